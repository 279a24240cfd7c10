use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum AddonType {
    #[default]
    Extension,
    Theme,
    Locale,
    Dictionary,
    #[serde(rename = "sitepermission")]
    SitePermission,
    #[serde(other)]
    Unknown,
}

impl AddonType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extension => "extension",
            Self::Theme => "theme",
            Self::Locale => "locale",
            Self::Dictionary => "dictionary",
            Self::SitePermission => "sitepermission",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "extension" => Some(Self::Extension),
            "theme" => Some(Self::Theme),
            "locale" => Some(Self::Locale),
            "dictionary" => Some(Self::Dictionary),
            "sitepermission" => Some(Self::SitePermission),
            _ => None,
        }
    }

    /// Types whose packages carry a signature that the signing policy applies to.
    pub fn is_signed_type(self) -> bool {
        matches!(self, Self::Extension | Self::Locale | Self::Theme)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SignedState {
    Broken,
    Unsigned,
    Missing,
    Preliminary,
    Signed,
    System,
    Privileged,
    NotRequired,
}

impl SignedState {
    fn rank(self) -> i8 {
        match self {
            Self::Broken => -2,
            Self::Unsigned => -1,
            Self::Missing => 0,
            Self::Preliminary => 1,
            Self::Signed => 2,
            Self::System => 3,
            Self::Privileged => 4,
            Self::NotRequired => 0,
        }
    }

    /// True when a valid signature of any kind is present.
    pub fn has_valid_signature(self) -> bool {
        self.rank() > Self::Missing.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Broken => "broken",
            Self::Unsigned => "unsigned",
            Self::Missing => "missing",
            Self::Preliminary => "preliminary",
            Self::Signed => "signed",
            Self::System => "system",
            Self::Privileged => "privileged",
            Self::NotRequired => "not-required",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum BlocklistState {
    #[default]
    NotBlocked,
    SoftBlocked,
    Blocked,
}

impl BlocklistState {
    pub fn is_blocked(self) -> bool {
        self > Self::NotBlocked
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotBlocked => "not-blocked",
            Self::SoftBlocked => "soft-blocked",
            Self::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetApplication {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetPlatform {
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InstallTelemetryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl InstallTelemetryInfo {
    pub fn sideload(location: &str) -> Self {
        Self {
            source: Some(location.to_string()),
            method: Some("sideload".to_string()),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocaleInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(
        rename = "homepageURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub homepage_url: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Manifest-derived metadata carried through the database without interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Passthrough {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<Value>,
    #[serde(rename = "iconURL", default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locales: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<LocaleInfo>,
    #[serde(rename = "optionsURL", default, skip_serializing_if = "Option::is_none")]
    pub options_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_browser_style: Option<Value>,
    #[serde(rename = "aboutURL", default, skip_serializing_if = "Option::is_none")]
    pub about_url: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skinnable: Option<Value>,
    #[serde(rename = "sourceURI", default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<Value>,
    #[serde(
        rename = "releaseNotesURI",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub release_notes_uri: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_background_updates: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incognito: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_permissions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_permissions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_permissions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_state: Option<Value>,
}

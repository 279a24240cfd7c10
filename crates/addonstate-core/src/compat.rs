use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::{InstallLocation, SigningRule};
use crate::record::{AddonRecord, TOOLKIT_ID};
use crate::types::{AddonType, BlocklistState, SignedState};
use crate::version::compare_versions;

/// The running application that compatibility is judged against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppInfo {
    pub id: String,
    pub version: String,
    pub platform_version: String,
    pub os: String,
    pub abi: Option<String>,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            id: TOOLKIT_ID.to_string(),
            version: "1.0".to_string(),
            platform_version: "1.0".to_string(),
            os: std::env::consts::OS.to_string(),
            abi: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatSettings {
    pub require_signing: bool,
    pub langpacks_require_signing: bool,
    pub dev_root: bool,
    pub check_compatibility: bool,
    pub strict_compatibility: bool,
    pub check_update_security: bool,
}

impl Default for CompatSettings {
    fn default() -> Self {
        Self {
            require_signing: true,
            langpacks_require_signing: true,
            dev_root: false,
            check_compatibility: true,
            strict_compatibility: true,
            check_update_security: true,
        }
    }
}

/// Enterprise policy predicates. Every default allows everything.
pub trait InstallPolicy: Send + Sync {
    fn is_installed_by_policy(&self, _id: &str) -> bool {
        false
    }

    fn may_install(&self, _record: &AddonRecord) -> bool {
        true
    }

    fn allows_extension_installs(&self) -> bool {
        true
    }

    fn allows_uninstall(&self, _id: &str) -> bool {
        true
    }

    fn allows_disable(&self, _id: &str) -> bool {
        true
    }

    fn updates_disabled(&self, _id: &str) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPolicy;

impl InstallPolicy for AllowAllPolicy {}

/// Answers whether a dependency id is currently active.
pub trait DependencyState {
    fn is_active(&self, id: &str) -> bool;
}

impl<F> DependencyState for F
where
    F: Fn(&str) -> bool,
{
    fn is_active(&self, id: &str) -> bool {
        self(id)
    }
}

/// Everything besides the record and its location that `app_disabled` depends on.
#[derive(Clone, Copy)]
pub struct CompatContext<'a> {
    pub app: &'a AppInfo,
    pub settings: &'a CompatSettings,
    pub policy: &'a dyn InstallPolicy,
    pub dependencies: &'a dyn DependencyState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableReason {
    NotCorrectlySigned,
    PolicyInstallOnly,
    Blocklisted,
    BrokenManifest,
    InsecureUpdates,
    PlatformIncompatible,
    DependencyInactive(String),
    Legacy,
    AppVersionIncompatible,
    NoTargetApplication,
    BlockedByPolicy,
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCorrectlySigned => f.write_str("not correctly signed"),
            Self::PolicyInstallOnly => {
                f.write_str("installable only by policy, but no policy entry exists")
            }
            Self::Blocklisted => f.write_str("blocklisted"),
            Self::BrokenManifest => f.write_str("manifest could not be read"),
            Self::InsecureUpdates => f.write_str("updates must be provided over https"),
            Self::PlatformIncompatible => f.write_str("not compatible with platform"),
            Self::DependencyInactive(id) => write!(f, "dependency '{id}' is not active"),
            Self::Legacy => f.write_str("legacy extension format"),
            Self::AppVersionIncompatible => {
                f.write_str("not compatible with application version")
            }
            Self::NoTargetApplication => f.write_str("no matching target application"),
            Self::BlockedByPolicy => f.write_str("install rejected by policy"),
        }
    }
}

pub fn must_sign(addon_type: AddonType, settings: &CompatSettings) -> bool {
    if !addon_type.is_signed_type() {
        return false;
    }
    if addon_type == AddonType::Locale {
        return settings.langpacks_require_signing;
    }
    settings.require_signing
}

pub fn is_correctly_signed(
    record: &AddonRecord,
    location: &InstallLocation,
    app: &AppInfo,
) -> bool {
    match location.signing {
        SigningRule::SystemOrPrivileged => {
            return matches!(
                record.signed_state,
                Some(SignedState::System | SignedState::Privileged)
            );
        }
        SigningRule::SystemOnly => return record.signed_state == Some(SignedState::System),
        SigningRule::Exempt => return true,
        SigningRule::ExemptUnlessDarwin if !app.os.eq_ignore_ascii_case("darwin") => return true,
        SigningRule::ExemptUnlessDarwin | SigningRule::Standard => {}
    }

    match record.signed_state {
        Some(SignedState::NotRequired) => true,
        Some(state) => state.has_valid_signature(),
        None => false,
    }
}

/// An empty target platform list is compatible with everything. A platform
/// entry that names the running OS and an ABI only matches when the ABI
/// matches as well.
pub fn is_platform_compatible(record: &AddonRecord, app: &AppInfo) -> bool {
    if record.target_platforms.is_empty() {
        return true;
    }

    let mut matched_os = false;
    let mut needs_abi = false;
    for platform in &record.target_platforms {
        if platform.os != app.os {
            continue;
        }
        match platform.abi.as_deref() {
            Some(abi) => {
                needs_abi = true;
                if app.abi.as_deref() == Some(abi) {
                    return true;
                }
            }
            None => matched_os = true,
        }
    }

    matched_os && !needs_abi
}

pub fn is_compatible_with(
    record: &AddonRecord,
    app: &AppInfo,
    settings: &CompatSettings,
) -> bool {
    let Some(target) = record.matching_target_application(&app.id) else {
        return false;
    };

    let min_version = target.min_version.as_deref().unwrap_or("0");
    let max_version = target.max_version.as_deref().unwrap_or("*");
    let version = if target.id == app.id {
        app.version.as_str()
    } else {
        app.platform_version.as_str()
    };

    let at_least_min = compare_versions(version, min_version) != Ordering::Less;
    if !record.strict_compatibility
        && (!settings.strict_compatibility || record.addon_type == AddonType::Dictionary)
    {
        return at_least_min;
    }

    at_least_min && compare_versions(version, max_version) != Ordering::Greater
}

/// First reason `record` must be disabled by the application, if any.
pub fn evaluate_app_disabled(
    record: &AddonRecord,
    location: &InstallLocation,
    ctx: &CompatContext<'_>,
) -> Option<DisableReason> {
    let signing_required = must_sign(record.addon_type, ctx.settings);
    if signing_required && !is_correctly_signed(record, location, ctx.app) {
        return Some(DisableReason::NotCorrectlySigned);
    }

    if signing_required
        && record.admin_install_only
        && !ctx.policy.is_installed_by_policy(&record.id)
    {
        return Some(DisableReason::PolicyInstallOnly);
    }

    if record.blocklist_state == BlocklistState::Blocked {
        return Some(DisableReason::Blocklisted);
    }

    if record.broken_manifest {
        return Some(DisableReason::BrokenManifest);
    }

    if ctx.settings.check_update_security && !record.provides_updates_securely() {
        return Some(DisableReason::InsecureUpdates);
    }

    if !is_platform_compatible(record, ctx.app) {
        return Some(DisableReason::PlatformIncompatible);
    }

    if let Some(inactive) = record
        .dependencies()
        .iter()
        .find(|id| !ctx.dependencies.is_active(id))
    {
        return Some(DisableReason::DependencyInactive(inactive.clone()));
    }

    if !record.is_web_extension() {
        return Some(DisableReason::Legacy);
    }

    if ctx.settings.check_compatibility {
        if !is_compatible_with(record, ctx.app, ctx.settings) {
            return Some(DisableReason::AppVersionIncompatible);
        }
    } else if record.matching_target_application(&ctx.app.id).is_none() {
        return Some(DisableReason::NoTargetApplication);
    }

    if location.is_system_or_builtin() {
        return None;
    }

    if !ctx.policy.may_install(record) {
        return Some(DisableReason::BlockedByPolicy);
    }

    None
}

pub fn compute_app_disabled(
    record: &AddonRecord,
    location: &InstallLocation,
    ctx: &CompatContext<'_>,
) -> bool {
    evaluate_app_disabled(record, location, ctx).is_some()
}

impl AddonRecord {
    /// Recomputes `app_disabled` and returns the reason when it is set.
    pub fn refresh_app_disabled(
        &mut self,
        location: &InstallLocation,
        ctx: &CompatContext<'_>,
    ) -> Option<DisableReason> {
        let reason = evaluate_app_disabled(self, location, ctx);
        self.app_disabled = reason.is_some();
        reason
    }

    /// Marks the manifest unreadable, which always disables the record.
    pub fn mark_broken_manifest(&mut self) {
        self.broken_manifest = true;
        self.app_disabled = true;
    }
}

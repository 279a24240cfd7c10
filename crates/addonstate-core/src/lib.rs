mod compat;
mod location;
mod manifest;
mod record;
mod types;
mod version;
mod view;

pub use compat::{
    compute_app_disabled, evaluate_app_disabled, is_compatible_with, is_correctly_signed,
    is_platform_compatible, must_sign, AllowAllPolicy, AppInfo, CompatContext, CompatSettings,
    DependencyState, DisableReason, InstallPolicy,
};
pub use location::{
    validate_location_name, InstallLocation, LocationScope, SigningRule, KEY_APP_BUILTINS,
    KEY_APP_GLOBAL, KEY_APP_PROFILE, KEY_APP_SYSTEM_ADDONS, KEY_APP_SYSTEM_BUILTINS,
    KEY_APP_SYSTEM_LOCAL, KEY_APP_SYSTEM_PROFILE, KEY_APP_SYSTEM_SHARE, KEY_APP_SYSTEM_USER,
    KEY_APP_TEMPORARY,
};
pub use manifest::{AddonManifest, ManifestError};
pub use record::{AddonKey, AddonRecord, TOOLKIT_ID};
pub use types::{
    AddonType, BlocklistState, InstallTelemetryInfo, LocaleInfo, Passthrough, SignedState,
    TargetApplication, TargetPlatform,
};
pub use version::compare_versions;
pub use view::{AddonView, Permissions, RepositoryData, DEFAULT_THEME_ID};

#[cfg(test)]
mod tests;

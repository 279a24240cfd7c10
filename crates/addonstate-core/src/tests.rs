use super::*;
use std::cmp::Ordering;

use serde_json::json;

fn test_app() -> AppInfo {
    AppInfo {
        id: "app@example.test".to_string(),
        version: "100.0".to_string(),
        platform_version: "100.0".to_string(),
        os: "Linux".to_string(),
        abi: Some("x86_64-gcc3".to_string()),
    }
}

fn signed_manifest(id: &str) -> AddonManifest {
    let mut manifest = AddonManifest::new(id, "1.0");
    manifest.signed_state = Some(SignedState::Signed);
    manifest.target_applications = vec![TargetApplication {
        id: TOOLKIT_ID.to_string(),
        min_version: Some("1.0".to_string()),
        max_version: Some("200.*".to_string()),
    }];
    manifest
}

fn profile_record(id: &str) -> AddonRecord {
    let mut record = AddonRecord::from_manifest(signed_manifest(id), KEY_APP_PROFILE);
    record.visible = true;
    record
}

fn evaluate(record: &AddonRecord, location: &InstallLocation) -> Option<DisableReason> {
    let app = test_app();
    let settings = CompatSettings::default();
    let active = |_: &str| true;
    let ctx = CompatContext {
        app: &app,
        settings: &settings,
        policy: &AllowAllPolicy,
        dependencies: &active,
    };
    evaluate_app_disabled(record, location, &ctx)
}

struct DenyAllPolicy;

impl InstallPolicy for DenyAllPolicy {
    fn may_install(&self, _record: &AddonRecord) -> bool {
        false
    }

    fn allows_disable(&self, _id: &str) -> bool {
        false
    }

    fn allows_uninstall(&self, _id: &str) -> bool {
        false
    }
}

#[test]
fn compare_versions_treats_missing_parts_as_zero() {
    assert_eq!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
    assert_eq!(compare_versions("1", "1.0.0.0"), Ordering::Equal);
    assert_eq!(compare_versions("2.0", "10.0"), Ordering::Less);
    assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
}

#[test]
fn compare_versions_orders_pre_releases_before_release() {
    assert_eq!(compare_versions("1.0pre1", "1.0"), Ordering::Less);
    assert_eq!(compare_versions("1.0a", "1.0b"), Ordering::Less);
    assert_eq!(compare_versions("1.0pre1", "1.0pre2"), Ordering::Less);
    assert_eq!(compare_versions("1.1+", "1.2pre"), Ordering::Equal);
    assert_eq!(compare_versions("1.1+", "1.1"), Ordering::Greater);
}

#[test]
fn compare_versions_star_is_larger_than_any_number() {
    assert_eq!(compare_versions("*", "99999"), Ordering::Greater);
    assert_eq!(compare_versions("100.0", "200.*"), Ordering::Less);
    assert_eq!(compare_versions("200.5", "200.*"), Ordering::Less);
}

#[test]
fn manifest_rejects_self_dependency_and_duplicate_targets() {
    let raw = r#"{"id":"a@test","version":"1.0","dependencies":["a@test"]}"#;
    let err = AddonManifest::from_json_str(raw).expect_err("must reject self dependency");
    assert!(err.to_string().contains("depends on itself"));

    let raw = r#"{
        "id":"a@test",
        "version":"1.0",
        "targetApplications":[{"id":"x"},{"id":"x"}]
    }"#;
    let err = AddonManifest::from_json_str(raw).expect_err("must reject duplicate target");
    assert!(err.to_string().contains("duplicate target application"));
}

#[test]
fn manifest_parses_camel_case_fields_and_passthrough() {
    let raw = r#"{
        "id":"a@test",
        "version":"2.1",
        "type":"theme",
        "updateURL":"https://updates.example.test",
        "signedState":"privileged",
        "signedTypes":["privileged"],
        "defaultLocale":{"name":"A Theme","creator":"Someone","contributors":["x"]},
        "iconURL":"icon.png"
    }"#;
    let manifest = AddonManifest::from_json_str(raw).expect("must parse manifest");
    assert_eq!(manifest.addon_type, AddonType::Theme);
    assert_eq!(manifest.signed_state, Some(SignedState::Privileged));
    assert_eq!(manifest.manifest_version, 2);
    let locale = manifest
        .passthrough
        .default_locale
        .as_ref()
        .expect("must keep default locale");
    assert_eq!(locale.name.as_deref(), Some("A Theme"));
    assert!(locale.extra.contains_key("contributors"));
    assert_eq!(manifest.passthrough.icon_url, Some(json!("icon.png")));
}

#[test]
fn manifest_expect_id_reports_mismatch() {
    let manifest = AddonManifest::new("a@test", "1.0");
    assert!(manifest.expect_id("a@test").is_ok());
    assert_eq!(
        manifest.expect_id("b@test"),
        Err(ManifestError::IdMismatch {
            expected: "b@test".to_string(),
            found: "a@test".to_string(),
        })
    );
}

#[test]
fn unknown_addon_type_deserializes_as_unknown() {
    let manifest: AddonManifest =
        serde_json::from_value(json!({"id":"a@test","version":"1","type":"service"}))
            .expect("must parse");
    assert_eq!(manifest.addon_type, AddonType::Unknown);
}

#[test]
fn record_serialization_skips_active_and_transient_fields() {
    let mut record = profile_record("a@test");
    record.sync_guid = Some("guid-1".to_string());
    record.mark_broken_manifest();

    let value = serde_json::to_value(&record).expect("must serialize");
    assert_eq!(value["syncGUID"], json!("guid-1"));
    assert_eq!(value["location"], json!(KEY_APP_PROFILE));
    assert_eq!(value["appDisabled"], json!(true));
    assert!(value.get("active").is_none());
    assert!(value.get("brokenManifest").is_none());
    assert!(value.get("adminInstallOnly").is_none());
}

#[test]
fn record_deserialization_defaults_missing_and_drops_unknown_fields() {
    let record: AddonRecord = serde_json::from_value(json!({
        "id": "a@test",
        "location": "app-profile",
        "version": "1.0",
        "active": true,
        "someFutureField": {"nested": 1},
    }))
    .expect("must decode");
    assert!(record.seen);
    assert_eq!(record.manifest_version, 2);
    assert_eq!(record.blocklist_state, BlocklistState::NotBlocked);
    assert!(!record.visible);
    assert!(!record.is_active());
    assert!(record.dependencies().is_empty());
}

#[test]
fn active_is_derived_from_visibility_and_disable_flags() {
    let mut record = profile_record("a@test");
    assert!(record.is_active());

    record.soft_disabled = true;
    assert!(record.disabled());
    assert!(!record.is_active());

    record.soft_disabled = false;
    record.pending_uninstall = true;
    assert!(!record.disabled());
    assert!(!record.is_active());

    record.pending_uninstall = false;
    record.visible = false;
    assert!(!record.is_active());
}

#[test]
fn signing_rules_follow_location() {
    let app = test_app();
    let mut record = profile_record("a@test");

    record.signed_state = Some(SignedState::Signed);
    assert!(is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_PROFILE),
        &app
    ));
    assert!(!is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_SYSTEM_ADDONS),
        &app
    ));
    assert!(!is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_SYSTEM_PROFILE),
        &app
    ));

    record.signed_state = Some(SignedState::Privileged);
    assert!(is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_SYSTEM_PROFILE),
        &app
    ));

    record.signed_state = Some(SignedState::Missing);
    assert!(!is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_PROFILE),
        &app
    ));
    assert!(is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_TEMPORARY),
        &app
    ));
    assert!(is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_SYSTEM_SHARE),
        &app
    ));

    let darwin = AppInfo {
        os: "Darwin".to_string(),
        ..test_app()
    };
    assert!(!is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_SYSTEM_SHARE),
        &darwin
    ));

    record.signed_state = Some(SignedState::NotRequired);
    assert!(is_correctly_signed(
        &record,
        &InstallLocation::new(KEY_APP_PROFILE),
        &app
    ));
}

#[test]
fn platform_with_abi_requires_matching_abi() {
    let app = test_app();
    let mut record = profile_record("a@test");
    assert!(is_platform_compatible(&record, &app));

    record.target_platforms = vec![TargetPlatform {
        os: "Linux".to_string(),
        abi: Some("arm-gcc3".to_string()),
    }];
    assert!(!is_platform_compatible(&record, &app));

    record.target_platforms.push(TargetPlatform {
        os: "Linux".to_string(),
        abi: None,
    });
    assert!(!is_platform_compatible(&record, &app));

    record.target_platforms = vec![TargetPlatform {
        os: "Linux".to_string(),
        abi: None,
    }];
    assert!(is_platform_compatible(&record, &app));

    record.target_platforms = vec![TargetPlatform {
        os: "WINNT".to_string(),
        abi: None,
    }];
    assert!(!is_platform_compatible(&record, &app));
}

#[test]
fn non_strict_compatibility_only_checks_minimum() {
    let app = test_app();
    let mut record = profile_record("a@test");
    record.target_applications = vec![TargetApplication {
        id: app.id.clone(),
        min_version: Some("50.0".to_string()),
        max_version: Some("60.0".to_string()),
    }];

    let strict = CompatSettings::default();
    assert!(!is_compatible_with(&record, &app, &strict));

    let lenient = CompatSettings {
        strict_compatibility: false,
        ..CompatSettings::default()
    };
    assert!(is_compatible_with(&record, &app, &lenient));

    record.strict_compatibility = true;
    assert!(!is_compatible_with(&record, &app, &lenient));
}

#[test]
fn application_target_is_preferred_over_toolkit() {
    let app = test_app();
    let mut record = profile_record("a@test");
    record.target_applications.push(TargetApplication {
        id: app.id.clone(),
        min_version: Some("101.0".to_string()),
        max_version: None,
    });
    let target = record
        .matching_target_application(&app.id)
        .expect("must match app target");
    assert_eq!(target.id, app.id);
    assert!(!is_compatible_with(&record, &app, &CompatSettings::default()));
}

#[test]
fn calculator_reports_signature_before_blocklist() {
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let mut record = profile_record("a@test");
    record.signed_state = Some(SignedState::Missing);
    record.blocklist_state = BlocklistState::Blocked;
    assert_eq!(
        evaluate(&record, &location),
        Some(DisableReason::NotCorrectlySigned)
    );

    record.signed_state = Some(SignedState::Signed);
    assert_eq!(evaluate(&record, &location), Some(DisableReason::Blocklisted));

    record.blocklist_state = BlocklistState::SoftBlocked;
    assert_eq!(evaluate(&record, &location), None);
}

#[test]
fn calculator_checks_each_disable_reason() {
    let location = InstallLocation::new(KEY_APP_PROFILE);

    let mut record = profile_record("a@test");
    record.broken_manifest = true;
    assert_eq!(
        evaluate(&record, &location),
        Some(DisableReason::BrokenManifest)
    );

    let mut record = profile_record("a@test");
    record.update_url = Some("http://updates.example.test".to_string());
    assert_eq!(
        evaluate(&record, &location),
        Some(DisableReason::InsecureUpdates)
    );

    let mut record = profile_record("a@test");
    record.loader = Some("bootstrap".to_string());
    assert_eq!(evaluate(&record, &location), Some(DisableReason::Legacy));

    let mut record = profile_record("a@test");
    record.target_applications.clear();
    assert_eq!(
        evaluate(&record, &location),
        Some(DisableReason::AppVersionIncompatible)
    );

    let mut record = profile_record("a@test");
    record.admin_install_only = true;
    assert_eq!(
        evaluate(&record, &location),
        Some(DisableReason::PolicyInstallOnly)
    );
}

#[test]
fn calculator_without_compat_checking_requires_target_application() {
    let app = test_app();
    let settings = CompatSettings {
        check_compatibility: false,
        ..CompatSettings::default()
    };
    let active = |_: &str| true;
    let ctx = CompatContext {
        app: &app,
        settings: &settings,
        policy: &AllowAllPolicy,
        dependencies: &active,
    };
    let location = InstallLocation::new(KEY_APP_PROFILE);

    let mut record = profile_record("a@test");
    record.target_applications[0].max_version = Some("2.0".to_string());
    assert_eq!(evaluate_app_disabled(&record, &location, &ctx), None);

    record.target_applications.clear();
    assert_eq!(
        evaluate_app_disabled(&record, &location, &ctx),
        Some(DisableReason::NoTargetApplication)
    );
}

#[test]
fn policy_rejection_is_skipped_for_system_and_builtin_locations() {
    let app = test_app();
    let settings = CompatSettings::default();
    let active = |_: &str| true;
    let ctx = CompatContext {
        app: &app,
        settings: &settings,
        policy: &DenyAllPolicy,
        dependencies: &active,
    };

    let record = profile_record("a@test");
    assert_eq!(
        evaluate_app_disabled(&record, &InstallLocation::new(KEY_APP_PROFILE), &ctx),
        Some(DisableReason::BlockedByPolicy)
    );
    assert_eq!(
        evaluate_app_disabled(&record, &InstallLocation::new(KEY_APP_BUILTINS), &ctx),
        None
    );
}

#[test]
fn calculator_is_idempotent_and_side_effect_free() {
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let mut record = profile_record("a@test");
    record.signed_state = Some(SignedState::Unsigned);
    let before = record.clone();

    let app = test_app();
    let settings = CompatSettings::default();
    let active = |_: &str| true;
    let ctx = CompatContext {
        app: &app,
        settings: &settings,
        policy: &AllowAllPolicy,
        dependencies: &active,
    };

    let first = compute_app_disabled(&record, &location, &ctx);
    let second = compute_app_disabled(&record, &location, &ctx);
    assert!(first);
    assert_eq!(first, second);
    assert_eq!(record, before);
}

#[test]
fn dependency_gating_follows_dependency_activity() {
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let mut manifest = signed_manifest("a@test");
    manifest.dependencies = vec!["b@test".to_string()];
    let mut record = AddonRecord::from_manifest(manifest, KEY_APP_PROFILE);
    record.visible = true;

    let app = test_app();
    let settings = CompatSettings::default();

    let inactive = |_: &str| false;
    let ctx = CompatContext {
        app: &app,
        settings: &settings,
        policy: &AllowAllPolicy,
        dependencies: &inactive,
    };
    assert_eq!(
        record.refresh_app_disabled(&location, &ctx),
        Some(DisableReason::DependencyInactive("b@test".to_string()))
    );
    assert!(record.app_disabled());
    assert!(!record.is_active());

    let active = |id: &str| id == "b@test";
    let ctx = CompatContext {
        dependencies: &active,
        ..ctx
    };
    assert_eq!(record.refresh_app_disabled(&location, &ctx), None);
    assert!(!record.app_disabled());
    assert!(record.is_active());
}

#[test]
fn hidden_requires_privilege_outside_temporary_locations() {
    let mut record = profile_record("a@test");
    record.hidden = true;
    assert!(!record.is_hidden(&InstallLocation::new(KEY_APP_PROFILE)));

    record.signed_state = Some(SignedState::Privileged);
    assert!(record.is_hidden(&InstallLocation::new(KEY_APP_PROFILE)));
    assert!(!record.is_hidden(&InstallLocation::new(KEY_APP_TEMPORARY)));

    let hidden_location = InstallLocation::new(KEY_APP_PROFILE).with_hidden(true);
    record.hidden = false;
    assert!(record.is_hidden(&hidden_location));
}

#[test]
fn permissions_follow_location_and_policy() {
    let record = profile_record("a@test");
    let profile = InstallLocation::new(KEY_APP_PROFILE);
    let view = AddonView::new(&record, &profile);

    let permissions = view.permissions(&AllowAllPolicy, LocationScope::PROFILE);
    assert!(permissions.contains(Permissions::DISABLE));
    assert!(permissions.contains(Permissions::UPGRADE));
    assert!(permissions.contains(Permissions::UNINSTALL));
    assert!(permissions.contains(Permissions::API_UNINSTALL));
    assert!(!permissions.contains(Permissions::ENABLE));

    let denied = view.permissions(&DenyAllPolicy, LocationScope::PROFILE);
    assert!(!denied.contains(Permissions::DISABLE));
    assert!(!denied.contains(Permissions::UNINSTALL));
    assert!(denied.contains(Permissions::API_UNINSTALL));

    let builtin = InstallLocation::new(KEY_APP_BUILTINS);
    let mut builtin_record = record.clone();
    builtin_record.location = KEY_APP_BUILTINS.to_string();
    builtin_record.user_disabled = true;
    let permissions = AddonView::new(&builtin_record, &builtin)
        .permissions(&AllowAllPolicy, LocationScope::PROFILE);
    assert_eq!(permissions, Permissions::ENABLE);
}

#[test]
fn default_theme_cannot_be_disabled() {
    let mut manifest = signed_manifest(DEFAULT_THEME_ID);
    manifest.addon_type = AddonType::Theme;
    let record = AddonRecord::from_manifest(manifest, KEY_APP_PROFILE);
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let permissions =
        AddonView::new(&record, &location).permissions(&AllowAllPolicy, LocationScope::PROFILE);
    assert!(!permissions.contains(Permissions::DISABLE));
    assert_eq!(permissions.to_string(), "upgrade,uninstall,api-uninstall");
}

#[test]
fn view_merges_repository_data_per_field() {
    let mut record = profile_record("a@test");
    record.passthrough.default_locale = Some(LocaleInfo {
        name: Some("Local Name".to_string()),
        creator: Some("Local Creator".to_string()),
        ..LocaleInfo::default()
    });
    let repository = RepositoryData {
        name: Some("Repo Name".to_string()),
        description: Some("Repo Description".to_string()),
        creator: Some("Repo Creator".to_string()),
        ..RepositoryData::default()
    };
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let view = AddonView::new(&record, &location).with_repository(Some(&repository));

    assert_eq!(view.name().as_deref(), Some("Local Name"));
    assert_eq!(view.description().as_deref(), Some("Repo Description"));
    assert_eq!(view.creator().as_deref(), Some("Repo Creator"));
    assert_eq!(view.homepage_url(), None);
}

#[test]
fn refresh_from_manifest_keeps_user_owned_fields() {
    let mut record = profile_record("a@test");
    record.user_disabled = true;
    record.sync_guid = Some("guid".to_string());
    record.passthrough.source_uri = Some(json!("https://example.test/a.xpi"));

    let mut manifest = signed_manifest("a@test");
    manifest.version = "1.5".to_string();
    manifest.target_applications.clear();
    record.refresh_from_manifest(&manifest, true);

    assert_eq!(record.version, "1.5");
    assert!(record.user_disabled);
    assert_eq!(record.sync_guid.as_deref(), Some("guid"));
    assert_eq!(record.target_applications.len(), 1);
    assert_eq!(
        record.passthrough.source_uri,
        Some(json!("https://example.test/a.xpi"))
    );
}

use super::*;
use std::collections::BTreeMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use addonstate_core::{
    AddonKey, AddonManifest, AddonRecord, BlocklistState, InstallLocation, LocationScope,
    ManifestError, SignedState, KEY_APP_GLOBAL, KEY_APP_PROFILE, KEY_APP_SYSTEM_ADDONS,
};
use addonstate_db::{
    AttentionInfo, LocationInstaller, LocationScanner, ManifestLoader, SignatureVerifier,
    StartupChanges,
};
use addonstate_store::ProfileLayout;
use clap::error::ErrorKind;
use serde_json::json;

use crate::completion::write_completions_script;
use crate::config::{load_profile_config, ProfileConfig};
use crate::dispatch::{open_session, run_database_command, Session};
use crate::fs_locations::DirectoryLocations;
use crate::render::{
    addon_state_label, format_addon_line, format_attention_lines, format_startup_changes,
    render_status_line, resolve_output_style, OutputStyle,
};
use crate::services::JsonBlocklist;

static TEST_PROFILE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_layout() -> ProfileLayout {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_PROFILE_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "addonstate-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    ProfileLayout::new(path)
}

fn write_manifest(layout: &ProfileLayout, location: &str, manifest: serde_json::Value) {
    let id = manifest["id"].as_str().expect("must have id").to_string();
    let dir = layout.location_dir(location).join(&id);
    fs::create_dir_all(&dir).expect("must create package dir");
    fs::write(
        dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest).expect("must encode manifest"),
    )
    .expect("must write manifest");
}

fn signed_manifest(id: &str, version: &str) -> serde_json::Value {
    json!({
        "id": id,
        "version": version,
        "type": "extension",
        "signedState": "signed",
        "targetApplications": [
            { "id": addonstate_core::TOOLKIT_ID, "minVersion": "0", "maxVersion": "*" }
        ]
    })
}

fn record(id: &str) -> AddonRecord {
    let mut manifest = AddonManifest::new(id, "1.0");
    manifest.signed_state = Some(SignedState::Signed);
    let mut record = AddonRecord::from_manifest(manifest, KEY_APP_PROFILE);
    record.visible = true;
    record
}

#[test]
fn cli_parses_disable_with_allow_system() {
    let cli = Cli::try_parse_from(["addonstate", "disable", "ext@test", "--allow-system"])
        .expect("must parse");
    match cli.command {
        Commands::Disable { id, allow_system } => {
            assert_eq!(id, "ext@test");
            assert!(allow_system);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    assert_eq!(cli.profile, std::path::PathBuf::from("."));
}

#[test]
fn cli_parses_scan_app_changed_and_profile() {
    let cli = Cli::try_parse_from(["addonstate", "--profile", "/tmp/p", "scan", "--app-changed"])
        .expect("must parse");
    assert!(matches!(cli.command, Commands::Scan { app_changed: true }));
    assert_eq!(cli.profile, std::path::PathBuf::from("/tmp/p"));
}

#[test]
fn cli_rejects_unknown_completion_shell() {
    let err = Cli::try_parse_from(["addonstate", "completions", "tcsh"])
        .expect_err("must reject shell");
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

#[test]
fn completions_script_names_binary() {
    let mut output = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut output)
        .expect("must write completions");
    let script = String::from_utf8(output).expect("must be utf-8");
    assert!(script.contains("addonstate"));
    assert!(script.contains("set-sync-id"));
}

#[test]
fn profile_config_parses_locations_and_settings() {
    let config = ProfileConfig::from_toml_str(
        r#"
[app]
id = "app@example.org"
version = "128.0"

[settings]
require_signing = false
embedded = true
auto_disabled_scopes = ["application", "system"]
save_delay_ms = 5

[settings.system_addon_overrides]
"sys@example.org" = false

[[locations]]
name = "app-system-addons"

[[locations]]
name = "app-profile"
linked = ["dev@example.org"]

[[locations]]
name = "vendor"
scope = "system"
locked = true
hidden = true

[policy]
blocked = ["bad@example.org"]
"#,
    )
    .expect("must parse config");

    assert_eq!(config.app.id, "app@example.org");
    assert!(!config.settings.compat.require_signing);

    let locations = config.install_locations().expect("must build locations");
    let names: Vec<&str> = locations
        .iter()
        .map(|location| location.name.as_str())
        .collect();
    assert_eq!(names, vec![KEY_APP_SYSTEM_ADDONS, KEY_APP_PROFILE, "vendor"]);
    assert!(locations[0].is_system);
    assert!(locations[1].is_linked_addon("dev@example.org"));
    assert_eq!(locations[2].scope, LocationScope::SYSTEM);
    assert!(locations[2].locked);
    assert!(locations[2].hidden);

    let settings = config.database_settings().expect("must build settings");
    assert!(settings.is_embedded);
    assert!(settings.auto_disabled_scopes.intersects(LocationScope::APPLICATION));
    assert!(settings.auto_disabled_scopes.intersects(LocationScope::SYSTEM));
    assert!(!settings.auto_disabled_scopes.intersects(LocationScope::PROFILE));
    assert!(settings.sideload_scopes.intersects(LocationScope::PROFILE));
    assert_eq!(settings.save_delay, std::time::Duration::from_millis(5));
    assert_eq!(
        settings.system_addon_overrides.get("sys@example.org"),
        Some(&false)
    );
}

#[test]
fn profile_config_defaults_to_single_profile_location() {
    let config = ProfileConfig::from_toml_str("").expect("must parse empty config");
    let locations = config.install_locations().expect("must build locations");
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, KEY_APP_PROFILE);
    assert!(config.settings.compat.require_signing);
    assert!(config.policy.extension_installs);
}

#[test]
fn profile_config_rejects_duplicate_locations() {
    let err = ProfileConfig::from_toml_str(
        r#"
[[locations]]
name = "app-profile"

[[locations]]
name = "app-profile"
"#,
    )
    .expect_err("must reject duplicate");
    assert!(err.to_string().contains("duplicate install location"));
}

#[test]
fn profile_config_rejects_unknown_scope() {
    let err = ProfileConfig::from_toml_str(
        r#"
[settings]
sideload_scopes = ["galaxy"]
"#,
    )
    .expect_err("must reject scope");
    assert!(err.to_string().contains("unknown location scope"));
}

#[test]
fn profile_config_rejects_invalid_location_name() {
    ProfileConfig::from_toml_str(
        r#"
[[locations]]
name = "Not Valid"
"#,
    )
    .expect_err("must reject name");
}

#[test]
fn profile_config_rejects_unknown_top_level_key() {
    ProfileConfig::from_toml_str("registry = true\n").expect_err("must reject unknown key");
}

#[test]
fn load_profile_config_missing_file_uses_defaults() {
    let layout = test_layout();
    let config = load_profile_config(&layout).expect("must load defaults");
    assert_eq!(config, ProfileConfig::default());
}

#[test]
fn load_profile_config_reports_path_of_invalid_file() {
    let layout = test_layout();
    layout.ensure_base_dirs().expect("must create dirs");
    fs::write(layout.config_path(), "[[locations]]\nname = 3\n").expect("must write config");

    let err = load_profile_config(&layout).expect_err("must fail");
    assert!(format!("{err:#}").contains("addonstate.toml"));

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn policy_config_locks_and_blocks_ids() {
    use addonstate_core::InstallPolicy;

    let config = ProfileConfig::from_toml_str(
        r#"
[policy]
extension_installs = false
locked = ["pinned@example.org"]
blocked = ["bad@example.org"]
"#,
    )
    .expect("must parse config");

    assert!(!config.policy.allows_extension_installs());
    assert!(!config.policy.allows_disable("pinned@example.org"));
    assert!(!config.policy.allows_uninstall("pinned@example.org"));
    assert!(config.policy.allows_disable("other@example.org"));
    assert!(!config.policy.may_install(&record("bad@example.org")));
    assert!(config.policy.may_install(&record("good@example.org")));
}

#[test]
fn resolve_output_style_follows_stdout_tty() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(false, true), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "addon database up to date"),
        "addon database up to date"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "warn", "enable hook failed"),
        "[WARN] enable hook failed"
    );
}

#[test]
fn addon_state_label_prefers_most_specific_reason() {
    let mut addon = record("ext@test");
    assert_eq!(addon_state_label(&addon), "active");

    addon.user_disabled = true;
    assert_eq!(addon_state_label(&addon), "user-disabled");

    addon.soft_disabled = true;
    assert_eq!(addon_state_label(&addon), "soft-disabled");

    addon.pending_uninstall = true;
    assert_eq!(addon_state_label(&addon), "pending-uninstall");

    let mut shadowed = record("ext@test");
    shadowed.visible = false;
    assert_eq!(addon_state_label(&shadowed), "hidden-by-priority");
}

#[test]
fn format_addon_line_rich_marks_active_state() {
    let mut addon = record("ext@test");
    assert_eq!(
        format_addon_line(&addon, OutputStyle::Rich),
        "[ON] ext@test 1.0 type=extension location=app-profile state=active"
    );

    addon.user_disabled = true;
    assert_eq!(
        format_addon_line(&addon, OutputStyle::Plain),
        "ext@test 1.0 type=extension location=app-profile state=user-disabled"
    );
}

#[test]
fn format_startup_changes_lists_each_group() {
    let empty = format_startup_changes(&StartupChanges::default(), OutputStyle::Plain);
    assert_eq!(empty, vec!["addon database up to date".to_string()]);

    let changes = StartupChanges {
        installed: vec!["a@test".to_string(), "b@test".to_string()],
        uninstalled: vec!["c@test".to_string()],
        ..StartupChanges::default()
    };
    assert_eq!(
        format_startup_changes(&changes, OutputStyle::Rich),
        vec![
            "[OK] installed: a@test, b@test".to_string(),
            "[OK] uninstalled: c@test".to_string(),
        ]
    );
}

#[test]
fn format_attention_lines_reports_severity() {
    let info = AttentionInfo {
        addons: vec!["bad@test".to_string()],
        should_show: true,
        has_soft_blocked: false,
        has_hard_blocked: true,
        count: 1,
    };
    assert_eq!(
        format_attention_lines(&info, OutputStyle::Plain),
        vec![
            "1 blocked addon(s) need attention".to_string(),
            "- bad@test".to_string(),
        ]
    );
    assert_eq!(
        format_attention_lines(&AttentionInfo::default(), OutputStyle::Plain),
        vec!["no blocked addons need attention".to_string()]
    );
}

#[test]
fn directory_scan_lists_packages_with_manifests() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("b@test", "2.0"));
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("a@test", "1.5"));
    fs::create_dir_all(layout.location_dir(KEY_APP_PROFILE).join("empty@test"))
        .expect("must create empty dir");
    fs::write(layout.location_dir(KEY_APP_PROFILE).join("stray.txt"), "x")
        .expect("must write stray file");

    let location = InstallLocation::new(KEY_APP_PROFILE);
    let locations = DirectoryLocations::new(layout.clone(), vec![location.clone()]);
    let scanned = locations.scan(&location).expect("must scan");

    let ids: Vec<&str> = scanned.iter().map(|addon| addon.id.as_str()).collect();
    assert_eq!(ids, vec!["a@test", "b@test"]);
    assert_eq!(scanned[0].version, "1.5");
    assert!(scanned[0].mtime > 0);
    assert_eq!(scanned[0].path, "a@test");
    let root_uri = scanned[0].root_uri.as_deref().expect("must have root uri");
    assert!(root_uri.starts_with("file://"));
    assert!(root_uri.ends_with("a@test/"));

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn directory_scan_of_missing_location_is_empty() {
    let layout = test_layout();
    let location = InstallLocation::new(KEY_APP_GLOBAL);
    let locations = DirectoryLocations::new(layout, vec![location.clone()]);
    assert!(locations.scan(&location).expect("must scan").is_empty());
}

#[test]
fn load_manifest_rejects_mismatched_id() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("real@test", "1.0"));
    fs::rename(
        layout.location_dir(KEY_APP_PROFILE).join("real@test"),
        layout.location_dir(KEY_APP_PROFILE).join("alias@test"),
    )
    .expect("must rename package");

    let location = InstallLocation::new(KEY_APP_PROFILE);
    let locations = DirectoryLocations::new(layout.clone(), vec![location.clone()]);
    let scanned = locations.scan(&location).expect("must scan");
    let err = locations
        .load_manifest(&location, &scanned[0])
        .expect_err("must reject id");
    assert!(matches!(err, ManifestError::IdMismatch { .. }));

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn load_manifest_reports_invalid_json() {
    let layout = test_layout();
    let dir = layout.location_dir(KEY_APP_PROFILE).join("broken@test");
    fs::create_dir_all(&dir).expect("must create dir");
    fs::write(dir.join("manifest.json"), "{ not json").expect("must write manifest");

    let location = InstallLocation::new(KEY_APP_PROFILE);
    let locations = DirectoryLocations::new(layout.clone(), vec![location.clone()]);
    let scanned = locations.scan(&location).expect("must scan");
    assert_eq!(scanned[0].version, "");
    let err = locations
        .load_manifest(&location, &scanned[0])
        .expect_err("must reject manifest");
    assert!(matches!(err, ManifestError::Invalid { .. }));

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn uninstall_removes_package_directory() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("gone@test", "1.0"));
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let locations = DirectoryLocations::new(layout.clone(), vec![location.clone()]);

    locations
        .uninstall_addon(&location, "gone@test")
        .expect("must uninstall");
    assert!(!locations.package_dir(KEY_APP_PROFILE, "gone@test").exists());
    locations
        .uninstall_addon(&location, "gone@test")
        .expect("missing package is already uninstalled");

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn uninstall_refuses_locked_location() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_GLOBAL, signed_manifest("kept@test", "1.0"));
    let location = InstallLocation::new(KEY_APP_GLOBAL);
    let locations = DirectoryLocations::new(layout.clone(), vec![location.clone()]);

    locations
        .uninstall_addon(&location, "kept@test")
        .expect_err("must refuse locked location");
    assert!(locations.package_dir(KEY_APP_GLOBAL, "kept@test").exists());

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn invalid_system_addons_are_those_without_system_signature() {
    let layout = test_layout();
    let location = InstallLocation::new(KEY_APP_SYSTEM_ADDONS);
    let locations = DirectoryLocations::new(layout, vec![location.clone()]);

    let mut system = record("sys@test");
    system.signed_state = Some(SignedState::System);
    let unsigned = record("plain@test");
    let records = BTreeMap::from([
        (system.id.clone(), system),
        (unsigned.id.clone(), unsigned),
    ]);

    assert_eq!(
        locations.invalid_system_addon_ids(&location, &records),
        vec!["plain@test".to_string()]
    );
}

#[tokio::test]
async fn signature_check_rereads_manifest() {
    let layout = test_layout();
    let mut manifest = signed_manifest("sig@test", "1.0");
    manifest["signedState"] = json!("privileged");
    manifest["adminInstallOnly"] = json!(true);
    write_manifest(&layout, KEY_APP_PROFILE, manifest);
    let location = InstallLocation::new(KEY_APP_PROFILE);
    let locations = DirectoryLocations::new(layout.clone(), vec![location]);

    let info = locations
        .verify(&record("sig@test"))
        .await
        .expect("must verify")
        .expect("package must exist");
    assert_eq!(info.signed_state, Some(SignedState::Privileged));
    assert_eq!(info.admin_install_only, Some(true));

    fs::remove_dir_all(locations.package_dir(KEY_APP_PROFILE, "sig@test"))
        .expect("must remove package");
    assert!(locations
        .verify(&record("sig@test"))
        .await
        .expect("must verify")
        .is_none());

    let _ = fs::remove_dir_all(layout.profile());
}

#[test]
fn json_blocklist_matches_listed_versions_only() {
    let blocklist = JsonBlocklist::from_json_str(
        r#"{
  "any@test": { "state": "blocked", "url": "https://blocked.example/any" },
  "some@test": { "state": "soft-blocked", "versions": ["1.0"] }
}"#,
    )
    .expect("must parse blocklist");

    let any = blocklist.lookup("any@test", "9.9").expect("must match");
    assert_eq!(any.state, BlocklistState::Blocked);
    assert_eq!(any.url.as_deref(), Some("https://blocked.example/any"));

    assert_eq!(
        blocklist
            .lookup("some@test", "1.0")
            .map(|entry| entry.state),
        Some(BlocklistState::SoftBlocked)
    );
    assert!(blocklist.lookup("some@test", "2.0").is_none());
    assert!(blocklist.lookup("other@test", "1.0").is_none());
}

#[test]
fn json_blocklist_missing_file_is_empty() {
    let layout = test_layout();
    let blocklist = JsonBlocklist::load(&layout.blocklist_path()).expect("must load");
    assert!(blocklist.lookup("any@test", "1.0").is_none());
}

#[tokio::test]
async fn session_installs_disables_and_persists_across_runs() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("ext@test", "1.0"));

    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must open session");
    assert_eq!(changes.installed, vec!["ext@test".to_string()]);

    let lines = run_database_command(
        &mut database,
        &changes,
        Commands::Disable {
            id: "ext@test".to_string(),
            allow_system: false,
        },
        OutputStyle::Plain,
    )
    .await
    .expect("must disable");
    assert_eq!(lines, vec!["ext@test: disabled".to_string()]);
    database.shutdown().await;
    assert!(database.last_error().is_none());
    assert!(layout.database_path().exists());

    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must reopen session");
    assert!(changes.is_empty());
    let record = database
        .get(&AddonKey::new(KEY_APP_PROFILE, "ext@test"))
        .expect("must keep record");
    assert!(record.user_disabled);
    assert!(!record.is_active());

    let lines = run_database_command(
        &mut database,
        &changes,
        Commands::List {
            addon_type: Some("extension".to_string()),
            all: false,
        },
        OutputStyle::Plain,
    )
    .await
    .expect("must list");
    assert_eq!(
        lines,
        vec!["ext@test 1.0 type=extension location=app-profile state=user-disabled".to_string()]
    );
    database.shutdown().await;

    let _ = fs::remove_dir_all(layout.profile());
}

#[tokio::test]
async fn session_reports_removed_package_as_uninstalled() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("temp@test", "1.0"));

    let Session { mut database, .. } =
        open_session(&layout, false).await.expect("must open session");
    database.shutdown().await;

    fs::remove_dir_all(layout.location_dir(KEY_APP_PROFILE).join("temp@test"))
        .expect("must remove package");
    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must reopen session");
    assert_eq!(changes.uninstalled, vec!["temp@test".to_string()]);
    assert!(database.visible_addon("temp@test").is_none());
    database.shutdown().await;

    let _ = fs::remove_dir_all(layout.profile());
}

#[tokio::test]
async fn scan_command_applies_blocklist_file() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("bad@test", "1.0"));
    layout.ensure_base_dirs().expect("must create dirs");
    fs::write(
        layout.blocklist_path(),
        r#"{ "bad@test": { "state": "blocked" } }"#,
    )
    .expect("must write blocklist");

    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must open session");
    let lines = run_database_command(
        &mut database,
        &changes,
        Commands::Scan { app_changed: false },
        OutputStyle::Plain,
    )
    .await
    .expect("must scan");
    assert!(lines.contains(&"blocklist app-profile:bad@test: not-blocked -> blocked".to_string()));

    let record = database.visible_addon("bad@test").expect("must be visible");
    assert_eq!(record.blocklist_state, BlocklistState::Blocked);
    assert!(!record.is_active());
    database.shutdown().await;

    let _ = fs::remove_dir_all(layout.profile());
}

#[tokio::test]
async fn info_command_rejects_unknown_addon() {
    let layout = test_layout();
    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must open session");

    let err = run_database_command(
        &mut database,
        &changes,
        Commands::Info {
            id: "missing@test".to_string(),
        },
        OutputStyle::Plain,
    )
    .await
    .expect_err("must fail");
    assert!(err.to_string().contains("is not installed"));
    database.shutdown().await;

    let _ = fs::remove_dir_all(layout.profile());
}

#[tokio::test]
async fn relocated_profile_keeps_location_relative_paths() {
    let layout = test_layout();
    write_manifest(&layout, KEY_APP_PROFILE, signed_manifest("ext@test", "1.0"));

    let Session { mut database, .. } =
        open_session(&layout, false).await.expect("must open session");
    let record = database
        .get(&AddonKey::new(KEY_APP_PROFILE, "ext@test"))
        .expect("must install record");
    assert_eq!(record.path, "ext@test");
    database.shutdown().await;

    let moved = test_layout();
    fs::rename(layout.profile(), moved.profile()).expect("must move profile");
    let Session {
        mut database,
        changes,
    } = open_session(&moved, false).await.expect("must reopen moved profile");
    assert!(changes.is_empty());
    let record = database
        .get(&AddonKey::new(KEY_APP_PROFILE, "ext@test"))
        .expect("must keep record");
    assert_eq!(record.path, "ext@test");
    assert!(record.is_active());
    database.shutdown().await;

    let _ = fs::remove_dir_all(moved.profile());
}

#[tokio::test]
async fn theme_command_switches_back_to_an_earlier_theme() {
    let layout = test_layout();
    for id in [addonstate_core::DEFAULT_THEME_ID, "t1@test", "t2@test"] {
        let mut manifest = signed_manifest(id, "1.0");
        manifest["type"] = json!("theme");
        write_manifest(&layout, KEY_APP_PROFILE, manifest);
    }

    let Session {
        mut database,
        changes,
    } = open_session(&layout, false).await.expect("must open session");
    for (id, expected) in [
        ("t2@test", "active theme: t2@test"),
        ("t1@test", "active theme: t1@test"),
    ] {
        let lines = run_database_command(
            &mut database,
            &changes,
            Commands::Theme {
                id: Some(id.to_string()),
            },
            OutputStyle::Plain,
        )
        .await
        .expect("must select theme");
        assert_eq!(lines, vec![expected.to_string()]);
    }

    let lines = run_database_command(
        &mut database,
        &changes,
        Commands::Theme { id: None },
        OutputStyle::Plain,
    )
    .await
    .expect("must select default theme");
    assert_eq!(
        lines,
        vec![format!("active theme: {}", addonstate_core::DEFAULT_THEME_ID)]
    );
    database.shutdown().await;

    let _ = fs::remove_dir_all(layout.profile());
}

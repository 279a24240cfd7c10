use addonstate_core::{AddonKey, AddonType};
use addonstate_db::{AddonDatabase, DisabledTransition, ReconcileOptions, StartupChanges};
use addonstate_store::ProfileLayout;
use anyhow::{anyhow, Result};
use tracing::warn;

use crate::completion::write_completions_script;
use crate::config::load_profile_config;
use crate::render::{
    current_output_style, format_addon_lines, format_attention_lines, format_disabled_changes,
    format_info_lines, format_startup_changes, render_section_header, render_status_line,
    OutputStyle,
};
use crate::services::build_services;
use crate::{Cli, Commands};

/// A database that has been reconciled with the install locations.
pub(crate) struct Session {
    pub database: AddonDatabase,
    pub changes: StartupChanges,
}

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();

    if let Commands::Completions { shell } = cli.command {
        let mut stdout = std::io::stdout().lock();
        return write_completions_script(shell, &mut stdout);
    }

    let app_changed = matches!(cli.command, Commands::Scan { app_changed: true });
    let layout = ProfileLayout::new(cli.profile);
    let Session {
        mut database,
        changes,
    } = open_session(&layout, app_changed).await?;

    let outcome = run_database_command(&mut database, &changes, cli.command, style).await;
    database.shutdown().await;
    if let Some(err) = database.last_error() {
        eprintln!(
            "{}",
            render_status_line(style, "warn", &format!("database write failed: {err}"))
        );
    }

    for line in outcome? {
        println!("{line}");
    }
    Ok(())
}

/// Loads the profile, opens its database and runs a startup reconciliation.
pub(crate) async fn open_session(layout: &ProfileLayout, app_changed: bool) -> Result<Session> {
    layout.ensure_base_dirs()?;
    let config = load_profile_config(layout)?;
    let services = build_services(layout, &config)?;
    let settings = config.database_settings()?;

    let mut database = AddonDatabase::open(layout.clone(), settings, services).await;
    let changes = database
        .process_file_changes(ReconcileOptions {
            app_changed,
            ..ReconcileOptions::default()
        })
        .await?;
    Ok(Session { database, changes })
}

pub(crate) async fn run_database_command(
    database: &mut AddonDatabase,
    changes: &StartupChanges,
    command: Commands,
    style: OutputStyle,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    match command {
        Commands::Scan { .. } => {
            lines.extend(format_startup_changes(changes, style));
            for (key, refresh) in database.refresh_all_blocklist_states().await? {
                lines.push(render_status_line(
                    style,
                    "warn",
                    &format!(
                        "blocklist {key}: {} -> {}",
                        refresh.old_state.as_str(),
                        refresh.new_state.as_str()
                    ),
                ));
            }
        }
        Commands::List { addon_type, all } => {
            let types = addon_type
                .as_deref()
                .map(|value| {
                    AddonType::parse(value).ok_or_else(|| anyhow!("unknown addon type '{value}'"))
                })
                .transpose()?
                .map(|addon_type| vec![addon_type]);
            let records = if all {
                database
                    .records()
                    .filter(|record| {
                        types
                            .as_ref()
                            .map_or(true, |types| types.contains(&record.addon_type))
                    })
                    .collect::<Vec<_>>()
            } else {
                database.visible_addons(types.as_deref())
            };
            if let Some(header) = render_section_header(style, "addons") {
                lines.push(header);
            }
            lines.extend(format_addon_lines(&records, style));
        }
        Commands::Info { id } => {
            let key = visible_key(database, &id)?;
            let view = database
                .view(&key)
                .ok_or_else(|| anyhow!("addon '{id}' has no known install location"))?;
            let permissions = database
                .permissions(&key)
                .ok_or_else(|| anyhow!("addon '{id}' has no known install location"))?;
            lines.extend(format_info_lines(&view, permissions));
        }
        Commands::Enable { id } => {
            let key = visible_key(database, &id)?;
            let transition = database.set_user_disabled(&key, false, false).await?;
            lines.push(transition_line(style, &id, transition));
        }
        Commands::Disable { id, allow_system } => {
            let key = visible_key(database, &id)?;
            let transition = database.set_user_disabled(&key, true, allow_system).await?;
            lines.push(transition_line(style, &id, transition));
        }
        Commands::Theme { id } => {
            database.select_theme(id.as_deref()).await?;
            let active = database.active_theme_id().unwrap_or("none");
            lines.push(render_status_line(
                style,
                "ok",
                &format!("active theme: {active}"),
            ));
        }
        Commands::Attention { dismiss } => {
            if dismiss {
                let dismissed = database.dismiss_blocklist_attention()?;
                let message = if dismissed.is_empty() {
                    "nothing to dismiss".to_string()
                } else {
                    format!("dismissed: {}", dismissed.join(", "))
                };
                lines.push(render_status_line(style, "ok", &message));
            } else {
                lines.extend(format_attention_lines(&database.attention_info(), style));
            }
        }
        Commands::Verify => {
            let changes = database.verify_signatures().await?;
            lines.extend(format_disabled_changes(&changes, style));
        }
        Commands::SetSyncId { id, guid } => {
            let key = visible_key(database, &id)?;
            database.set_sync_guid(&key, &guid)?;
            lines.push(render_status_line(
                style,
                "ok",
                &format!("{id}: sync id set to {guid}"),
            ));
        }
        Commands::Completions { .. } => {
            warn!("completions do not need a database");
        }
    }
    Ok(lines)
}

fn visible_key(database: &AddonDatabase, id: &str) -> Result<AddonKey> {
    database
        .visible_addon(id)
        .map(|record| record.key())
        .ok_or_else(|| anyhow!("addon '{id}' is not installed"))
}

fn transition_line(style: OutputStyle, id: &str, transition: DisabledTransition) -> String {
    match transition {
        DisabledTransition::Enabled => render_status_line(style, "on", &format!("{id}: enabled")),
        DisabledTransition::Disabled => {
            render_status_line(style, "off", &format!("{id}: disabled"))
        }
        DisabledTransition::Unchanged => {
            render_status_line(style, "ok", &format!("{id}: unchanged"))
        }
    }
}

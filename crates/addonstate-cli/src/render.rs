use std::io::IsTerminal;

use addonstate_core::{AddonRecord, AddonView, Permissions};
use addonstate_db::{AttentionInfo, DisabledChanges, StartupChanges};
use anstyle::{AnsiColor, Effects, Style};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::io::stderr().is_terminal(),
    )
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "on" => "[ON]",
                "off" => "[OFF]",
                "warn" => "[WARN]",
                "error" => "[ERR]",
                _ => "[..]",
            };
            format!("{badge} {message}")
        }
    }
}

pub fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// The most specific reason a record is not running, or `active`.
pub fn addon_state_label(record: &AddonRecord) -> &'static str {
    if record.pending_uninstall {
        "pending-uninstall"
    } else if record.is_active() {
        "active"
    } else if !record.visible {
        "hidden-by-priority"
    } else if record.app_disabled() {
        "app-disabled"
    } else if record.soft_disabled {
        "soft-disabled"
    } else if record.user_disabled {
        "user-disabled"
    } else if record.embedder_disabled {
        "embedder-disabled"
    } else {
        "disabled"
    }
}

pub fn format_addon_line(record: &AddonRecord, style: OutputStyle) -> String {
    let line = format!(
        "{} {} type={} location={} state={}",
        record.id,
        record.version,
        record.addon_type.as_str(),
        record.location,
        addon_state_label(record)
    );
    let status = if record.is_active() { "on" } else { "off" };
    render_status_line(style, status, &line)
}

pub fn format_addon_lines(records: &[&AddonRecord], style: OutputStyle) -> Vec<String> {
    if records.is_empty() {
        return vec!["no addons installed".to_string()];
    }
    records
        .iter()
        .map(|record| format_addon_line(record, style))
        .collect()
}

pub fn format_info_lines(view: &AddonView<'_>, permissions: Permissions) -> Vec<String> {
    let record = view.record();
    let mut lines = vec![
        format!("id: {}", view.id()),
        format!("version: {}", view.version()),
        format!("type: {}", view.addon_type().as_str()),
        format!("location: {}", view.location_name()),
        format!("state: {}", addon_state_label(record)),
        format!(
            "signed: {}",
            view.signed_state().map_or("unknown", |state| state.as_str())
        ),
        format!("blocklist: {}", view.blocklist_state().as_str()),
    ];
    if let Some(name) = view.name() {
        lines.push(format!("name: {name}"));
    }
    if let Some(creator) = view.creator() {
        lines.push(format!("creator: {creator}"));
    }
    if let Some(guid) = &record.sync_guid {
        lines.push(format!("sync-guid: {guid}"));
    }
    if record.foreign_install {
        lines.push("foreign-install: true".to_string());
    }
    let names = permissions.names();
    lines.push(format!(
        "permissions: {}",
        if names.is_empty() {
            "none".to_string()
        } else {
            names.join(",")
        }
    ));
    lines
}

pub fn format_startup_changes(changes: &StartupChanges, style: OutputStyle) -> Vec<String> {
    if changes.is_empty() {
        return vec![render_status_line(style, "ok", "addon database up to date")];
    }

    let mut lines = Vec::new();
    for (label, ids) in [
        ("installed", &changes.installed),
        ("changed", &changes.changed),
        ("uninstalled", &changes.uninstalled),
        ("enabled", &changes.enabled),
        ("disabled", &changes.disabled),
    ] {
        if !ids.is_empty() {
            lines.push(render_status_line(
                style,
                "ok",
                &format!("{label}: {}", ids.join(", ")),
            ));
        }
    }
    for failure in &changes.failed_hooks {
        lines.push(render_status_line(
            style,
            "warn",
            &format!(
                "{} hook failed for {}: {}",
                failure.hook, failure.id, failure.message
            ),
        ));
    }
    lines
}

pub fn format_disabled_changes(changes: &DisabledChanges, style: OutputStyle) -> Vec<String> {
    if changes.enabled.is_empty() && changes.disabled.is_empty() {
        return vec![render_status_line(style, "ok", "no state changes")];
    }
    let mut lines = Vec::new();
    if !changes.enabled.is_empty() {
        lines.push(render_status_line(
            style,
            "on",
            &format!("enabled: {}", changes.enabled.join(", ")),
        ));
    }
    if !changes.disabled.is_empty() {
        lines.push(render_status_line(
            style,
            "off",
            &format!("disabled: {}", changes.disabled.join(", ")),
        ));
    }
    lines
}

pub fn format_attention_lines(info: &AttentionInfo, style: OutputStyle) -> Vec<String> {
    if !info.should_show {
        return vec![render_status_line(style, "ok", "no blocked addons need attention")];
    }
    let severity = match (info.has_hard_blocked, info.has_soft_blocked) {
        (true, true) => "blocked and soft-blocked",
        (true, false) => "blocked",
        _ => "soft-blocked",
    };
    let mut lines = vec![render_status_line(
        style,
        "warn",
        &format!("{} {} addon(s) need attention", info.count, severity),
    )];
    lines.extend(info.addons.iter().map(|id| format!("- {id}")));
    lines
}

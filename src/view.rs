//! Text rendering of the file table.

use crate::browser::{BrowserView, ViewState};
use crate::config::DisplayConfig;
use crate::datetime::format_modified;

const SIZE_WIDTH: usize = 12;
const MIN_NAME_WIDTH: usize = 8;

/// Format a byte count with 1024-based units, up to GB.
///
/// Values are rounded to two decimals and printed without trailing zeros.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// "1 file" / "N files".
pub fn file_count_label(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", count)
    }
}

/// Shorten `name` to `width` characters, ending in "...".
fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let keep = width.saturating_sub(3);
    let truncated: String = name.chars().take(keep).collect();
    format!("{}...", truncated)
}

/// Render a browser snapshot as text.
pub fn render(view: &BrowserView<'_>, display: &DisplayConfig) -> String {
    let name_width = display.name_width.max(MIN_NAME_WIDTH);
    let size_width = SIZE_WIDTH;
    let mut lines = Vec::new();

    let mut header = format!(
        "Storage: {} | {}",
        view.storage,
        file_count_label(view.total)
    );
    if !view.query.trim().is_empty() {
        header.push_str(&format!(
            " | search {:?}: {} shown",
            view.query.trim(),
            view.records.len()
        ));
    }
    lines.push(header);

    if let ViewState::Error(reason) = view.state {
        lines.push(format!("! Failed to load files: {}", reason));
    }

    if *view.state == ViewState::Loading && view.records.is_empty() {
        lines.push("Loading...".to_string());
    } else if view.records.is_empty() {
        if view.query.trim().is_empty() {
            lines.push("No files".to_string());
        } else {
            lines.push(format!("No files match '{}'", view.query.trim()));
        }
    } else {
        lines.push(format!(
            "{:<name_width$} {:>size_width$}  {}",
            "Name", "Size", "Modified"
        ));
        lines.push("-".repeat(name_width + size_width + 2 + display.date_format.len().max(19)));
        for record in &view.records {
            let name = if record.is_dir {
                format!("{}/", record.name)
            } else {
                record.name.clone()
            };
            lines.push(format!(
                "{:<name_width$} {:>size_width$}  {}",
                truncate_name(&name, name_width),
                format_size(record.size),
                format_modified(
                    record.modified.as_ref(),
                    &display.timezone,
                    &display.date_format
                )
            ));
        }
    }

    if let Some(progress) = view.progress {
        lines.push(format!("[upload] {}", progress));
    }

    if let Some(notification) = view.notification {
        lines.push(format!(
            "[{}] {}",
            notification.kind.label(),
            notification.message
        ));
    }

    lines.join("\n")
}

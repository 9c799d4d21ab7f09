//! Terminal output primitives. Everything goes through [`print`], so lines
//! share the tracing writer with log events and never tear the spinner.

use colored::*;
use unicode_width::UnicodeWidthStr;

use crate::terminal::logging::PRINT_TARGET;
use crate::terminal::{banner, colors};

pub const TOTAL_WIDTH: usize = 64;
const TREE_KEY_WIDTH: usize = 8;

pub fn print(msg: &str) {
    tracing::info!(target: PRINT_TARGET, "{msg}");
}

pub fn banner(no_banner: bool, q_level: u8) {
    if no_banner || q_level > 0 {
        return;
    }

    let title = format!("⟦ SIGMA v{} ⟧ ", env!("CARGO_PKG_VERSION"));
    let sep = "═"
        .repeat(TOTAL_WIDTH.saturating_sub(title.width()) / 2)
        .color(colors::SEPARATOR);

    banner::print();
    print(&format!("{sep}{}{sep}", title.bright_green().bold()));
}

/// `──⟦ MSG ⟧──` centered on the terminal width.
pub fn header(msg: &str, q_level: u8) {
    if q_level > 0 {
        return;
    }

    let label = format!("⟦ {} ⟧", msg.to_uppercase());
    let dashes = TOTAL_WIDTH.saturating_sub(label.width());
    let left = "─".repeat(dashes / 2).color(colors::SEPARATOR);
    let right = "─".repeat(dashes - dashes / 2).color(colors::SEPARATOR);
    print(&format!("{left}{}{right}", label.bright_green()));
}

pub fn separator() {
    print(&"═".repeat(TOTAL_WIDTH).color(colors::SEPARATOR).to_string());
}

pub fn centered(msg: &ColoredString) {
    let pad = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(&msg.to_string())) / 2);
    print(&format!("{pad}{msg}"));
}

pub fn print_status<T: AsRef<str>>(msg: T) {
    let prefix = ">".color(colors::SEPARATOR);
    print(&format!("{prefix} {}", msg.as_ref().color(colors::TEXT_DEFAULT)));
}

/// `key....: value` lines with the dots filling up to `key_width`.
pub fn aligned_lines(rows: Vec<(&str, ColoredString)>) {
    let key_width = rows.iter().map(|(key, _)| key.width()).max().unwrap_or(0);
    for (key, value) in rows {
        print_status(format!(
            "{}{}{} {value}",
            key.color(colors::PRIMARY),
            dots(key, key_width + 1).color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR)
        ));
    }
}

pub fn tree_head(idx: usize, hostname: &str) {
    let idx = format!("[{}]", idx.to_string().color(colors::ACCENT));
    print(&format!("{} {}", idx.color(colors::SEPARATOR), hostname.color(colors::HOSTNAME)));
}

pub fn as_tree_one_level(details: Vec<(String, ColoredString)>) {
    let last = details.len().saturating_sub(1);
    for (i, (key, value)) in details.iter().enumerate() {
        let branch = if i == last { "└─" } else { "├─" };
        print(&format!(
            " {} {}{}{} {value}",
            branch.color(colors::SEPARATOR),
            key.color(colors::TEXT_DEFAULT),
            dots(key, TREE_KEY_WIDTH).color(colors::SEPARATOR),
            ":".color(colors::SEPARATOR),
        ));
    }
}

/// Shown instead of a results tree when a stage ended empty.
pub fn no_hosts(target: &str, hints: &[&str]) {
    print(&format!("  no hosts found under {}", target.color(colors::HOSTNAME)).red().bold().to_string());
    for hint in hints {
        print_status(*hint);
    }
}

/// Leader dots that pad `key` out to `width` display columns.
fn dots(key: &str, width: usize) -> String {
    ".".repeat(width.saturating_sub(key.width()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_line_up_by_display_width() {
        assert_eq!(dots("crtsh", 12), ".......");
        assert_eq!(dots("virustotal", 12), "..");
        assert_eq!(dots("ünïcode", 8), ".");
        assert_eq!(dots("a-key-longer-than-the-column", 8), "");
    }
}

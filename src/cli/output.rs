//! Shared CLI output helpers.
//!
//! Color scheme (respects NO_COLOR):
//! - Green: success, checkmarks
//! - Red: errors
//! - Yellow: warnings
//! - Cyan: fingerprints, paths, hints
//! - Bold: headers, important values
//! - Dimmed: secondary info
//!
//! Human-readable messages go to stderr so stdout stays clean for exported
//! keys and JSON.

use std::fmt::Display;
use std::io::{self, Write};

use console::style;

const RULE_WIDTH: usize = 56;

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// `✓ generated key`
pub fn success(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("✓").green(), msg);
    } else {
        eprintln!("✓ {}", msg);
    }
}

/// `✗ key not found`
pub fn error(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("✗").red(), msg);
    } else {
        eprintln!("✗ {}", msg);
    }
}

/// `⚠ key expires in 3 days`
pub fn warn(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("⚠").yellow(), msg);
    } else {
        eprintln!("⚠ {}", msg);
    }
}

/// `→ run: keysmith keys list`
pub fn hint(msg: &str) {
    if colors_enabled() {
        eprintln!("{} {}", style("→").cyan(), style(msg).cyan());
    } else {
        eprintln!("→ {}", msg);
    }
}

pub fn header(title: &str) {
    if colors_enabled() {
        eprintln!("{}", style(title).bold());
    } else {
        eprintln!("{}", title);
    }
}

/// Label dimmed, value bold: `  created  2024-01-01`
pub fn kv(label: &str, value: impl Display) {
    if colors_enabled() {
        eprintln!("  {:<12} {}", style(label).dim(), style(value).bold());
    } else {
        eprintln!("  {:<12} {}", label, value);
    }
}

pub fn list_item(item: &str) {
    eprintln!("  • {}", item);
}

pub fn rule() {
    if colors_enabled() {
        eprintln!("{}", style("─".repeat(RULE_WIDTH)).dim());
    } else {
        eprintln!("{}", "─".repeat(RULE_WIDTH));
    }
}

pub fn blank() {
    eprintln!();
}

pub fn dimmed(msg: &str) {
    if colors_enabled() {
        eprintln!("{}", style(msg).dim());
    } else {
        eprintln!("{}", msg);
    }
}

/// Format a fingerprint or path in cyan for inline use.
pub fn highlight(text: &str) -> String {
    if colors_enabled() {
        style(text).cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Machine-readable data on stdout.
pub fn data(text: &str) {
    println!("{}", text);
}

/// Raw bytes on stdout.
pub fn bytes(content: &[u8]) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content)?;
    stdout.flush()
}

/// Human-readable byte count: `512 B`, `1.5 KiB`, `16.0 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

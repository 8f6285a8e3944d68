//! Output formatting for CLI
//!
//! Keeps command output consistent: tables for listings, warnings on
//! stderr, and secret values redacted unless the user asks otherwise.

use colored::Colorize;
use tabled::{Table, Tabled};

/// Print rows as a table.
pub fn print_table<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No results found".yellow());
        return;
    }

    let table = Table::new(rows);
    println!("{}", table);
}

/// Print a warning message with yellow triangle.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message with red X.
#[allow(dead_code)]
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Render a secret value for display, redacted by default.
pub fn display_value(value: &[u8], reveal: bool) -> String {
    if !reveal {
        return "<redacted>".to_string();
    }
    match std::str::from_utf8(value) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary, {} bytes>", value.len()),
    }
}

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use terminal_size::{Width, Height, terminal_size};

fn rule() -> String {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    "─".repeat(width.0 as usize)
}

pub fn print_header(title: &str, account: Option<&str>) {
    let line = rule();
    println!("{}", line.black().bold());

    let name = "Konsol".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}  {}", name, version, title.cyan());

    if let Some(account) = account {
        println!("  {}", account.black().bold());
    }

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("  {} {}", "❌".red().bold(), msg.red());
}

pub fn print_thinking(msg: &str) {
    println!("  {} {}...", "∴".magenta(), msg);
}

/// One listing row: a bold key and a dimmed detail column
pub fn print_row(key: &str, detail: &str) {
    if detail.is_empty() {
        println!("  {}", key.bold());
    } else {
        println!("  {}  {}", key.bold(), detail.dimmed());
    }
}

/// Footer telling the user how to fetch the next page
pub fn print_next_page(token: Option<&str>) {
    if let Some(token) = token {
        println!("\n  {} --page-token {}", "more:".dimmed(), token.cyan());
    }
}

/// Spinner shown while `--all` walks through pages
pub fn spinner(msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("  {spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

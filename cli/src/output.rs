//! CLI output helpers for consistent formatting.

use colored::Colorize;
use driftless_migrations::{Hint, MigrationPlan};

pub fn heading(text: &str) -> String {
    format!("{}", text.bright_cyan())
}

pub fn label(text: &str) -> String {
    format!("{}", text.bright_blue())
}

pub fn muted(text: &str) -> String {
    format!("{}", text.bright_black())
}

pub fn success(text: &str) -> String {
    format!("{}", text.bright_green())
}

pub fn warning(text: &str) -> String {
    format!("{}", text.yellow())
}

pub fn error(text: &str) -> String {
    format!("{}", text.red())
}

pub fn err_line(text: &str) -> String {
    format!("{} {}", "Error:".red().bold(), text)
}

pub fn status_ok() -> String {
    format!("{}", "OK".green())
}

pub fn status_error() -> String {
    format!("{}", "ERROR".red())
}

pub fn hint_line(hint: &Hint) -> String {
    let tag = format!("[{}]", hint.kind.label());
    let tag = if hint.is_destructive() {
        tag.red().bold()
    } else {
        tag.yellow()
    };
    format!("{} {}", tag, hint.message)
}

/// Print every statement of `plan`, then its hints
pub fn print_plan(plan: &MigrationPlan) {
    println!("{}", muted("--- Planned SQL ---"));
    for sql in plan.sql() {
        println!("{sql}");
    }
    println!("{}", muted("--- End SQL ---"));

    if !plan.renames.is_empty() {
        println!();
        for rename in &plan.renames {
            println!("  {} {}", label("rename"), rename);
        }
    }
    print_hints(&plan.hints);
}

pub fn print_hints(hints: &[Hint]) {
    if hints.is_empty() {
        return;
    }
    println!();
    for hint in hints {
        println!("  {}", hint_line(hint));
    }
}

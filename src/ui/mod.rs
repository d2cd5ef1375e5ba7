//! Terminal output for the ocguard binary.

pub mod icons;

use crate::guard::RunStatus;
use console::style;
use icons::{CHECK, CROSS, FOLDER, SKIP};

/// One-line verdict for a guard operation.
pub fn status_line(status: RunStatus) -> String {
    match status {
        RunStatus::Passed => format!("{}{}", CHECK, style("Passed").green().bold()),
        RunStatus::Failed => format!("{}{}", CROSS, style("Failed").red().bold()),
        RunStatus::NothingToRun => {
            format!("{}{}", SKIP, style("No tests matched the changes").dim())
        }
    }
}

pub fn print_status(status: RunStatus) {
    println!("{}", status_line(status));
}

/// List selected targets, one per line.
pub fn print_targets(targets: &[String]) {
    if targets.is_empty() {
        println!("{}", style("(no test targets)").dim());
        return;
    }
    for target in targets {
        println!("{}{}", FOLDER, target);
    }
}

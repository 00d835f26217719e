//! Console output for engine events.
//!
//! Lines are printed as events arrive; there is no live redraw since vendors
//! are processed one at a time anyway.

use std::sync::Mutex;

use crossterm::style::Stylize;
use naner_core::{Reporter, Stage};
use naner_schema::VendorName;

const NAME_WIDTH: usize = 16;

#[derive(Debug, Default)]
pub struct ConsoleReporter {
    /// Last progress step printed per vendor, so each 10% step shows once.
    last_percent: Mutex<Option<(VendorName, u8)>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn label(name: &VendorName) -> String {
        format!("{:<NAME_WIDTH$}", name.as_str())
    }
}

impl Reporter for ConsoleReporter {
    fn section(&self, title: &str) {
        println!();
        println!("{}", title.bold());
    }

    fn stage(&self, name: &VendorName, stage: Stage) {
        if matches!(stage, Stage::Installed) {
            return;
        }
        println!("  {} {}", Self::label(name).dark_grey(), stage.to_string().dark_grey());
    }

    fn downloading(&self, name: &VendorName, percent: u8, current: u64, total: u64) {
        if let Ok(mut last) = self.last_percent.lock() {
            if last.as_ref() == Some(&(name.clone(), percent)) {
                return;
            }
            *last = Some((name.clone(), percent));
        }
        println!(
            "  {} {}",
            Self::label(name).dark_grey(),
            format!("{percent:>3}% ({} / {})", format_size(current), format_size(total))
                .dark_grey()
        );
    }

    fn done(&self, name: &VendorName, version: &str, detail: &str) {
        println!(
            "  {} {} {} {}",
            "✓".green(),
            Self::label(name).bold(),
            version.cyan(),
            detail.dark_grey()
        );
    }

    fn skipped(&self, name: &VendorName, reason: &str) {
        println!("  {} {} {}", "-".dark_grey(), Self::label(name), reason.dark_grey());
    }

    fn failed(&self, name: &VendorName, stage: Stage, reason: &str) {
        println!(
            "  {} {} {}",
            "✗".red(),
            Self::label(name).bold(),
            format!("{stage}: {reason}").red()
        );
    }

    fn info(&self, msg: &str) {
        println!("  {msg}");
    }

    fn warning(&self, msg: &str) {
        println!("  {} {}", "!".yellow(), msg.yellow());
    }

    fn summary(&self, installed: usize, skipped: usize, failed: usize, elapsed_secs: f64) {
        println!();
        let line = format!(
            "{installed} installed, {skipped} skipped, {failed} failed in {elapsed_secs:.1}s"
        );
        if failed > 0 {
            println!("{}", line.red().bold());
        } else {
            println!("{}", line.green().bold());
        }
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

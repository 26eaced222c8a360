//! Terminal output for the command-line front end.
//!
//! Log events go through `tracing`; this module only renders the summaries
//! the `sweep` and `check` commands print for a human.

use crate::reconcile::SweepReport;
use crate::routing::RoutingTable;
use colored::*;

/// Prints CLI messages with consistent styling.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints the rules in match order with the state of each destination.
    ///
    /// ```no_run
    /// use tidywatch::output::OutputFormatter;
    /// use tidywatch::routing::{RoutingRule, RoutingTable};
    ///
    /// let table = RoutingTable::new(vec![RoutingRule::new("/data/docs", ["txt", "pdf"])]);
    /// OutputFormatter::routing_table(&table);
    /// ```
    pub fn routing_table(table: &RoutingTable) {
        Self::header("ROUTING RULES");

        if table.is_empty() {
            Self::warning("No destination directories configured; every file is unmatched.");
            return;
        }

        for (index, rule) in table.rules().iter().enumerate() {
            let mut extensions: Vec<_> = rule.extensions.iter().map(String::as_str).collect();
            extensions.sort_unstable();

            let state = if rule.destination.is_dir() {
                "exists".green()
            } else if rule.create_if_missing {
                "missing, will be created".yellow()
            } else {
                "missing, rule inactive".red()
            };

            println!(
                "{:>2}. {} [{}] padding {} ({})",
                index + 1,
                rule.destination.display().to_string().bold(),
                extensions.join(", "),
                rule.padding_width,
                state
            );
        }
    }

    /// Prints a summary table of a sweep.
    pub fn sweep_summary(report: &SweepReport) {
        Self::header("SUMMARY");

        let rows = [
            ("Moved", report.moved.len()),
            ("Unmatched", report.unmatched.len()),
            ("Failed", report.failed.len()),
            ("Ignored", report.ignored.len()),
        ];
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);

        println!("{:<width$} | {}", "Outcome".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let count = match label {
                "Moved" => count.to_string().green(),
                _ if count == 0 => count.to_string().normal(),
                _ => count.to_string().red(),
            };
            println!("{:<width$} | {}", label, count, width = width);
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            report.total_processed().to_string().bold(),
            width = width
        );

        for (from, to) in &report.moved {
            println!("  {} → {}", from.display(), to.display());
        }
        for path in &report.unmatched {
            println!("  {} {}", path.display(), "(no matching rule)".yellow());
        }
        for (path, reason) in &report.failed {
            eprintln!("  {} {}", path.display(), reason.red());
        }
    }
}

//! Styled terminal output for Shipguard
//!
//! Human-facing messages (verdicts, findings, remediation) go through here;
//! diagnostics go through `tracing`.

use crate::review::{ConvergenceReport, IterationSnapshot};
use crate::security::{GateVerdict, ScanFinding};
use console::style;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Errors are always shown, even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✖").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn step(&self, step: &str) {
        if !self.quiet {
            println!("{} {}", style("❯").cyan(), step);
        }
    }

    pub fn table_row(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {:<20} {}", style(key).dim(), value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.quiet {
            println!("  • {}", item);
        }
    }

    pub fn blank_line(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Print a critical error with enhanced styling
    pub fn critical(&self, message: &str) {
        eprintln!("{} {}", style("✖").red().bold(), style(message).red().bold());
    }

    fn finding(&self, finding: &ScanFinding) {
        let location = match finding.line_number {
            Some(line) => format!("{}:{}", finding.file_path, line),
            None => finding.file_path.clone(),
        };
        if finding.excerpt.is_empty() {
            eprintln!(
                "    {} {} {}",
                style(format!("[{}]", finding.kind)).red().bold(),
                style(location).underlined(),
                style(&finding.pattern_label).dim()
            );
        } else {
            eprintln!(
                "    {} {} {} {}",
                style(format!("[{}]", finding.kind)).red().bold(),
                style(location).underlined(),
                style(&finding.pattern_label).dim(),
                style(&finding.excerpt).yellow()
            );
        }
    }

    /// Render a gate verdict; a blocked verdict is printed even in quiet mode
    pub fn verdict(&self, verdict: &GateVerdict) {
        if verdict.passed {
            self.success("Security gate passed");
            return;
        }

        self.critical(&format!(
            "Security gate blocked: {} finding(s)",
            verdict.findings.len()
        ));
        for finding in &verdict.findings {
            self.finding(finding);
        }
        eprintln!(
            "  {}",
            style("Remove the secrets (or unstage the environment files) and run the gate again.")
                .dim()
        );
    }

    fn iteration(&self, snapshot: &IterationSnapshot) {
        let counts = &snapshot.classified_counts;
        self.step(&format!(
            "Iteration {}: {} new comment(s) ({} blocking, {} suggestion, {} other), {} file(s) changed",
            snapshot.iteration_number,
            snapshot.new_comment_ids.len(),
            counts.blocking,
            counts.suggestion,
            counts.other,
            snapshot.files_changed.len()
        ));
        if self.verbose {
            for location in &snapshot.locations {
                self.list_item(&location.to_string());
            }
        }
    }

    pub fn convergence(&self, report: &ConvergenceReport) {
        self.header(&format!("Review convergence for {}", report.change_id));
        for snapshot in &report.iterations {
            self.iteration(snapshot);
        }
        self.blank_line();

        let summary = format!("Status: {}", report.status);
        match (report.cancelled, report.exit_code()) {
            (true, _) => self.warning(&format!("{summary} (cancelled)")),
            (false, 0) => self.success(&summary),
            _ => self.critical(&summary),
        }
        if report.exit_code() == 0 {
            self.info(&report.remediation());
        } else {
            self.error(&report.remediation());
        }
    }
}

use colored::Colorize;

use crate::runner::types::{IterationOutcome, IterationReport, IterationSummary, TransactionResult};
use crate::scenario::Scenario;

pub struct ScenarioReporter {
    verbose: bool,
}

impl ScenarioReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// 打印运行开始
    pub fn print_header(&self, scenario: &Scenario, path: &str, iterations: usize) {
        println!(
            "\nRunning scenario {} ({} steps, {} iteration{}) from {}...\n",
            scenario.name.bold(),
            scenario.steps.len(),
            iterations,
            if iterations == 1 { "" } else { "s" },
            path
        );
    }

    /// 打印单个事务结果
    pub fn print_result(&self, index: usize, result: &TransactionResult) {
        let symbol = if result.is_pass() {
            "✓".green()
        } else {
            "✗".red()
        };
        let status = result
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "---".to_string());
        let repeated = if result.requests > 1 {
            format!(" x{}", result.requests)
        } else {
            String::new()
        };

        println!(
            " {} [{}] {} {}{} ({}ms)",
            symbol,
            index,
            result.step,
            status.cyan(),
            repeated.dimmed(),
            result.elapsed.as_millis()
        );

        if let Some(failure) = &result.failure {
            println!("   {}: {}", "Error".red().bold(), failure);
        }
        if self.verbose || !result.is_pass() {
            for miss in &result.extraction_misses {
                println!(
                    "   {}: {} not extracted ({})",
                    "Warning".yellow(),
                    miss.variable,
                    miss.message
                );
            }
        }
    }

    /// 打印一次迭代的报告
    pub fn print_report(&self, iteration: usize, report: &IterationReport) {
        println!("{} #{} {}", "Iteration".bold(), iteration, report.id.to_string().dimmed());

        for (index, result) in report.results.iter().enumerate() {
            self.print_result(index + 1, result);
        }

        let offset = report.results.len();
        for (index, skipped) in report.not_executed.iter().enumerate() {
            println!(
                " {} [{}] {} {}",
                "⊘".dimmed(),
                offset + index + 1,
                skipped.step,
                format!("(not executed: {})", skipped.reason).dimmed()
            );
        }

        let outcome = match report.outcome {
            IterationOutcome::Pass => report.outcome.to_string().green().bold(),
            IterationOutcome::Fail => report.outcome.to_string().red().bold(),
            IterationOutcome::Cancelled => report.outcome.to_string().yellow().bold(),
        };
        println!("   {} in {}ms", outcome, report.elapsed.as_millis());
        if let Some(error) = &report.config_error {
            println!("   {}: {}", "Configuration".red().bold(), error);
        }
        println!();
    }

    /// 打印多次迭代的摘要
    pub fn print_summary(&self, summary: &IterationSummary) {
        println!("{}", "━".repeat(50));
        println!("{}", "Summary".bold());
        println!("{}", "━".repeat(50));

        if summary.cancelled > 0 {
            println!(
                "  {}: {} passed, {} failed, {} cancelled, {} total",
                "Iterations".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.cancelled.to_string().yellow(),
                summary.total
            );
        } else if summary.failed == 0 {
            println!(
                "  {}: {} passed, {} total",
                "Iterations".bold(),
                summary.passed.to_string().green(),
                summary.total
            );
        } else {
            println!(
                "  {}: {} passed, {} failed, {} total",
                "Iterations".bold(),
                summary.passed.to_string().green(),
                summary.failed.to_string().red(),
                summary.total
            );
        }

        println!(
            "  {}: {:.3}s",
            "Duration".bold(),
            summary.total_duration.as_secs_f64()
        );
        println!();
    }
}

impl Default for ScenarioReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::style;
use rscoop_config::{AutoUpdateConfig, MultiInstanceWarningConfig};
use rscoop_events::AutoUpdateEvent;
use rscoop_ops::OperationState;
use rscoop_types::{OperationOutput, OperationResult, OperationStatus, OutputSource};
use std::io;

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format; live output is suppressed
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    pub fn render_started(&self, title: &str) {
        if !self.json_output {
            println!("{} {title}", style("==>").cyan().bold());
        }
    }

    pub fn render_output(&self, title: &str, output: &OperationOutput) {
        if self.json_output {
            return;
        }
        let prefix = style(format!("[{title}]")).dim();
        match output.source {
            OutputSource::Stdout => println!("{prefix} {}", output.line),
            OutputSource::Stderr | OutputSource::ErrorMarker => {
                println!("{prefix} {}", style(&output.line).red());
            }
            OutputSource::CommandEcho => println!("{prefix} {}", style(&output.line).bold()),
            OutputSource::SuccessMarker => println!("{prefix} {}", style(&output.line).green()),
        }
    }

    pub fn render_finished(&self, title: &str, result: &OperationResult) {
        if self.json_output {
            return;
        }
        if result.success {
            println!("{} {title}: {}", style("[OK]").green().bold(), result.summary);
        } else {
            println!("{} {title}: {}", style("[ERROR]").red().bold(), result.summary);
        }
    }

    pub fn render_multi_instance_warning(&self, active_count: usize, threshold: u32) {
        if self.json_output {
            return;
        }
        eprintln!(
            "{} {active_count} operations are running at once (warning threshold {threshold}). \
             Run `rscoop warning dismiss` to stop this notice.",
            style("warning:").yellow().bold()
        );
    }

    pub fn render_auto_update(&self, event: &AutoUpdateEvent) {
        if self.json_output {
            return;
        }
        match event {
            AutoUpdateEvent::RunStarted { update_all: true } => {
                println!("{} Scheduled update: buckets, then all packages", style("==>").cyan().bold());
            }
            AutoUpdateEvent::RunStarted { update_all: false } => {
                println!("{} Scheduled update: buckets", style("==>").cyan().bold());
            }
            AutoUpdateEvent::StepStarted { .. } => {}
            AutoUpdateEvent::StepFailed { operation, message } => {
                eprintln!("{} scheduled {operation} failed: {message}", style("warning:").yellow().bold());
            }
            AutoUpdateEvent::RunFinished { success: true } => {
                println!("{} Scheduled update finished", style("[OK]").green().bold());
            }
            AutoUpdateEvent::RunFinished { success: false } => {
                println!("{} Scheduled update finished with errors", style("[ERROR]").red().bold());
            }
        }
    }

    pub fn render_auto_update_status(
        &self,
        config: &AutoUpdateConfig,
        last_run_ms: Option<i64>,
    ) -> io::Result<()> {
        let last_run = last_run_ms
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|t| t.with_timezone(&chrono::Local));

        if self.json_output {
            let json = serde_json::json!({
                "interval": config.interval,
                "updateAll": config.update_all,
                "silent": config.silent,
                "lastRun": last_run.map(|t| t.to_rfc3339()),
            });
            let json = serde_json::to_string_pretty(&json).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        let interval = match config.interval.duration() {
            None => style("off".to_string()).dim(),
            Some(period) => style(format!("every {}s", period.as_secs())).green(),
        };
        println!("Scheduled update: {interval}");
        println!("Update all packages afterwards: {}", if config.update_all { "yes" } else { "no" });
        println!("Silent: {}", if config.silent { "yes" } else { "no" });
        match last_run {
            Some(t) => println!("Last run: {}", t.format("%Y-%m-%d %H:%M:%S")),
            None => println!("Last run: never"),
        }
        Ok(())
    }

    /// Render the final state of every operation
    pub fn render_operations(&self, operations: &[OperationState]) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(operations).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }
        if operations.is_empty() {
            return Ok(());
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Operation").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Lines").add_attribute(Attribute::Bold),
            Cell::new("Started").add_attribute(Attribute::Bold),
            Cell::new("Summary").add_attribute(Attribute::Bold),
        ]);

        for op in operations {
            let lines = match op.output().omitted() {
                0 => op.output().len().to_string(),
                omitted => format!("{} (+{omitted} omitted)", op.output().len()),
            };
            let started = chrono::DateTime::from_timestamp_millis(op.created_at())
                .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(op.title()),
                status_cell(op.status()),
                Cell::new(lines),
                Cell::new(started),
                Cell::new(op.result().map_or("-", |r| r.summary.as_str())),
            ]);
        }

        println!("{table}");
        Ok(())
    }

    pub fn render_warning_config(&self, config: &MultiInstanceWarningConfig) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(config).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        let state = match (config.enabled, config.dismissed) {
            (false, _) => style("disabled").dim(),
            (true, true) => style("dismissed").yellow(),
            (true, false) => style("enabled").green(),
        };
        println!("Multi-instance warning: {state}");
        println!("Threshold: {} active operations", config.threshold);
        Ok(())
    }
}

fn status_cell(status: OperationStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        OperationStatus::InProgress => cell.fg(Color::Yellow),
        OperationStatus::Success => cell.fg(Color::Green),
        OperationStatus::Error => cell.fg(Color::Red),
    }
}

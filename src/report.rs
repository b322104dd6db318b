//! Run summary formatting (table, JSON).

use crate::config::OutputFormat;
use crate::pipeline::RunSummary;
use crate::store::SinkKind;

/// Formats run summaries for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the summary of a run over the given sinks.
    pub fn format_summary(&self, summary: &RunSummary, sinks: &[SinkKind]) -> String {
        match self.format {
            OutputFormat::Json => self.json_summary(summary),
            OutputFormat::Table => self.table_summary(summary, sinks),
        }
    }

    fn json_summary(&self, summary: &RunSummary) -> String {
        serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
    }

    fn table_summary(&self, summary: &RunSummary, sinks: &[SinkKind]) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Links found:      {}", summary.links_found));
        lines.push(format!("Products visited: {}", summary.products_visited));
        lines.push(format!("Products skipped: {}", summary.products_failed));

        if sinks.is_empty() {
            lines.push(String::new());
            lines.push("No sinks enabled, nothing was stored.".to_string());
            return lines.join("\n");
        }

        let sink_width = 12;
        let count_width = 8;

        lines.push(String::new());
        lines.push(format!(
            "{:<sink_width$}  {:>count_width$}  {:>count_width$}",
            "Sink", "Written", "Seen"
        ));
        lines.push(format!("{:-<sink_width$}  {:-<count_width$}  {:-<count_width$}", "", "", ""));

        for sink in sinks {
            lines.push(format!(
                "{:<sink_width$}  {:>count_width$}  {:>count_width$}",
                sink.to_string(),
                summary.written(*sink),
                summary.seen(*sink)
            ));
        }

        if sinks.contains(&SinkKind::Images) {
            lines.push(String::new());
            lines.push(format!(
                "Images: {} saved, {} failed",
                summary.images_saved, summary.images_failed
            ));
        }

        if summary.sink_failures > 0 {
            lines.push(format!("Sink failures: {} (see log)", summary.sink_failures));
        }

        lines.join("\n")
    }
}

//! Table output for experiment results using comfy-table.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use std::env;
use std::fmt::Write as _;

use super::truncate;
use crate::domain::models::{ExperimentResult, VariantResult};

/// Formats an experiment result for the terminal.
pub struct ResultsTable {
    use_colors: bool,
    max_width: Option<u16>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Variant comparison table, one row per variant.
    pub fn format_variants(&self, result: &ExperimentResult) -> String {
        let mut table = self.create_base_table();

        table.set_header(
            [
                "Variant", "Sessions", "Conv.", "Rate", "Avg time", "Scroll", "Bounce",
                "Engagement",
            ]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

        for variant in result.variant_results.values() {
            let is_winner = result.winner.as_deref() == Some(variant.variant_id.as_str());
            table.add_row(vec![
                self.name_cell(variant, is_winner),
                numeric(variant.sessions.to_string()),
                numeric(variant.conversions.to_string()),
                numeric(format!("{:.1}%", variant.conversion_rate)),
                numeric(format!("{:.1}s", variant.avg_time_on_page_ms / 1_000.0)),
                numeric(format!("{:.0}%", variant.avg_scroll_depth_percent)),
                numeric(format!("{:.0}%", variant.bounce_rate)),
                numeric(variant.engagement_score.to_string()),
            ]);
        }

        table.to_string()
    }

    /// Full human report: table, verdict, insights and recommendations.
    pub fn format_report(&self, result: &ExperimentResult) -> String {
        let mut out = self.format_variants(result);
        out.push_str("\n\n");

        let verdict = match &result.winner {
            Some(winner) => format!(
                "Winner: {winner} ({}% confidence, {})",
                result.confidence,
                if result.is_significant {
                    "significant"
                } else {
                    "not significant"
                }
            ),
            None => "No winner".to_string(),
        };
        let _ = writeln!(out, "{}", self.emphasize(&verdict, result.is_significant));

        let failed = result.failed_sessions();
        if failed > 0 {
            let _ = writeln!(
                out,
                "{failed} of {} sessions failed",
                result.sessions.len()
            );
        }

        if !result.insights.is_empty() {
            out.push_str("\nInsights:\n");
            for insight in &result.insights {
                let _ = writeln!(out, "  - {insight}");
            }
        }
        if !result.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for rec in &result.recommendations {
                let _ = writeln!(out, "  - {rec}");
            }
        }
        out
    }

    fn name_cell(&self, variant: &VariantResult, is_winner: bool) -> Cell {
        let mut label = truncate(&variant.variant_id, 24);
        if variant.is_control {
            label.push_str(" (control)");
        }
        if is_winner {
            label.push_str(" *");
        }

        let cell = Cell::new(label);
        if self.use_colors && is_winner {
            cell.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            cell
        }
    }

    fn emphasize(&self, text: &str, positive: bool) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        if positive {
            style(text).green().bold().to_string()
        } else {
            style(text).yellow().to_string()
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for ResultsTable {
    fn default() -> Self {
        Self::new()
    }
}

fn numeric(value: String) -> Cell {
    Cell::new(value).set_alignment(CellAlignment::Right)
}

/// Check if the terminal supports color
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

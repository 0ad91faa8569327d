//! Terminal sink with optional colors
//!
//! Renders one live status line per phase: a sparkline of the rolling
//! history followed by the current/max/average readings. In verbose mode
//! every refresh is printed on its own line instead of being redrawn.

use super::DisplaySink;
use crate::{
    stats::ThroughputSummary,
    types::{bits_per_ms_to_mbps, TestDirection},
};
use colored::*;
use std::io::{self, Write};
use std::sync::Mutex;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render a series as unicode block characters scaled to its own maximum
pub fn sparkline(series: &[f64]) -> String {
    let max = series.iter().copied().fold(0.0_f64, f64::max);
    series
        .iter()
        .map(|value| {
            if max <= 0.0 || !value.is_finite() {
                SPARK_LEVELS[0]
            } else {
                let ratio = (value / max).clamp(0.0, 1.0);
                let index = (ratio * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[index.min(SPARK_LEVELS.len() - 1)]
            }
        })
        .collect()
}

/// Terminal columns a line occupies, ignoring ANSI escape sequences
fn visible_width(line: &str) -> usize {
    let mut width = 0;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI sequences end at the first byte in '@'..='~'
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if ('@'..='~').contains(&c) {
                        break;
                    }
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

#[derive(Debug, Default)]
struct ConsoleState {
    series: Vec<f64>,
    last_line_len: usize,
}

/// Console renderer for live results
#[derive(Debug)]
pub struct ConsoleSink {
    use_color: bool,
    verbose: bool,
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self {
            use_color,
            verbose,
            state: Mutex::new(ConsoleState::default()),
        }
    }

    /// Build the status line for a direction
    pub fn format_status(&self, direction: TestDirection, series: &[f64], summary: &ThroughputSummary) -> String {
        let stats = summary.for_direction(direction);
        let label = format!("{:<8}", direction.label());
        let chart = sparkline(series);
        let readings = format!(
            "{:>8.1} Mbit/s  max {:.1}  avg {:.1}",
            bits_per_ms_to_mbps(stats.current),
            bits_per_ms_to_mbps(stats.max),
            bits_per_ms_to_mbps(stats.average()),
        );

        if self.use_color {
            let label = match direction {
                TestDirection::Inbound => label.cyan().bold(),
                TestDirection::Outbound => label.magenta().bold(),
            };
            format!("{} {} {}", label, chart.green(), readings.bold())
        } else {
            format!("{} {} {}", label, chart, readings)
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplaySink for ConsoleSink {
    fn reset(&self, direction: TestDirection) {
        let mut state = self.lock_state();
        state.series.clear();
        state.last_line_len = 0;

        let header = format!("Testing {} throughput...", direction.label().to_lowercase());
        if self.use_color {
            println!("{}", header.bright_blue().bold());
        } else {
            println!("{}", header);
        }
    }

    fn update_chart(&self, _direction: TestDirection, series: &[f64]) {
        let mut state = self.lock_state();
        state.series.clear();
        state.series.extend_from_slice(series);
    }

    fn update_summary(&self, summary: &ThroughputSummary) {
        let mut state = self.lock_state();
        let line = self.format_status(summary.active, &state.series, summary);

        let mut stdout = io::stdout().lock();
        if self.verbose {
            let _ = writeln!(stdout, "{}", line);
        } else {
            let visible = visible_width(&line);
            let padding = state.last_line_len.saturating_sub(visible);
            let _ = write!(stdout, "\r{}{}", line, " ".repeat(padding));
            state.last_line_len = visible;
        }
        let _ = stdout.flush();
    }

    fn test_complete(&self, direction: TestDirection) {
        let mut state = self.lock_state();
        if !self.verbose && state.last_line_len > 0 {
            println!();
        }
        state.last_line_len = 0;

        let footer = format!("{} test complete", direction.label());
        if self.use_color {
            println!("{}", footer.green());
        } else {
            println!("{}", footer);
        }
    }
}

//! Recap callback plugin.
//!
//! Prints one line per host once the run is over:
//!
//! ```text
//! RECAP **************************************************************************
//! db1                            : ok=0    failed=0    skipped=2    unreachable=1
//! web1                           : ok=3    failed=1    skipped=0    unreachable=0
//! ```
//!
//! Colors are disabled when `NO_COLOR` is set.

use async_trait::async_trait;
use colored::{Color, Colorize};

use crate::callback::ExecutionCallback;
use crate::executor::{HostStats, RunReport};

const OUTPUT_WIDTH: usize = 80;

/// Callback that prints a per-host recap at the end of the run
#[derive(Debug, Clone)]
pub struct RecapCallback {
    use_color: bool,
}

impl Default for RecapCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl RecapCallback {
    pub fn new() -> Self {
        Self {
            use_color: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    #[must_use]
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.use_color = !no_color;
        self
    }

    /// Render the recap as text
    pub fn render(&self, report: &RunReport) -> String {
        let header = "RECAP";
        let stars = "*".repeat(OUTPUT_WIDTH.saturating_sub(header.len() + 1));
        let mut out = if self.use_color {
            format!("{} {}\n", header.bright_white().bold(), stars.bright_black())
        } else {
            format!("{} {}\n", header, stars)
        };

        for (host, stats) in report.host_stats() {
            out.push_str(&format!(
                "{} : {}    {}    {}    {}\n",
                self.format_host(&host, &stats),
                self.format_stat("ok", stats.ok, Color::Green),
                self.format_stat("failed", stats.failed, Color::Red),
                self.format_stat("skipped", stats.skipped, Color::Cyan),
                self.format_stat("unreachable", u32::from(stats.unreachable), Color::Red),
            ));
        }
        out
    }

    /// Padded before coloring so escape codes do not eat into the column
    fn format_host(&self, host: &str, stats: &HostStats) -> String {
        let padded = format!("{:<30}", host);
        if !self.use_color {
            padded
        } else if stats.failed > 0 || stats.unreachable {
            padded.red().bold().to_string()
        } else {
            padded.green().to_string()
        }
    }

    /// Dimmed when zero
    fn format_stat(&self, label: &str, value: u32, color: Color) -> String {
        if !self.use_color {
            format!("{}={}", label, value)
        } else if value > 0 {
            format!(
                "{}={}",
                label.color(color),
                value.to_string().color(color).bold()
            )
        } else {
            format!("{}={}", label, value).dimmed().to_string()
        }
    }
}

#[async_trait]
impl ExecutionCallback for RecapCallback {
    async fn on_run_end(&self, report: &RunReport) {
        println!("\n{}", self.render(report));
    }
}

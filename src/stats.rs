//! sccache statistics display
//!
//! Presentation layered on top of the installed executable: runs
//! `sccache --show-stats` in JSON and human form, derives the hit
//! ratio, and renders a notice line, an aligned table, and a Markdown
//! job summary. Nothing here feeds back into cache coordination.

use crate::error::{CiError, CiResult};
use console::style;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Wall-clock duration as sccache reports it
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatsDuration {
    #[serde(default)]
    pub secs: u64,
    #[serde(default)]
    pub nanos: u64,
}

/// Per-language counter block
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub counts: HashMap<String, u64>,
    #[serde(default)]
    pub adv_counts: HashMap<String, u64>,
}

impl Counter {
    fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsInner {
    #[serde(default)]
    pub compile_requests: u64,
    #[serde(default)]
    pub requests_executed: u64,
    #[serde(default)]
    pub cache_errors: Counter,
    #[serde(default)]
    pub cache_hits: Counter,
    #[serde(default)]
    pub cache_misses: Counter,
    #[serde(default)]
    pub cache_write_errors: u64,
    #[serde(default)]
    pub cache_writes: u64,
    #[serde(default)]
    pub cache_write_duration: StatsDuration,
    #[serde(default)]
    pub cache_read_hit_duration: StatsDuration,
    #[serde(default)]
    pub compiler_write_duration: StatsDuration,
}

/// Top-level JSON document from `--show-stats --stats-format=json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    pub stats: StatsInner,
}

impl Stats {
    pub fn parse(json: &str) -> CiResult<Self> {
        serde_json::from_str(json).map_err(CiError::from)
    }

    pub fn hit_count(&self) -> u64 {
        self.stats.cache_hits.total()
    }

    pub fn miss_count(&self) -> u64 {
        self.stats.cache_misses.total()
    }

    pub fn error_count(&self) -> u64 {
        self.stats.cache_errors.total()
    }

    /// Hit percentage over hits + misses + errors, rounded; 0 when the
    /// cache saw no traffic
    pub fn hit_ratio(&self) -> u64 {
        let total = self.hit_count() + self.miss_count() + self.error_count();
        if total == 0 {
            return 0;
        }
        (self.hit_count() as f64 / total as f64 * 100.0).round() as u64
    }

    /// One-line summary for the job log
    pub fn notice(&self) -> String {
        format!(
            "{}% - {} hits, {} misses, {} errors",
            self.hit_ratio(),
            self.hit_count(),
            self.miss_count(),
            self.error_count()
        )
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Cache hit %", format!("{}%", self.hit_ratio())),
            ("Cache hits", self.hit_count().to_string()),
            ("Cache misses", self.miss_count().to_string()),
            ("Cache errors", self.error_count().to_string()),
            ("Compile requests", self.stats.compile_requests.to_string()),
            ("Requests executed", self.stats.requests_executed.to_string()),
            ("Cache writes", self.stats.cache_writes.to_string()),
            ("Cache write errors", self.stats.cache_write_errors.to_string()),
            (
                "Cache write duration",
                format_duration(self.stats.cache_write_duration),
            ),
            (
                "Cache read hit duration",
                format_duration(self.stats.cache_read_hit_duration),
            ),
            (
                "Compiler write duration",
                format_duration(self.stats.compiler_write_duration),
            ),
        ]
    }
}

fn format_duration(d: StatsDuration) -> String {
    format!("{}s {}ms", d.secs, d.nanos / 1_000_000)
}

/// Aligned two-column table for terminal output
pub fn render_table(stats: &Stats) -> String {
    let mut out = String::new();
    for (label, value) in stats.rows() {
        out.push_str(&format!("{:<26} {}\n", label, value));
    }
    out
}

/// Markdown job summary: table plus collapsed raw sections
pub fn render_markdown(stats: &Stats, human: &str, json: &str) -> String {
    let mut out = String::from("## sccache stats\n\n");
    out.push_str("| Metric | Value |\n|---|---|\n");
    for (label, value) in stats.rows() {
        out.push_str(&format!("| {} | {} |\n", label, value));
    }
    out.push_str(&format!(
        "\n<details><summary>Full human-readable stats</summary>\n\n```\n{}\n```\n\n</details>\n",
        human.trim_end()
    ));
    out.push_str(&format!(
        "\n<details><summary>Full JSON stats</summary>\n\n```json\n{}\n```\n\n</details>\n",
        json.trim_end()
    ));
    out
}

async fn get_output(exe: &Path, args: &[&str]) -> CiResult<String> {
    let command = format!("{} {}", exe.display(), args.join(" "));
    debug!(%command, "collecting stats");

    let output = Command::new(exe)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CiError::command_failed(command.clone(), e))?;

    if !output.status.success() {
        return Err(CiError::CommandExecution {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Collect and display stats from the installed executable.
///
/// Prints the notice line and table to the job log, and appends the
/// Markdown summary to `summary_file` when one is provided.
pub async fn show_stats(exe: &Path, summary_file: Option<&Path>) -> CiResult<()> {
    let json = get_output(exe, &["--show-stats", "--stats-format=json"]).await?;
    let human = get_output(exe, &["--show-stats"]).await?;
    let stats = Stats::parse(&json).map_err(|e| CiError::Stats(e.to_string()))?;

    println!(
        "{} {}",
        style("sccache stats:").cyan().bold(),
        stats.notice()
    );
    println!();
    print!("{}", render_table(&stats));
    println!();
    println!("{}", human.trim_end());

    if let Some(file) = summary_file {
        use std::io::Write;
        let mut handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .map_err(|e| CiError::io(format!("opening {}", file.display()), e))?;
        write!(handle, "{}", render_markdown(&stats, &human, &json))
            .map_err(|e| CiError::io(format!("appending to {}", file.display()), e))?;
    }

    Ok(())
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::SystemConfig;
use crate::metrics::Metrics;

/// Result of one benchmark run, written as `analysis-<model>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub system_config: SystemConfig,
    pub model: String,
    pub total_prompts: usize,
    pub total_time_taken_in_seconds: f64,
    pub average_time_taken_in_seconds: f64,
    pub prompt_response: Vec<PromptResponse>,
}

/// One row per prompt, in the order the prompts were sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// 1-based position in the run
    pub order: usize,
    pub prompt: String,
    /// Reference label of the prompt
    pub expected_model: String,
    /// The model's answer with reasoning stripped
    pub response_model: String,
    pub time_taken_in_seconds: f64,
}

impl PromptResponse {
    pub fn matches_expected(&self) -> bool {
        self.response_model.trim().eq_ignore_ascii_case(self.expected_model.trim())
    }
}

impl AnalysisReport {
    pub fn new(model: impl Into<String>, system_config: SystemConfig) -> Self {
        Self {
            system_config,
            model: model.into(),
            total_prompts: 0,
            total_time_taken_in_seconds: 0.0,
            average_time_taken_in_seconds: 0.0,
            prompt_response: Vec::new(),
        }
    }

    pub fn push(&mut self, record: PromptResponse) {
        self.prompt_response.push(record);
        self.total_prompts = self.prompt_response.len();
    }

    /// Fill in the totals from the wall-clock time of the whole run.
    pub fn finalize(&mut self, total: Duration) {
        self.total_prompts = self.prompt_response.len();
        self.total_time_taken_in_seconds = round2(total.as_secs_f64());
        self.average_time_taken_in_seconds = if self.total_prompts == 0 {
            0.0
        } else {
            round2(self.total_time_taken_in_seconds / self.total_prompts as f64)
        };
    }

    pub fn matched(&self) -> usize {
        self.prompt_response
            .iter()
            .filter(|r| r.matches_expected())
            .count()
    }

    /// Artifact name for this report. Path separators in the model name are
    /// replaced so the file always lands directly in the output directory.
    pub fn file_name(&self) -> String {
        format!("analysis-{}.json", self.model.replace(['/', '\\'], "-"))
    }

    /// Write the report as pretty JSON into `directory`, creating it if needed.
    pub async fn write_json(&self, directory: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(directory)
            .await
            .with_context(|| format!("failed to create {}", directory.display()))?;

        let path = directory.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        log::info!("Report written to {}", path.display());
        Ok(path)
    }

    pub fn print_console_report(&self, file: Option<&Path>) {
        output!();
        output!("-----");
        output!("Benchmark Complete");
        output!("Model: {}", self.model);
        output!(
            "System: CPU: {} Memory: {}",
            self.system_config.cpu,
            self.system_config.memory
        );
        output!("Prompts: {}", self.total_prompts);
        output!("Total time taken: {:.2}s", self.total_time_taken_in_seconds);
        output!(
            "Average time taken: {:.2}s",
            self.average_time_taken_in_seconds
        );

        if let Some(percentiles) = Metrics::latency_percentiles(&[50.0, 90.0, 99.0]) {
            let mut line = String::from("Request Latency (s):");
            for (percentile, seconds) in percentiles {
                line.push_str(&format!(" p{}: {:.2}", percentile.round() as u32, seconds));
            }
            output!("{}", line);
        }

        if self.total_prompts > 0 {
            output!(
                "Matches reference: {}/{} ({:.1}%)",
                self.matched(),
                self.total_prompts,
                self.matched() as f64 / self.total_prompts as f64 * 100.0
            );
        }

        if let Some(path) = file {
            output!("Report written to {}", path.display());
        }
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

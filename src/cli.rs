use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser, Debug, Default)]
#[command(name = "ollama-bench")]
#[command(author, version, about = "Benchmark model-routing prompts against a local Ollama server", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (built-in defaults when omitted)
    pub config: Option<PathBuf>,

    /// Logical model name from the catalog
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of prompts to run
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only run prompts from this built-in category
    #[arg(long)]
    pub category: Option<String>,

    /// Only run prompts with this reference label
    #[arg(long)]
    pub reference: Option<String>,

    /// Read prompts from a JSONL file instead of the built-in corpus
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Shuffle the selected prompts
    #[arg(long)]
    pub shuffle: bool,

    /// Directory for the JSON report
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the model catalog and exit
    #[arg(long)]
    pub list_models: bool,

    /// Print the built-in prompt categories and exit
    #[arg(long)]
    pub list_categories: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(limit) = self.limit {
            config.input.sample_size = Some(limit);
        }
        if let Some(category) = &self.category {
            config.input.category = Some(category.clone());
        }
        if let Some(reference) = &self.reference {
            config.input.reference = Some(reference.clone());
        }
        if let Some(file) = &self.prompts {
            config.input.file = Some(file.clone());
        }
        if self.shuffle {
            config.input.shuffle = true;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if self.quiet {
            config.output.quiet = true;
        }
    }
}

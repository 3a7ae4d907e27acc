/// Print with timestamp prefix
macro_rules! output {
    () => {
        let now = chrono::Utc::now();
        println!("{}", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false));
    };
    ($($arg:tt)*) => {{
        let now = chrono::Utc::now();
        print!("{} ", now.to_rfc3339_opts(chrono::SecondsFormat::Millis, false));
        println!($($arg)*);
    }};
}

pub mod benchmark;
pub mod cli;
pub mod client;
pub mod config;
pub mod metrics;
pub mod prompts;
pub mod report;
pub mod wrapper;

pub use benchmark::BenchmarkRunner;
pub use cli::Cli;
pub use client::{ChatClient, ChatRequest, ChatResponse, ClientConfig, Message, OllamaClient, Role};
pub use config::Config;
pub use prompts::TestPrompt;
pub use report::{AnalysisReport, PromptResponse};
pub use wrapper::{ChatWrapper, SanitizedResponse, strip_reasoning};

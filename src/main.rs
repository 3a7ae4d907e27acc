use anyhow::Result;
use log::{info, LevelFilter, Metadata, Record};
use ollama_bench::config::HOST_ENV;
use ollama_bench::{BenchmarkRunner, Cli, Config, prompts};
use ringlog::{Drain, File, LogBuilder, MultiLogBuilder, Output, Stderr};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Maximum log file size before rotation (10MB)
const LOG_FILE_MAX_SIZE: u64 = 1024 * 1024 * 10;

/// How often the ringlog drain is flushed in the background
const LOG_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Keeps the ringlog drain alive and flushed until dropped
struct LogDrain {
    drain: Arc<Mutex<Box<dyn Drain>>>,
}

impl LogDrain {
    fn start(drain: Box<dyn Drain>) -> Self {
        let drain = Arc::new(Mutex::new(drain));
        let background = drain.clone();
        std::thread::spawn(move || {
            loop {
                if let Ok(mut drain) = background.lock() {
                    let _ = drain.flush();
                }
                std::thread::sleep(LOG_FLUSH_INTERVAL);
            }
        });
        Self { drain }
    }
}

impl Drop for LogDrain {
    fn drop(&mut self) {
        if let Ok(mut drain) = self.drain.lock() {
            let _ = drain.flush();
        }
    }
}

/// Parse log filter strings like "reqwest=warn" into a map of module prefix to level filter
fn parse_log_filters(filters: &[String]) -> HashMap<String, LevelFilter> {
    let mut map = HashMap::new();
    for filter in filters {
        if let Some((module, level)) = filter.split_once('=') {
            let level_filter = match level.to_lowercase().as_str() {
                "error" => LevelFilter::Error,
                "warn" => LevelFilter::Warn,
                "info" => LevelFilter::Info,
                "debug" => LevelFilter::Debug,
                "trace" => LevelFilter::Trace,
                "off" => LevelFilter::Off,
                _ => continue,
            };
            map.insert(module.to_string(), level_filter);
        }
    }
    map
}

fn should_log(metadata: &Metadata, filters: &HashMap<String, LevelFilter>) -> bool {
    let target = metadata.target();

    for (module_prefix, level_filter) in filters {
        if target.starts_with(module_prefix) {
            return metadata.level() <= *level_filter;
        }
    }

    true
}

/// Logger with per-module filtering on top of a ringlog output
struct FilteredLogger {
    output: Mutex<Box<dyn Output>>,
    max_level: LevelFilter,
    filters: HashMap<String, LevelFilter>,
}

impl log::Log for FilteredLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level && should_log(metadata, &self.filters)
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if let Ok(mut output) = self.output.lock() {
                let message = format!("{} [{}] {}\n", record.level(), record.target(), record.args());
                let _ = output.write_all(message.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut output) = self.output.lock() {
            let _ = output.flush();
        }
    }
}

fn init_logging(config: &Config) -> Result<Option<LogDrain>> {
    let log_level = config.log.level.to_level_filter();

    let output: Box<dyn Output> = if let Some(ref log_file) = config.output.trace_log {
        let backup_file = log_file.with_extension("old");
        Box::new(File::new(log_file.clone(), backup_file, LOG_FILE_MAX_SIZE)?)
    } else {
        Box::new(Stderr::new())
    };

    let filters = parse_log_filters(&config.log.filter);

    if filters.is_empty() {
        // No filters, ringlog handles everything
        let base_log = LogBuilder::new()
            .output(output)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to initialize logger: {:?}", e))?;

        let drain = MultiLogBuilder::new()
            .level_filter(log_level)
            .default(base_log)
            .build()
            .start();

        Ok(Some(LogDrain::start(drain)))
    } else {
        let logger = FilteredLogger {
            output: Mutex::new(output),
            max_level: log_level,
            filters,
        };

        log::set_boxed_logger(Box::new(logger))?;
        log::set_max_level(log_level);

        Ok(None)
    }
}

fn print_models(config: &Config) -> Result<()> {
    for name in config.models.keys() {
        let mut entry = config.clone();
        entry.model = name.clone();
        let target = entry.target()?;
        let marker = if *name == config.model { "*" } else { " " };
        println!("{} {:<20} {:<20} {}", marker, target.name, target.model, target.host);
    }
    Ok(())
}

fn print_categories() {
    for category in prompts::CATEGORIES {
        println!("{:<45} {} prompts", category.name, category.prompts.len());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let _log_drain = init_logging(&config)?;

    if let Some(host) = Config::host_override() {
        info!("{} overrides model hosts with {}", HOST_ENV, host);
    }

    if cli.list_models {
        return print_models(&config);
    }
    if cli.list_categories {
        print_categories();
        return Ok(());
    }

    config.validate()?;

    if !config.output.quiet {
        let target = config.target()?;
        println!("Ollama Benchmark Tool");
        if let Some(path) = &cli.config {
            println!("   Config: {}", path.display());
        }
        println!("   Target: {}", target.host);
        println!("   Model: {} ({})", target.name, target.model);
        if let Some(limit) = config.input.sample_size {
            println!("   Prompts: up to {}", limit);
        }
        println!();
    }

    // Requests are strictly sequential, one thread is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async { run_benchmark(config).await })
}

async fn run_benchmark(config: Config) -> Result<()> {
    let prompts = prompts::select(&config.input).await?;
    if prompts.is_empty() {
        log::warn!("No prompts selected, the report will be empty");
    }

    let runner = BenchmarkRunner::from_config(&config).await?;
    info!("Starting benchmark run");
    let report = runner.run(&prompts).await?;

    let path = report.write_json(&config.output.directory).await?;
    if !config.output.quiet {
        report.print_console_report(Some(&path));
    }

    info!("Benchmark completed successfully");
    Ok(())
}

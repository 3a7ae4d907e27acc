use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;

use crate::client::{ChatClient, ClientConfig, Message, OllamaClient};
use crate::config::{Config, SystemConfig};
use crate::metrics::{ErrorType, Metrics, RequestStatus};
use crate::prompts::{SYSTEM_PROMPT, TestPrompt};
use crate::report::{AnalysisReport, PromptResponse};
use crate::wrapper::ChatWrapper;

/// Drives a list of prompts through a [`ChatWrapper`], one at a time.
///
/// A local server holds a single loaded model and cannot usefully serve
/// concurrent requests, so every call completes before the next one is sent.
/// The first failing call aborts the run.
///
/// # Examples
///
/// ```no_run
/// use ollama_bench::{BenchmarkRunner, Config, prompts};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load(None)?;
///     let runner = BenchmarkRunner::from_config(&config).await?;
///     let report = runner.run(&prompts::all()).await?;
///     report.write_json(&config.output.directory).await?;
///     Ok(())
/// }
/// ```
pub struct BenchmarkRunner<C> {
    wrapper: ChatWrapper<C>,
    system_prompt: String,
    system: SystemConfig,
    quiet: bool,
}

impl<C: ChatClient> BenchmarkRunner<C> {
    pub fn new(wrapper: ChatWrapper<C>, config: &Config) -> Self {
        Self {
            wrapper,
            system_prompt: SYSTEM_PROMPT.to_string(),
            system: config.system.clone(),
            quiet: config.output.quiet,
        }
    }

    /// Replace the instruction sent as the system message.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        self.wrapper.model()
    }

    /// Send every prompt in order and build the analysis report.
    ///
    /// Total time is measured around the whole loop; the average is
    /// total / count, and 0 for an empty list.
    pub async fn run(&self, prompts: &[TestPrompt]) -> Result<AnalysisReport> {
        let mut report = AnalysisReport::new(self.wrapper.model(), self.system.clone());
        let start_instant = Instant::now();

        info!(
            "Running {} prompts against {}",
            prompts.len(),
            self.wrapper.model()
        );
        if !self.quiet {
            output!("Testing {} prompts...", prompts.len());
        }

        for (index, test_prompt) in prompts.iter().enumerate() {
            let order = index + 1;
            let record = self
                .execute_prompt(order, test_prompt)
                .await
                .with_context(|| format!("prompt #{} failed", order))?;
            report.push(record);
        }

        report.finalize(start_instant.elapsed());

        debug!(
            "Run finished: {} prompts in {:.2}s",
            report.total_prompts, report.total_time_taken_in_seconds
        );

        Ok(report)
    }

    async fn execute_prompt(&self, order: usize, test_prompt: &TestPrompt) -> Result<PromptResponse> {
        let messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(test_prompt.prompt.clone()),
        ];

        debug!("Sending prompt #{} (reference: {})", order, test_prompt.model);
        Metrics::record_request_sent();
        let request_start = Instant::now();

        match self.wrapper.send(messages).await {
            Ok(response) => {
                let elapsed = request_start.elapsed();
                Metrics::record_latency(elapsed);
                Metrics::record_tokens(
                    response.response.prompt_eval_count,
                    response.response.eval_count,
                );
                Metrics::record_request_complete(RequestStatus::Success);

                let record = PromptResponse {
                    order,
                    prompt: test_prompt.prompt.clone(),
                    expected_model: test_prompt.model.clone(),
                    response_model: response.non_reasoning_content,
                    time_taken_in_seconds: elapsed.as_millis() as f64 / 1000.0,
                };

                if !self.quiet {
                    output!(
                        "Prompt #{}: {:.3}s expected: {} answered: {}",
                        order,
                        record.time_taken_in_seconds,
                        record.expected_model,
                        record.response_model
                    );
                }

                Ok(record)
            }
            Err(e) => {
                debug!("Prompt #{} failed: {}", order, e);
                Metrics::record_request_complete(RequestStatus::Failed(ErrorType::classify(&e)));
                Err(e)
            }
        }
    }
}

impl BenchmarkRunner<OllamaClient> {
    /// Build a runner for the configured model over a real Ollama client.
    ///
    /// Waits for the server first when `health_check_timeout` is set, and
    /// warns when the target model is not installed.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let target = config.target()?;

        if config.endpoint.health_check_timeout > 0 {
            crate::client::check_server_ready(
                &target.host,
                Duration::from_secs(config.endpoint.health_check_timeout),
                Duration::from_secs(config.endpoint.health_check_interval),
            )
            .await?;
        }

        match crate::client::list_models(&target.host, Duration::from_secs(10)).await {
            Ok(models) => {
                let latest = format!("{}:latest", target.model);
                let installed = models
                    .iter()
                    .any(|m| m.name == target.model || m.model == target.model || m.name == latest);
                if !installed {
                    warn!(
                        "Model {} is not installed on {} ({} models available)",
                        target.model,
                        target.host,
                        models.len()
                    );
                }
            }
            Err(e) => debug!("Could not list installed models: {}", e),
        }

        let client = OllamaClient::new(ClientConfig {
            host: target.host.clone(),
            timeout: config.request_timeout(),
        })?;

        info!("Benchmarking {} at {}", target.model, target.host);

        Ok(Self::new(ChatWrapper::new(client, target.model), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatRequest, ChatResponse, ClientError, Role};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers each call after a fixed delay, failing at `fail_at` if set.
    struct ScriptedClient {
        script: Vec<(Duration, &'static str)>,
        fail_at: Option<usize>,
        calls: AtomicUsize,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<(Duration, &'static str)>) -> Self {
            Self {
                script,
                fail_at: None,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatClient for ScriptedClient {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);

            let (delay, reply) = self.script[call % self.script.len()];
            tokio::time::sleep(delay).await;

            if self.fail_at == Some(call) {
                return Err(ClientError::Http5xx {
                    status: 500,
                    message: "model requires more system memory".to_string(),
                }
                .into());
            }

            Ok(ChatResponse {
                model,
                created_at: None,
                message: Message {
                    role: Role::Assistant,
                    content: reply.to_string(),
                },
                done: true,
                done_reason: Some("stop".to_string()),
                total_duration: delay.as_nanos() as u64,
                load_duration: 0,
                prompt_eval_count: 100,
                prompt_eval_duration: 0,
                eval_count: 5,
                eval_duration: 0,
            })
        }
    }

    fn prompt(text: &str, model: &str) -> TestPrompt {
        TestPrompt {
            prompt: text.to_string(),
            model: model.to_string(),
        }
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.output.quiet = true;
        config.system = SystemConfig {
            cpu: "8".to_string(),
            memory: "16GB".to_string(),
        };
        config
    }

    fn runner(client: ScriptedClient) -> BenchmarkRunner<ScriptedClient> {
        BenchmarkRunner::new(ChatWrapper::new(client, "llama3.2:3b"), &quiet_config())
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_timing_totals() {
        let runner = runner(ScriptedClient::new(vec![
            (Duration::from_millis(1000), "<think>maths</think>gpt-5o"),
            (Duration::from_millis(2000), "claude-sonnet-4"),
            (Duration::from_millis(1500), "<think>\nimages\n</think>\n\ngemini-2.5-pro"),
        ]));

        let prompts = vec![
            prompt("Prove det(A) = λ1 × λ2 × λ3", "gpt-5o"),
            prompt("Review this codebase", "claude-sonnet-4"),
            prompt("Describe this image", "gemini-2.5-pro"),
        ];

        let report = runner.run(&prompts).await.unwrap();

        assert_eq!(report.model, "llama3.2:3b");
        assert_eq!(report.total_prompts, 3);
        assert_eq!(report.total_time_taken_in_seconds, 4.5);
        assert_eq!(report.average_time_taken_in_seconds, 1.5);

        let times: Vec<f64> = report
            .prompt_response
            .iter()
            .map(|r| r.time_taken_in_seconds)
            .collect();
        assert_eq!(times, vec![1.0, 2.0, 1.5]);

        let sum: f64 = times.iter().sum();
        assert!((sum - report.total_time_taken_in_seconds).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_records_in_input_order() {
        let runner = runner(ScriptedClient::new(vec![
            (Duration::from_millis(10), "<think>a</think>sonar-pro"),
            (Duration::from_millis(10), "xai.grok-4"),
        ]));

        let prompts = vec![
            prompt("latest quantum research", "sonar-pro"),
            prompt("automate invoices", "xai.grok-4"),
            prompt("plan an app launch", "deepseek-v3.1"),
        ];

        let report = runner.run(&prompts).await.unwrap();

        assert_eq!(report.prompt_response.len(), 3);
        for (i, record) in report.prompt_response.iter().enumerate() {
            assert_eq!(record.order, i + 1);
            assert_eq!(record.prompt, prompts[i].prompt);
            assert_eq!(record.expected_model, prompts[i].model);
            assert!(record.time_taken_in_seconds >= 0.0);
        }
        assert_eq!(report.prompt_response[0].response_model, "sonar-pro");
        assert_eq!(report.prompt_response[2].response_model, "sonar-pro");
        assert_eq!(report.matched(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_system_then_user() {
        let runner = runner(ScriptedClient::new(vec![(Duration::ZERO, "gpt-5o")]))
            .with_system_prompt("Answer with a model name.");

        runner
            .run(&[prompt("Design a fraud detector", "gpt-5o")])
            .await
            .unwrap();

        let requests = runner.wrapper.client().requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama3.2:3b");
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].content, "Answer with a model name.");
        assert_eq!(requests[0].messages[1].role, Role::User);
        assert_eq!(requests[0].messages[1].content, "Design a fraud detector");
    }

    #[tokio::test]
    async fn test_default_system_prompt() {
        let runner = runner(ScriptedClient::new(vec![(Duration::ZERO, "gpt-5o")]));
        runner.run(&[prompt("hi", "gpt-5o")]).await.unwrap();

        let requests = runner.wrapper.client().requests.lock().unwrap();
        assert_eq!(requests[0].messages[0].content, SYSTEM_PROMPT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_run() {
        let runner = runner(ScriptedClient::new(vec![(Duration::ZERO, "unused")]));

        let report = runner.run(&[]).await.unwrap();

        assert_eq!(report.total_prompts, 0);
        assert!(report.prompt_response.is_empty());
        assert_eq!(report.total_time_taken_in_seconds, 0.0);
        assert_eq!(report.average_time_taken_in_seconds, 0.0);
        assert_eq!(runner.wrapper.client().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_run() {
        let mut client = ScriptedClient::new(vec![(Duration::from_millis(100), "gpt-5o")]);
        client.fail_at = Some(1);
        let runner = runner(client);

        let prompts = vec![
            prompt("one", "gpt-5o"),
            prompt("two", "gpt-5o"),
            prompt("three", "gpt-5o"),
        ];

        let err = runner.run(&prompts).await.unwrap_err();

        assert!(err.to_string().contains("prompt #2"));
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Http5xx { status: 500, .. })
        ));
        // the third prompt is never sent
        assert_eq!(runner.wrapper.client().calls.load(Ordering::SeqCst), 2);
    }
}

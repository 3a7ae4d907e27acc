//! End-to-end runs against a stub of Ollama's HTTP API.

use ollama_bench::client::{ChatClient, ClientError};
use ollama_bench::{BenchmarkRunner, ChatRequest, ClientConfig, Config, Message, OllamaClient, prompts};
use serde_json::{Value, json};
use std::net::SocketAddr;
use warp::Filter;
use warp::http::StatusCode;

/// Answers every chat with a reasoning block followed by the reference label
/// hidden in the user prompt after `label:`.
fn spawn_stub() -> SocketAddr {
    let chat = warp::path!("api" / "chat")
        .and(warp::post())
        .and(warp::body::json())
        .map(|req: Value| {
            let user = req["messages"][1]["content"].as_str().unwrap_or_default();
            let label = user.rsplit("label:").next().unwrap_or_default().trim();
            let done = req["stream"] == json!(false);
            warp::reply::json(&json!({
                "model": req["model"],
                "created_at": "2025-08-20T10:00:00Z",
                "message": {
                    "role": "assistant",
                    "content": format!("<think>\nThe user asks: {user}\n</think>\n\n{label}\n"),
                },
                "done_reason": "stop",
                "done": done,
                "prompt_eval_count": 620,
                "eval_count": 12
            }))
        });

    let tags = warp::path!("api" / "tags").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "models": [{"name": "qwen3:1.7b", "model": "qwen3:1.7b", "size": 1_400_000_000u64}]
        }))
    });

    let (addr, server) = warp::serve(chat.or(tags)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn spawn_out_of_memory_stub() -> SocketAddr {
    let chat = warp::path!("api" / "chat").and(warp::post()).map(|| {
        warp::reply::with_status(
            warp::reply::json(&json!({
                "error": "model requires more system memory (3.3 GiB) than is available (2.3 GiB)"
            })),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    });

    let (addr, server) = warp::serve(chat).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

fn config_for(addr: SocketAddr) -> Config {
    let mut config = Config::default();
    config.model = "qwen3:1.7b".to_string();
    config.output.quiet = true;
    config.apply_host_override(Some(format!("http://{addr}")));
    config
}

#[tokio::test]
async fn test_full_run_writes_report() {
    let addr = spawn_stub();
    let config = config_for(addr);

    let prompts: Vec<_> = prompts::all()
        .into_iter()
        .take(3)
        .map(|mut p| {
            p.prompt = format!("{} label: {}", p.prompt, p.model);
            p
        })
        .collect();

    let runner = BenchmarkRunner::from_config(&config).await.unwrap();
    assert_eq!(runner.model(), "qwen3:1.7b");

    let report = runner.run(&prompts).await.unwrap();
    assert_eq!(report.total_prompts, 3);
    assert_eq!(report.matched(), 3);
    for (i, record) in report.prompt_response.iter().enumerate() {
        assert_eq!(record.order, i + 1);
        assert_eq!(record.response_model, "gpt-5o");
        assert!(record.time_taken_in_seconds >= 0.0);
    }

    let dir = tempfile::tempdir().unwrap();
    let path = report.write_json(dir.path()).await.unwrap();
    assert!(path.ends_with("analysis-qwen3:1.7b.json"));

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["model"], "qwen3:1.7b");
    assert_eq!(json["totalPrompts"], 3);
    assert_eq!(json["promptResponse"].as_array().unwrap().len(), 3);
    assert_eq!(json["promptResponse"][0]["expectedModel"], "gpt-5o");
    assert!(json["averageTimeTakenInSeconds"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_client_round_trip() {
    let addr = spawn_stub();
    let client = OllamaClient::new(ClientConfig {
        host: format!("http://{addr}"),
        timeout: None,
    })
    .unwrap();

    let response = client
        .chat(ChatRequest::new(
            "qwen3:1.7b",
            vec![Message::system("route"), Message::user("weather today label: sonar-pro")],
        ))
        .await
        .unwrap();

    assert_eq!(response.model, "qwen3:1.7b");
    assert!(response.done);
    assert_eq!(response.prompt_eval_count, 620);
    assert!(response.message.content.starts_with("<think>"));
    assert_eq!(ollama_bench::strip_reasoning(&response.message.content), "sonar-pro");
}

#[tokio::test]
async fn test_server_error_aborts_run() {
    let addr = spawn_out_of_memory_stub();
    let config = config_for(addr);

    let runner = BenchmarkRunner::from_config(&config).await.unwrap();
    let err = runner.run(&prompts::all()[..2]).await.unwrap_err();

    assert!(err.to_string().contains("prompt #1"));
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Http5xx { status, message }) => {
            assert_eq!(*status, 500);
            assert!(message.contains("more system memory"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_refused() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OllamaClient::new(ClientConfig {
        host: format!("http://{addr}"),
        timeout: None,
    })
    .unwrap();

    let err = client
        .chat(ChatRequest::new("qwen3:1.7b", vec![Message::user("hi")]))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::Connection(_))
    ));
}

use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn ask_with_pdf_url_strategy_embeds_the_pdf_url_and_fetches_nothing() {
    let requests: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let rq = requests.clone();
    let provider = Router::new().route(
        "/chat/completions",
        post(move |Json(body): Json<serde_json::Value>| {
            let rq = rq.clone();
            async move {
                rq.lock().unwrap().push(body);
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "the answer"}}]
                }))
            }
        }),
    );
    let provider_addr = serve(provider).await;

    let tmp = tempfile::tempdir().unwrap();
    let env_file = tmp.path().join(".env");
    std::fs::write(&env_file, "PERPLEXITY_API_KEY=pplx-test\n").unwrap();

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = tokio::process::Command::new(bin)
        .args([
            "ask",
            "https://arxiv.org/abs/2301.12345",
            "what is the main result?",
            "--strategy",
            "pdf-url",
        ])
        .env("PAPERPIPE_ENV_FILE", &env_file)
        .env("PAPERPIPE_ENV_JSON", tmp.path().join("missing-env.json"))
        .env("PAPERPIPE_CONFIG_DIR", tmp.path())
        // No mirror is running; the PDF-reference strategy must not need one.
        .env("PAPERPIPE_AR5IV_BASE", "http://127.0.0.1:9/html/")
        .env(
            "PAPERPIPE_PERPLEXITY_ENDPOINT",
            format!("http://{provider_addr}/chat/completions"),
        )
        .output()
        .await
        .expect("run paperpipe ask");

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "ask failed: {stderr}");
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "the answer");

    let reqs = requests.lock().unwrap();
    assert_eq!(reqs.len(), 1);
    let user = reqs[0]["messages"][1]["content"].as_str().unwrap_or("");
    assert!(user.contains("Paper PDF: https://arxiv.org/pdf/2301.12345.pdf"));
    assert!(user.contains("User question: what is the main result?"));
    assert!(!user.contains("BEGIN PAPER TEXT"));
}

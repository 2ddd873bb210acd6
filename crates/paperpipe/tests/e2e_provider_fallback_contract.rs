use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

const PAGE: &str =
    r#"<html><body><div id="content"><p>A short mock paper body.</p></div></body></html>"#;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn serve_mirror() -> SocketAddr {
    let app = Router::new().route(
        "/html/2301.12345",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], PAGE) }),
    );
    serve(app).await
}

fn reply_router(text: &'static str) -> Router {
    Router::new().route(
        "/chat/completions",
        post(move || async move {
            Json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": text}}]
            }))
        }),
    )
}

fn write_env_file(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join(".env");
    std::fs::write(&path, body).unwrap();
    path
}

fn base_cmd(bin: &Path, tmp: &Path, env_file: &Path, mirror: SocketAddr) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(bin);
    cmd.env("PAPERPIPE_ENV_FILE", env_file)
        .env("PAPERPIPE_ENV_JSON", tmp.join("missing-env.json"))
        .env("PAPERPIPE_CONFIG_DIR", tmp)
        .env("PAPERPIPE_AR5IV_BASE", format!("http://{mirror}/html/"));
    cmd
}

#[tokio::test]
async fn perplexity_wins_when_both_keys_are_configured() {
    let mirror = serve_mirror().await;
    let perplexity = serve(reply_router("from perplexity")).await;
    let openai = serve(reply_router("from openai")).await;

    let tmp = tempfile::tempdir().unwrap();
    let env_file = write_env_file(
        tmp.path(),
        "OPENAI_API_KEY=sk-test\nPERPLEXITY_API_KEY=pplx-test\n",
    );

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = base_cmd(&bin, tmp.path(), &env_file, mirror)
        .args(["summarize", "https://arxiv.org/abs/2301.12345"])
        .env(
            "PAPERPIPE_PERPLEXITY_ENDPOINT",
            format!("http://{perplexity}/chat/completions"),
        )
        .env(
            "PAPERPIPE_OPENAI_ENDPOINT",
            format!("http://{openai}/chat/completions"),
        )
        .output()
        .await
        .expect("run paperpipe summarize");

    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "from perplexity"
    );
}

#[tokio::test]
async fn openai_is_used_when_only_its_key_resolves() {
    let mirror = serve_mirror().await;
    let openai = serve(reply_router("from openai")).await;

    let tmp = tempfile::tempdir().unwrap();
    let env_file = write_env_file(tmp.path(), "OPENAI_API_KEY=sk-test\n");

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = base_cmd(&bin, tmp.path(), &env_file, mirror)
        .args(["summarize", "https://arxiv.org/abs/2301.12345"])
        .env(
            "PAPERPIPE_OPENAI_ENDPOINT",
            format!("http://{openai}/chat/completions"),
        )
        .output()
        .await
        .expect("run paperpipe summarize");

    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "from openai");
}

#[tokio::test]
async fn provider_error_status_and_body_reach_the_user() {
    let mirror = serve_mirror().await;
    let provider = serve(Router::new().route(
        "/chat/completions",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "rate limited") }),
    ))
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let env_file = write_env_file(tmp.path(), "PERPLEXITY_API_KEY=pplx-test\n");

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = base_cmd(&bin, tmp.path(), &env_file, mirror)
        .args(["summarize", "https://arxiv.org/abs/2301.12345"])
        .env(
            "PAPERPIPE_PERPLEXITY_ENDPOINT",
            format!("http://{provider}/chat/completions"),
        )
        .output()
        .await
        .expect("run paperpipe summarize");

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("429"), "stderr: {stderr}");
    assert!(stderr.contains("rate limited"), "stderr: {stderr}");
}

#[tokio::test]
async fn blank_model_reply_is_reported_as_empty_not_success() {
    let mirror = serve_mirror().await;
    let provider = serve(reply_router("   ")).await;

    let tmp = tempfile::tempdir().unwrap();
    let env_file = write_env_file(tmp.path(), "PERPLEXITY_API_KEY=pplx-test\n");

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = base_cmd(&bin, tmp.path(), &env_file, mirror)
        .args(["summarize", "https://arxiv.org/abs/2301.12345"])
        .env(
            "PAPERPIPE_PERPLEXITY_ENDPOINT",
            format!("http://{provider}/chat/completions"),
        )
        .output()
        .await
        .expect("run paperpipe summarize");

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("empty reply"), "stderr: {stderr}");
}

#[tokio::test]
async fn missing_credentials_point_at_the_settings_command() {
    let mirror = serve_mirror().await;
    let tmp = tempfile::tempdir().unwrap();
    let env_file = write_env_file(tmp.path(), "");

    let bin = assert_cmd::cargo::cargo_bin!("paperpipe");
    let out = base_cmd(&bin, tmp.path(), &env_file, mirror)
        .args(["summarize", "https://arxiv.org/abs/2301.12345"])
        .output()
        .await
        .expect("run paperpipe summarize");

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("paperpipe config"), "stderr: {stderr}");
}

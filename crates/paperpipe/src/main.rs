use anyhow::Result;
use clap::{Parser, Subcommand};
use paperpipe_core::Role;
use paperpipe_local::arxiv::{arxiv_id_from_url, arxiv_lookup_by_id};
use paperpipe_local::content::FetchStrategy;
use paperpipe_local::credentials::{default_settings_path, Settings};
use paperpipe_local::summarize::PipelineOptions;

mod session;

use session::{SessionHandle, Update, ERROR_PREFIX, NOT_ARXIV_MESSAGE, WORKING_MESSAGE};

#[derive(Parser, Debug)]
#[command(name = "paperpipe")]
#[command(about = "ArXiv paper summarization plumbing (CLI + background session)", long_about = None)]
struct Cli {
    /// Do not read `.env` / `env.json` credential files (hermetic runs).
    #[arg(long, global = true, default_value_t = false)]
    no_env_files: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize an arXiv paper URL.
    Summarize(SummarizeCmd),
    /// Answer a one-shot question about an arXiv paper URL.
    Ask(AskCmd),
    /// Summarize, then answer follow-up questions read from stdin.
    Chat(ChatCmd),
    /// Inspect or edit persisted provider settings.
    Config(ConfigCmd),
    /// Print version info (json).
    Version,
}

#[derive(clap::Args, Debug)]
struct SummarizeCmd {
    url: String,
    /// Content strategy. Allowed: rendered-text, pdf-url
    #[arg(long, default_value = "rendered-text")]
    strategy: String,
    /// Timeout for the paper content fetch (ms).
    #[arg(long, default_value_t = 20_000)]
    timeout_ms: u64,
    /// Sampling temperature forwarded to the provider.
    #[arg(long)]
    temperature: Option<f64>,
    /// Emit a JSON envelope (with paper metadata when available).
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct AskCmd {
    url: String,
    question: String,
    /// Content strategy. Allowed: rendered-text, pdf-url
    #[arg(long, default_value = "rendered-text")]
    strategy: String,
    #[arg(long, default_value_t = 20_000)]
    timeout_ms: u64,
    #[arg(long)]
    temperature: Option<f64>,
}

#[derive(clap::Args, Debug)]
struct ChatCmd {
    url: String,
    /// Content strategy. Allowed: rendered-text, pdf-url
    #[arg(long, default_value = "rendered-text")]
    strategy: String,
    #[arg(long, default_value_t = 20_000)]
    timeout_ms: u64,
    #[arg(long)]
    temperature: Option<f64>,
    /// Cap on follow-up turns for this conversation.
    #[arg(long)]
    max_turns: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct ConfigCmd {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the settings with secrets redacted (json).
    Show,
    /// Print the settings store path.
    Path,
    /// Set the API key and/or model for one provider.
    Set(ConfigSetCmd),
}

#[derive(clap::Args, Debug)]
struct ConfigSetCmd {
    /// Provider. Allowed: openai, perplexity
    provider: String,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

fn parse_strategy(s: &str) -> Result<FetchStrategy> {
    match s {
        "rendered-text" => Ok(FetchStrategy::RenderedText),
        "pdf-url" => Ok(FetchStrategy::PdfReference),
        other => anyhow::bail!("unknown strategy {other:?} (allowed: rendered-text, pdf-url)"),
    }
}

fn pipeline_options(
    no_env_files: bool,
    strategy: &str,
    timeout_ms: u64,
    temperature: Option<f64>,
    max_turns: Option<usize>,
) -> Result<PipelineOptions> {
    Ok(PipelineOptions {
        strategy: parse_strategy(strategy)?,
        fetch_timeout_ms: timeout_ms,
        temperature,
        use_env_files: !no_env_files,
        max_turns,
    })
}

/// Drive one summarization through the session and wait for its terminal
/// update: a conversation (success) or a non-working summary (failure).
async fn run_summarize(handle: &SessionHandle, url: &str) -> Result<String> {
    let mut updates = handle.subscribe();
    handle.summarize(url).await?;
    loop {
        match updates.recv().await? {
            Update::ConversationUpdated { messages, .. } => {
                let reply = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                return Ok(reply);
            }
            Update::SummaryReady { summary, .. } if summary != WORKING_MESSAGE => {
                if let Some(err) = summary.strip_prefix(ERROR_PREFIX) {
                    anyhow::bail!("{err}");
                }
                return Ok(summary);
            }
            Update::SummaryReady { .. } => continue,
        }
    }
}

async fn cmd_summarize(no_env_files: bool, args: SummarizeCmd) -> Result<()> {
    if arxiv_id_from_url(&args.url).is_none() {
        if args.json {
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "summarize",
                    "ok": false,
                    "error": NOT_ARXIV_MESSAGE,
                    "source_url": args.url,
                })
            );
        } else {
            println!("{NOT_ARXIV_MESSAGE}");
        }
        return Ok(());
    }

    let opts = pipeline_options(
        no_env_files,
        &args.strategy,
        args.timeout_ms,
        args.temperature,
        None,
    )?;
    let http = paperpipe_local::http_client()?;
    let handle = session::spawn(http.clone(), opts);
    let summary = run_summarize(&handle, &args.url).await?;

    if args.json {
        // Metadata is decoration; lookup failures must not fail the command.
        let id = arxiv_id_from_url(&args.url).unwrap_or_default();
        let paper = arxiv_lookup_by_id(&http, &id, 10_000).await.ok().flatten();
        println!(
            "{}",
            serde_json::json!({
                "schema_version": 1,
                "kind": "summarize",
                "ok": true,
                "summary": summary,
                "source_url": args.url,
                "arxiv_id": id,
                "paper": paper,
            })
        );
    } else {
        println!("{summary}");
    }
    Ok(())
}

async fn cmd_ask(no_env_files: bool, args: AskCmd) -> Result<()> {
    let opts = pipeline_options(
        no_env_files,
        &args.strategy,
        args.timeout_ms,
        args.temperature,
        None,
    )?;
    let http = paperpipe_local::http_client()?;
    let handle = session::spawn(http, opts);
    match handle.ask(&args.url, &args.question).await? {
        Ok(answer) => {
            println!("{answer}");
            Ok(())
        }
        Err(e) => anyhow::bail!("{e}"),
    }
}

async fn cmd_chat(no_env_files: bool, args: ChatCmd) -> Result<()> {
    let opts = pipeline_options(
        no_env_files,
        &args.strategy,
        args.timeout_ms,
        args.temperature,
        args.max_turns,
    )?;
    let http = paperpipe_local::http_client()?;
    let handle = session::spawn(http, opts);

    let summary = run_summarize(&handle, &args.url).await?;
    println!("{summary}");

    use tokio::io::AsyncBufReadExt;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        match handle.follow_up(&args.url, question).await? {
            Ok(()) => {
                let snap = handle.get_conversation().await?;
                if let Some(reply) = snap
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                {
                    println!("{}", reply.content);
                }
            }
            Err(e) => eprintln!("{ERROR_PREFIX}{e}"),
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<()> {
    let path = default_settings_path();
    match action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Show => {
            let s = Settings::load(&path);
            let redact = |k: &Option<String>| k.as_deref().map(|_| "(set)");
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "kind": "config",
                    "path": path.display().to_string(),
                    "openai": {
                        "api_key": redact(&s.openai_api_key),
                        "model": s.openai_model,
                    },
                    "perplexity": {
                        "api_key": redact(&s.perplexity_api_key),
                        "model": s.perplexity_model,
                    },
                })
            );
        }
        ConfigAction::Set(set) => {
            let mut s = Settings::load(&path);
            match set.provider.as_str() {
                "openai" => {
                    if let Some(k) = set.api_key {
                        s.openai_api_key = Some(k);
                    }
                    if let Some(m) = set.model {
                        s.openai_model = Some(m);
                    }
                }
                "perplexity" => {
                    if let Some(k) = set.api_key {
                        s.perplexity_api_key = Some(k);
                    }
                    if let Some(m) = set.model {
                        s.perplexity_model = Some(m);
                    }
                }
                other => anyhow::bail!("unknown provider {other:?} (allowed: openai, perplexity)"),
            }
            s.save(&path)?;
            println!("saved {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("PAPERPIPE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Summarize(args) => cmd_summarize(cli.no_env_files, args).await,
        Commands::Ask(args) => cmd_ask(cli.no_env_files, args).await,
        Commands::Chat(args) => cmd_chat(cli.no_env_files, args).await,
        Commands::Config(cmd) => cmd_config(cmd.action),
        Commands::Version => {
            println!(
                "{}",
                serde_json::json!({
                    "schema_version": 1,
                    "name": "paperpipe",
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
            Ok(())
        }
    }
}

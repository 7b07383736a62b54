use std::io::Read;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pr_review_agent::config::AppConfig;
use pr_review_agent::server::{create_router, AppState, ReviewBody};
use pr_review_agent::shutdown::{graceful_shutdown, wait_for_shutdown};

#[derive(Parser)]
#[command(
    name = "pr-review-agent",
    about = "Drafts, quality-gates and posts GitHub pull request reviews"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Review one pull request and print the outcome as JSON
    Review {
        /// Free-text request naming the PR, e.g. "Please review PR #42". Read from stdin when omitted.
        #[arg(short, long)]
        prompt: Option<String>,
        #[arg(long)]
        repo_url: Option<String>,
        /// GitHub token for this run
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `review` output stays parseable
    let json = cli.json_logs;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Review {
            prompt,
            repo_url,
            token,
        } => review_once(config, prompt, repo_url, token).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting pr-review-agent server"
    );

    let state = Arc::new(AppState::new(config.clone())?);
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    graceful_shutdown(&state).await;

    Ok(())
}

async fn review_once(
    config: AppConfig,
    prompt: Option<String>,
    repo_url: Option<String>,
    token: Option<String>,
) -> anyhow::Result<()> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let state = AppState::new(config)?;
    let request = state.review_request(ReviewBody {
        prompt,
        repo_url,
        github_token: token,
    })?;

    let outcome = state.workflow.run(request).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

//! `parley` — serves the conversational agent and runs its offline jobs.
//!
//! Reads `parley.toml` (or the path given with `--config`) layered under
//! `PARLEY_*` environment variables, opens the SQLite store and talks to an
//! OpenAI-compatible model provider.
//!
//! ```text
//! parley serve              # HTTP API (the default)
//! parley evaluate [--json]  # score every conversation, print averages
//! parley refine             # evaluate, then rewrite low-scoring prompts
//! ```
//!
//! A running server re-reads its variant source on `SIGHUP` or on
//! `POST /variants/reload`.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use parley_engine::{Engine, VariantRegistry, evaluation::EvaluationReport};
use parley_llm::OpenAiGateway;
use parley_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, expand_tilde};

#[derive(Parser)]
#[command(author, version, about = "Parley conversational agent")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "parley.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API.
  Serve,

  /// Score every stored conversation with the judge model.
  Evaluate {
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
  },

  /// Evaluate, then rewrite the prompt profiles of low-scoring conversations.
  Refine,
}

type AppEngine = Engine<SqliteStore, OpenAiGateway>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
  let engine = build_engine(&cfg).await?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(engine, &cfg).await,
    Command::Evaluate { json } => {
      let report = engine.evaluate_all().await.context("evaluation failed")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
      } else {
        print_report(&report);
      }
      Ok(())
    }
    Command::Refine => {
      let report = engine.evaluate_all().await.context("evaluation failed")?;
      print_report(&report);
      let refined = engine.refine_all(&report.evaluations).await;
      println!("\nUpdated {} prompt profile(s).", refined.updated());
      Ok(())
    }
  }
}

async fn build_engine(cfg: &ServerConfig) -> anyhow::Result<AppEngine> {
  if cfg.provider.api_key.is_empty() {
    tracing::warn!("provider.api_key is empty; model calls will likely be rejected");
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let variants_path = expand_tilde(&cfg.variants_path);
  let registry = VariantRegistry::load(&variants_path, cfg.default_variant.clone())
    .with_context(|| format!("failed to load variants from {variants_path:?}"))?;

  let gateway = OpenAiGateway::new(cfg.gateway()).context("failed to build HTTP client")?;

  Ok(Engine::new(
    Arc::new(store),
    Arc::new(gateway),
    Arc::new(registry),
    cfg.engine_settings(),
  ))
}

async fn serve(engine: AppEngine, cfg: &ServerConfig) -> anyhow::Result<()> {
  #[cfg(unix)]
  reload_on_hangup(engine.clone())?;

  let app = parley_api::api_router(engine).layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

#[cfg(unix)]
fn reload_on_hangup(engine: AppEngine) -> anyhow::Result<()> {
  use tokio::signal::unix::{SignalKind, signal};

  let mut hangups = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
  tokio::spawn(async move {
    while hangups.recv().await.is_some() {
      // Failures are logged by the registry, which keeps its previous source.
      let _ = engine.registry().reload();
    }
  });
  Ok(())
}

fn print_report(report: &EvaluationReport) {
  println!("Evaluation results:\n");
  for record in report.records() {
    let label = record.variant_label.as_deref().unwrap_or("-");
    match (record.score, &record.comment, &record.error) {
      (Some(score), Some(comment), _) => {
        println!("{} [{label}] score {score}: {comment}", record.conversation_id)
      }
      (_, _, Some(error)) => println!("{} [{label}] failed: {error}", record.conversation_id),
      _ => println!("{} [{label}] skipped", record.conversation_id),
    }
  }

  println!("\nAverage score per variant:");
  if report.averages.is_empty() {
    println!("  (no scored conversations)");
  }
  for (label, average) in &report.averages {
    println!("  {label}: {average:.2}");
  }
}

mod cli;
mod server;
mod services;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command};
use pdf_qa_core::{PdfSource, DEFAULT_SESSION_ID};
use server::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    let capabilities = services::build_capabilities(&cli).await?;

    match &cli.command {
        Command::Index { pdf, force } => {
            let indexer = capabilities.indexer()?;
            let source = PdfSource::new(pdf);
            let result = if *force {
                indexer.reindex(&source).await
            } else {
                indexer.index_corpus(&source).await
            };
            let report = result.with_context(|| format!("indexing {} failed", pdf.display()))?;

            if report.already_indexed {
                println!(
                    "{} chunks already indexed; pass --force to rebuild",
                    report.chunks_indexed
                );
            } else {
                println!(
                    "{} chunks indexed from {} pages at {}",
                    report.chunks_indexed,
                    report.pages_read,
                    Utc::now().to_rfc3339()
                );
            }
        }
        Command::Ask { question } => {
            let completion = services::build_completion(&cli)?;
            let system_prompt = services::load_system_prompt(&cli).await?;
            let orchestrator = capabilities.orchestrator(completion, system_prompt);

            // Sessions live in process memory, so a one-shot ask has no history.
            let answer = orchestrator.answer(DEFAULT_SESSION_ID, question).await?;

            println!("{}", answer.answer);
            println!();
            println!("context_used: {}", answer.context_used);
            for (index, source) in answer.sources.iter().enumerate() {
                let page = source
                    .page
                    .map(|page| page.to_string())
                    .unwrap_or_else(|| "?".to_string());
                let distance = source
                    .distance
                    .map(|distance| format!("{distance:.4}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!("[{}] page={page} distance={distance}", index + 1);
                println!("  {}", source.excerpt);
            }
        }
        Command::Serve { bind, pdf } => {
            let completion = services::build_completion(&cli)?;
            let system_prompt = services::load_system_prompt(&cli).await?;
            let state = AppState {
                orchestrator: Arc::new(capabilities.orchestrator(completion, system_prompt)),
                indexer: Arc::new(capabilities.indexer()?),
                collection: cli.collection.clone(),
            };

            if let Some(pdf) = pdf.clone() {
                let indexer = state.indexer.clone();
                tokio::spawn(async move {
                    let source = PdfSource::new(&pdf);
                    match indexer.index_corpus(&source).await {
                        Ok(report) => info!(
                            chunks = report.chunks_indexed,
                            already_indexed = report.already_indexed,
                            "startup indexing finished"
                        ),
                        Err(err) => warn!(
                            path = %pdf.display(),
                            error = %err,
                            "startup indexing skipped; serving with existing documents"
                        ),
                    }
                });
            } else {
                warn!("no PDF configured; serving with existing documents only");
            }

            let addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address {bind}"))?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, "pdf-qa listening");

            axum::serve(listener, server::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server shutdown")?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown requested");
}

//! CLI entry point for the papertab tool.

use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use papertab_core::cache::{CacheConfig, MetadataCache};
use papertab_core::resolver::{ResolveError, build_default_resolver_set};
use papertab_core::{
    ExtractionClient, Orchestrator, PageStatus, TabEvent, TabStatus, TitleApplyError, TitleSink,
    is_paper_url,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

/// How long the one-shot run waits for all resolutions (covers the full
/// 1 s + 2 s + 4 s retry schedule plus network time).
const RESOLUTION_DEADLINE: Duration = Duration::from_secs(30);

/// Prints applied titles to stdout, one line per tab.
struct PrintlnSink;

#[async_trait]
impl TitleSink for PrintlnSink {
    async fn apply_title(&self, tab_id: u64, title: &str) -> Result<(), TitleApplyError> {
        println!("[tab {tab_id}] {title}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    // Read input: from positional args or stdin
    let urls: Vec<String> = if args.urls.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe URLs via stdin or pass as arguments.");
            info!("Example: papertab https://arxiv.org/abs/1706.03762");
            return Ok(());
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        args.urls.clone()
    };

    let (urls, skipped): (Vec<String>, Vec<String>) =
        urls.into_iter().partition(|url| is_paper_url(url));
    for url in &skipped {
        warn!(url, "not a recognized paper URL, skipping");
    }
    if urls.is_empty() {
        info!("No paper URLs found in input");
        return Ok(());
    }

    let cache = MetadataCache::new(CacheConfig::default());
    let _sweeper = cache.spawn_sweeper();

    let resolvers = build_default_resolver_set(
        Duration::from_millis(args.arxiv_interval_ms),
        Duration::from_secs(args.timeout_secs),
    )?;

    // No page to scrape in CLI mode: the extraction collaborator answers
    // every generic-document request with a terminal-looking failure.
    let (extraction, mut extraction_requests) = ExtractionClient::new(Duration::from_secs(2));
    tokio::spawn(async move {
        while let Some(request) = extraction_requests.recv().await {
            let _ = request.reply.send(Err(ResolveError::network(
                "page extraction is not available in CLI mode",
            )));
        }
    });

    let orchestrator = Orchestrator::new(cache, resolvers, extraction, Arc::new(PrintlnSink));

    // Each URL plays the part of one freshly loaded browser tab.
    let tab_ids: Vec<u64> = (1..=urls.len() as u64).collect();
    for (tab_id, url) in tab_ids.iter().zip(&urls) {
        orchestrator.handle_tab_event(TabEvent {
            tab_id: *tab_id,
            url: url.clone(),
            status: PageStatus::Complete,
        });
    }

    wait_for_resolutions(&orchestrator, &tab_ids).await;

    let status = orchestrator.status().await;
    info!(
        resolved = status.resolved_count,
        cache_size = status.cache_size,
        "run finished"
    );
    if !args.quiet {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    Ok(())
}

/// How long an errored tab may sit unchanged before the run treats it as
/// settled. Longer than the largest retry backoff (4 s).
const ERROR_SETTLE_WINDOW: Duration = Duration::from_secs(8);

/// Polls tab states until every tab has settled or the deadline passes.
///
/// A tab has settled when it resolved, exhausted its retry budget, or sat
/// in an error state past the longest possible backoff. The deadline bounds
/// the whole one-shot run regardless.
async fn wait_for_resolutions(orchestrator: &Orchestrator, tab_ids: &[u64]) {
    let deadline = tokio::time::Instant::now() + RESOLUTION_DEADLINE;
    loop {
        let all_settled = tab_ids.iter().all(|tab_id| {
            orchestrator.tab_state(*tab_id).is_none_or(|state| {
                state.status == TabStatus::Complete
                    || (state.status == TabStatus::Error
                        && (state.retry_count > 3
                            || state.last_update.elapsed() > ERROR_SETTLE_WINDOW))
            })
        });
        if all_settled {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            warn!("deadline reached with unresolved tabs");
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

//! CLI argument definitions using clap derive macros.

use clap::Parser;

/// Resolve paper page URLs into clean bibliographic tab titles.
///
/// Papertab classifies each URL (arXiv, OpenReview, or a generic PDF),
/// resolves its metadata through the matching API, and prints the title a
/// browser tab showing that page would receive.
#[derive(Parser, Debug)]
#[command(name = "papertab")]
#[command(author, version, about)]
pub struct Args {
    /// Paper page URLs to resolve (reads stdin when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Per-request timeout in seconds (1-120)
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=120))]
    pub timeout_secs: u64,

    /// Minimum spacing between arXiv API calls in milliseconds (0-60000)
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub arxiv_interval_ms: u64,
}

//! CLI argument definitions for synthstats.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `network` | Fetch every network stat and render the section |
//! | `chart` | Fetch the SNX price series for one period |
//! | `sources` | List data source capabilities and health |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--source` | `auto` | Source selection strategy |
//! | `--timeout-ms` | config | Per-request timeout in ms |
//! | `--config` | none | JSON config file |
//! | `--mock` | `false` | Serve fixture data only |
//!
//! # Examples
//!
//! ```bash
//! # Render the network section from fixtures
//! synthstats network --mock --format table
//!
//! # Weekly price chart from the subgraph only
//! synthstats chart --period W --source subgraph --pretty
//!
//! # Stream a snapshot every time a stat resolves
//! synthstats network --incremental
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use synthstats_core::ChartPeriod;

/// Network stats for a synthetic-asset protocol.
///
/// Reads on-chain balances, subgraph aggregates and market quotes, then
/// derives market cap, collateral ratios and locked value.
#[derive(Debug, Parser)]
#[command(
    name = "synthstats",
    author,
    version,
    about = "Network stats for a synthetic-asset protocol",
    long_about = "synthstats fetches the network section of a synthetic-asset protocol \
dashboard: market cap, sUSD price, collateral ratios, locked collateral and \
the largest sUSD holders.\n\
\n\
Sources are configured with SYNTHSTATS_RPC_URL, SYNTHSTATS_SUBGRAPH_URL and \
SYNTHSTATS_CMC_API_KEY, or a JSON file passed with --config.\n\
\n\
Use 'synthstats <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    ///
    /// - json: Single JSON object (default)
    /// - ndjson: One JSON object per line
    /// - table: Plain text summary
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Source selection strategy for routing requests.
    #[arg(long, global = true, value_enum, default_value_t = SourceSelector::Auto)]
    pub source: SourceSelector,

    /// Per-request timeout in milliseconds. Overrides the config file.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// JSON config file with endpoints, contracts and holder labels.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve deterministic fixture data without network access.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Ndjson,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    Auto,
    Fixture,
    Rpc,
    Subgraph,
    Cmc,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every network stat and render the section.
    Network(NetworkArgs),
    /// Fetch the SNX price series for one chart period.
    Chart(ChartArgs),
    /// List data sources with capabilities and health.
    Sources(SourcesArgs),
}

#[derive(Debug, Args)]
pub struct NetworkArgs {
    /// Chart period (D, W, M, Y).
    #[arg(long, default_value = "D")]
    pub period: ChartPeriod,

    /// How long to wait for pending stats before rendering.
    #[arg(long, default_value_t = 10_000)]
    pub wait_ms: u64,

    /// Print an NDJSON snapshot each time a stat resolves.
    #[arg(long, default_value_t = false)]
    pub incremental: bool,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Chart period (D, W, M, Y).
    #[arg(long, default_value = "D")]
    pub period: ChartPeriod,

    /// How long to wait for the series.
    #[arg(long, default_value_t = 10_000)]
    pub wait_ms: u64,
}

#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Include sources that are not configured.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

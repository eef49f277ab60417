//! Nexus command line: API server, background worker, scheduler and
//! one-shot X searches.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use x_search::MatchMode;

mod cmd;
mod output;

use output::OutputFormat;

const DEFAULT_LOG_FILTER: &str = "nexus=info,x_search=info,tower_http=info";

#[derive(Parser)]
#[command(name = "nexus")]
#[command(about = "Nexus: X listening tool")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Nexus API server
    Run {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind to (PORT overrides)
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Runtime worker threads
        #[arg(long, default_value_t = 1)]
        workers: usize,
    },

    /// Start a background worker fed with task envelopes on stdin
    Worker {
        /// Queue name to process
        #[arg(long, default_value = "default")]
        queue: String,

        /// Number of tasks run at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Start the scheduler for recurring listening runs
    Scheduler {
        /// TOML file of [[listening]] jobs
        #[arg(long, default_value = "config/schedules.toml")]
        schedule: PathBuf,

        /// Number of listening runs executed at once
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },

    /// Search X with the organization's scraping account
    TwitterSearch {
        /// Keyword(s) to search
        #[arg(short = 'k', long = "keyword", required = true)]
        keywords: Vec<String>,

        /// Look back hours
        #[arg(long, default_value_t = 48)]
        last_hours: u32,

        /// Max tweets
        #[arg(long, default_value_t = 50)]
        limit: u32,

        /// ALL or ANY
        #[arg(long, default_value = "ANY")]
        match_mode: MatchMode,

        /// Organization whose scraping account is used
        #[arg(long)]
        org_id: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            host,
            port,
            workers,
        } => runtime(Some(workers))?.block_on(cmd::serve::run(&host, port)),
        Commands::Worker { queue, concurrency } => {
            runtime(None)?.block_on(cmd::worker::run(&queue, concurrency))
        }
        Commands::Scheduler {
            schedule,
            concurrency,
        } => runtime(None)?.block_on(cmd::scheduler::run(&schedule, concurrency)),
        Commands::TwitterSearch {
            keywords,
            last_hours,
            limit,
            match_mode,
            org_id,
            output,
        } => runtime(None)?.block_on(cmd::search::run(cmd::search::SearchArgs {
            keywords,
            last_hours,
            limit,
            match_mode,
            org_id,
            output,
        })),
    }
}

fn init_tracing(json_logs: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let production = std::env::var("NEXUS_ENV")
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    // Logs go to stderr; stdout carries command output.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs || production {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(threads) = worker_threads {
        builder.worker_threads(threads.max(1));
    }
    builder
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("nexus").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = parse(&["run"]).unwrap();
        match cli.command {
            Commands::Run {
                host,
                port,
                workers,
            } => {
                assert_eq!(host, "0.0.0.0");
                assert_eq!(port, 8000);
                assert_eq!(workers, 1);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn twitter_search_collects_repeated_keywords() {
        let cli = parse(&[
            "twitter-search",
            "-k",
            "rust",
            "--keyword",
            "tokio",
            "--match-mode",
            "all",
            "--org-id",
            "acme",
            "--output",
            "jsonl",
        ])
        .unwrap();
        match cli.command {
            Commands::TwitterSearch {
                keywords,
                last_hours,
                limit,
                match_mode,
                org_id,
                output,
            } => {
                assert_eq!(keywords, vec!["rust", "tokio"]);
                assert_eq!(last_hours, 48);
                assert_eq!(limit, 50);
                assert_eq!(match_mode, MatchMode::All);
                assert_eq!(org_id, "acme");
                assert_eq!(output, OutputFormat::Jsonl);
            }
            _ => panic!("expected twitter-search"),
        }
    }

    #[test]
    fn twitter_search_requires_keyword_and_org() {
        assert!(parse(&["twitter-search", "--org-id", "acme"]).is_err());
        assert!(parse(&["twitter-search", "-k", "rust"]).is_err());
    }

    #[test]
    fn unknown_match_mode_is_rejected() {
        assert!(parse(&[
            "twitter-search",
            "-k",
            "rust",
            "--org-id",
            "acme",
            "--match-mode",
            "SOME"
        ])
        .is_err());
    }

    #[test]
    fn json_logs_is_global() {
        let cli = parse(&["worker", "--json-logs"]).unwrap();
        assert!(cli.json_logs);
    }
}

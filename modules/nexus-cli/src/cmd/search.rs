use std::io::Write;

use anyhow::{Context, Result};
use x_search::{search_and_normalize, EnvAccountDirectory, MatchMode, SearchQueryOptions};

use crate::output::{self, OutputFormat};

pub struct SearchArgs {
    pub keywords: Vec<String>,
    pub last_hours: u32,
    pub limit: u32,
    pub match_mode: MatchMode,
    pub org_id: String,
    pub output: OutputFormat,
}

pub async fn run(args: SearchArgs) -> Result<()> {
    let accounts = EnvAccountDirectory::from_env();
    let options = SearchQueryOptions::builder()
        .keywords(args.keywords)
        .hours_back(args.last_hours)
        .match_mode(args.match_mode)
        .build();

    let records = search_and_normalize(&accounts, &args.org_id, &options, args.limit)
        .await
        .context("X search failed")?;

    let rendered = output::render(args.output, &records)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    if !rendered.is_empty() && !rendered.ends_with('\n') {
        writeln!(stdout)?;
    }
    Ok(())
}

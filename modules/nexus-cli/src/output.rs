//! Rendering of normalized search results for the terminal.

use clap::ValueEnum;
use x_search::NormalizedTweet;

const TEXT_PREVIEW_CHARS: usize = 200;
const COLUMNS: [&str; 4] = ["date", "user", "text", "url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Jsonl,
    Json,
}

pub fn render(format: OutputFormat, records: &[NormalizedTweet]) -> serde_json::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(records)),
        OutputFormat::Jsonl => render_jsonl(records),
        OutputFormat::Json => serde_json::to_string_pretty(records),
    }
}

/// One compact JSON object per line.
pub fn render_jsonl(records: &[NormalizedTweet]) -> serde_json::Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

pub fn render_table(records: &[NormalizedTweet]) -> String {
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|r| {
            [
                r.date.clone().unwrap_or_default(),
                r.username.clone().unwrap_or_default(),
                preview(r.text.as_deref().unwrap_or_default()),
                r.url.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(|c| c.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format!("X search results ({})\n", records.len());
    out.push_str(&line(&COLUMNS.map(String::from), &widths));
    out.push_str(&line(&widths.map(|w| "-".repeat(w)), &widths));
    for row in &rows {
        out.push_str(&line(row, &widths));
    }
    out
}

fn line(cells: &[String; 4], widths: &[usize; 4]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

/// First 200 characters, flattened onto one line.
fn preview(text: &str) -> String {
    text.chars()
        .take(TEXT_PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

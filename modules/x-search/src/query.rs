use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{Result, SearchError};

/// How keywords combine into the term expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum MatchMode {
    /// Every keyword must match (implicit AND).
    All,
    /// Any keyword may match.
    #[default]
    Any,
}

impl FromStr for MatchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(MatchMode::All),
            "ANY" => Ok(MatchMode::Any),
            other => Err(SearchError::InvalidInput(format!(
                "match mode must be ALL or ANY, got {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for MatchMode {
    type Error = SearchError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::All => f.write_str("ALL"),
            MatchMode::Any => f.write_str("ANY"),
        }
    }
}

/// Inputs for a keyword search.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
pub struct SearchQueryOptions {
    #[builder(setter(into))]
    pub keywords: Vec<String>,
    pub hours_back: u32,
    #[builder(default)]
    #[serde(default)]
    pub match_mode: MatchMode,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub lang: Option<String>,
    #[builder(default = true)]
    #[serde(default = "default_exclude_retweets")]
    pub exclude_retweets: bool,
}

fn default_exclude_retweets() -> bool {
    true
}

/// The token grammar of a particular search backend.
///
/// Only the term joining, the since-bound format and the filter tokens vary
/// between backends; part ordering is fixed by [`build_search_query_with`].
pub trait SearchDialect {
    fn join_terms(&self, terms: &[&str], mode: MatchMode) -> String;
    fn since_token(&self, since: DateTime<Utc>) -> String;
    fn lang_token(&self, lang: &str) -> String;
    fn exclude_retweets_token(&self) -> &str;
}

/// X advanced-search grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct XDialect;

impl XDialect {
    /// X rejects any other layout for `since:`.
    pub const SINCE_FORMAT: &'static str = "%Y-%m-%d_%H:%M:%S_UTC";
}

impl SearchDialect for XDialect {
    fn join_terms(&self, terms: &[&str], mode: MatchMode) -> String {
        match mode {
            MatchMode::All => terms.join(" "),
            MatchMode::Any => terms.join(" OR "),
        }
    }

    fn since_token(&self, since: DateTime<Utc>) -> String {
        format!("since:{}", since.format(Self::SINCE_FORMAT))
    }

    fn lang_token(&self, lang: &str) -> String {
        format!("lang:{lang}")
    }

    fn exclude_retweets_token(&self) -> &str {
        "-filter:nativeretweets"
    }
}

/// Build an X search query, sampling the clock once.
pub fn build_search_query(options: &SearchQueryOptions) -> Result<String> {
    build_search_query_at(options, Utc::now())
}

/// Build an X search query relative to a fixed `now`.
pub fn build_search_query_at(options: &SearchQueryOptions, now: DateTime<Utc>) -> Result<String> {
    build_search_query_with(&XDialect, options, now)
}

/// Build a search query in the given dialect.
///
/// Parts are emitted in a fixed order: term expression, since bound,
/// optional language, optional retweet filter.
pub fn build_search_query_with<D: SearchDialect + ?Sized>(
    dialect: &D,
    options: &SearchQueryOptions,
    now: DateTime<Utc>,
) -> Result<String> {
    let terms: Vec<&str> = options
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if terms.is_empty() {
        return Err(SearchError::InvalidInput(
            "at least one non-empty keyword is required".to_string(),
        ));
    }

    let since = since_bound(now, options.hours_back)?;

    let mut parts = vec![
        dialect.join_terms(&terms, options.match_mode),
        dialect.since_token(since),
    ];
    if let Some(lang) = options.lang.as_deref().filter(|l| !l.is_empty()) {
        parts.push(dialect.lang_token(lang));
    }
    if options.exclude_retweets {
        parts.push(dialect.exclude_retweets_token().to_string());
    }
    Ok(parts.join(" "))
}

/// `now` minus `hours_back`, kept within the four-digit years a `since:` token can carry.
fn since_bound(now: DateTime<Utc>, hours_back: u32) -> Result<DateTime<Utc>> {
    Duration::try_hours(i64::from(hours_back))
        .and_then(|lookback| now.checked_sub_signed(lookback))
        .filter(|since| (1..=9999).contains(&since.year()))
        .ok_or_else(|| {
            SearchError::InvalidInput(format!(
                "hours_back {hours_back} reaches before the year 1"
            ))
        })
}

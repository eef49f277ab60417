use crate::accounts::AccountDirectory;
use crate::error::Result;
use crate::query::{build_search_query, SearchQueryOptions};
use crate::record::{normalize_record, NormalizedTweet};

/// Run one keyword search for an organization and flatten every result.
///
/// The query is built before credentials are resolved or the provider is
/// contacted, so invalid keywords never leave the process.
pub async fn search_and_normalize(
    accounts: &dyn AccountDirectory,
    org_id: &str,
    options: &SearchQueryOptions,
    limit: u32,
) -> Result<Vec<NormalizedTweet>> {
    let query = build_search_query(options)?;
    let provider = accounts.provider_for_org(org_id).await?;

    tracing::info!(org_id, %query, limit, match_mode = %options.match_mode, "Running X search");
    let tweets = provider.search(&query, limit).await?;

    Ok(tweets.iter().map(normalize_record).collect())
}

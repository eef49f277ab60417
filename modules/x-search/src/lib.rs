pub mod accounts;
pub mod client;
pub mod error;
pub mod listen;
pub mod query;
pub mod record;
pub mod types;

pub use accounts::{AccountDirectory, EnvAccountDirectory};
pub use client::{ApifyClient, SearchProvider};
pub use error::{Result, SearchError};
pub use listen::search_and_normalize;
pub use query::{
    build_search_query, build_search_query_at, build_search_query_with, MatchMode,
    SearchDialect, SearchQueryOptions, XDialect,
};
pub use record::{normalize_record, NormalizedTweet, RawDate, RawTweet, RawUser, TweetId};

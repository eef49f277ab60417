//! Raw scraped posts and their flat, serialization-ready form.
//!
//! Providers return loosely shaped JSON: any field may be missing, null, of
//! an unexpected type, or present under several names at once. Every field of
//! [`RawTweet`] is read leniently so that one malformed field never rejects
//! the whole record.

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Timelike, Utc};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Base of canonical status URLs.
pub const STATUS_URL_BASE: &str = "https://x.com";

/// Legacy v1.1 `created_at` layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
const LEGACY_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A post as returned by the search provider.
///
/// Field names differ between providers, so each field lists the keys it is
/// read from; the first key present in the object wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTweet {
    pub id: Option<TweetId>,
    pub url: Option<String>,
    pub date: Option<RawDate>,
    pub user: Option<RawUser>,
    pub raw_content: Option<String>,
    pub text: Option<String>,
    pub like_count: Option<i64>,
    pub reply_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub quote_count: Option<i64>,
}

impl RawTweet {
    /// Read a post from one dataset item. `None` unless the item is an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: field(obj, &["id"]),
            url: field(obj, &["url"]),
            date: field(obj, &["date", "createdAt", "created_at"]),
            user: field(obj, &["user", "author"]),
            raw_content: field(obj, &["rawContent", "fullText", "full_text"]),
            text: field(obj, &["text"]),
            like_count: field(obj, &["likeCount"]),
            reply_count: field(obj, &["replyCount"]),
            retweet_count: field(obj, &["retweetCount"]),
            quote_count: field(obj, &["quoteCount"]),
        })
    }

    /// Returns whichever text field is populated, preferring the full text.
    pub fn content(&self) -> Option<&str> {
        self.raw_content.as_deref().or(self.text.as_deref())
    }
}

impl<'de> Deserialize<'de> for RawTweet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| de::Error::custom("expected a post object"))
    }
}

/// Author info nested inside a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUser {
    pub username: Option<String>,
    pub displayname: Option<String>,
}

impl<'de> Deserialize<'de> for RawUser {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = value
            .as_object()
            .ok_or_else(|| de::Error::custom("expected a user object"))?;
        Ok(Self {
            username: field(obj, &["username", "userName"]),
            displayname: field(obj, &["displayname", "name"]),
        })
    }
}

/// Post identifier; providers send either a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TweetId {
    Numeric(u64),
    Text(String),
}

impl TweetId {
    fn is_blank(&self) -> bool {
        matches!(self, TweetId::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for TweetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TweetId::Numeric(n) => write!(f, "{n}"),
            TweetId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for TweetId {
    fn from(id: u64) -> Self {
        TweetId::Numeric(id)
    }
}

impl From<&str> for TweetId {
    fn from(id: &str) -> Self {
        TweetId::Text(id.to_string())
    }
}

/// A post timestamp: either zone-aware, or whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    Zoned(DateTime<FixedOffset>),
    Other(String),
}

impl RawDate {
    fn from_text(s: &str) -> Self {
        DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, LEGACY_DATE_FORMAT))
            .map(RawDate::Zoned)
            .unwrap_or_else(|_| RawDate::Other(s.to_string()))
    }

    /// ISO-8601 in UTC for zone-aware values; the raw text otherwise.
    pub fn to_utc_string(&self) -> String {
        match self {
            RawDate::Zoned(dt) => {
                let precision = if dt.nanosecond() == 0 {
                    SecondsFormat::Secs
                } else {
                    SecondsFormat::Micros
                };
                dt.with_timezone(&Utc).to_rfc3339_opts(precision, false)
            }
            RawDate::Other(s) => s.clone(),
        }
    }
}

impl<T: chrono::TimeZone> From<DateTime<T>> for RawDate {
    fn from(dt: DateTime<T>) -> Self {
        RawDate::Zoned(dt.fixed_offset())
    }
}

impl<'de> Deserialize<'de> for RawDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => RawDate::from_text(&s),
            other => RawDate::Other(other.to_string()),
        })
    }
}

/// A flat record with a fixed key set. Absent values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTweet {
    pub id: Option<String>,
    pub date: Option<String>,
    pub username: Option<String>,
    pub displayname: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub likes: Option<i64>,
    pub replies: Option<i64>,
    pub retweets: Option<i64>,
    pub quotes: Option<i64>,
}

/// Project a raw post onto the flat record shape. Never fails.
pub fn normalize_record(raw: &RawTweet) -> NormalizedTweet {
    let user = raw.user.as_ref();
    let username = user.and_then(|u| u.username.clone());
    let displayname = user.and_then(|u| u.displayname.clone());

    let url = raw
        .url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| status_url(username.as_deref(), raw.id.as_ref()));

    NormalizedTweet {
        id: raw.id.as_ref().map(ToString::to_string),
        date: raw.date.as_ref().map(RawDate::to_utc_string),
        username,
        displayname,
        text: raw.content().map(str::to_string),
        url,
        likes: raw.like_count,
        replies: raw.reply_count,
        retweets: raw.retweet_count,
        quotes: raw.quote_count,
    }
}

fn status_url(username: Option<&str>, id: Option<&TweetId>) -> Option<String> {
    let username = username.filter(|u| !u.is_empty())?;
    let id = id.filter(|id| !id.is_blank())?;
    Some(format!("{STATUS_URL_BASE}/{username}/status/{id}"))
}

/// The value under the first of `keys` present in `obj`, or `None` when that
/// value is null or of the wrong shape.
fn field<T: DeserializeOwned>(obj: &Map<String, Value>, keys: &[&str]) -> Option<T> {
    let value = keys.iter().find_map(|key| obj.get(*key))?;
    T::deserialize(value).ok()
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::client::{ApifyClient, SearchProvider};
use crate::error::{Result, SearchError};

const ORG_TOKEN_PREFIX: &str = "APIFY_TOKEN_";
const FALLBACK_TOKEN_KEY: &str = "APIFY_API_KEY";

/// Resolves an organization to a search provider holding its scraping credentials.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn provider_for_org(&self, org_id: &str) -> Result<Arc<dyn SearchProvider>>;
}

/// Org-scoped Apify tokens read from `APIFY_TOKEN_<ORG>` variables,
/// with `APIFY_API_KEY` as the shared fallback.
#[derive(Debug, Clone, Default)]
pub struct EnvAccountDirectory {
    tokens: HashMap<String, String>,
    fallback: Option<String>,
}

impl EnvAccountDirectory {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut directory = Self::default();
        for (key, value) in vars {
            let key = key.as_ref().to_ascii_uppercase();
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            if key == FALLBACK_TOKEN_KEY {
                directory.fallback = Some(value);
            } else if let Some(org) = key.strip_prefix(ORG_TOKEN_PREFIX) {
                directory.tokens.insert(org.to_string(), value);
            }
        }
        directory
    }

    /// The token an organization's searches run with.
    pub fn token_for(&self, org_id: &str) -> Result<&str> {
        if org_id.trim().is_empty() {
            return Err(SearchError::InvalidInput(
                "organization id must not be empty".to_string(),
            ));
        }
        self.tokens
            .get(&org_key(org_id))
            .or(self.fallback.as_ref())
            .map(String::as_str)
            .ok_or_else(|| SearchError::MissingCredentials(org_id.to_string()))
    }
}

#[async_trait]
impl AccountDirectory for EnvAccountDirectory {
    async fn provider_for_org(&self, org_id: &str) -> Result<Arc<dyn SearchProvider>> {
        let token = self.token_for(org_id)?;
        tracing::debug!(org_id, "Resolved scraping credentials");
        Ok(Arc::new(ApifyClient::new(token.to_string())))
    }
}

/// `acme-corp.eu` -> `ACME_CORP_EU`
fn org_key(org_id: &str) -> String {
    org_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_token_preferred_over_fallback() {
        let dir = EnvAccountDirectory::from_vars([
            ("APIFY_API_KEY", "shared"),
            ("APIFY_TOKEN_ACME_CORP", "acme"),
        ]);

        assert_eq!(dir.token_for("acme-corp").unwrap(), "acme");
        assert_eq!(dir.token_for("other").unwrap(), "shared");
    }

    #[test]
    fn missing_credentials() {
        let dir = EnvAccountDirectory::from_vars([("APIFY_TOKEN_ACME", "acme")]);

        let err = dir.token_for("globex").unwrap_err();

        assert!(matches!(err, SearchError::MissingCredentials(org) if org == "globex"));
    }

    #[test]
    fn blank_values_are_ignored() {
        let dir = EnvAccountDirectory::from_vars([("APIFY_API_KEY", "  ")]);

        assert!(dir.token_for("acme").is_err());
    }

    #[test]
    fn blank_org_is_invalid() {
        let dir = EnvAccountDirectory::from_vars([("APIFY_API_KEY", "shared")]);

        assert!(matches!(
            dir.token_for(" ").unwrap_err(),
            SearchError::InvalidInput(_)
        ));
    }

    #[test]
    fn org_key_sanitizes() {
        assert_eq!(org_key("acme-corp.eu"), "ACME_CORP_EU");
        assert_eq!(org_key(" 42 "), "42");
    }
}

use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::types::{AddressUser, OwnedCardsResponse};
use crate::normalize::strip_embeddings;

pub const RIP_FUN_BASE: &str = "https://www.rip.fun";

#[derive(Debug, Error)]
pub enum RipFunError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("rip.fun returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// JSON endpoints of rip.fun.
#[derive(Debug, Clone)]
pub struct RipFunClient {
    http: Client,
    base_url: String,
}

impl RipFunClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public profile page for `username`.
    pub fn profile_url(&self, username: &str) -> String {
        self.endpoint(&["profile", username.trim()])
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/profile/{}", self.base_url, username.trim()))
    }

    /// Every card a user owns, as raw API records.
    pub async fn owned_cards(&self, user_id: i64) -> Result<Vec<Value>, RipFunError> {
        let url = self.endpoint(&["api", "user", &user_id.to_string(), "owned-cards"])?;
        let resp = self.get_json(url, &format!("user {user_id}")).await?;

        let body: OwnedCardsResponse = serde_json::from_value(resp)
            .map_err(|e| RipFunError::Unexpected(format!("owned-cards: {e}")))?;
        let mut cards = body
            .cards
            .ok_or_else(|| RipFunError::Unexpected("owned-cards response has no cards array".into()))?;

        cards.iter_mut().for_each(strip_embeddings);
        tracing::debug!(user_id, cards = cards.len(), "fetched owned cards");
        Ok(cards)
    }

    /// Full card listing of one set, embeddings removed.
    pub async fn set_cards(&self, set_id: &str) -> Result<Value, RipFunError> {
        let mut url = self.endpoint(&["api", "set", set_id, "cards"])?;
        url.set_query(Some("page=1&limit=1000&sort=number-asc&all=true"));

        let mut data = self.get_json(url, &format!("set {set_id}")).await?;
        strip_embeddings(&mut data);
        Ok(data)
    }

    /// Account that owns `address`. Unknown addresses are `Ok(None)`.
    pub async fn user_by_address(&self, address: &str) -> Result<Option<AddressUser>, RipFunError> {
        let url = self.endpoint(&["api", "auth", address])?;
        let resp = match self.get_json(url, &format!("address {address}")).await {
            Ok(resp) => resp,
            Err(RipFunError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let user: AddressUser = serde_json::from_value(resp)
            .map_err(|e| RipFunError::Unexpected(format!("auth {address}: {e}")))?;
        Ok(Some(user))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RipFunError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RipFunError::Unexpected(format!("bad base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| RipFunError::Unexpected(format!("base url cannot have paths: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, url: Url, what: &str) -> Result<Value, RipFunError> {
        let resp = self
            .http
            .get(url.as_str())
            .header(ACCEPT, "application/json")
            .header(REFERER, format!("{}/", self.base_url))
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(RipFunError::NotFound(what.to_string())),
            s if !s.is_success() => Err(RipFunError::Status {
                status: s.as_u16(),
                url: url.to_string(),
            }),
            _ => Ok(resp.json().await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_percent_encoded() {
        let client = RipFunClient::new(Client::new(), "https://www.rip.fun/");
        assert_eq!(client.base_url(), "https://www.rip.fun");
        assert_eq!(client.profile_url("ash"), "https://www.rip.fun/profile/ash");
        assert_eq!(
            client.profile_url("a b/c"),
            "https://www.rip.fun/profile/a%20b%2Fc"
        );
        assert_eq!(
            client.endpoint(&["api", "user", "7", "owned-cards"]).unwrap().as_str(),
            "https://www.rip.fun/api/user/7/owned-cards"
        );
    }
}

//! Client configuration for the hosted backend.
//!
//! A `ClientConfig` holds the two public values every Bookmarker client needs
//! (project URL and anon key) and derives the auth, REST, and realtime
//! endpoints from them. Secret credentials must never be stored here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    supabase_url: String,
    supabase_anon_key: String,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = normalize_text_option(Some(url.into()))
            .ok_or_else(|| Error::Config("Supabase URL must not be empty".to_string()))?;
        if !is_http_url(&supabase_url) {
            return Err(Error::Config(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let supabase_anon_key = normalize_text_option(Some(anon_key.into()))
            .ok_or_else(|| Error::Config("Supabase anon key must not be empty".to_string()))?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
        })
    }

    /// Build a config from optional parts.
    ///
    /// Returns `Ok(None)` when neither part is set and an error when only one
    /// of them is.
    pub fn from_parts(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (Some(_), None) => Err(Error::Config(format!("{SUPABASE_ANON_KEY_ENV} is not set"))),
            (None, Some(_)) => Err(Error::Config(format!("{SUPABASE_URL_ENV} is not set"))),
        }
    }

    /// Read `SUPABASE_URL` and `SUPABASE_ANON_KEY` from the environment.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_parts(
            std::env::var(SUPABASE_URL_ENV).ok(),
            std::env::var(SUPABASE_ANON_KEY_ENV).ok(),
        )
    }

    pub fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn anon_key(&self) -> &str {
        &self.supabase_anon_key
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    /// Websocket endpoint of the realtime service, with the anon key attached.
    pub fn realtime_url(&self) -> String {
        let socket_base = self
            .supabase_url
            .strip_prefix("https://")
            .map(|host| format!("wss://{host}"))
            .or_else(|| {
                self.supabase_url
                    .strip_prefix("http://")
                    .map(|host| format!("ws://{host}"))
            })
            .unwrap_or_else(|| self.supabase_url.clone());

        format!(
            "{socket_base}/realtime/v1/websocket?apikey={}&vsn={REALTIME_PROTOCOL_VERSION}",
            self.supabase_anon_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_trailing_slash_and_whitespace() {
        let config = ClientConfig::new(" https://demo.supabase.co/ ", " anon ").unwrap();
        assert_eq!(config.supabase_url(), "https://demo.supabase.co");
        assert_eq!(config.anon_key(), "anon");
    }

    #[test]
    fn new_rejects_missing_scheme() {
        let error = ClientConfig::new("demo.supabase.co", "anon").unwrap_err();
        assert!(error.to_string().contains("http://"));
    }

    #[test]
    fn derived_endpoints() {
        let config = ClientConfig::new("https://demo.supabase.co", "anon").unwrap();
        assert_eq!(config.auth_url(), "https://demo.supabase.co/auth/v1");
        assert_eq!(config.rest_url(), "https://demo.supabase.co/rest/v1");
        assert_eq!(
            config.realtime_url(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn realtime_url_uses_plain_ws_for_local_stacks() {
        let config = ClientConfig::new("http://127.0.0.1:54321", "anon").unwrap();
        assert!(config
            .realtime_url()
            .starts_with("ws://127.0.0.1:54321/realtime/v1/websocket"));
    }

    #[test]
    fn from_parts_requires_both_values() {
        assert!(ClientConfig::from_parts(None, None).unwrap().is_none());
        assert!(ClientConfig::from_parts(Some("https://x.supabase.co".into()), None).is_err());
        assert!(ClientConfig::from_parts(None, Some("anon".into())).is_err());
        assert!(
            ClientConfig::from_parts(Some("https://x.supabase.co".into()), Some("anon".into()))
                .unwrap()
                .is_some()
        );
    }
}

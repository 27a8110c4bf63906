//! Environment-driven configuration

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SECRETS_NAME: &str = "env:MAILGATE_SECRETS";
const DEFAULT_EMAILS_TABLE: &str = "mailgate_emails_dev";
const DEFAULT_SES_REGION: &str = "us-east-1";
const DEFAULT_DATABASE_PATH: &str = "mailgate.db";
const DEFAULT_ZOHO_API_BASE: &str = "https://mail.zoho.com/api/accounts";
const DEFAULT_ZOHO_TOKEN_URL: &str = "https://accounts.zoho.com/oauth/v2/token";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PORT: u16 = 3030;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Secrets backend identifier (`file:<path>` or `env:<VAR>`)
    pub secrets_name: String,
    pub emails_table: String,
    pub ses_region: String,
    pub database_path: PathBuf,
    pub zoho_api_base: String,
    pub zoho_token_url: String,
    pub http_timeout: Duration,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            secrets_name: DEFAULT_SECRETS_NAME.to_string(),
            emails_table: DEFAULT_EMAILS_TABLE.to_string(),
            ses_region: DEFAULT_SES_REGION.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            zoho_api_base: DEFAULT_ZOHO_API_BASE.to_string(),
            zoho_token_url: DEFAULT_ZOHO_TOKEN_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            port: DEFAULT_PORT,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup; unset or blank keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(v) = get("SECRETS_NAME") {
            config.secrets_name = v;
        }
        if let Some(v) = get("EMAILS_TABLE") {
            config.emails_table = v;
        }
        if let Some(v) = get("SES_REGION") {
            config.ses_region = v;
        }
        if let Some(v) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("ZOHO_API_BASE") {
            config.zoho_api_base = v;
        }
        if let Some(v) = get("ZOHO_TOKEN_URL") {
            config.zoho_token_url = v;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECS must be a whole number of seconds, got {:?}", v))?;
            if secs == 0 {
                bail!("HTTP_TIMEOUT_SECS must be greater than zero");
            }
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = get("PORT") {
            config.port = v
                .parse()
                .with_context(|| format!("PORT must be a port number, got {:?}", v))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.emails_table, "mailgate_emails_dev");
        assert_eq!(config.port, 3030);
    }

    #[test]
    fn test_overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("SECRETS_NAME", "file:/etc/mailgate/secrets.json"),
            ("SES_REGION", "eu-west-1"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("PORT", "8080"),
            ("EMAILS_TABLE", "  "),
        ]))
        .unwrap();

        assert_eq!(config.secrets_name, "file:/etc/mailgate/secrets.json");
        assert_eq!(config.ses_region, "eu-west-1");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 8080);
        assert_eq!(config.emails_table, "mailgate_emails_dev");
    }

    #[test]
    fn test_bad_numbers_are_errors() {
        assert!(GatewayConfig::from_lookup(lookup(&[("PORT", "http")])).is_err());
        assert!(GatewayConfig::from_lookup(lookup(&[("HTTP_TIMEOUT_SECS", "0")])).is_err());
    }
}

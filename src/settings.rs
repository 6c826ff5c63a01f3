use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use config::{Config, ConfigError};
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::record::CountryCode;

pub const BASE_ID: &str = "base_id";
pub const TABLE_NAME: &str = "table_name";
pub const API_TOKEN: &str = "api_token";
pub const API_URL: &str = "api_url";

const ENV_PREFIX: &str = "AIRTABLE";
const DEFAULT_API_URL: &str = "https://api.airtable.com";
const DEFAULT_SITE_URL: &str = "https://www.twilio.com";
const DEFAULT_DB_PATH: &str = "data/guidelines.sqlite";

/// Source of datastore configuration values.
///
/// Keys are the lowercase names above (`base_id`, `table_name`, ...). An
/// empty value is the same as no value.
pub trait ConfigProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `AIRTABLE_*` environment variables.
pub struct EnvConfig {
    inner: Config,
}

impl EnvConfig {
    pub fn load() -> Self {
        let inner = or_empty(
            Config::builder()
                .add_source(config::Environment::with_prefix(ENV_PREFIX))
                .build(),
        );
        debug!(settings_loaded = ?inner, "Loaded environment configuration");
        EnvConfig { inner }
    }
}

/// A failed build leaves every key unset, so `resolve` reports them missing.
fn or_empty(built: Result<Config, ConfigError>) -> Config {
    built.unwrap_or_else(|e| {
        warn!("Could not read {}_* environment configuration: {}", ENV_PREFIX, e);
        Config::default()
    })
}

impl ConfigProvider for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get_string(key).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed set of values handed in by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: HashMap<String, String>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` only when a value was given.
    pub fn with_opt(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// First provider holding a value wins.
pub struct ChainConfig {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl ChainConfig {
    pub fn new(providers: Vec<Box<dyn ConfigProvider>>) -> Self {
        ChainConfig { providers }
    }
}

impl ConfigProvider for ChainConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.providers.iter().find_map(|p| p.get(key))
    }
}

/// Everything needed to talk to the Airtable REST API.
#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub api_url: String,
    pub base_id: String,
    pub table_name: String,
    pub api_token: String,
}

impl AirtableSettings {
    /// Collect the three required values, reporting every missing one.
    pub fn resolve(provider: &dyn ConfigProvider) -> Result<Self, SettingsError> {
        let base_id = provider.get(BASE_ID);
        let table_name = provider.get(TABLE_NAME);
        let api_token = provider.get(API_TOKEN);

        match (base_id, table_name, api_token) {
            (Some(base_id), Some(table_name), Some(api_token)) => Ok(AirtableSettings {
                api_url: provider
                    .get(API_URL)
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                base_id,
                table_name,
                api_token,
            }),
            (base_id, table_name, api_token) => {
                let mut missing = Vec::new();
                if base_id.is_none() {
                    missing.push("AIRTABLE_BASE_ID");
                }
                if table_name.is_none() {
                    missing.push("AIRTABLE_TABLE_NAME");
                }
                if api_token.is_none() {
                    missing.push("AIRTABLE_API_TOKEN");
                }
                Err(SettingsError::Missing(missing))
            }
        }
    }
}

/// Location of the guideline pages.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::new(DEFAULT_SITE_URL)
    }
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Endpoints {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn landing_url(&self) -> String {
        format!("{}/en-us/guidelines/sms", self.base)
    }

    pub fn country_url(&self, code: &CountryCode) -> String {
        format!("{}/en-us/guidelines/{}/sms", self.base, code)
    }
}

/// Local snapshot database location (`GUIDELINES_DB_PATH` overrides).
pub fn db_path() -> PathBuf {
    env::var("GUIDELINES_DB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_reports_every_missing_key() {
        let cfg = StaticConfig::new().with(TABLE_NAME, "Guidelines");
        match AirtableSettings::resolve(&cfg) {
            Err(SettingsError::Missing(keys)) => {
                assert_eq!(keys, vec!["AIRTABLE_BASE_ID", "AIRTABLE_API_TOKEN"]);
            }
            other => panic!("expected missing keys, got {:?}", other),
        }
    }

    #[test]
    fn empty_values_count_as_missing() {
        let cfg = StaticConfig::new()
            .with(BASE_ID, "app123")
            .with(TABLE_NAME, "")
            .with(API_TOKEN, "tok");
        assert!(AirtableSettings::resolve(&cfg).is_err());
    }

    #[test]
    fn resolve_defaults_api_url() {
        let cfg = StaticConfig::new()
            .with(BASE_ID, "app123")
            .with(TABLE_NAME, "SMS Guidelines")
            .with(API_TOKEN, "tok");
        let s = AirtableSettings::resolve(&cfg).unwrap();
        assert_eq!(s.api_url, "https://api.airtable.com");
        assert_eq!(s.table_name, "SMS Guidelines");
    }

    #[test]
    fn unreadable_environment_leaves_keys_unset() {
        let env = EnvConfig {
            inner: or_empty(Err(ConfigError::Message("bad AIRTABLE_BASE_ID".into()))),
        };
        assert_eq!(env.get(BASE_ID), None);
        assert!(matches!(
            AirtableSettings::resolve(&env),
            Err(SettingsError::Missing(keys)) if keys.len() == 3
        ));
    }

    #[test]
    fn chain_prefers_earlier_provider() {
        let flags = StaticConfig::new().with_opt(BASE_ID, Some("from-flag".into()));
        let env = StaticConfig::new()
            .with(BASE_ID, "from-env")
            .with(API_TOKEN, "tok");
        let chain = ChainConfig::new(vec![Box::new(flags), Box::new(env)]);
        assert_eq!(chain.get(BASE_ID).as_deref(), Some("from-flag"));
        assert_eq!(chain.get(API_TOKEN).as_deref(), Some("tok"));
        assert_eq!(chain.get(TABLE_NAME), None);
    }

    #[test]
    fn endpoints_template_country_page() {
        let e = Endpoints::new("http://localhost:8080/");
        assert_eq!(e.landing_url(), "http://localhost:8080/en-us/guidelines/sms");
        assert_eq!(
            e.country_url(&CountryCode::from("gb")),
            "http://localhost:8080/en-us/guidelines/gb/sms"
        );
    }
}

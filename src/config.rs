use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::sites::SiteConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub bind_addr: String,
    pub log_level: String,
    pub database_path: PathBuf,
    pub max_body_bytes: usize,
    pub sites: Vec<SiteConfig>,
    pub rate_limit: RateLimitSettings,
    pub crm_retry: RetrySettings,
    pub upstash: Option<UpstashSettings>,
    pub supabase: Option<SupabaseSettings>,
    pub hubspot: Option<HubSpotSettings>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 3,
            window_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstashSettings {
    pub rest_url: String,
    pub rest_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupabaseSettings {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSpotSettings {
    pub private_app_token: String,
    #[serde(default = "default_hubspot_base")]
    pub api_base: String,
}

fn default_hubspot_base() -> String {
    "https://api.hubapi.com".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let database_path = dirs::data_dir()
            .map(|d| d.join("lead-intake").join("leads.db"))
            .unwrap_or_else(|| PathBuf::from("leads.db"));

        Self {
            environment: Environment::Development,
            bind_addr: "127.0.0.1:8080".to_string(),
            log_level: "info".to_string(),
            database_path,
            max_body_bytes: 1024 * 1024,
            sites: vec![SiteConfig::hair_salon_template()],
            rate_limit: RateLimitSettings::default(),
            crm_retry: RetrySettings::default(),
            upstash: None,
            supabase: None,
            hubspot: None,
        }
    }
}

impl AppConfig {
    /// Reads the config file, writing defaults when it doesn't exist yet,
    /// then layers environment overrides on top.
    pub fn load(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_json::from_str(&content)?
        } else {
            let c = Self::default();
            c.save(config_path)?;
            c
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Environment variables win over the file. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = var("APP_ENV").as_deref().and_then(Environment::parse) {
            self.environment = env;
        }
        if let Some(addr) = var("BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        // Only meaningful for single-site deployments.
        if let Some(url) = var("SITE_URL") {
            if let [site] = self.sites.as_mut_slice() {
                site.site_url = url;
            }
        }

        let upstash = merge_pair(
            self.upstash.take().map(|u| (u.rest_url, u.rest_token)),
            var("UPSTASH_REDIS_REST_URL"),
            var("UPSTASH_REDIS_REST_TOKEN"),
        );
        self.upstash = upstash.map(|(rest_url, rest_token)| UpstashSettings {
            rest_url,
            rest_token,
        });

        let supabase = merge_pair(
            self.supabase.take().map(|s| (s.url, s.service_role_key)),
            var("SUPABASE_URL"),
            var("SUPABASE_SERVICE_ROLE_KEY"),
        );
        self.supabase = supabase.map(|(url, service_role_key)| SupabaseSettings {
            url,
            service_role_key,
        });

        if let Some(token) = var("HUBSPOT_PRIVATE_APP_TOKEN") {
            let api_base = self
                .hubspot
                .as_ref()
                .map(|h| h.api_base.clone())
                .unwrap_or_else(default_hubspot_base);
            self.hubspot = Some(HubSpotSettings {
                private_app_token: token,
                api_base,
            });
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.sites.is_empty() {
            problems.push("at least one site must be configured".to_string());
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id.as_str()) {
                problems.push(format!("duplicate site id '{}'", site.id));
            }
            if !is_http_url(&site.site_url) {
                problems.push(format!("site '{}' has invalid site_url", site.id));
            }
        }

        if let Some(upstash) = &self.upstash {
            if upstash.rest_url.is_empty() || upstash.rest_token.is_empty() {
                problems.push(
                    "UPSTASH_REDIS_REST_URL and UPSTASH_REDIS_REST_TOKEN must be set together"
                        .to_string(),
                );
            } else if !is_http_url(&upstash.rest_url) {
                problems.push("UPSTASH_REDIS_REST_URL is not a valid URL".to_string());
            }
        }

        if let Some(supabase) = &self.supabase {
            if supabase.url.is_empty() || supabase.service_role_key.is_empty() {
                problems.push(
                    "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set together".to_string(),
                );
            } else if !is_http_url(&supabase.url) {
                problems.push("SUPABASE_URL is not a valid URL".to_string());
            }
        }

        if let Some(hubspot) = &self.hubspot {
            if hubspot.private_app_token.trim().is_empty() {
                problems.push("HUBSPOT_PRIVATE_APP_TOKEN must not be empty".to_string());
            }
        }

        if self.environment.is_production() {
            if self.upstash.is_none() {
                problems.push(
                    "distributed rate limiting is required in production: set UPSTASH_REDIS_REST_URL and UPSTASH_REDIS_REST_TOKEN"
                        .to_string(),
                );
            }
            if self.supabase.is_none() {
                problems.push(
                    "lead storage is required in production: set SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY"
                        .to_string(),
                );
            }
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            problems.push("rate_limit values must be positive".to_string());
        }
        if self.crm_retry.max_attempts == 0 {
            problems.push("crm_retry.max_attempts must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(problems.join("; ")))
        }
    }
}

/// Overlays an env-provided (url, secret) pair on the file's. Either half may
/// come from either source; a half left empty fails `validate`.
fn merge_pair(
    current: Option<(String, String)>,
    url: Option<String>,
    secret: Option<String>,
) -> Option<(String, String)> {
    if url.is_none() && secret.is_none() {
        return current;
    }
    let (file_url, file_secret) = current.unwrap_or_default();
    Some((url.unwrap_or(file_url), secret.unwrap_or(file_secret)))
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid_in_development() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[
            ("APP_ENV", "production"),
            ("SITE_URL", "https://salon.example"),
            ("UPSTASH_REDIS_REST_URL", "https://redis.example"),
            ("UPSTASH_REDIS_REST_TOKEN", "tok"),
            ("SUPABASE_URL", "https://db.example"),
            ("SUPABASE_SERVICE_ROLE_KEY", "key"),
            ("HUBSPOT_PRIVATE_APP_TOKEN", "hs"),
        ]));

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.sites[0].site_url, "https://salon.example");
        assert_eq!(config.hubspot.as_ref().unwrap().api_base, "https://api.hubapi.com");
        config.validate().unwrap();
    }

    #[test]
    fn production_requires_distributed_limiter_and_storage() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[("APP_ENV", "production")]));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("UPSTASH_REDIS_REST_URL"), "got: {err}");
        assert!(err.contains("SUPABASE_URL"), "got: {err}");
    }

    #[test]
    fn half_configured_upstash_is_rejected() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[("UPSTASH_REDIS_REST_URL", "https://redis.example")]));

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("must be set together"), "got: {err}");
    }

    #[test]
    fn duplicate_site_ids_are_rejected() {
        let mut config = AppConfig::default();
        config.sites.push(SiteConfig::hair_salon_template());
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lead-intake.json");

        let config = AppConfig::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.rate_limit.max_requests, 3);

        let reloaded = AppConfig::load(&path).unwrap();
        assert_eq!(reloaded.sites.len(), config.sites.len());
    }
}

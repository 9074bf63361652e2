use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::booking::BookingManager;
use crate::config::AppConfig;
use crate::error::Result;
use crate::integrations::{CrmClient, HubSpotClient};
use crate::leads::{LeadStore, SqliteLeadStore, SupabaseLeadStore};
use crate::ratelimit::{MemoryRateLimiter, RateLimiter, UpstashRateLimiter};
use crate::security::{client_ip, validate_origin};
use crate::server::http::Headers;
use crate::sites::{SiteConfig, SiteRegistry};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a request handler needs, shared across connections.
pub struct AppState {
    pub config: AppConfig,
    pub sites: SiteRegistry,
    pub limiter: Arc<dyn RateLimiter>,
    pub leads: Arc<dyn LeadStore>,
    pub crm: Option<Arc<dyn CrmClient>>,
    pub bookings: BookingManager,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        limiter: Arc<dyn RateLimiter>,
        leads: Arc<dyn LeadStore>,
        crm: Option<Arc<dyn CrmClient>>,
    ) -> Self {
        Self {
            sites: SiteRegistry::new(config.sites.clone()),
            config,
            limiter,
            leads,
            crm,
            bookings: BookingManager::new(),
        }
    }

    /// Wires the configured backends. Hosted services win; the in-memory
    /// limiter and SQLite store cover local development.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;

        let limiter: Arc<dyn RateLimiter> = match &config.upstash {
            Some(upstash) => Arc::new(UpstashRateLimiter::new(client.clone(), upstash)),
            None => {
                log::warn!("Upstash not configured, using in-memory rate limiting");
                Arc::new(MemoryRateLimiter::new())
            }
        };

        let leads: Arc<dyn LeadStore> = match &config.supabase {
            Some(supabase) => Arc::new(SupabaseLeadStore::new(client.clone(), supabase)),
            None => {
                log::warn!(
                    "Supabase not configured, storing leads in {}",
                    config.database_path.display()
                );
                Arc::new(SqliteLeadStore::open(&config.database_path)?)
            }
        };

        let crm: Option<Arc<dyn CrmClient>> = match &config.hubspot {
            Some(hubspot) => Some(Arc::new(HubSpotClient::new(client, hubspot))),
            None => {
                log::info!("HubSpot not configured, leads will stay pending");
                None
            }
        };

        Ok(Self::new(config, limiter, leads, crm))
    }

    pub fn crm(&self) -> Option<&dyn CrmClient> {
        self.crm.as_deref()
    }
}

/// The parts of an incoming request the form pipelines look at.
#[derive(Clone, Copy)]
pub struct RequestMeta<'a> {
    pub headers: &'a Headers,
    pub peer: Option<IpAddr>,
}

impl RequestMeta<'_> {
    pub fn origin_allowed(&self, site: &SiteConfig) -> bool {
        validate_origin(self.headers, site.host().as_deref())
    }

    pub fn client_ip(&self, config: &AppConfig) -> String {
        client_ip(self.headers, config.environment, self.peer)
    }
}

//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Promoting and demoting domains ([`domains`])
//! - Promoting, adopting and demoting A records ([`subdomains`])
//! - Reconciling managed records against the public IP ([`reconcile`])
//!
//! ## Architecture
//!
//! ```text
//!                            ┌──────────────┐
//!   CLI / caller ───────────▶│ DdnsEngine   │
//!                            └──────────────┘
//!                                     │
//!         ┌───────────────────────────┼───────────────────────────┐
//!         │                           │                           │
//!         ▼                           ▼                           ▼
//! ┌─────────────┐           ┌──────────────┐           ┌─────────────┐
//! │CatalogStore │           │ DnsProvider  │           │ IpResolver  │
//! │ (rows)      │           │ (records)    │           │ (public IP) │
//! └─────────────┘           └──────────────┘           └─────────────┘
//! ```
//!
//! Every collaborator is injected; the engine holds no global state and
//! performs every remote call sequentially.

pub mod domains;
pub mod reconcile;
pub mod subdomains;

pub use domains::{DomainEntry, DomainListing, ManageDomainOutcome, UnmanageDomainOutcome};
pub use reconcile::{PassOutcome, RecordChange, RecordFailure, RecordOutcome, ReconcileReport};
pub use subdomains::{
    ListingKind, ManageSubdomainOutcome, RecordListing, SubdomainStatus, UnmanageSubdomainOutcome,
};

use chrono::{DateTime, Utc};
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::traits::{CatalogStore, DnsProvider, Domain, IpResolver};

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Call management or reconciliation operations
/// 3. Drop to release the collaborators
///
/// ## Threading
///
/// Operations take `&self` and await each remote call in turn. The engine
/// assumes no other process is mutating the same catalog concurrently.
pub struct DdnsEngine {
    /// DNS provider holding the authoritative records
    provider: Box<dyn DnsProvider>,

    /// Public IP lookup
    ip_resolver: Box<dyn IpResolver>,

    /// Local catalog of managed names
    catalog: Box<dyn CatalogStore>,

    config: EngineConfig,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `provider`: DNS provider implementation
    /// - `ip_resolver`: Public IP resolver implementation
    /// - `catalog`: Catalog store implementation
    /// - `config`: Engine settings
    pub fn new(
        provider: Box<dyn DnsProvider>,
        ip_resolver: Box<dyn IpResolver>,
        catalog: Box<dyn CatalogStore>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            provider,
            ip_resolver,
            catalog,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn CatalogStore {
        self.catalog.as_ref()
    }

    /// Counts of cataloged and managed rows
    pub async fn catalog_summary(&self) -> Result<CatalogSummary> {
        let domains = self.catalog.list_domains().await?;
        let subdomains = self.catalog.list_subdomains().await?;

        Ok(CatalogSummary {
            provider: self.provider.provider_name(),
            ip_resolver: self.ip_resolver.endpoint().map(str::to_string),
            domains: domains.len(),
            managed_domains: domains.iter().filter(|d| d.managed).count(),
            subdomains: subdomains.len(),
            managed_subdomains: subdomains.iter().filter(|s| s.managed).count(),
            last_checked_at: subdomains.iter().map(|s| s.last_checked_at).max(),
            last_updated_at: subdomains.iter().map(|s| s.last_updated_at).max(),
        })
    }

    /// Look up a domain that must be cataloged and managed
    async fn managed_domain(&self, domain: &str) -> Result<Domain> {
        match self.catalog.find_domain(domain).await? {
            Some(row) if row.managed => Ok(row),
            Some(_) => {
                error!("Domain {} has been demoted; manage it again first", domain);
                Err(Error::TopDomainNotManaged(domain.to_string()))
            }
            None => {
                error!("Domain {} is not in the catalog", domain);
                Err(Error::TopDomainNotManaged(domain.to_string()))
            }
        }
    }

    /// One public IP lookup, logged
    async fn resolve_ip(&self) -> Result<Ipv4Addr> {
        match self.ip_resolver.current_ipv4().await {
            Ok(ip) => {
                debug!("Public IP is {}", ip);
                Ok(ip)
            }
            Err(e) => {
                error!("Failed to resolve public IP: {}", e);
                Err(e)
            }
        }
    }
}

/// Overview of the catalog for status output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    pub provider: &'static str,
    pub ip_resolver: Option<String>,
    pub domains: usize,
    pub managed_domains: usize,
    pub subdomains: usize,
    pub managed_subdomains: usize,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stamp = |at: Option<DateTime<Utc>>| {
            at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string())
        };

        writeln!(f, "Provider       : {}", self.provider)?;
        writeln!(
            f,
            "IP resolver    : {}",
            self.ip_resolver.as_deref().unwrap_or("not configured")
        )?;
        writeln!(f, "Domains        : {} ({} managed)", self.domains, self.managed_domains)?;
        writeln!(
            f,
            "Subdomains     : {} ({} managed)",
            self.subdomains, self.managed_subdomains
        )?;
        writeln!(f, "Last checked   : {}", stamp(self.last_checked_at))?;
        write!(f, "Last updated   : {}", stamp(self.last_updated_at))
    }
}

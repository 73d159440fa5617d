// # Catalog Store Trait
//
// Defines the interface for the local catalog of domains and dynamic
// subdomains.
//
// ## Purpose
//
// The catalog remembers which names the user asked us to keep pointed at
// this host:
// - Which domains are managed
// - Which A records (by provider record id) belong to each domain
// - The last address we wrote and when each record was last checked
//
// Rows are never deleted. Un-managing flips `managed` to false so history
// survives and a later re-manage can reactivate the same row.
//
// ## Implementations
//
// - In-memory: `MemoryCatalogStore`
// - SQLite (durable): `SqliteCatalogStore`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::dns_provider::RecordId;

/// A top-level zone in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Local catalog id
    pub id: i64,
    /// Fully-qualified zone name, unique in the catalog
    pub name: String,
    /// Whether subdomains of this zone may be managed
    pub managed: bool,
    pub cataloged_at: DateTime<Utc>,
    /// Last time the zone transitioned to managed
    pub last_managed_at: DateTime<Utc>,
}

/// A dynamic A record in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    /// Local catalog id; also the reconciliation order
    pub id: i64,
    /// Provider identifier of the A record
    pub domain_record_id: RecordId,
    /// Owning [`Domain::id`]
    pub main_id: i64,
    /// Host portion relative to the domain (`@` for the apex)
    pub name: String,
    /// Last address this tool wrote to the record
    pub current_ip4: Ipv4Addr,
    pub managed: bool,
    pub cataloged_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Subdomain {
    /// Fully-qualified host name, given the owning domain
    pub fn fqdn(&self, domain: &str) -> String {
        if self.name == "@" {
            domain.to_string()
        } else {
            format!("{}.{}", self.name, domain)
        }
    }
}

/// Fields supplied when cataloging a subdomain; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubdomain {
    pub domain_record_id: RecordId,
    pub main_id: i64,
    pub name: String,
    pub current_ip4: Ipv4Addr,
    /// Used for every timestamp on the new row
    pub at: DateTime<Utc>,
}

/// Trait for catalog store implementations
///
/// # Consistency
///
/// Stores are read-your-writes: a write that returned `Ok` is visible to
/// every subsequent read through the same handle. Each mutating method is a
/// single statement or transaction.
///
/// # Invariants
///
/// - Domain names are unique
/// - `(main_id, name)` is unique among rows with `managed = true`; a write
///   that would break this fails with [`crate::Error::Catalog`]
///
/// # Trust Level
///
/// Stores own persistence only. They never talk to the provider and never
/// decide whether a record needs updating.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Look up a domain by name, managed or not
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>, crate::Error>;

    async fn find_domain_by_id(&self, id: i64) -> Result<Option<Domain>, crate::Error>;

    /// Insert a managed domain with both timestamps set to `at`
    ///
    /// # Returns
    ///
    /// - `Ok(Domain)`: The stored row
    /// - `Err(Error::Catalog)`: The name is already cataloged
    async fn insert_domain(&self, name: &str, at: DateTime<Utc>) -> Result<Domain, crate::Error>;

    /// Flip a domain's `managed` flag
    ///
    /// Setting `managed = true` also stamps `last_managed_at` with `at`.
    async fn set_domain_managed(
        &self,
        id: i64,
        managed: bool,
        at: DateTime<Utc>,
    ) -> Result<(), crate::Error>;

    /// All domains in catalog order
    async fn list_domains(&self) -> Result<Vec<Domain>, crate::Error>;

    /// Look up a subdomain row of `main_id` by name
    ///
    /// A managed row is preferred over demoted ones; among demoted rows the
    /// most recent wins.
    async fn find_subdomain(
        &self,
        main_id: i64,
        name: &str,
    ) -> Result<Option<Subdomain>, crate::Error>;

    /// Insert a managed subdomain row
    async fn insert_subdomain(&self, new: NewSubdomain) -> Result<Subdomain, crate::Error>;

    /// Flip a subdomain's `managed` flag
    async fn set_subdomain_managed(&self, id: i64, managed: bool) -> Result<(), crate::Error>;

    /// Demote every managed subdomain of `main_id`
    ///
    /// # Returns
    ///
    /// The number of rows that changed
    async fn demote_subdomains_of(&self, main_id: i64) -> Result<u64, crate::Error>;

    /// Every subdomain row, managed or not, in ascending id order
    async fn list_subdomains(&self) -> Result<Vec<Subdomain>, crate::Error>;

    /// Every subdomain row of one domain, in ascending id order
    async fn list_subdomains_of(&self, main_id: i64) -> Result<Vec<Subdomain>, crate::Error>;

    /// Record that `ip` was written upstream at `at`
    ///
    /// Sets `current_ip4`, `last_updated_at` and `last_checked_at`.
    async fn record_update(
        &self,
        id: i64,
        ip: Ipv4Addr,
        at: DateTime<Utc>,
    ) -> Result<(), crate::Error>;

    /// Record that the row was checked at `at` and needed no change
    ///
    /// Only `last_checked_at` moves.
    async fn record_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), crate::Error>;
}

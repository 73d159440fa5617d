// # Memory Catalog Store
//
// In-memory implementation of CatalogStore.
//
// ## Purpose
//
// Provides a simple, fast catalog that doesn't persist across restarts.
// Useful for testing and for one-shot runs where the catalog is rebuilt
// from the provider each time.
//
// ## Crash Behavior
//
// - All rows are lost on restart/crash
// - No recovery possible (state is in-memory only)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::catalog_store::{CatalogStore, Domain, NewSubdomain, Subdomain};

#[derive(Debug, Default)]
struct Tables {
    domains: Vec<Domain>,
    subdomains: Vec<Subdomain>,
}

impl Tables {
    fn domain_mut(&mut self, id: i64) -> Result<&mut Domain, Error> {
        self.domains
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::catalog(format!("no domain with id {id}")))
    }

    fn subdomain_mut(&mut self, id: i64) -> Result<&mut Subdomain, Error> {
        self.subdomains
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::catalog(format!("no subdomain with id {id}")))
    }

    fn managed_name_taken(&self, main_id: i64, name: &str, except: Option<i64>) -> bool {
        self.subdomains.iter().any(|s| {
            s.managed && s.main_id == main_id && s.name == name && Some(s.id) != except
        })
    }
}

/// In-memory catalog store implementation
///
/// Rows live in two vectors behind a single RwLock, so ids are assigned in
/// insertion order and listings come back in catalog order without sorting.
/// Clones share the same tables.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::MemoryCatalogStore;
/// use ddns_core::CatalogStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryCatalogStore::new();
///
///     let domain = store.insert_domain("example.com", chrono::Utc::now()).await?;
///     assert!(domain.managed);
///
///     let found = store.find_domain("example.com").await?;
///     assert_eq!(found, Some(domain));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogStore {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryCatalogStore {
    /// Create a new empty memory catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subdomain rows, managed or not
    pub async fn subdomain_count(&self) -> usize {
        self.inner.read().await.subdomains.len()
    }

    /// Check if the catalog holds no rows at all
    pub async fn is_empty(&self) -> bool {
        let guard = self.inner.read().await;
        guard.domains.is_empty() && guard.subdomains.is_empty()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.domains.iter().find(|d| d.name == name).cloned())
    }

    async fn find_domain_by_id(&self, id: i64) -> Result<Option<Domain>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.domains.iter().find(|d| d.id == id).cloned())
    }

    async fn insert_domain(&self, name: &str, at: DateTime<Utc>) -> Result<Domain, Error> {
        let mut guard = self.inner.write().await;
        if guard.domains.iter().any(|d| d.name == name) {
            return Err(Error::catalog(format!("domain {name} is already cataloged")));
        }

        let domain = Domain {
            id: guard.domains.len() as i64 + 1,
            name: name.to_string(),
            managed: true,
            cataloged_at: at,
            last_managed_at: at,
        };
        guard.domains.push(domain.clone());
        Ok(domain)
    }

    async fn set_domain_managed(&self, id: i64, managed: bool, at: DateTime<Utc>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let domain = guard.domain_mut(id)?;
        domain.managed = managed;
        if managed {
            domain.last_managed_at = at;
        }
        Ok(())
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, Error> {
        Ok(self.inner.read().await.domains.clone())
    }

    async fn find_subdomain(&self, main_id: i64, name: &str) -> Result<Option<Subdomain>, Error> {
        let guard = self.inner.read().await;
        let mut matching = guard
            .subdomains
            .iter()
            .filter(|s| s.main_id == main_id && s.name == name);

        let found = match matching.clone().find(|s| s.managed) {
            Some(managed) => Some(managed),
            None => matching.next_back(),
        };
        Ok(found.cloned())
    }

    async fn insert_subdomain(&self, new: NewSubdomain) -> Result<Subdomain, Error> {
        let mut guard = self.inner.write().await;
        if guard.managed_name_taken(new.main_id, &new.name, None) {
            return Err(Error::catalog(format!(
                "a managed subdomain '{}' already exists for domain id {}",
                new.name, new.main_id
            )));
        }

        let subdomain = Subdomain {
            id: guard.subdomains.len() as i64 + 1,
            domain_record_id: new.domain_record_id,
            main_id: new.main_id,
            name: new.name,
            current_ip4: new.current_ip4,
            managed: true,
            cataloged_at: new.at,
            last_checked_at: new.at,
            last_updated_at: new.at,
        };
        guard.subdomains.push(subdomain.clone());
        Ok(subdomain)
    }

    async fn set_subdomain_managed(&self, id: i64, managed: bool) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if managed {
            let (main_id, name) = {
                let row = guard.subdomain_mut(id)?;
                (row.main_id, row.name.clone())
            };
            if guard.managed_name_taken(main_id, &name, Some(id)) {
                return Err(Error::catalog(format!(
                    "a managed subdomain '{name}' already exists for domain id {main_id}"
                )));
            }
        }
        guard.subdomain_mut(id)?.managed = managed;
        Ok(())
    }

    async fn demote_subdomains_of(&self, main_id: i64) -> Result<u64, Error> {
        let mut guard = self.inner.write().await;
        let mut changed = 0;
        for row in guard
            .subdomains
            .iter_mut()
            .filter(|s| s.main_id == main_id && s.managed)
        {
            row.managed = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_subdomains(&self) -> Result<Vec<Subdomain>, Error> {
        Ok(self.inner.read().await.subdomains.clone())
    }

    async fn list_subdomains_of(&self, main_id: i64) -> Result<Vec<Subdomain>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .subdomains
            .iter()
            .filter(|s| s.main_id == main_id)
            .cloned()
            .collect())
    }

    async fn record_update(&self, id: i64, ip: Ipv4Addr, at: DateTime<Utc>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        let row = guard.subdomain_mut(id)?;
        row.current_ip4 = ip;
        row.last_updated_at = at;
        row.last_checked_at = at;
        Ok(())
    }

    async fn record_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.subdomain_mut(id)?.last_checked_at = at;
        Ok(())
    }
}

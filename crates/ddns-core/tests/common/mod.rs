//! Test doubles and common utilities for contract tests
//!
//! The doubles are cheap to clone and clones share state, so a test can hand
//! one copy to the engine and keep another to inspect call counts.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use ddns_core::error::{ApiError, Error, Result};
use ddns_core::{
    ARecord, CatalogStore, DdnsEngine, DnsProvider, Domain, EngineConfig, IpResolver,
    MemoryCatalogStore, NewSubdomain, Page, PageStream, RecordId, RemoteDomain, Subdomain,
    paginate,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Small pages so listings exercise pagination
const PAGE_SIZE: usize = 2;

#[derive(Debug, Default)]
struct ProviderState {
    domains: Vec<String>,
    /// (domain, record) in creation order
    records: Vec<(String, ARecord)>,
    next_id: i64,
    failing_records: HashMap<RecordId, u16>,
    fail_create: Option<u16>,
    updates: Vec<(RecordId, Ipv4Addr)>,
}

/// In-memory stand-in for the provider API that counts every call
#[derive(Debug, Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
    verify_calls: Arc<AtomicUsize>,
    create_calls: Arc<AtomicUsize>,
    get_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        provider.state.lock().unwrap().next_id = 20001;
        provider
    }

    /// Register a zone on the fake account
    pub fn with_domain(self, domain: &str) -> Self {
        self.state.lock().unwrap().domains.push(domain.to_string());
        self
    }

    /// Seed an A record
    pub fn with_record(self, domain: &str, id: i64, name: &str, data: &str) -> Self {
        self.state.lock().unwrap().records.push((
            domain.to_string(),
            ARecord {
                id: RecordId(id),
                name: name.to_string(),
                data: data.to_string(),
                ttl: Some(3600),
            },
        ));
        self
    }

    /// Make reads and updates of one record fail with `status`
    pub fn fail_record(&self, id: i64, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failing_records
            .insert(RecordId(id), status);
    }

    /// Make record creation fail with `status`
    pub fn fail_create(&self, status: u16) {
        self.state.lock().unwrap().fail_create = Some(status);
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Every `update_a_record` call, in order
    pub fn updates(&self) -> Vec<(RecordId, Ipv4Addr)> {
        self.state.lock().unwrap().updates.clone()
    }

    /// Current upstream state of one record
    pub fn record(&self, id: i64) -> Option<ARecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(_, r)| r.id == RecordId(id))
            .map(|(_, r)| r.clone())
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }

    fn check_failure(&self, id: RecordId) -> Result<()> {
        match self.state.lock().unwrap().failing_records.get(&id) {
            Some(status) => Err(ApiError::from_status(*status, format!("record {id}")).into()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn verify_domain_registered(&self, domain: &str) -> Result<()> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.lock().unwrap().domains.iter().any(|d| d == domain) {
            Ok(())
        } else {
            Err(ApiError::NotFound(domain.to_string()).into())
        }
    }

    fn all_domains(&self) -> PageStream<'_, RemoteDomain> {
        let domains: Vec<RemoteDomain> = self
            .state
            .lock()
            .unwrap()
            .domains
            .iter()
            .map(|name| RemoteDomain {
                name: name.clone(),
                ttl: Some(1800),
            })
            .collect();
        paged(domains)
    }

    fn a_records<'a>(&'a self, domain: &'a str) -> PageStream<'a, ARecord> {
        let records: Vec<ARecord> = self
            .state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(d, _)| d == domain)
            .map(|(_, r)| r.clone())
            .collect();
        paged(records)
    }

    async fn create_a_record(
        &self,
        name: &str,
        domain: &str,
        ip: Ipv4Addr,
        ttl: u32,
    ) -> Result<RecordId> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.fail_create {
            return Err(ApiError::from_status(status, "create failed").into());
        }

        let id = RecordId(state.next_id);
        state.next_id += 1;
        state.records.push((
            domain.to_string(),
            ARecord {
                id,
                name: name.to_string(),
                data: ip.to_string(),
                ttl: Some(ttl),
            },
        ));
        Ok(id)
    }

    async fn get_a_record(&self, record_id: RecordId, domain: &str) -> Result<ARecord> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(record_id)?;

        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|(d, r)| d == domain && r.id == record_id)
            .map(|(_, r)| r.clone())
            .ok_or_else(|| ApiError::NotFound(format!("record {record_id}")).into())
    }

    async fn update_a_record(
        &self,
        record_id: RecordId,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<ARecord> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(record_id)?;

        let mut state = self.state.lock().unwrap();
        state.updates.push((record_id, ip));
        let record = state
            .records
            .iter_mut()
            .find(|(d, r)| d == domain && r.id == record_id)
            .map(|(_, r)| r)
            .ok_or_else(|| Error::from(ApiError::NotFound(format!("record {record_id}"))))?;
        record.data = ip.to_string();
        Ok(record.clone())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

fn paged<'a, T: Clone + Send + Sync + 'a>(items: Vec<T>) -> PageStream<'a, T> {
    let total = items.len() as u64;
    paginate(move |page| {
        let start = (page as usize - 1) * PAGE_SIZE;
        let items: Vec<T> = items.iter().skip(start).take(PAGE_SIZE).cloned().collect();
        async move {
            Ok(Page {
                items,
                total: Some(total),
            })
        }
    })
}

/// Resolver returning a fixed address (or no resolver at all)
#[derive(Debug, Clone)]
pub struct FixedIpResolver {
    ip: Arc<Mutex<Option<Ipv4Addr>>>,
    calls: Arc<AtomicUsize>,
}

impl FixedIpResolver {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip: Arc::new(Mutex::new(Some(ip))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A resolver with no endpoint configured
    pub fn unconfigured() -> Self {
        Self {
            ip: Arc::new(Mutex::new(None)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_ip(&self, ip: Ipv4Addr) {
        *self.ip.lock().unwrap() = Some(ip);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpResolver for FixedIpResolver {
    async fn current_ipv4(&self) -> Result<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (*self.ip.lock().unwrap()).ok_or(Error::NoIpResolverConfigured)
    }
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

/// An hour before now, for rows whose timestamps a test wants to see move
pub fn an_hour_ago() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

pub fn engine(
    provider: &MockDnsProvider,
    resolver: &FixedIpResolver,
    catalog: &MemoryCatalogStore,
) -> DdnsEngine {
    engine_with_config(provider, resolver, catalog, EngineConfig::default())
}

pub fn engine_with_config(
    provider: &MockDnsProvider,
    resolver: &FixedIpResolver,
    catalog: &MemoryCatalogStore,
    config: EngineConfig,
) -> DdnsEngine {
    DdnsEngine::new(
        Box::new(provider.clone()),
        Box::new(resolver.clone()),
        Box::new(catalog.clone()),
        config,
    )
    .expect("engine construction succeeds")
}

/// Catalog a managed domain directly, bypassing verification
pub async fn seed_domain(catalog: &dyn CatalogStore, name: &str) -> Domain {
    catalog
        .insert_domain(name, an_hour_ago())
        .await
        .expect("domain insert succeeds")
}

/// Catalog a managed subdomain directly, with every timestamp an hour ago
pub async fn seed_subdomain(
    catalog: &dyn CatalogStore,
    domain: &Domain,
    name: &str,
    record_id: i64,
    cached: Ipv4Addr,
) -> Subdomain {
    catalog
        .insert_subdomain(NewSubdomain {
            domain_record_id: RecordId(record_id),
            main_id: domain.id,
            name: name.to_string(),
            current_ip4: cached,
            at: an_hour_ago(),
        })
        .await
        .expect("subdomain insert succeeds")
}

/// Look up one subdomain row by record id
pub async fn row_for(catalog: &dyn CatalogStore, record_id: i64) -> Subdomain {
    catalog
        .list_subdomains()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.domain_record_id == RecordId(record_id))
        .expect("row exists")
}

// # ddns-core
//
// Core library for the do-ddns dynamic DNS tool.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping A records pointed
// at the current host:
// - **DnsProvider**: Trait for reading and writing A records via a provider API
// - **IpResolver**: Trait for discovering the host's public IPv4 address
// - **CatalogStore**: Trait for the local catalog of managed domains and subdomains
// - **DdnsEngine**: Domain and subdomain management plus the reconciliation pass
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Explicit Handles**: Collaborators are injected, never global
// 3. **Tagged Outcomes**: "Already managed" and "not managed" are results, not errors
// 4. **Library-First**: The CLI is a thin layer over `DdnsEngine`
// 5. **No Retries**: Every failure is reported to the caller as-is

pub mod config;
pub mod engine;
pub mod error;
pub mod pagination;
pub mod state;
pub mod traits;
pub mod validation;

// Re-export core types for convenience
pub use config::{
    CatalogConfig, DdnsConfig, EngineConfig, FailurePolicy, IpResolverConfig, ProviderConfig,
};
pub use engine::{
    CatalogSummary, DdnsEngine, DomainListing, ManageDomainOutcome, ManageSubdomainOutcome,
    PassOutcome, ReconcileReport, RecordListing, SubdomainStatus, UnmanageDomainOutcome,
    UnmanageSubdomainOutcome,
};
pub use error::{ApiError, Error, Result};
pub use pagination::{Page, paginate};
pub use state::{MemoryCatalogStore, SqliteCatalogStore};
pub use traits::{
    ARecord, CatalogStore, DnsProvider, Domain, IpResolver, NewSubdomain, PageStream, RecordId,
    RemoteDomain, Subdomain,
};

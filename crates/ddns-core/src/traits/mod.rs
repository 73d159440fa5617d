//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Read and write A records at the provider
//! - [`IpResolver`]: Discover the host's public IPv4 address
//! - [`CatalogStore`]: Local record of managed domains and subdomains

pub mod catalog_store;
pub mod dns_provider;
pub mod ip_resolver;

pub use catalog_store::{CatalogStore, Domain, NewSubdomain, Subdomain};
pub use dns_provider::{ARecord, DnsProvider, PageStream, RecordId, RemoteDomain};
pub use ip_resolver::IpResolver;

// # DNS Provider Trait
//
// Defines the interface to the remote directory that owns the authoritative
// A records.
//
// ## Implementations
//
// - DigitalOcean: `doddns-provider-digitalocean` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let mut records = provider.a_records("example.com");
//     while let Some(record) = records.next().await {
//         println!("{}", record?.name);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::pin::Pin;
use tokio_stream::Stream;

/// Lazily paginated sequence of provider items
///
/// Every call that returns one of these builds a fresh stream, so a listing
/// can always be restarted by calling the method again. A failed page is
/// yielded as an `Err` item and ends the stream.
pub type PageStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T, crate::Error>> + Send + 'a>>;

/// Provider-assigned identifier of a DNS record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A zone registered with the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDomain {
    /// Fully-qualified zone name
    pub name: String,
    /// Zone default TTL, if reported
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// An A record as the provider reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecord {
    /// The record ID (provider-specific)
    pub id: RecordId,
    /// Host portion of the record, e.g. `@` or `support`
    pub name: String,
    /// The record value; an IPv4 address for well-formed A records
    pub data: String,
    /// Time-to-live for the record
    #[serde(default)]
    pub ttl: Option<u32>,
}

impl ARecord {
    /// Whether the record currently points at `ip`
    pub fn points_at(&self, ip: Ipv4Addr) -> bool {
        self.data.trim().parse::<Ipv4Addr>().ok() == Some(ip)
    }
}

/// Trait for remote directory implementations
///
/// Implementations issue authenticated HTTP calls and translate non-2xx
/// responses into [`crate::ApiError`]. They never retry, never cache and never
/// touch the catalog; those decisions belong to [`crate::DdnsEngine`].
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Confirm that `domain` is registered to the authenticated account
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The zone exists upstream
    /// - `Err(Error::Api(ApiError::NotFound(_)))`: It does not
    /// - `Err(Error)`: Any other transport or API failure
    async fn verify_domain_registered(&self, domain: &str) -> Result<(), crate::Error>;

    /// All zones on the account, fetched page by page on demand
    fn all_domains(&self) -> PageStream<'_, RemoteDomain>;

    /// All A records of `domain`, fetched page by page on demand
    fn a_records<'a>(&'a self, domain: &'a str) -> PageStream<'a, ARecord>;

    /// Create an A record `name` in `domain` pointing at `ip`
    ///
    /// # Returns
    ///
    /// The provider's identifier for the new record
    async fn create_a_record(
        &self,
        name: &str,
        domain: &str,
        ip: Ipv4Addr,
        ttl: u32,
    ) -> Result<RecordId, crate::Error>;

    /// Read the authoritative state of one record
    async fn get_a_record(&self, record_id: RecordId, domain: &str)
    -> Result<ARecord, crate::Error>;

    /// Point an existing record at `ip`
    ///
    /// # Returns
    ///
    /// The record as the provider reports it after the update
    async fn update_a_record(
        &self,
        record_id: RecordId,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<ARecord, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_at_ignores_whitespace() {
        let record = ARecord {
            id: RecordId(1),
            name: "@".to_string(),
            data: " 127.0.0.1\n".to_string(),
            ttl: Some(3600),
        };
        assert!(record.points_at(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(!record.points_at(Ipv4Addr::new(127, 0, 0, 2)));
    }

    #[test]
    fn test_points_at_rejects_garbage() {
        let record = ARecord {
            id: RecordId(1),
            name: "@".to_string(),
            data: "not-an-ip".to_string(),
            ttl: None,
        };
        assert!(!record.points_at(Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[test]
    fn test_record_id_is_transparent() {
        let record: ARecord =
            serde_json::from_str(r#"{"id": 10001, "name": "support", "data": "1.2.3.4"}"#).unwrap();
        assert_eq!(record.id, RecordId(10001));
        assert_eq!(record.ttl, None);
        assert_eq!(record.id.to_string(), "10001");
    }
}

// # DigitalOcean DNS Provider
//
// This crate provides the DigitalOcean implementation of `DnsProvider`.
//
// ## Behaviour
//
// - One HTTP request per call (listings: one request per page, on demand)
// - Every non-2xx response becomes an `ApiError` carrying the status
// - HTTP timeout configured (45 seconds by default)
// - NO retry logic (a failure is reported to the caller as-is)
// - NO caching (the catalog is owned by `DdnsEngine`)
// - NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - A missing token is reported when the first request is attempted
//
// ## API Reference
//
// - DigitalOcean API v2: https://docs.digitalocean.com/reference/api/
// - Get Domain: GET `/domains/:name`
// - List Domains: GET `/domains?per_page=..&page=..`
// - List Records: GET `/domains/:name/records?type=A&per_page=..&page=..`
// - Create Record: POST `/domains/:name/records`
// - Get Record: GET `/domains/:name/records/:id`
// - Update Record: PATCH `/domains/:name/records/:id`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::pagination::{Page, paginate};
use ddns_core::traits::{ARecord, DnsProvider, PageStream, RecordId, RemoteDomain};
use ddns_core::{ApiError, Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::Ipv4Addr;
use std::time::Duration;

/// DigitalOcean DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct DigitalOceanProvider {
    /// Bearer token
    /// ⚠️ NEVER log this value
    api_token: Option<String>,

    /// API root without a trailing slash
    base_url: String,

    /// Items requested per listing page
    page_size: u32,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DigitalOceanProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanProvider")
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DomainsPage {
    #[serde(default)]
    domains: Vec<RemoteDomain>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct RecordsPage {
    #[serde(default)]
    domain_records: Vec<DoRecord>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    domain_record: DoRecord,
}

/// A record as the API returns it; only A records are passed on
#[derive(Debug, Deserialize)]
struct DoRecord {
    id: i64,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    data: String,
    #[serde(default)]
    ttl: Option<u32>,
}

impl From<DoRecord> for ARecord {
    fn from(record: DoRecord) -> Self {
        ARecord {
            id: RecordId(record.id),
            name: record.name,
            data: record.data,
            ttl: record.ttl,
        }
    }
}

impl DigitalOceanProvider {
    /// Create a new DigitalOcean provider
    ///
    /// A missing token is accepted here; calls fail with
    /// [`Error::MissingApiToken`] until one is supplied.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("do-ddns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            client,
        })
    }

    fn token(&self) -> Result<&str> {
        self.api_token.as_deref().ok_or(Error::MissingApiToken)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and turn any non-2xx response into an `ApiError`
    ///
    /// `what` names the thing being accessed, for the error message.
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String> {
        let token = self.token()?;

        let response = request
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(what, e))?;

        if !status.is_success() {
            tracing::debug!("{} answered {}", what, status);
            return Err(ApiError::from_status(status.as_u16(), describe_failure(what, &body)).into());
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        tracing::debug!("GET {}", url);
        let body = self.send(self.client.get(url).query(query), what).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn page_query(&self, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("per_page", self.page_size.to_string()),
            ("page", page.to_string()),
        ]
    }

    async fn fetch_domains_page(&self, page: u32) -> Result<Page<RemoteDomain>> {
        let listing: DomainsPage = self
            .get_json(&self.url("/domains"), &self.page_query(page), "domain list")
            .await?;

        Ok(Page {
            items: listing.domains,
            total: listing.meta.total,
        })
    }

    async fn fetch_records_page(&self, domain: &str, page: u32) -> Result<Page<ARecord>> {
        let mut query = self.page_query(page);
        query.push(("type", "A".to_string()));

        let listing: RecordsPage = self
            .get_json(
                &self.url(&format!("/domains/{domain}/records")),
                &query,
                &format!("records of {domain}"),
            )
            .await?;

        Ok(Page {
            items: listing
                .domain_records
                .into_iter()
                .filter(|r| r.record_type == "A")
                .map(ARecord::from)
                .collect(),
            total: listing.meta.total,
        })
    }
}

fn transport_error(what: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::transport(format!("request for {what} timed out"))
    } else {
        Error::transport(format!("request for {what} failed: {err}"))
    }
}

/// The API's own `message` field when present, else the raw body
fn describe_failure(what: &str, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{what}: {}", parsed.message),
        Err(_) if body.trim().is_empty() => what.to_string(),
        Err(_) => format!("{what}: {}", body.trim()),
    }
}

#[async_trait]
impl DnsProvider for DigitalOceanProvider {
    async fn verify_domain_registered(&self, domain: &str) -> Result<()> {
        let url = self.url(&format!("/domains/{domain}"));
        match self.get_json::<serde_json::Value>(&url, &[], domain).await {
            Ok(_) => {
                tracing::debug!("Domain {} is registered", domain);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    "{} is not associated with this DigitalOcean account. \
                     Check the spelling, or add the domain in the DigitalOcean control panel first.",
                    domain
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn all_domains(&self) -> PageStream<'_, RemoteDomain> {
        paginate(move |page| self.fetch_domains_page(page))
    }

    fn a_records<'a>(&'a self, domain: &'a str) -> PageStream<'a, ARecord> {
        paginate(move |page| self.fetch_records_page(domain, page))
    }

    async fn create_a_record(
        &self,
        name: &str,
        domain: &str,
        ip: Ipv4Addr,
        ttl: u32,
    ) -> Result<RecordId> {
        let url = self.url(&format!("/domains/{domain}/records"));
        let payload = serde_json::json!({
            "type": "A",
            "name": name,
            "data": ip.to_string(),
            "ttl": ttl,
        });

        tracing::debug!("POST {}", url);
        let body = self
            .send(
                self.client.post(&url).json(&payload),
                &format!("new record {name} in {domain}"),
            )
            .await?;
        let created: RecordEnvelope = serde_json::from_str(&body)?;

        tracing::info!(
            "Created A record {} in {} -> {} (id {})",
            name,
            domain,
            ip,
            created.domain_record.id
        );
        Ok(RecordId(created.domain_record.id))
    }

    async fn get_a_record(&self, record_id: RecordId, domain: &str) -> Result<ARecord> {
        let url = self.url(&format!("/domains/{domain}/records/{record_id}"));
        let envelope: RecordEnvelope = self
            .get_json(&url, &[], &format!("record {record_id} of {domain}"))
            .await?;

        if envelope.domain_record.record_type != "A" {
            return Err(Error::invalid_input(format!(
                "record {record_id} of {domain} is a {} record, not A",
                envelope.domain_record.record_type
            )));
        }
        Ok(envelope.domain_record.into())
    }

    async fn update_a_record(
        &self,
        record_id: RecordId,
        domain: &str,
        ip: Ipv4Addr,
    ) -> Result<ARecord> {
        let url = self.url(&format!("/domains/{domain}/records/{record_id}"));
        let payload = serde_json::json!({
            "type": "A",
            "data": ip.to_string(),
        });

        tracing::debug!("PATCH {}", url);
        let body = self
            .send(
                self.client.patch(&url).json(&payload),
                &format!("record {record_id} of {domain}"),
            )
            .await?;
        let updated: RecordEnvelope = serde_json::from_str(&body)?;

        tracing::info!("DNS record {} of {} updated -> {}", record_id, domain, ip);
        Ok(updated.domain_record.into())
    }

    fn provider_name(&self) -> &'static str {
        "digitalocean"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    fn provider(token: Option<&str>) -> DigitalOceanProvider {
        let mut config = ProviderConfig::default();
        config.api_token = token.map(str::to_string);
        // Nothing listens here; tests must never reach the network
        config.base_url = "http://127.0.0.1:9/v2/".to_string();
        DigitalOceanProvider::new(&config).unwrap()
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let provider = provider(Some("dop_v1_secret_token_12345"));

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("dop_v1_secret"));
        assert!(debug_str.contains("DigitalOceanProvider"));
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_base_url_is_normalised() {
        let provider = provider(None);
        assert_eq!(
            provider.url("/domains/example.com"),
            "http://127.0.0.1:9/v2/domains/example.com"
        );
        assert_eq!(provider.provider_name(), "digitalocean");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ProviderConfig::default();
        config.page_size = 0;
        assert!(matches!(
            DigitalOceanProvider::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_fails_at_first_use() {
        let provider = provider(None);

        let err = provider
            .verify_domain_registered("example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingApiToken));

        let err = provider
            .get_a_record(RecordId(10001), "example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingApiToken));

        let mut domains = provider.all_domains();
        assert!(matches!(domains.next().await, Some(Err(Error::MissingApiToken))));
        assert!(domains.next().await.is_none());
    }

    #[test]
    fn test_parse_records_page() {
        let body = r#"{
            "domain_records": [
                {"id": 10001, "type": "A", "name": "@", "data": "127.0.0.1", "priority": null, "port": null, "ttl": 3600, "weight": null, "flags": null, "tag": null},
                {"id": 10002, "type": "A", "name": "support", "data": "127.0.0.2", "ttl": 1800},
                {"id": 10003, "type": "CNAME", "name": "www", "data": "@", "ttl": 1800}
            ],
            "links": {},
            "meta": {"total": 3}
        }"#;

        let page: RecordsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.meta.total, Some(3));

        let records: Vec<ARecord> = page
            .domain_records
            .into_iter()
            .filter(|r| r.record_type == "A")
            .map(ARecord::from)
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, RecordId(10001));
        assert_eq!(records[1].name, "support");
        assert_eq!(records[1].ttl, Some(1800));
    }

    #[test]
    fn test_parse_domains_page_without_meta() {
        let body = r#"{"domains": [{"name": "example.com", "ttl": 1800, "zone_file": "..."}]}"#;

        let page: DomainsPage = serde_json::from_str(body).unwrap();
        assert_eq!(page.domains.len(), 1);
        assert_eq!(page.domains[0].name, "example.com");
        assert_eq!(page.meta.total, None);
    }

    #[test]
    fn test_parse_created_record() {
        let body = r#"{"domain_record": {"id": 28448433, "type": "A", "name": "support", "data": "127.0.0.1", "ttl": 3600}}"#;

        let envelope: RecordEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.domain_record.id, 28448433);
    }

    #[test]
    fn test_describe_failure_prefers_api_message() {
        let body = r#"{"id": "not_found", "message": "The resource you requested could not be found."}"#;
        assert_eq!(
            describe_failure("example.com", body),
            "example.com: The resource you requested could not be found."
        );
        assert_eq!(describe_failure("example.com", ""), "example.com");
        assert_eq!(
            describe_failure("example.com", "Bad Gateway"),
            "example.com: Bad Gateway"
        );
    }
}

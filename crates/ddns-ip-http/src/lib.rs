// # HTTP IP Resolver
//
// This crate provides the HTTP implementation of `IpResolver`.
//
// ## Purpose
//
// Asks an external "what is my IP" endpoint (e.g. https://api.ipify.org)
// for the public IPv4 address of this host. The endpoint must answer a
// plain GET with the address as text, optionally surrounded by whitespace.
//
// ## Behaviour
//
// - Exactly one request per call; the engine decides how often to call
// - NO caching: every reconciliation pass must see the address as it is now
// - Anything that is not a single IPv4 address is an error (IPv6 included)
// - With no endpoint configured every call fails with
//   `Error::NoIpResolverConfigured`, so commands that never need an
//   address keep working

use ddns_core::config::IpResolverConfig;
use ddns_core::traits::IpResolver;
use ddns_core::{Error, Result};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Public IPv4 lookup over HTTP
#[derive(Debug)]
pub struct HttpIpResolver {
    /// Endpoint to ask, if one is configured
    url: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver from its configuration section
    pub fn from_config(config: &IpResolverConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }

    /// Create a resolver asking `url` with the default timeout
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::from_config(&IpResolverConfig {
            url: Some(url.into()),
            ..IpResolverConfig::default()
        })
    }
}

/// Parse an endpoint's answer into an IPv4 address
pub fn parse_ipv4_body(body: &str) -> Result<Ipv4Addr> {
    let text = body.trim();

    match text.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(ip),
        Ok(IpAddr::V6(ip)) => Err(Error::ip_resolver(format!(
            "Expected an IPv4 address, got IPv6 {ip}"
        ))),
        Err(_) => Err(Error::ip_resolver(format!(
            "Invalid IP address in response: '{}'",
            text.chars().take(64).collect::<String>()
        ))),
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn current_ipv4(&self) -> Result<Ipv4Addr> {
        let url = self.url.as_deref().ok_or(Error::NoIpResolverConfigured)?;

        tracing::debug!("Resolving public IPv4 via {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_resolver(format!("Request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ip_resolver(format!(
                "{url} answered HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_resolver(format!("Failed to read response: {e}")))?;

        let ip = parse_ipv4_body(&body)?;
        tracing::info!("Public IPv4 is {}", ip);
        Ok(ip)
    }

    fn endpoint(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

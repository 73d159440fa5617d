// # IP Resolver Trait
//
// Defines the interface for discovering the host's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP endpoint returning the address as plain text: `doddns-ip-http` crate
//
// IPv6 is not supported; resolvers reject anything that is not IPv4.

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP resolver implementations
///
/// # Trust Level
///
/// Resolvers are observers. They perform one lookup per call and never
/// retry, cache, or decide whether DNS needs to change.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Get the host's current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current public address
    /// - `Err(Error::NoIpResolverConfigured)`: No endpoint has been set up
    /// - `Err(Error)`: Transport failure or unusable response
    async fn current_ipv4(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Where the resolver looks the address up, for display
    fn endpoint(&self) -> Option<&str> {
        None
    }
}

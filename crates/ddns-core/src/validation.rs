//! Name checks shared by the domain and subdomain managers
//!
//! Names are compared case-insensitively, so everything is lower-cased on
//! the way in.

use crate::{Error, Result};

/// Host portion used for the zone apex
pub const APEX: &str = "@";

/// Accept only ASCII letters, digits, `.`, `-` and `@`
///
/// Runs before any I/O. The empty string is rejected.
pub fn check_simple_name(name: &str) -> Result<()> {
    let simple = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '@'));

    if simple {
        Ok(())
    } else {
        Err(Error::NonSimpleDomainName(name.to_string()))
    }
}

/// Validate and lower-case a domain name
pub fn domain_name(domain: &str) -> Result<String> {
    let domain = domain.trim();
    check_simple_name(domain)?;
    if domain.contains('@') {
        return Err(Error::NonSimpleDomainName(domain.to_string()));
    }
    Ok(domain.trim_end_matches('.').to_ascii_lowercase())
}

/// Reduce `subdomain` to its host portion relative to `domain`
///
/// `"support.example.com"` and `"support"` both become `"support"`;
/// `"example.com"` and `"@"` both become the apex `"@"`.
pub fn normalize_subdomain(subdomain: &str, domain: &str) -> Result<String> {
    let subdomain = subdomain.trim();
    check_simple_name(subdomain)?;

    let subdomain = subdomain.trim_end_matches('.').to_ascii_lowercase();
    let domain = domain.to_ascii_lowercase();

    if subdomain == domain || subdomain == APEX {
        return Ok(APEX.to_string());
    }

    let host = subdomain
        .strip_suffix(&domain)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(&subdomain);

    if host.is_empty() || host.starts_with('.') || host.ends_with('.') || host.contains('@') {
        return Err(Error::NonSimpleDomainName(subdomain.clone()));
    }

    Ok(host.to_string())
}

//! Error types for the do-ddns system
//!
//! This module defines all error types used throughout the crate.
//! Idempotent no-ops (already managed, not managed, ...) are NOT errors;
//! they are reported through the outcome types in [`crate::engine`].

use thiserror::Error;

/// Result type alias for do-ddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failure for a non-success response from the provider API
///
/// Each variant carries enough context to print an actionable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// 401/403: the API token was rejected
    #[error("Unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// 404: the domain or record does not exist for this account
    #[error("Not found: {0}")]
    NotFound(String),

    /// 429: too many requests
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// 5xx: provider-side failure
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Anything else that is not a 2xx
    #[error("Unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

impl ApiError {
    /// Map a non-success HTTP status to its typed failure
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            404 => Self::NotFound(message),
            429 => Self::RateLimited(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Unexpected { status, message },
        }
    }

    /// The HTTP status code behind this failure
    pub fn status(&self) -> u16 {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Server { status, .. }
            | Self::Unexpected { status, .. } => *status,
            Self::NotFound(_) => 404,
            Self::RateLimited(_) => 429,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Core error type for the do-ddns system
#[derive(Error, Debug)]
pub enum Error {
    /// Name contains characters outside letters, digits, `.`, `-` and `@`
    #[error("'{0}' is not a simple domain name")]
    NonSimpleDomainName(String),

    /// A subdomain operation referenced a domain that is not managed
    #[error("{0} is not a managed domain")]
    TopDomainNotManaged(String),

    /// The catalog holds no subdomain rows at all
    #[error("No subdomains are cataloged")]
    NoManagedSubdomains,

    /// No public IP resolver endpoint is configured
    #[error("No IP resolver configured")]
    NoIpResolverConfigured,

    /// No API token was supplied
    #[error("No API token available")]
    MissingApiToken,

    /// Non-success response from the provider API
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Connection failure, timeout, or unreadable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local catalog store errors
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Public IP resolver errors (bad status, unparseable body)
    #[error("IP resolver error: {0}")]
    IpResolver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create an IP resolver error
    pub fn ip_resolver(msg: impl Into<String>) -> Self {
        Self::IpResolver(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True when the provider reported the domain or record as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_not_found())
    }

    /// One actionable line for the user, printed by front-ends before exiting
    pub fn guidance(&self) -> String {
        match self {
            Self::NonSimpleDomainName(name) => format!(
                "Error: '{name}' is not a simple name. Give the domain name in simple form e.g. test.example.com"
            ),
            Self::TopDomainNotManaged(domain) => format!(
                "Error: {domain} is not a managed domain. Add it first with `do_ddns domains add {domain}`."
            ),
            Self::NoManagedSubdomains => "Error: There are no dynamic domains cataloged. \
                 Start by adding one with `do_ddns subdomains add <subdomain> <domain>`."
                .to_string(),
            Self::NoIpResolverConfigured => "Error: No IP resolver configured. \
                 Pass --ip-resolver or set DO_DDNS_IP_RESOLVER, e.g. https://api.ipify.org"
                .to_string(),
            Self::MissingApiToken => "Error: No API token available. \
                 Pass --api-token or set DO_DDNS_API_TOKEN."
                .to_string(),
            Self::Api(ApiError::Unauthorized { .. }) => {
                "Error: The provider rejected the API token. Check that it is valid and has write scope."
                    .to_string()
            }
            Self::Api(ApiError::NotFound(what)) => format!(
                "Error: {what} was not found for this account. Check spelling or run `do_ddns domains list`."
            ),
            Self::Api(ApiError::RateLimited(_)) => {
                "Error: The provider is rate limiting requests. Try again later.".to_string()
            }
            Self::Api(ApiError::Server { status, .. }) => format!(
                "Error: The provider returned a server error ({status}). Try again later."
            ),
            other => format!("Error: {other}"),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Catalog(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Catalog(format!("migration failed: {err}"))
    }
}

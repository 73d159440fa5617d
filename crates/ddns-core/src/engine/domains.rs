//! Domain management
//!
//! Promoting a domain verifies it upstream before it is cataloged. Demoting
//! never touches the provider; it only stops this tool from reconciling the
//! domain and its subdomains.

use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::{DdnsEngine, ManageSubdomainOutcome};
use crate::error::{Error, Result};
use crate::traits::Domain;
use crate::validation;

/// Result of [`DdnsEngine::manage_domain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageDomainOutcome {
    /// Verified upstream and inserted
    Cataloged(Domain),
    /// Already managed; nothing was done
    AlreadyManaged(Domain),
    /// A demoted row was verified again and reactivated
    Reactivated(Domain),
}

impl ManageDomainOutcome {
    pub fn domain(&self) -> &Domain {
        match self {
            Self::Cataloged(d) | Self::AlreadyManaged(d) | Self::Reactivated(d) => d,
        }
    }
}

impl fmt::Display for ManageDomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cataloged(d) => write!(f, "The domain {} has been added to the catalog", d.name),
            Self::AlreadyManaged(d) => write!(f, "The domain {} is already managed", d.name),
            Self::Reactivated(d) => write!(f, "The domain {} is managed again", d.name),
        }
    }
}

/// Result of [`DdnsEngine::un_manage_domain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmanageDomainOutcome {
    /// The domain is no longer managed; `cascaded` subdomains were demoted with it
    Demoted { domain: Domain, cascaded: u64 },
    /// No catalog row for that name
    NotCataloged(String),
}

impl fmt::Display for UnmanageDomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demoted { domain, cascaded } => write!(
                f,
                "The domain {} is no longer managed ({} subdomain(s) demoted)",
                domain.name, cascaded
            ),
            Self::NotCataloged(name) => write!(f, "The domain {name} is not in the catalog"),
        }
    }
}

/// A remote domain annotated with its catalog state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEntry {
    pub name: String,
    pub managed: bool,
}

/// Result of [`DdnsEngine::show_all_domains`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainListing {
    pub entries: Vec<DomainEntry>,
}

impl DomainListing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for DomainListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "No domains associated with this account");
        }

        writeln!(f, "Domains in the catalog are marked with a [*]")?;
        write!(f, "{}", "=".repeat(48))?;
        for entry in &self.entries {
            let marker = if entry.managed { " [*]" } else { "" };
            write!(f, "\nName : {}{}", entry.name, marker)?;
        }
        Ok(())
    }
}

impl DdnsEngine {
    /// Promote `name` to a managed domain
    ///
    /// # Returns
    ///
    /// - `Ok(ManageDomainOutcome)`: What changed, if anything
    /// - `Err(Error::NonSimpleDomainName)`: Bad characters; nothing was attempted
    /// - `Err(Error::Api(ApiError::NotFound))`: The zone is not on this account
    pub async fn manage_domain(&self, name: &str) -> Result<ManageDomainOutcome> {
        let name = validation::domain_name(name)?;

        match self.catalog.find_domain(&name).await? {
            Some(existing) if existing.managed => {
                warn!("Domain {} is already managed", name);
                Ok(ManageDomainOutcome::AlreadyManaged(existing))
            }
            Some(existing) => {
                self.verify_upstream(&name).await?;
                self.catalog
                    .set_domain_managed(existing.id, true, Utc::now())
                    .await?;
                let domain = self
                    .catalog
                    .find_domain_by_id(existing.id)
                    .await?
                    .ok_or_else(|| Error::catalog(format!("domain {name} vanished")))?;
                info!("Domain {} reactivated", name);
                Ok(ManageDomainOutcome::Reactivated(domain))
            }
            None => {
                self.verify_upstream(&name).await?;
                let domain = self.catalog.insert_domain(&name, Utc::now()).await?;
                info!("Domain {} added to the catalog", name);
                Ok(ManageDomainOutcome::Cataloged(domain))
            }
        }
    }

    /// Demote `name` and every managed subdomain under it
    pub async fn un_manage_domain(&self, name: &str) -> Result<UnmanageDomainOutcome> {
        let name = validation::domain_name(name)?;

        let Some(mut domain) = self.catalog.find_domain(&name).await? else {
            warn!("Domain {} is not in the catalog", name);
            return Ok(UnmanageDomainOutcome::NotCataloged(name));
        };

        if domain.managed {
            self.catalog
                .set_domain_managed(domain.id, false, Utc::now())
                .await?;
            domain.managed = false;
        } else {
            warn!("Domain {} was already demoted", name);
        }

        let cascaded = self.catalog.demote_subdomains_of(domain.id).await?;
        info!("Domain {} demoted, {} subdomain(s) cascaded", name, cascaded);

        Ok(UnmanageDomainOutcome::Demoted { domain, cascaded })
    }

    /// Every domain on the account, flagged when it is managed here
    pub async fn show_all_domains(&self) -> Result<DomainListing> {
        let managed: HashSet<String> = self
            .catalog
            .list_domains()
            .await?
            .into_iter()
            .filter(|d| d.managed)
            .map(|d| d.name)
            .collect();

        let mut entries = Vec::new();
        let mut remote = self.provider.all_domains();
        while let Some(domain) = remote.next().await {
            let domain = domain?;
            let name = domain.name.to_ascii_lowercase();
            entries.push(DomainEntry {
                managed: managed.contains(&name),
                name,
            });
        }

        debug!("Provider reported {} domain(s)", entries.len());
        Ok(DomainListing { entries })
    }

    /// Adopt every A record the provider currently holds for `domain`
    ///
    /// Records whose names this tool cannot manage (wildcards, for example)
    /// are skipped with a warning.
    pub async fn manage_all_existing_a_records(
        &self,
        domain: &str,
    ) -> Result<Vec<ManageSubdomainOutcome>> {
        let domain = validation::domain_name(domain)?;
        let parent = self.managed_domain(&domain).await?;

        let records = crate::pagination::collect_all(self.provider.a_records(&domain)).await?;
        info!("Importing {} A record(s) for {}", records.len(), domain);

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let host = match validation::normalize_subdomain(&record.name, &domain) {
                Ok(host) => host,
                Err(e) => {
                    warn!("Skipping record {} ({}): {}", record.id, record.name, e);
                    continue;
                }
            };
            outcomes.push(self.adopt_record(&parent, &host, record).await?);
        }

        Ok(outcomes)
    }

    async fn verify_upstream(&self, name: &str) -> Result<()> {
        match self.provider.verify_domain_registered(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!(
                    "Domain {} is not associated with this {} account",
                    name,
                    self.provider.provider_name()
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

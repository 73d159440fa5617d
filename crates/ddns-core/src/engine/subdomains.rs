//! Subdomain management
//!
//! A subdomain moves between three states: unregistered, managed and
//! demoted. Promotion of an unregistered name creates the A record upstream;
//! promotion of a demoted name reactivates its existing row and never
//! creates a second record.

use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use super::DdnsEngine;
use crate::error::{Error, Result};
use crate::traits::{ARecord, Domain, NewSubdomain, RecordId, Subdomain};
use crate::validation;

/// Result of [`DdnsEngine::manage_subdomain`] and the adopt operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageSubdomainOutcome {
    /// A new A record was created upstream and cataloged
    Created(Subdomain),
    /// An existing upstream record was cataloged
    Adopted(Subdomain),
    /// A demoted row was managed again
    Reactivated(Subdomain),
    /// Already managed; nothing was done
    AlreadyManaged(Subdomain),
}

impl ManageSubdomainOutcome {
    pub fn subdomain(&self) -> &Subdomain {
        match self {
            Self::Created(s) | Self::Adopted(s) | Self::Reactivated(s) | Self::AlreadyManaged(s) => s,
        }
    }

    /// User-facing line, given the owning domain
    pub fn describe(&self, domain: &str) -> String {
        let fqdn = self.subdomain().fqdn(domain);
        match self {
            Self::Created(s) => format!("The domain {fqdn} has been added ({}).", s.current_ip4),
            Self::Adopted(s) => format!(
                "The domain {fqdn} (record {}) is now managed.",
                s.domain_record_id
            ),
            Self::Reactivated(_) => format!("The domain {fqdn} is managed again."),
            Self::AlreadyManaged(_) => format!("The domain {fqdn} is already managed."),
        }
    }
}

/// Result of [`DdnsEngine::un_manage_subdomain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmanageSubdomainOutcome {
    /// The row is no longer managed
    Demoted(Subdomain),
    /// No managed row for that name
    NotManaged(String),
}

impl fmt::Display for UnmanageSubdomainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demoted(s) => write!(f, "The subdomain {} is no longer managed", s.name),
            Self::NotManaged(name) => write!(f, "The subdomain {name} is not managed"),
        }
    }
}

/// Which side of the partition a [`RecordListing`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Managed,
    Unmanaged,
}

/// Upstream A records of one domain on one side of the partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordListing {
    pub domain: String,
    pub kind: ListingKind,
    pub records: Vec<ARecord>,
}

impl fmt::Display for RecordListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ListingKind::Managed => "managed",
            ListingKind::Unmanaged => "unmanaged",
        };

        if self.records.is_empty() {
            return write!(f, "No {label} records for {}", self.domain);
        }

        writeln!(f, "A records for {} ({label})", self.domain)?;
        write!(f, "{}", "=".repeat(64))?;
        for record in &self.records {
            let fqdn = if record.name == validation::APEX {
                self.domain.clone()
            } else {
                format!("{}.{}", record.name, self.domain)
            };
            write!(f, "\n{:<32}\tID : {}\t{}", fqdn, record.id, record.data)?;
        }
        Ok(())
    }
}

/// Cached address of one subdomain next to the current public address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainStatus {
    pub fqdn: String,
    pub managed: bool,
    pub cached_ip: Ipv4Addr,
    pub public_ip: Ipv4Addr,
}

impl SubdomainStatus {
    pub fn is_current(&self) -> bool {
        self.cached_ip == self.public_ip
    }
}

impl fmt::Display for SubdomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The domain {} has the IP {}. Your public IP is {}.",
            self.fqdn, self.cached_ip, self.public_ip
        )?;
        if !self.managed {
            write!(f, " (not managed)")?;
        }
        Ok(())
    }
}

impl DdnsEngine {
    /// Promote `subdomain` of the managed `domain`, creating its A record upstream
    ///
    /// `subdomain` may be bare (`www`) or fully-qualified (`www.example.com`).
    ///
    /// # Returns
    ///
    /// - `Ok(ManageSubdomainOutcome)`: What changed, if anything
    /// - `Err(Error::NonSimpleDomainName)`: Bad characters; nothing was attempted
    /// - `Err(Error::TopDomainNotManaged)`: `domain` must be managed first
    /// - `Err(Error)`: Resolver or provider failure during creation
    pub async fn manage_subdomain(
        &self,
        subdomain: &str,
        domain: &str,
    ) -> Result<ManageSubdomainOutcome> {
        validation::check_simple_name(subdomain)?;
        let domain = validation::domain_name(domain)?;
        let host = validation::normalize_subdomain(subdomain, &domain)?;
        let parent = self.managed_domain(&domain).await?;

        if let Some(existing) = self.catalog.find_subdomain(parent.id, &host).await? {
            if existing.managed {
                warn!("{} is already managed", existing.fqdn(&domain));
                return Ok(ManageSubdomainOutcome::AlreadyManaged(existing));
            }
            return self.reactivate(existing, &domain).await;
        }

        let ip = self.resolve_ip().await?;
        let record_id = self
            .provider
            .create_a_record(&host, &domain, ip, self.config.record_ttl)
            .await?;

        let row = self
            .catalog
            .insert_subdomain(NewSubdomain {
                domain_record_id: record_id,
                main_id: parent.id,
                name: host,
                current_ip4: ip,
                at: Utc::now(),
            })
            .await?;

        info!("{} created with record {} -> {}", row.fqdn(&domain), record_id, ip);
        Ok(ManageSubdomainOutcome::Created(row))
    }

    /// Promote an A record that already exists upstream
    ///
    /// The record named by `record_id` must exist in `domain` and carry the
    /// normalised name of `subdomain`.
    pub async fn adopt_subdomain(
        &self,
        subdomain: &str,
        domain: &str,
        record_id: RecordId,
    ) -> Result<ManageSubdomainOutcome> {
        validation::check_simple_name(subdomain)?;
        let domain = validation::domain_name(domain)?;
        let host = validation::normalize_subdomain(subdomain, &domain)?;
        let parent = self.managed_domain(&domain).await?;

        if let Some(existing) = self.catalog.find_subdomain(parent.id, &host).await? {
            if existing.managed && existing.domain_record_id != record_id {
                return Err(Error::invalid_input(format!(
                    "{} is already managed through record {}",
                    existing.fqdn(&domain),
                    existing.domain_record_id
                )));
            }
        }

        let record = self.provider.get_a_record(record_id, &domain).await?;
        let remote_host = validation::normalize_subdomain(&record.name, &domain)?;
        if remote_host != host {
            return Err(Error::invalid_input(format!(
                "record {} is named '{}', not '{}'",
                record_id, record.name, host
            )));
        }

        self.adopt_record(&parent, &host, record).await
    }

    /// Catalog an upstream record under `parent`, reusing any existing row
    pub(super) async fn adopt_record(
        &self,
        parent: &Domain,
        host: &str,
        record: ARecord,
    ) -> Result<ManageSubdomainOutcome> {
        if let Some(existing) = self.catalog.find_subdomain(parent.id, host).await? {
            if existing.managed {
                warn!("{} is already managed", existing.fqdn(&parent.name));
                return Ok(ManageSubdomainOutcome::AlreadyManaged(existing));
            }
            if existing.domain_record_id == record.id {
                return self.reactivate(existing, &parent.name).await;
            }
        }

        let ip: Ipv4Addr = record.data.trim().parse().map_err(|_| {
            Error::invalid_input(format!(
                "record {} holds '{}', which is not an IPv4 address",
                record.id, record.data
            ))
        })?;

        let row = self
            .catalog
            .insert_subdomain(NewSubdomain {
                domain_record_id: record.id,
                main_id: parent.id,
                name: host.to_string(),
                current_ip4: ip,
                at: Utc::now(),
            })
            .await?;

        info!("{} adopted with record {}", row.fqdn(&parent.name), record.id);
        Ok(ManageSubdomainOutcome::Adopted(row))
    }

    /// Demote `subdomain` of `domain`; the upstream record is left alone
    ///
    /// A demoted `domain` is accepted so stragglers can still be demoted.
    pub async fn un_manage_subdomain(
        &self,
        subdomain: &str,
        domain: &str,
    ) -> Result<UnmanageSubdomainOutcome> {
        validation::check_simple_name(subdomain)?;
        let domain = validation::domain_name(domain)?;
        let host = validation::normalize_subdomain(subdomain, &domain)?;

        let Some(parent) = self.catalog.find_domain(&domain).await? else {
            return Err(Error::TopDomainNotManaged(domain));
        };

        match self.catalog.find_subdomain(parent.id, &host).await? {
            Some(mut row) if row.managed => {
                self.catalog.set_subdomain_managed(row.id, false).await?;
                row.managed = false;
                info!("{} is no longer managed", row.fqdn(&domain));
                Ok(UnmanageSubdomainOutcome::Demoted(row))
            }
            _ => {
                warn!("{}.{} is not managed", host, domain);
                Ok(UnmanageSubdomainOutcome::NotManaged(host))
            }
        }
    }

    /// Upstream A records of `domain` that are managed here
    pub async fn list_sub_domains(&self, domain: &str) -> Result<RecordListing> {
        self.partition_records(domain, ListingKind::Managed).await
    }

    /// Upstream A records of `domain` that are not managed here
    ///
    /// Includes records never cataloged and records that were demoted.
    pub async fn list_unmanaged(&self, domain: &str) -> Result<RecordListing> {
        self.partition_records(domain, ListingKind::Unmanaged).await
    }

    /// Cached address of a cataloged subdomain next to the current public IP
    pub async fn subdomain_status(&self, subdomain: &str, domain: &str) -> Result<SubdomainStatus> {
        validation::check_simple_name(subdomain)?;
        let domain = validation::domain_name(domain)?;
        let host = validation::normalize_subdomain(subdomain, &domain)?;

        let Some(parent) = self.catalog.find_domain(&domain).await? else {
            return Err(Error::TopDomainNotManaged(domain));
        };
        let Some(row) = self.catalog.find_subdomain(parent.id, &host).await? else {
            return Err(Error::invalid_input(format!(
                "{host}.{domain} is not in the catalog"
            )));
        };

        let public_ip = self.resolve_ip().await?;
        Ok(SubdomainStatus {
            fqdn: row.fqdn(&domain),
            managed: row.managed,
            cached_ip: row.current_ip4,
            public_ip,
        })
    }

    async fn partition_records(&self, domain: &str, kind: ListingKind) -> Result<RecordListing> {
        let domain = validation::domain_name(domain)?;

        let managed_ids: HashSet<RecordId> = match self.catalog.find_domain(&domain).await? {
            Some(parent) => self
                .catalog
                .list_subdomains_of(parent.id)
                .await?
                .into_iter()
                .filter(|s| s.managed)
                .map(|s| s.domain_record_id)
                .collect(),
            None => HashSet::new(),
        };

        let mut records = Vec::new();
        {
            let mut remote = self.provider.a_records(&domain);
            while let Some(record) = remote.next().await {
                let record = record?;
                let is_managed = managed_ids.contains(&record.id);
                if is_managed == (kind == ListingKind::Managed) {
                    records.push(record);
                }
            }
        }

        debug!("{} {:?} record(s) for {}", records.len(), kind, domain);
        Ok(RecordListing {
            domain,
            kind,
            records,
        })
    }

    async fn reactivate(&self, mut row: Subdomain, domain: &str) -> Result<ManageSubdomainOutcome> {
        self.catalog.set_subdomain_managed(row.id, true).await?;
        row.managed = true;
        info!(
            "{} reactivated with record {}",
            row.fqdn(domain),
            row.domain_record_id
        );
        Ok(ManageSubdomainOutcome::Reactivated(row))
    }
}

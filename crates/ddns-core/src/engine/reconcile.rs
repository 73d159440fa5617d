//! Reconciliation pass
//!
//! ## Flow
//!
//! 1. Load every subdomain row; an empty catalog is an error
//! 2. Resolve the public IP once for the whole pass
//! 3. For each managed row, in catalog order:
//!    - read the authoritative record by `domain_record_id`
//!    - patch it if it differs from the snapshot (or when forced), then
//!      record the write
//!    - otherwise record the check only; `current_ip4` stays as it was
//!
//! Demoted rows never reach the provider. Nothing is retried.

use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, error, info};

use super::DdnsEngine;
use crate::config::FailurePolicy;
use crate::error::{Error, Result};
use crate::traits::{Domain, RecordId, Subdomain};

/// What happened to one record during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// The record was patched; `previous` is the upstream value before the patch
    Updated { previous: String, new: Ipv4Addr },
    /// Upstream already matched the snapshot
    Unchanged,
}

/// Per-record entry of a [`ReconcileReport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub subdomain_id: i64,
    pub record_id: RecordId,
    pub fqdn: String,
    pub change: RecordChange,
}

/// A record the pass could not reconcile
#[derive(Debug)]
pub struct RecordFailure {
    pub subdomain_id: i64,
    pub record_id: RecordId,
    pub fqdn: String,
    pub error: Error,
}

/// Aggregate result of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// At least one record was patched
    UpdatesPerformed,
    /// Every managed record already pointed at the public IP
    NoUpdatesNecessary,
    /// Rows exist but every one of them is demoted
    NoneManaged,
}

impl fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpdatesPerformed => write!(f, "Updates performed"),
            Self::NoUpdatesNecessary => write!(f, "No updates necessary"),
            Self::NoneManaged => write!(f, "No managed subdomains to update"),
        }
    }
}

/// Result of [`DdnsEngine::update_all_managed_subdomains`]
#[derive(Debug)]
pub struct ReconcileReport {
    /// The snapshot every write in this pass used; `None` when nothing was managed
    pub public_ip: Option<Ipv4Addr>,
    pub records: Vec<RecordOutcome>,
    /// Only populated under [`FailurePolicy::Continue`]
    pub failures: Vec<RecordFailure>,
    pub outcome: PassOutcome,
}

impl ReconcileReport {
    pub fn updated(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.records
            .iter()
            .filter(|r| matches!(r.change, RecordChange::Updated { .. }))
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.outcome)?;
        for record in self.updated() {
            if let RecordChange::Updated { previous, new } = &record.change {
                write!(f, "\n  {}: {} -> {}", record.fqdn, previous, new)?;
            }
        }
        if !self.failures.is_empty() {
            write!(f, "\n{} record(s) failed:", self.failures.len())?;
            for failure in &self.failures {
                write!(f, "\n  {}: {}", failure.fqdn, failure.error)?;
            }
        }
        Ok(())
    }
}

impl DdnsEngine {
    /// Bring every managed record in line with the current public IP
    ///
    /// With `force`, every managed record is patched even when it already
    /// matches.
    ///
    /// # Returns
    ///
    /// - `Ok(ReconcileReport)`: The pass completed (possibly with collected
    ///   failures under [`FailurePolicy::Continue`])
    /// - `Err(Error::NoManagedSubdomains)`: The catalog holds no rows at all;
    ///   no network call was made
    /// - `Err(Error)`: Resolver failure, or the first record failure under
    ///   [`FailurePolicy::Abort`]
    pub async fn update_all_managed_subdomains(&self, force: bool) -> Result<ReconcileReport> {
        let rows = self.catalog.list_subdomains().await?;
        if rows.is_empty() {
            return Err(Error::NoManagedSubdomains);
        }

        let managed: Vec<Subdomain> = rows.into_iter().filter(|s| s.managed).collect();
        if managed.is_empty() {
            info!("Every cataloged subdomain is demoted; nothing to do");
            return Ok(ReconcileReport {
                public_ip: None,
                records: Vec::new(),
                failures: Vec::new(),
                outcome: PassOutcome::NoneManaged,
            });
        }

        let domains: HashMap<i64, Domain> = self
            .catalog
            .list_domains()
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        let snapshot = self.resolve_ip().await?;
        info!(
            "Reconciling {} managed subdomain(s) against {}{}",
            managed.len(),
            snapshot,
            if force { " (forced)" } else { "" }
        );

        let mut records = Vec::with_capacity(managed.len());
        let mut failures = Vec::new();

        for row in &managed {
            let (fqdn, result) = match domains.get(&row.main_id) {
                Some(domain) => (
                    row.fqdn(&domain.name),
                    self.reconcile_one(row, &domain.name, snapshot, force).await,
                ),
                None => (
                    row.name.clone(),
                    Err(Error::catalog(format!(
                        "subdomain {} references missing domain id {}",
                        row.id, row.main_id
                    ))),
                ),
            };

            match result {
                Ok(change) => records.push(RecordOutcome {
                    subdomain_id: row.id,
                    record_id: row.domain_record_id,
                    fqdn,
                    change,
                }),
                Err(e) => {
                    error!("Failed to reconcile {} (record {}): {}", fqdn, row.domain_record_id, e);
                    match self.config.on_record_error {
                        FailurePolicy::Abort => return Err(e),
                        FailurePolicy::Continue => failures.push(RecordFailure {
                            subdomain_id: row.id,
                            record_id: row.domain_record_id,
                            fqdn,
                            error: e,
                        }),
                    }
                }
            }
        }

        let outcome = if records
            .iter()
            .any(|r| matches!(r.change, RecordChange::Updated { .. }))
        {
            PassOutcome::UpdatesPerformed
        } else {
            PassOutcome::NoUpdatesNecessary
        };
        info!("{}", outcome);

        Ok(ReconcileReport {
            public_ip: Some(snapshot),
            records,
            failures,
            outcome,
        })
    }

    async fn reconcile_one(
        &self,
        row: &Subdomain,
        domain: &str,
        snapshot: Ipv4Addr,
        force: bool,
    ) -> Result<RecordChange> {
        let remote = self.provider.get_a_record(row.domain_record_id, domain).await?;

        if remote.points_at(snapshot) && !force {
            debug!("{} already points at {}", row.fqdn(domain), snapshot);
            self.catalog.record_check(row.id, Utc::now()).await?;
            return Ok(RecordChange::Unchanged);
        }

        self.provider
            .update_a_record(row.domain_record_id, domain, snapshot)
            .await?;
        self.catalog.record_update(row.id, snapshot, Utc::now()).await?;

        info!("{} updated {} -> {}", row.fqdn(domain), remote.data, snapshot);
        Ok(RecordChange::Updated {
            previous: remote.data,
            new: snapshot,
        })
    }
}

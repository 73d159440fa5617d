// # SQLite Catalog Store
//
// Durable implementation of CatalogStore backed by a single SQLite file.
//
// ## Schema
//
// Managed by `sqlx::migrate!` from `migrations/`. The partial unique index
// `subdomains_managed_name` enforces that a name is managed at most once per
// domain while leaving demoted history rows alone.
//
// ## Crash Behavior
//
// - Every mutating method is a single statement, so a crash leaves either
//   the old or the new row, never a partial write
// - Rows are never deleted

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::Error;
use crate::traits::catalog_store::{CatalogStore, Domain, NewSubdomain, Subdomain};
use crate::traits::dns_provider::RecordId;

const SUBDOMAIN_COLUMNS: &str = "id, domain_record_id, main_id, name, current_ip4, managed, \
     cataloged_at, last_checked_at, last_updated_at";

/// SQLite catalog store implementation
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::state::SqliteCatalogStore;
/// use ddns_core::CatalogStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteCatalogStore::open("/var/lib/do-ddns/ddns.db").await?;
///     for domain in store.list_domains().await? {
///         println!("{} managed={}", domain.name, domain.managed);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl SqliteCatalogStore {
    /// Open (creating if needed) the catalog at `path` and apply migrations
    ///
    /// Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::catalog(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Opened catalog at {}", path.display());
        Self::migrated(pool, Some(path.to_path_buf())).await
    }

    /// A private catalog that lives only as long as this handle
    pub async fn in_memory() -> Result<Self, Error> {
        let options = SqliteConnectOptions::new().in_memory(true);
        // The database disappears with its last connection
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrated(pool, None).await
    }

    async fn migrated(pool: SqlitePool, path: Option<PathBuf>) -> Result<Self, Error> {
        sqlx::migrate!().run(&pool).await?;
        Ok(Self { pool, path })
    }

    /// Database file backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the pool, waiting for pending writes
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn domain_from_row(row: &SqliteRow) -> Result<Domain, Error> {
    Ok(Domain {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        managed: row.try_get("managed")?,
        cataloged_at: row.try_get::<DateTime<Utc>, _>("cataloged_at")?,
        last_managed_at: row.try_get::<DateTime<Utc>, _>("last_managed_at")?,
    })
}

fn subdomain_from_row(row: &SqliteRow) -> Result<Subdomain, Error> {
    let ip: String = row.try_get("current_ip4")?;
    let current_ip4 = ip
        .parse::<Ipv4Addr>()
        .map_err(|_| Error::catalog(format!("stored address '{ip}' is not IPv4")))?;

    Ok(Subdomain {
        id: row.try_get("id")?,
        domain_record_id: RecordId(row.try_get("domain_record_id")?),
        main_id: row.try_get("main_id")?,
        name: row.try_get("name")?,
        current_ip4,
        managed: row.try_get("managed")?,
        cataloged_at: row.try_get::<DateTime<Utc>, _>("cataloged_at")?,
        last_checked_at: row.try_get::<DateTime<Utc>, _>("last_checked_at")?,
        last_updated_at: row.try_get::<DateTime<Utc>, _>("last_updated_at")?,
    })
}

fn expect_one_row(rows_affected: u64, what: &str, id: i64) -> Result<(), Error> {
    if rows_affected == 0 {
        return Err(Error::catalog(format!("no {what} with id {id}")));
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn find_domain(&self, name: &str) -> Result<Option<Domain>, Error> {
        let row = sqlx::query(
            "SELECT id, name, managed, cataloged_at, last_managed_at FROM domains WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(domain_from_row).transpose()
    }

    async fn find_domain_by_id(&self, id: i64) -> Result<Option<Domain>, Error> {
        let row = sqlx::query(
            "SELECT id, name, managed, cataloged_at, last_managed_at FROM domains WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(domain_from_row).transpose()
    }

    async fn insert_domain(&self, name: &str, at: DateTime<Utc>) -> Result<Domain, Error> {
        let res = sqlx::query(
            r#"
            INSERT INTO domains (name, managed, cataloged_at, last_managed_at)
            VALUES (?, 1, ?, ?)
            "#,
        )
        .bind(name)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(Domain {
            id: res.last_insert_rowid(),
            name: name.to_string(),
            managed: true,
            cataloged_at: at,
            last_managed_at: at,
        })
    }

    async fn set_domain_managed(&self, id: i64, managed: bool, at: DateTime<Utc>) -> Result<(), Error> {
        let res = if managed {
            sqlx::query("UPDATE domains SET managed = 1, last_managed_at = ? WHERE id = ?")
                .bind(at)
                .bind(id)
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query("UPDATE domains SET managed = 0 WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?
        };
        expect_one_row(res.rows_affected(), "domain", id)
    }

    async fn list_domains(&self) -> Result<Vec<Domain>, Error> {
        let rows = sqlx::query(
            "SELECT id, name, managed, cataloged_at, last_managed_at FROM domains ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(domain_from_row).collect()
    }

    async fn find_subdomain(&self, main_id: i64, name: &str) -> Result<Option<Subdomain>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {SUBDOMAIN_COLUMNS} FROM subdomains \
             WHERE main_id = ? AND name = ? \
             ORDER BY managed DESC, id DESC LIMIT 1"
        ))
        .bind(main_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subdomain_from_row).transpose()
    }

    async fn insert_subdomain(&self, new: NewSubdomain) -> Result<Subdomain, Error> {
        let res = sqlx::query(
            r#"
            INSERT INTO subdomains (
                domain_record_id,
                main_id,
                name,
                current_ip4,
                managed,
                cataloged_at,
                last_checked_at,
                last_updated_at
            ) VALUES (?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(new.domain_record_id.0)
        .bind(new.main_id)
        .bind(&new.name)
        .bind(new.current_ip4.to_string())
        .bind(new.at)
        .bind(new.at)
        .bind(new.at)
        .execute(&self.pool)
        .await?;

        Ok(Subdomain {
            id: res.last_insert_rowid(),
            domain_record_id: new.domain_record_id,
            main_id: new.main_id,
            name: new.name,
            current_ip4: new.current_ip4,
            managed: true,
            cataloged_at: new.at,
            last_checked_at: new.at,
            last_updated_at: new.at,
        })
    }

    async fn set_subdomain_managed(&self, id: i64, managed: bool) -> Result<(), Error> {
        let res = sqlx::query("UPDATE subdomains SET managed = ? WHERE id = ?")
            .bind(managed)
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one_row(res.rows_affected(), "subdomain", id)
    }

    async fn demote_subdomains_of(&self, main_id: i64) -> Result<u64, Error> {
        let res = sqlx::query("UPDATE subdomains SET managed = 0 WHERE main_id = ? AND managed = 1")
            .bind(main_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn list_subdomains(&self) -> Result<Vec<Subdomain>, Error> {
        let rows = sqlx::query(&format!("SELECT {SUBDOMAIN_COLUMNS} FROM subdomains ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(subdomain_from_row).collect()
    }

    async fn list_subdomains_of(&self, main_id: i64) -> Result<Vec<Subdomain>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBDOMAIN_COLUMNS} FROM subdomains WHERE main_id = ? ORDER BY id"
        ))
        .bind(main_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subdomain_from_row).collect()
    }

    async fn record_update(&self, id: i64, ip: Ipv4Addr, at: DateTime<Utc>) -> Result<(), Error> {
        let res = sqlx::query(
            r#"
            UPDATE subdomains
            SET current_ip4 = ?, last_updated_at = ?, last_checked_at = ?
            WHERE id = ?
            "#,
        )
        .bind(ip.to_string())
        .bind(at)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        expect_one_row(res.rows_affected(), "subdomain", id)
    }

    async fn record_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), Error> {
        let res = sqlx::query("UPDATE subdomains SET last_checked_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        expect_one_row(res.rows_affected(), "subdomain", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_subdomain(main_id: i64, name: &str, record: i64) -> NewSubdomain {
        NewSubdomain {
            domain_record_id: RecordId(record),
            main_id,
            name: name.to_string(),
            current_ip4: Ipv4Addr::new(127, 0, 0, 1),
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ddns.db");

        {
            let store = SqliteCatalogStore::open(&path).await.unwrap();
            let domain = store.insert_domain("example.com", Utc::now()).await.unwrap();
            store
                .insert_subdomain(new_subdomain(domain.id, "support", 10001))
                .await
                .unwrap();
            store.close().await;
        }

        let store = SqliteCatalogStore::open(&path).await.unwrap();
        assert_eq!(store.path(), Some(path.as_path()));

        let domain = store.find_domain("example.com").await.unwrap().unwrap();
        assert!(domain.managed);

        let rows = store.list_subdomains().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].domain_record_id, RecordId(10001));
        assert_eq!(rows[0].current_ip4, Ipv4Addr::new(127, 0, 0, 1));
    }

    #[tokio::test]
    async fn test_duplicate_domain_rejected() {
        let store = SqliteCatalogStore::in_memory().await.unwrap();
        store.insert_domain("example.com", Utc::now()).await.unwrap();

        let err = store.insert_domain("example.com", Utc::now()).await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
    }

    #[tokio::test]
    async fn test_partial_unique_index() {
        let store = SqliteCatalogStore::in_memory().await.unwrap();
        let domain = store.insert_domain("example.com", Utc::now()).await.unwrap();

        let first = store
            .insert_subdomain(new_subdomain(domain.id, "support", 10001))
            .await
            .unwrap();
        assert!(store
            .insert_subdomain(new_subdomain(domain.id, "support", 10002))
            .await
            .is_err());

        store.set_subdomain_managed(first.id, false).await.unwrap();
        let second = store
            .insert_subdomain(new_subdomain(domain.id, "support", 10002))
            .await
            .unwrap();

        let found = store.find_subdomain(domain.id, "support").await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
        assert!(store.set_subdomain_managed(first.id, true).await.is_err());
    }

    #[tokio::test]
    async fn test_domain_reactivation_stamps_time() {
        let store = SqliteCatalogStore::in_memory().await.unwrap();
        let cataloged = Utc::now();
        let domain = store.insert_domain("example.com", cataloged).await.unwrap();

        store.set_domain_managed(domain.id, false, cataloged).await.unwrap();
        let later = cataloged + chrono::Duration::hours(1);
        store.set_domain_managed(domain.id, true, later).await.unwrap();

        let domain = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert!(domain.managed);
        assert_eq!(domain.cataloged_at, cataloged);
        assert_eq!(domain.last_managed_at, later);
    }

    #[tokio::test]
    async fn test_cascade_and_checks() {
        let store = SqliteCatalogStore::in_memory().await.unwrap();
        let domain = store.insert_domain("example.com", Utc::now()).await.unwrap();
        let other = store.insert_domain("example.org", Utc::now()).await.unwrap();

        let a = store.insert_subdomain(new_subdomain(domain.id, "a", 1)).await.unwrap();
        store.insert_subdomain(new_subdomain(domain.id, "b", 2)).await.unwrap();
        store.insert_subdomain(new_subdomain(other.id, "c", 3)).await.unwrap();

        let later = a.cataloged_at + chrono::Duration::minutes(5);
        store.record_check(a.id, later).await.unwrap();
        let checked = store.list_subdomains_of(domain.id).await.unwrap().remove(0);
        assert_eq!(checked.last_checked_at, later);
        assert_eq!(checked.current_ip4, a.current_ip4);

        assert_eq!(store.demote_subdomains_of(domain.id).await.unwrap(), 2);
        assert_eq!(store.demote_subdomains_of(domain.id).await.unwrap(), 0);
        assert_eq!(store.list_subdomains().await.unwrap().iter().filter(|s| s.managed).count(), 1);

        assert!(store.record_check(999, later).await.is_err());
    }
}

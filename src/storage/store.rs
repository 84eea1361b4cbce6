use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{Expense, Invoice, Product, ReturnRecord};

/// One full serialized copy of every ledger collection. Used for durable
/// persistence, backup export, full-overwrite import and reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub products: Vec<Product>,
    pub invoices: Vec<Invoice>,
    pub returns: Vec<ReturnRecord>,
    pub expenses: Vec<Expense>,
}

impl Snapshot {
    pub fn new(
        products: Vec<Product>,
        invoices: Vec<Invoice>,
        returns: Vec<ReturnRecord>,
        expenses: Vec<Expense>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            products,
            invoices,
            returns,
            expenses,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new(), Vec::new())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Durable snapshot persistence: one JSON document on disk, loaded whole at
/// startup and rewritten whole after mutations. Saves are best-effort and sit
/// outside every mutation's atomicity boundary.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    /// Revision of the last snapshot written. Shared across clones of this
    /// store so queued background saves and explicit flushes serialize.
    write_gate: Arc<Mutex<u64>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_gate: Arc::new(Mutex::new(0)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub async fn load(&self) -> Result<Snapshot> {
        let raw = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot from {}", self.path.display()))?;
        let snapshot = serde_json::from_slice(&raw)
            .with_context(|| format!("Failed to parse snapshot at {}", self.path.display()))?;
        Ok(snapshot)
    }

    /// Write the snapshot to a sibling temp file and rename it into place, so
    /// a crash mid-write cannot truncate the last good snapshot. Holding the
    /// gate keeps concurrent writers off the temp file, and a save carrying a
    /// revision at or below the last written one is dropped as stale; returns
    /// whether the snapshot was actually written.
    pub async fn save(&self, snapshot: &Snapshot, revision: u64) -> Result<bool> {
        let mut last_written = self.write_gate.lock().await;
        if revision <= *last_written {
            return Ok(false);
        }
        let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize snapshot")?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write snapshot to {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))?;
        *last_written = revision;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let store = SnapshotStore::new(dir.path().join("shop.json"));

        let mut snapshot = Snapshot::empty();
        snapshot
            .products
            .push(Product::new("Pen", Some("blue ink".into()), 2.0, 5.0, 10));
        assert!(store.save(&snapshot, 1).await?);

        let loaded = store.load().await?;
        assert_eq!(loaded.products.len(), 1);
        assert_eq!(loaded.products[0].name, "Pen");
        assert_eq!(loaded.products[0].stock, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_revision_is_dropped() -> Result<()> {
        let dir = TempDir::new()?;
        let store = SnapshotStore::new(dir.path().join("shop.json"));

        let mut newer = Snapshot::empty();
        newer.products.push(Product::new("Pen", None, 2.0, 5.0, 10));
        assert!(store.save(&newer, 2).await?);

        // A save that lost the race must not clobber the newer snapshot
        assert!(!store.save(&Snapshot::empty(), 1).await?);
        let loaded = store.load().await?;
        assert_eq!(loaded.products.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing.json"));
        assert!(!store.exists());
        assert!(store.load().await.is_err());
    }
}

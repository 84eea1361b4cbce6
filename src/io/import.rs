use anyhow::{Context, Result};
use std::io::Read;

use crate::application::ShopService;
use crate::storage::Snapshot;

/// What a snapshot import brought in.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub products: usize,
    pub invoices: usize,
    pub returns: usize,
    pub expenses: usize,
}

/// Importer for loading a full JSON snapshot into the ledger.
pub struct Importer<'a> {
    service: &'a mut ShopService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a mut ShopService) -> Self {
        Self { service }
    }

    /// Replace all ledger state with the snapshot read from `reader`. This is
    /// a full overwrite, not a merge; existing records are discarded.
    pub fn import_full_json<R: Read>(&mut self, reader: R) -> Result<ImportSummary> {
        let snapshot: Snapshot =
            serde_json::from_reader(reader).context("Failed to parse snapshot document")?;
        let summary = ImportSummary {
            products: snapshot.products.len(),
            invoices: snapshot.invoices.len(),
            returns: snapshot.returns.len(),
            expenses: snapshot.expenses.len(),
        };
        self.service.import_snapshot(snapshot);
        Ok(summary)
    }

    /// Parse and count without touching the ledger.
    pub fn validate_full_json<R: Read>(&self, reader: R) -> Result<ImportSummary> {
        let snapshot: Snapshot =
            serde_json::from_reader(reader).context("Failed to parse snapshot document")?;
        Ok(ImportSummary {
            products: snapshot.products.len(),
            invoices: snapshot.invoices.len(),
            returns: snapshot.returns.len(),
            expenses: snapshot.expenses.len(),
        })
    }
}

use thiserror::Error;

use crate::domain::{ErrorKind, LedgerError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// Classification for user-facing handling; storage failures sit outside
    /// the ledger's error taxonomy.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Ledger(err) => Some(err.kind()),
            AppError::Storage(_) => None,
        }
    }
}

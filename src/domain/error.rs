use thiserror::Error;

use super::ProductId;

/// Entity tag used in lifecycle errors so messages name what was targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Product,
    Invoice,
    Return,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Product => "product",
            Entity::Invoice => "invoice",
            Entity::Return => "return",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad classification of ledger failures, used by callers that only need
/// to distinguish "fix your input" from "wrong id" from "wrong lifecycle state".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i64,
        requested: i64,
    },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("invalid discount: {0}")]
    InvalidDiscount(String),

    #[error("a deletion reason is required")]
    MissingReason,

    #[error("invoice already exists: {0}")]
    DuplicateInvoice(String),

    #[error("invoice {0} is in the recycle bin and cannot accept returns")]
    InvoiceDeleted(String),

    #[error(
        "returning {requested} x {name} exceeds the {sold} sold on invoice {invoice_id} \
         ({already_returned} already returned)"
    )]
    ReturnExceedsSold {
        invoice_id: String,
        product_id: ProductId,
        name: String,
        sold: i64,
        already_returned: i64,
        requested: i64,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("{entity} {id} is already in the recycle bin")]
    AlreadyDeleted { entity: Entity, id: String },

    #[error("{entity} {id} is not in the recycle bin")]
    NotDeleted { entity: Entity, id: String },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InsufficientStock { .. }
            | LedgerError::InvalidQuantity(_)
            | LedgerError::InvalidDiscount(_)
            | LedgerError::MissingReason
            | LedgerError::DuplicateInvoice(_)
            | LedgerError::InvoiceDeleted(_)
            | LedgerError::ReturnExceedsSold { .. } => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::AlreadyDeleted { .. } | LedgerError::NotDeleted { .. } => ErrorKind::State,
        }
    }

    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            LedgerError::MissingReason.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            LedgerError::not_found(Entity::Invoice, "INV-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LedgerError::NotDeleted {
                entity: Entity::Product,
                id: Uuid::new_v4().to_string()
            }
            .kind(),
            ErrorKind::State
        );
    }
}

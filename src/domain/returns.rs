use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recycle::{self, Recyclable};
use super::{Entity, Invoice, LedgerError, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub refund_amount: f64,
    /// Copied from the original sale line, not from the live product.
    pub wholesale_price_at_sale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: String,
    /// Weak reference: the invoice may be deleted or purged independently,
    /// and a dangling id is an expected state, not corruption.
    pub invoice_id: String,
    pub items: Vec<ReturnItem>,
    pub total_refund: f64,
    pub timestamp: DateTime<Utc>,
    pub deletion_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ReturnRecord {
    pub fn new(
        invoice_id: impl Into<String>,
        items: Vec<ReturnItem>,
        total_refund: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("RET-{:06}", Uuid::new_v4().as_u128() % 1_000_000),
            invoice_id: invoice_id.into(),
            items,
            total_refund,
            timestamp,
            deletion_reason: None,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Recyclable for ReturnRecord {
    const ENTITY: Entity = Entity::Return;

    fn entity_id(&self) -> String {
        self.id.clone()
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, reason: String, at: DateTime<Utc>) {
        self.deletion_reason = Some(reason);
        self.deleted_at = Some(at);
    }

    fn mark_restored(&mut self) {
        self.deletion_reason = None;
        self.deleted_at = None;
    }
}

/// Units already returned per product across all non-deleted returns
/// recorded against one invoice.
pub fn returned_quantities(invoice_id: &str, returns: &[ReturnRecord]) -> HashMap<ProductId, i64> {
    let mut totals: HashMap<ProductId, i64> = HashMap::new();
    for record in returns
        .iter()
        .filter(|r| !r.is_deleted() && r.invoice_id == invoice_id)
    {
        for item in &record.items {
            *totals.entry(item.product_id).or_insert(0) += item.quantity;
        }
    }
    totals
}

/// Validate that a proposed return keeps the cumulative returned quantity per
/// product within what the invoice actually sold.
pub fn validate_return(
    invoice: &Invoice,
    items: &[ReturnItem],
    prior_returns: &[ReturnRecord],
) -> Result<(), LedgerError> {
    let already = returned_quantities(&invoice.id, prior_returns);
    let mut pending: HashMap<ProductId, i64> = HashMap::new();

    for item in items {
        if item.quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(format!(
                "return quantity for {} must be positive (got {})",
                item.name, item.quantity
            )));
        }
        let requested = pending.entry(item.product_id).or_insert(0);
        *requested += item.quantity;

        let sold = invoice.quantity_sold(item.product_id);
        let already_returned = already.get(&item.product_id).copied().unwrap_or(0);
        if already_returned + *requested > sold {
            return Err(LedgerError::ReturnExceedsSold {
                invoice_id: invoice.id.clone(),
                product_id: item.product_id,
                name: item.name.clone(),
                sold,
                already_returned,
                requested: *requested,
            });
        }
    }
    Ok(())
}

/// True once every sold quantity on the invoice is covered by non-deleted
/// returns.
pub fn is_fully_returned(invoice: &Invoice, returns: &[ReturnRecord]) -> bool {
    if invoice.items.is_empty() {
        return false;
    }
    let returned = returned_quantities(&invoice.id, returns);
    invoice.items.iter().all(|item| {
        returned.get(&item.product_id).copied().unwrap_or(0) >= invoice.quantity_sold(item.product_id)
    })
}

/// Owns return records tied to invoices by id only.
#[derive(Debug, Default)]
pub struct ReturnLedger {
    returns: Vec<ReturnRecord>,
}

impl ReturnLedger {
    pub fn from_records(returns: Vec<ReturnRecord>) -> Self {
        Self { returns }
    }

    pub fn into_records(self) -> Vec<ReturnRecord> {
        self.returns
    }

    pub fn records(&self) -> &[ReturnRecord] {
        &self.returns
    }

    pub fn get(&self, id: &str) -> Option<&ReturnRecord> {
        self.returns.iter().find(|r| r.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &ReturnRecord> {
        recycle::active(&self.returns)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &ReturnRecord> {
        recycle::deleted(&self.returns)
    }

    /// Record a return against a resolved invoice. The caller resolves the
    /// invoice (and handles restocking); this ledger enforces the sold-quantity
    /// ceiling against its own records.
    pub fn add_return(
        &mut self,
        invoice: &Invoice,
        items: Vec<ReturnItem>,
        timestamp: DateTime<Utc>,
    ) -> Result<&ReturnRecord, LedgerError> {
        if invoice.is_deleted() {
            return Err(LedgerError::InvoiceDeleted(invoice.id.clone()));
        }
        validate_return(invoice, &items, &self.returns)?;
        let total_refund = items.iter().map(|i| i.refund_amount).sum();
        let record = ReturnRecord::new(invoice.id.clone(), items, total_refund, timestamp);
        self.returns.push(record);
        Ok(self.returns.last().unwrap())
    }

    pub fn delete(&mut self, id: &str, reason: &str) -> Result<(), LedgerError> {
        recycle::soft_delete(&mut self.returns, id, reason)
    }

    pub fn restore(&mut self, id: &str) -> Result<(), LedgerError> {
        recycle::restore(&mut self.returns, id)
    }

    pub fn permanently_delete(&mut self, id: &str) -> Result<ReturnRecord, LedgerError> {
        recycle::purge(&mut self.returns, id)
    }

    pub fn empty_bin(&mut self) -> usize {
        recycle::empty_bin(&mut self.returns)
    }
}

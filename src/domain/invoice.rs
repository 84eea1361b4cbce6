use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recycle::{self, Recyclable};
use super::{Entity, LedgerError, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "percentage" | "percent" | "%" => Some(DiscountType::Percentage),
            "fixed" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Completed,
    Returned,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Returned => "returned",
        }
    }
}

/// The absolute discount granted on a pre-discount total.
pub fn discount_amount(total_before_discount: f64, value: f64, discount_type: DiscountType) -> f64 {
    match discount_type {
        DiscountType::Percentage => total_before_discount * value / 100.0,
        DiscountType::Fixed => value,
    }
}

/// Net payable: the discount can wipe the total but never drive it negative.
pub fn net_total(total_before_discount: f64, value: f64, discount_type: DiscountType) -> f64 {
    (total_before_discount - discount_amount(total_before_discount, value, discount_type)).max(0.0)
}

/// A discount can only reduce the payable amount: negative or non-finite
/// values are rejected, and a percentage cannot exceed 100. A fixed discount
/// larger than the total is allowed; the net clamps at zero.
pub fn validate_discount(value: f64, discount_type: DiscountType) -> Result<(), LedgerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::InvalidDiscount(format!(
            "discount cannot be negative (got {value})"
        )));
    }
    if discount_type == DiscountType::Percentage && value > 100.0 {
        return Err(LedgerError::InvalidDiscount(format!(
            "percentage discount cannot exceed 100 (got {value})"
        )));
    }
    Ok(())
}

/// One line of an invoice. This is an immutable historical copy: it never
/// reflects later changes to the live product, so past profit figures stay
/// accurate no matter how prices move afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    /// Weak reference; the product may be deleted or purged independently.
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    /// Price charged per unit.
    pub unit_price: f64,
    /// Moving-average cost at the moment of sale.
    pub wholesale_price_at_sale: f64,
    pub subtotal: f64,
}

impl SaleItem {
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: i64,
        unit_price: f64,
        wholesale_price_at_sale: f64,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            quantity,
            unit_price,
            wholesale_price_at_sale,
            subtotal: quantity as f64 * unit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub items: Vec<SaleItem>,
    pub total_before_discount: f64,
    pub discount_value: f64,
    pub discount_type: DiscountType,
    pub net_total: f64,
    pub timestamp: DateTime<Utc>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    pub deletion_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Invoice {
    /// Build an invoice from line items, computing totals from the discount.
    pub fn new(
        items: Vec<SaleItem>,
        discount_value: f64,
        discount_type: DiscountType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let total_before_discount: f64 = items.iter().map(|i| i.subtotal).sum();
        Self {
            id: generate_invoice_id(),
            items,
            total_before_discount,
            discount_value,
            discount_type,
            net_total: net_total(total_before_discount, discount_value, discount_type),
            timestamp,
            customer_name: None,
            customer_phone: None,
            notes: None,
            status: InvoiceStatus::Completed,
            deletion_reason: None,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_customer(
        mut self,
        name: Option<String>,
        phone: Option<String>,
    ) -> Self {
        self.customer_name = name;
        self.customer_phone = phone;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Units sold for one product across all lines of this invoice.
    pub fn quantity_sold(&self, product_id: ProductId) -> i64 {
        self.items
            .iter()
            .filter(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .sum()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Short human-readable id. Derived from a v4 UUID rather than the clock so
/// two sales in the same instant cannot collide.
fn generate_invoice_id() -> String {
    format!("INV-{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

impl Recyclable for Invoice {
    const ENTITY: Entity = Entity::Invoice;

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

/// Owns the invoice journal: append-mostly, soft-delete lifecycle, no stock
/// side effects at this layer (those belong to the coordinator).
#[derive(Debug, Default)]
pub struct SalesLedger {
    invoices: Vec<Invoice>,
}

impl SalesLedger {
    pub fn from_records(invoices: Vec<Invoice>) -> Self {
        Self { invoices }
    }

    pub fn into_records(self) -> Vec<Invoice> {
        self.invoices
    }

    pub fn records(&self) -> &[Invoice] {
        &self.invoices
    }

    pub fn get(&self, id: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Invoice> {
        recycle::active(&self.invoices)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &Invoice> {
        recycle::deleted(&self.invoices)
    }

    /// An invoice id not present in the journal. The short form is preferred;
    /// once the journal crowds that space the id falls back to the full UUID
    /// form, which cannot realistically collide.
    pub fn next_invoice_id(&self) -> String {
        for _ in 0..16 {
            let id = generate_invoice_id();
            if self.get(&id).is_none() {
                return id;
            }
        }
        loop {
            let id = format!("INV-{}", Uuid::new_v4().simple());
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Append an invoice. Pure insert: stock deduction is the caller's job,
    /// done per sold item before or as part of checkout.
    pub fn save_invoice(&mut self, invoice: Invoice) -> Result<&Invoice, LedgerError> {
        if self.get(&invoice.id).is_some() {
            return Err(LedgerError::DuplicateInvoice(invoice.id));
        }
        self.invoices.push(invoice);
        Ok(self.invoices.last().unwrap())
    }

    pub fn set_status(&mut self, id: &str, status: InvoiceStatus) -> Result<(), LedgerError> {
        let invoice = self
            .invoices
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| LedgerError::not_found(Entity::Invoice, id))?;
        invoice.status = status;
        Ok(())
    }

    pub fn delete(&mut self, id: &str, reason: &str) -> Result<(), LedgerError> {
        recycle::soft_delete(&mut self.invoices, id, reason)
    }

    pub fn restore(&mut self, id: &str) -> Result<(), LedgerError> {
        recycle::restore(&mut self.invoices, id)
    }

    pub fn permanently_delete(&mut self, id: &str) -> Result<Invoice, LedgerError> {
        recycle::purge(&mut self.invoices, id)
    }

    pub fn empty_bin(&mut self) -> usize {
        recycle::empty_bin(&mut self.invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen_item(qty: i64) -> SaleItem {
        SaleItem::new(Uuid::new_v4(), "Pen", qty, 10.0, 4.0)
    }

    #[test]
    fn test_subtotal_is_quantity_times_price() {
        let item = pen_item(3);
        assert_eq!(item.subtotal, 30.0);
    }

    #[test]
    fn test_percentage_discount() {
        // 100 minus 10% -> 90
        assert_eq!(net_total(100.0, 10.0, DiscountType::Percentage), 90.0);
    }

    #[test]
    fn test_fixed_discount_floors_at_zero() {
        assert_eq!(net_total(100.0, 25.0, DiscountType::Fixed), 75.0);
        assert_eq!(net_total(100.0, 250.0, DiscountType::Fixed), 0.0);
    }

    #[test]
    fn test_invoice_totals() {
        let invoice = Invoice::new(
            vec![pen_item(5), pen_item(5)],
            10.0,
            DiscountType::Percentage,
            Utc::now(),
        );
        assert_eq!(invoice.total_before_discount, 100.0);
        assert_eq!(invoice.net_total, 90.0);
        assert_eq!(invoice.status, InvoiceStatus::Completed);
    }

    #[test]
    fn test_duplicate_invoice_id_rejected() {
        let mut ledger = SalesLedger::default();
        let a = Invoice::new(vec![pen_item(1)], 0.0, DiscountType::Fixed, Utc::now())
            .with_id("INV-000001");
        let b = Invoice::new(vec![pen_item(2)], 0.0, DiscountType::Fixed, Utc::now())
            .with_id("INV-000001");
        ledger.save_invoice(a).unwrap();
        assert_eq!(
            ledger.save_invoice(b).unwrap_err(),
            LedgerError::DuplicateInvoice("INV-000001".into())
        );
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn test_discount_bounds() {
        assert!(validate_discount(0.0, DiscountType::Percentage).is_ok());
        assert!(validate_discount(100.0, DiscountType::Percentage).is_ok());
        // A fixed discount larger than the total is fine; the net clamps at zero
        assert!(validate_discount(500.0, DiscountType::Fixed).is_ok());

        assert!(matches!(
            validate_discount(-5.0, DiscountType::Fixed),
            Err(LedgerError::InvalidDiscount(_))
        ));
        assert!(matches!(
            validate_discount(-0.01, DiscountType::Percentage),
            Err(LedgerError::InvalidDiscount(_))
        ));
        assert!(matches!(
            validate_discount(100.5, DiscountType::Percentage),
            Err(LedgerError::InvalidDiscount(_))
        ));
        assert!(matches!(
            validate_discount(f64::NAN, DiscountType::Fixed),
            Err(LedgerError::InvalidDiscount(_))
        ));
    }

    #[test]
    fn test_next_invoice_id_is_unused() {
        let mut ledger = SalesLedger::default();
        ledger
            .save_invoice(
                Invoice::new(vec![pen_item(1)], 0.0, DiscountType::Fixed, Utc::now())
                    .with_id("INV-000001"),
            )
            .unwrap();
        let id = ledger.next_invoice_id();
        assert!(ledger.get(&id).is_none());
        assert!(id.starts_with("INV-"));
    }

    #[test]
    fn test_id_generation_survives_crowded_journal() {
        // Every short-form id taken: the generator must still come back with
        // an unused id instead of handing out a colliding one.
        let invoices: Vec<Invoice> = (0..1_000_000)
            .map(|n| {
                Invoice::new(vec![], 0.0, DiscountType::Fixed, Utc::now())
                    .with_id(format!("INV-{n:06}"))
            })
            .collect();
        let ledger = SalesLedger::from_records(invoices);
        let id = ledger.next_invoice_id();
        assert!(ledger.get(&id).is_none());
    }

    #[test]
    fn test_quantity_sold_sums_across_lines() {
        let id = Uuid::new_v4();
        let invoice = Invoice::new(
            vec![
                SaleItem::new(id, "Pen", 2, 10.0, 4.0),
                SaleItem::new(id, "Pen", 3, 9.0, 4.0),
            ],
            0.0,
            DiscountType::Fixed,
            Utc::now(),
        );
        assert_eq!(invoice.quantity_sold(id), 5);
        assert_eq!(invoice.quantity_sold(Uuid::new_v4()), 0);
    }
}

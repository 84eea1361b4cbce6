use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recycle::{self, Recyclable};
use super::{Entity, LedgerError};

pub type ProductId = Uuid;

/// Weighted-average cost after merging `qty` units bought at `unit_cost` into
/// `old_stock` units carried at `old_cost`. If the merged stock level is not
/// positive there is nothing to average over and the old cost is kept.
pub fn weighted_average_cost(old_stock: i64, old_cost: f64, qty: i64, unit_cost: f64) -> f64 {
    let new_stock = old_stock + qty;
    if new_stock <= 0 {
        return old_cost;
    }
    (old_stock as f64 * old_cost + qty as f64 * unit_cost) / new_stock as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Numeric, barcode-compatible. Uses the EAN-13 in-store prefix (2) so
    /// codes can be printed and scanned without colliding with retail GTINs.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Moving-average unit cost across every stock layer ever merged in.
    pub wholesale_price: f64,
    pub retail_price: f64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub deletion_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        wholesale_price: f64,
        retail_price: f64,
        stock: i64,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            code: format!("2{:012}", id.as_u128() % 1_000_000_000_000),
            name: name.into(),
            description,
            wholesale_price,
            retail_price,
            stock,
            created_at: Utc::now(),
            deletion_reason: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Recyclable for Product {
    const ENTITY: Entity = Entity::Product;

    fn entity_id(&self) -> String {
        self.id.to_string()
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

/// Outcome of an intake: either a brand-new catalog entry or a
/// weighted-average merge into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockIntake {
    Created(ProductId),
    Merged(ProductId),
}

impl StockIntake {
    pub fn product_id(&self) -> ProductId {
        match self {
            StockIntake::Created(id) | StockIntake::Merged(id) => *id,
        }
    }
}

/// Owns product records, stock levels and moving-average cost.
/// Invariant: stock never goes negative.
#[derive(Debug, Default)]
pub struct ProductLedger {
    products: Vec<Product>,
}

impl ProductLedger {
    pub fn from_records(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn into_records(self) -> Vec<Product> {
        self.products
    }

    pub fn records(&self) -> &[Product] {
        &self.products
    }

    /// Lookup by id regardless of lifecycle state, so historical invoices can
    /// still render deleted products.
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: ProductId) -> Result<&mut Product, LedgerError> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LedgerError::not_found(Entity::Product, id))
    }

    pub fn active(&self) -> impl Iterator<Item = &Product> {
        recycle::active(&self.products)
    }

    pub fn deleted(&self) -> impl Iterator<Item = &Product> {
        recycle::deleted(&self.products)
    }

    /// The single lookup-and-merge policy for matching intake against the
    /// active catalog: trimmed, case-insensitive name equality.
    pub fn find_active_by_name(&self, name: &str) -> Option<&Product> {
        let wanted = name.trim().to_lowercase();
        self.active()
            .find(|p| p.name.trim().to_lowercase() == wanted)
    }

    /// Take in new stock. An active product with the same name absorbs it as
    /// a weighted-average merge (retail price and description are overwritten,
    /// last write wins); otherwise a fresh product is created at `cost_price`.
    pub fn add_or_merge_stock(
        &mut self,
        name: &str,
        description: Option<String>,
        cost_price: f64,
        retail_price: f64,
        qty: i64,
    ) -> Result<StockIntake, LedgerError> {
        if qty < 0 {
            return Err(LedgerError::InvalidQuantity(format!(
                "intake quantity cannot be negative (got {qty})"
            )));
        }
        if let Some(existing) = self.find_active_by_name(name) {
            let id = existing.id;
            self.update_stock_wac(id, qty, cost_price, Some(retail_price), description)?;
            Ok(StockIntake::Merged(id))
        } else {
            let product = Product::new(name.trim(), description, cost_price, retail_price, qty);
            let id = product.id;
            self.products.push(product);
            Ok(StockIntake::Created(id))
        }
    }

    /// Merge `qty` units at `unit_cost` into a product, recomputing the
    /// moving-average cost. This is the only place cost is ever recomputed;
    /// returns and restocks deliberately bypass it.
    pub fn update_stock_wac(
        &mut self,
        id: ProductId,
        qty: i64,
        unit_cost: f64,
        retail_override: Option<f64>,
        description_override: Option<String>,
    ) -> Result<&Product, LedgerError> {
        let product = self.get_mut(id)?;
        let new_stock = product.stock + qty;
        if new_stock < 0 {
            return Err(LedgerError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                available: product.stock,
                requested: -qty,
            });
        }
        product.wholesale_price =
            weighted_average_cost(product.stock, product.wholesale_price, qty, unit_cost);
        product.stock = new_stock;
        if let Some(retail) = retail_override {
            product.retail_price = retail;
        }
        if let Some(description) = description_override {
            product.description = Some(description);
        }
        Ok(product)
    }

    /// Remove `qty` units from stock, all or nothing.
    pub fn deduct_stock(&mut self, id: ProductId, qty: i64) -> Result<&Product, LedgerError> {
        if qty <= 0 {
            return Err(LedgerError::InvalidQuantity(format!(
                "deduction quantity must be positive (got {qty})"
            )));
        }
        let product = self.get_mut(id)?;
        if qty > product.stock {
            return Err(LedgerError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                available: product.stock,
                requested: qty,
            });
        }
        product.stock -= qty;
        Ok(product)
    }

    /// Put `qty` units back on the shelf. Never adjusts cost: goods coming
    /// back were already averaged in when they were first bought.
    pub fn restock_item(&mut self, id: ProductId, qty: i64) -> Result<&Product, LedgerError> {
        if qty <= 0 {
            return Err(LedgerError::InvalidQuantity(format!(
                "restock quantity must be positive (got {qty})"
            )));
        }
        let product = self.get_mut(id)?;
        product.stock += qty;
        Ok(product)
    }

    pub fn delete(&mut self, id: ProductId, reason: &str) -> Result<(), LedgerError> {
        recycle::soft_delete(&mut self.products, &id.to_string(), reason)
    }

    pub fn restore(&mut self, id: ProductId) -> Result<(), LedgerError> {
        recycle::restore(&mut self.products, &id.to_string())
    }

    pub fn permanently_delete(&mut self, id: ProductId) -> Result<Product, LedgerError> {
        recycle::purge(&mut self.products, &id.to_string())
    }

    pub fn empty_bin(&mut self) -> usize {
        recycle::empty_bin(&mut self.products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_average_cost() {
        // 10 units at 2.0 merged with 10 units at 4.0 -> 3.0
        assert_eq!(weighted_average_cost(10, 2.0, 10, 4.0), 3.0);
        // Merging into empty stock takes the new cost
        assert_eq!(weighted_average_cost(0, 0.0, 5, 7.5), 7.5);
        // Zero resulting stock keeps the old cost
        assert_eq!(weighted_average_cost(0, 9.0, 0, 4.0), 9.0);
    }

    #[test]
    fn test_intake_creates_then_merges() {
        let mut ledger = ProductLedger::default();
        let intake = ledger
            .add_or_merge_stock("Pen", Some("blue ink".into()), 2.0, 5.0, 10)
            .unwrap();
        let id = match intake {
            StockIntake::Created(id) => id,
            StockIntake::Merged(_) => panic!("expected a new product"),
        };
        let pen = ledger.get(id).unwrap();
        assert_eq!(pen.stock, 10);
        assert_eq!(pen.wholesale_price, 2.0);

        // Same name, different case: merges instead of duplicating
        let intake = ledger
            .add_or_merge_stock("PEN", None, 4.0, 6.0, 10)
            .unwrap();
        assert_eq!(intake, StockIntake::Merged(id));
        let pen = ledger.get(id).unwrap();
        assert_eq!(pen.stock, 20);
        assert!((pen.wholesale_price - 3.0).abs() < 1e-9);
        assert_eq!(pen.retail_price, 6.0);
        assert_eq!(ledger.active().count(), 1);
    }

    #[test]
    fn test_intake_ignores_deleted_products() {
        let mut ledger = ProductLedger::default();
        let id = ledger
            .add_or_merge_stock("Pen", None, 2.0, 5.0, 10)
            .unwrap()
            .product_id();
        ledger.delete(id, "discontinued").unwrap();

        // A deleted product must not absorb new stock
        let intake = ledger.add_or_merge_stock("Pen", None, 2.0, 5.0, 3).unwrap();
        assert!(matches!(intake, StockIntake::Created(_)));
        assert_ne!(intake.product_id(), id);
    }

    #[test]
    fn test_deduct_is_all_or_nothing() {
        let mut ledger = ProductLedger::default();
        let id = ledger
            .add_or_merge_stock("Pen", None, 2.0, 5.0, 3)
            .unwrap()
            .product_id();

        let err = ledger.deduct_stock(id, 5).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { available: 3, requested: 5, .. }));
        assert_eq!(ledger.get(id).unwrap().stock, 3);

        ledger.deduct_stock(id, 3).unwrap();
        assert_eq!(ledger.get(id).unwrap().stock, 0);
    }

    #[test]
    fn test_restock_never_touches_cost() {
        let mut ledger = ProductLedger::default();
        let id = ledger
            .add_or_merge_stock("Pen", None, 2.0, 5.0, 10)
            .unwrap()
            .product_id();
        ledger.restock_item(id, 5).unwrap();
        let pen = ledger.get(id).unwrap();
        assert_eq!(pen.stock, 15);
        assert_eq!(pen.wholesale_price, 2.0);
    }

    #[test]
    fn test_wac_with_zero_stock_keeps_cost() {
        let mut ledger = ProductLedger::default();
        let id = ledger
            .add_or_merge_stock("Pen", None, 2.0, 5.0, 4)
            .unwrap()
            .product_id();
        ledger.deduct_stock(id, 4).unwrap();
        // qty 0 into stock 0: stock stays 0, cost unchanged
        ledger.update_stock_wac(id, 0, 99.0, None, None).unwrap();
        let pen = ledger.get(id).unwrap();
        assert_eq!(pen.stock, 0);
        assert_eq!(pen.wholesale_price, 2.0);
    }

    #[test]
    fn test_deleted_product_still_retrievable_by_id() {
        let mut ledger = ProductLedger::default();
        let id = ledger
            .add_or_merge_stock("Pen", None, 2.0, 5.0, 1)
            .unwrap()
            .product_id();
        ledger.delete(id, "shelf damage").unwrap();
        assert_eq!(ledger.active().count(), 0);
        assert!(ledger.get(id).is_some());
    }

    #[test]
    fn test_product_code_is_numeric_ean_length() {
        let product = Product::new("Pen", None, 1.0, 2.0, 0);
        assert_eq!(product.code.len(), 13);
        assert!(product.code.starts_with('2'));
        assert!(product.code.chars().all(|c| c.is_ascii_digit()));
    }
}

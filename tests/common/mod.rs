#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use dukkan::application::{AppError, SaleLine, ShopService};
use dukkan::domain::{DiscountType, Invoice, ProductId};
use tempfile::TempDir;

/// A fresh shop ledger backed by a temp directory. The directory guard must
/// outlive the service or the snapshot file disappears under it.
pub async fn test_service() -> Result<(ShopService, TempDir)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("shop.json");
    let service = ShopService::init(path.to_str().unwrap()).await?;
    Ok((service, dir))
}

/// Stock a product and return its id.
pub fn stock_product(
    service: &mut ShopService,
    name: &str,
    cost: f64,
    retail: f64,
    qty: i64,
) -> Result<ProductId> {
    let intake = service.add_or_merge_stock(name, None, cost, retail, qty)?;
    Ok(intake.product_id())
}

/// Sell `qty` units of one product with no discount.
pub fn sell(
    service: &mut ShopService,
    product_id: ProductId,
    qty: i64,
) -> Result<Invoice, AppError> {
    let invoice = service.record_sale(
        &[SaleLine {
            product_id,
            quantity: qty,
        }],
        0.0,
        DiscountType::Fixed,
        None,
        None,
        None,
        Utc::now(),
    )?;
    Ok(invoice)
}

mod common;

use anyhow::Result;
use dukkan::application::AppError;
use dukkan::domain::{LedgerError, StockIntake};

use common::{stock_product, test_service};

#[tokio::test]
async fn test_intake_merges_at_weighted_average_cost() -> Result<()> {
    let (mut service, _dir) = test_service().await?;

    // 10 pens at 2.00, then 10 more at 4.00: average lands on 3.00
    let id = stock_product(&mut service, "Pen", 2.0, 5.0, 10)?;
    let intake = service.add_or_merge_stock("Pen", None, 4.0, 5.0, 10)?;
    assert_eq!(intake, StockIntake::Merged(id));

    let pen = service.get_product(id).unwrap();
    assert_eq!(pen.stock, 20);
    assert!((pen.wholesale_price - 3.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test]
async fn test_different_names_create_separate_products() -> Result<()> {
    let (mut service, _dir) = test_service().await?;

    let pen = stock_product(&mut service, "Pen", 2.0, 5.0, 10)?;
    let pencil = stock_product(&mut service, "Pencil", 1.0, 3.0, 10)?;
    assert_ne!(pen, pencil);
    assert_eq!(service.active_products().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_deduct_rejects_overdraw_and_leaves_stock_intact() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let id = stock_product(&mut service, "Pen", 2.0, 5.0, 3)?;

    let err = service.deduct_stock(id, 5).unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InsufficientStock {
            available: 3,
            requested: 5,
            ..
        })
    ));
    assert_eq!(service.get_product(id).unwrap().stock, 3);
    Ok(())
}

#[tokio::test]
async fn test_restock_adds_units_without_touching_cost() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let id = stock_product(&mut service, "Pen", 2.0, 5.0, 10)?;

    service.restock_product(id, 5)?;
    let pen = service.get_product(id).unwrap();
    assert_eq!(pen.stock, 15);
    assert_eq!(pen.wholesale_price, 2.0);
    Ok(())
}

#[tokio::test]
async fn test_stock_merge_overrides_retail_last_write_wins() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let id = stock_product(&mut service, "Pen", 2.0, 5.0, 10)?;

    let pen = service.update_stock_wac(id, 10, 2.0, Some(6.5), Some("gel tip".into()))?;
    assert_eq!(pen.retail_price, 6.5);
    assert_eq!(pen.description.as_deref(), Some("gel tip"));
    assert_eq!(pen.stock, 20);
    Ok(())
}

#[tokio::test]
async fn test_inventory_report_valuation() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    stock_product(&mut service, "Pen", 2.0, 5.0, 10)?;
    stock_product(&mut service, "Notebook", 10.0, 20.0, 3)?;
    stock_product(&mut service, "Eraser", 0.5, 1.0, 0)?;

    let report = service.inventory_report();
    assert_eq!(report.product_count, 3);
    assert_eq!(report.total_pieces, 13);
    assert!((report.stock_value_at_cost - (20.0 + 30.0)).abs() < 1e-9);
    assert!((report.stock_value_at_retail - (50.0 + 60.0)).abs() < 1e-9);
    assert_eq!(report.out_of_stock, 1);
    // Only Notebook at 3: zero stock counts as out, not low
    assert_eq!(report.low_stock, 1);
    Ok(())
}

mod common;

use anyhow::Result;
use chrono::Utc;
use dukkan::application::{AppError, SaleLine};
use dukkan::domain::{DiscountType, InvoiceStatus, LedgerError};

use common::{sell, stock_product, test_service};

#[tokio::test]
async fn test_checkout_deducts_stock_and_computes_totals() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let id = stock_product(&mut service, "Pen", 4.0, 10.0, 20)?;

    let invoice = service.record_sale(
        &[SaleLine {
            product_id: id,
            quantity: 10,
        }],
        10.0,
        DiscountType::Percentage,
        Some("Ada".into()),
        None,
        None,
        Utc::now(),
    )?;

    // 10 x 10.00 minus 10% -> 90.00
    assert_eq!(invoice.total_before_discount, 100.0);
    assert_eq!(invoice.net_total, 90.0);
    assert_eq!(invoice.status, InvoiceStatus::Completed);
    assert_eq!(invoice.customer_name.as_deref(), Some("Ada"));
    assert_eq!(service.get_product(id).unwrap().stock, 10);
    Ok(())
}

#[tokio::test]
async fn test_checkout_snapshots_prices_and_costs() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let id = stock_product(&mut service, "Pen", 4.0, 10.0, 20)?;
    let invoice = sell(&mut service, id, 2)?;

    // Later price and cost changes must not leak into the recorded sale
    service.update_stock_wac(id, 10, 8.0, Some(12.0), None)?;
    let recorded = service.get_invoice(&invoice.id).unwrap();
    assert_eq!(recorded.items[0].unit_price, 10.0);
    assert_eq!(recorded.items[0].wholesale_price_at_sale, 4.0);
    Ok(())
}

#[tokio::test]
async fn test_checkout_is_all_or_nothing_across_lines() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 20)?;
    let pad = stock_product(&mut service, "Notepad", 5.0, 12.0, 1)?;

    let err = service
        .record_sale(
            &[
                SaleLine {
                    product_id: pen,
                    quantity: 5,
                },
                SaleLine {
                    product_id: pad,
                    quantity: 2,
                },
            ],
            0.0,
            DiscountType::Fixed,
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InsufficientStock { available: 1, requested: 2, .. })
    ));
    // Nothing moved, not even the pen line that would have fit
    assert_eq!(service.get_product(pen).unwrap().stock, 20);
    assert_eq!(service.get_product(pad).unwrap().stock, 1);
    assert!(service.active_invoices().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_checkout_aggregates_duplicate_lines() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 5)?;

    // Two lines for the same product asking 3 + 3 against stock 5
    let err = service
        .record_sale(
            &[
                SaleLine {
                    product_id: pen,
                    quantity: 3,
                },
                SaleLine {
                    product_id: pen,
                    quantity: 3,
                },
            ],
            0.0,
            DiscountType::Fixed,
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InsufficientStock { available: 5, requested: 6, .. })
    ));
    assert_eq!(service.get_product(pen).unwrap().stock, 5);
    Ok(())
}

#[tokio::test]
async fn test_checkout_rejects_empty_and_deleted() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 5)?;

    let err = service
        .record_sale(&[], 0.0, DiscountType::Fixed, None, None, None, Utc::now())
        .unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::InvalidQuantity(_))));

    service.delete_product(pen, "discontinued")?;
    let err = sell(&mut service, pen, 1).unwrap_err();
    assert!(matches!(err, AppError::Ledger(LedgerError::NotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn test_negative_discount_rejected() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 5)?;

    let err = service
        .record_sale(
            &[SaleLine {
                product_id: pen,
                quantity: 1,
            }],
            -10.0,
            DiscountType::Fixed,
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InvalidDiscount(_))
    ));
    // Rejected before anything moved
    assert_eq!(service.get_product(pen).unwrap().stock, 5);
    assert!(service.active_invoices().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_percentage_discount_capped_at_100() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 5)?;

    let err = service
        .record_sale(
            &[SaleLine {
                product_id: pen,
                quantity: 1,
            }],
            150.0,
            DiscountType::Percentage,
            None,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Ledger(LedgerError::InvalidDiscount(_))
    ));

    // A full 100% giveaway is still a valid sale
    let invoice = service.record_sale(
        &[SaleLine {
            product_id: pen,
            quantity: 1,
        }],
        100.0,
        DiscountType::Percentage,
        None,
        None,
        None,
        Utc::now(),
    )?;
    assert_eq!(invoice.net_total, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_fixed_discount_cannot_go_negative() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 5)?;

    let invoice = service.record_sale(
        &[SaleLine {
            product_id: pen,
            quantity: 1,
        }],
        500.0,
        DiscountType::Fixed,
        None,
        None,
        None,
        Utc::now(),
    )?;
    assert_eq!(invoice.net_total, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_sales_report_over_recorded_sales() -> Result<()> {
    let (mut service, _dir) = test_service().await?;
    let pen = stock_product(&mut service, "Pen", 4.0, 10.0, 20)?;
    sell(&mut service, pen, 10)?;
    service.add_expense("Rent", 10.0, "premises", Utc::now())?;

    let report = service.sales_report(None, None);
    assert_eq!(report.transaction_count, 1);
    assert_eq!(report.units_sold, 10);
    assert_eq!(report.net_revenue, 100.0);
    assert_eq!(report.cost_of_goods, 40.0);
    assert_eq!(report.total_expenses, 10.0);
    assert_eq!(report.net_profit, 50.0);
    Ok(())
}

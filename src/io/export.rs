use anyhow::Result;
use std::io::Write;

use crate::application::ShopService;
use crate::storage::Snapshot;

/// Exporter for converting ledger data to external formats. Works off
/// point-in-time copies and never mutates ledger state.
pub struct Exporter<'a> {
    service: &'a ShopService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a ShopService) -> Self {
        Self { service }
    }

    /// Export the active catalog to CSV.
    pub fn export_products_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let products = self.service.active_products();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "code",
            "name",
            "description",
            "wholesale_price",
            "retail_price",
            "stock",
            "stock_value_at_cost",
            "stock_value_at_retail",
        ])?;

        let mut count = 0;
        for product in &products {
            csv_writer.write_record([
                product.id.to_string(),
                product.code.clone(),
                product.name.clone(),
                product.description.clone().unwrap_or_default(),
                product.wholesale_price.to_string(),
                product.retail_price.to_string(),
                product.stock.to_string(),
                (product.stock as f64 * product.wholesale_price).to_string(),
                (product.stock as f64 * product.retail_price).to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export active invoices to CSV, one row per line item so spreadsheet
    /// tools can pivot on products.
    pub fn export_invoices_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let invoices = self.service.active_invoices();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "invoice_id",
            "timestamp",
            "customer",
            "status",
            "product",
            "quantity",
            "unit_price",
            "subtotal",
            "invoice_net_total",
        ])?;

        let mut count = 0;
        for invoice in &invoices {
            for item in &invoice.items {
                csv_writer.write_record([
                    invoice.id.clone(),
                    invoice.timestamp.to_rfc3339(),
                    invoice.customer_name.clone().unwrap_or_default(),
                    invoice.status.as_str().to_string(),
                    item.name.clone(),
                    item.quantity.to_string(),
                    item.unit_price.to_string(),
                    item.subtotal.to_string(),
                    invoice.net_total.to_string(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export active returns to CSV, one row per returned item.
    pub fn export_returns_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let returns = self.service.active_returns();
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "return_id",
            "invoice_id",
            "timestamp",
            "product",
            "quantity",
            "refund_amount",
            "total_refund",
        ])?;

        let mut count = 0;
        for record in &returns {
            for item in &record.items {
                csv_writer.write_record([
                    record.id.clone(),
                    record.invoice_id.clone(),
                    record.timestamp.to_rfc3339(),
                    item.name.clone(),
                    item.quantity.to_string(),
                    item.refund_amount.to_string(),
                    record.total_refund.to_string(),
                ])?;
                count += 1;
            }
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full ledger state as a JSON snapshot document, suitable for
    /// backup and later full-overwrite import.
    pub fn export_full_json<W: Write>(&self, mut writer: W) -> Result<Snapshot> {
        let snapshot = self.service.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        Ok(snapshot)
    }
}

use chrono::{DateTime, Utc};

use crate::domain::{
    DiscountType, Entity, Expense, ExpenseLedger, Invoice, InvoiceStatus, LedgerError, Product,
    ProductId, ProductLedger, ReturnItem, ReturnLedger, ReturnRecord, SaleItem, SalesLedger,
    StockIntake, is_fully_returned, validate_discount,
};
use crate::storage::{Snapshot, SnapshotStore};

use super::reporting::{
    InventoryReport, SalesReport, build_inventory_report, build_sales_report,
};
use super::AppError;

/// The whole ledger state: one explicit context object owned by a single
/// service instance and passed through it, never ambient globals.
#[derive(Debug, Default)]
pub struct ShopState {
    pub products: ProductLedger,
    pub sales: SalesLedger,
    pub returns: ReturnLedger,
    pub expenses: ExpenseLedger,
}

impl ShopState {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            products: ProductLedger::from_records(snapshot.products),
            sales: SalesLedger::from_records(snapshot.invoices),
            returns: ReturnLedger::from_records(snapshot.returns),
            expenses: ExpenseLedger::from_records(snapshot.expenses),
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.products.records().to_vec(),
            self.sales.records().to_vec(),
            self.returns.records().to_vec(),
            self.expenses.records().to_vec(),
        )
    }
}

/// One line of a sale as requested by the caller; prices are snapshotted from
/// the live catalog at checkout.
#[derive(Debug, Clone)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One line of a return as requested by the caller.
#[derive(Debug, Clone)]
pub struct ReturnLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub refund_amount: f64,
}

/// The shop service: owns the ledgers and the snapshot store and hosts every
/// operation whose correctness spans ledger boundaries. This is the primary
/// interface for any client (CLI, exports, a future UI).
///
/// Single logical mutator: each mutation fully validates, then applies, then
/// queues a best-effort background snapshot save. Persistence is outside the
/// mutation's atomicity boundary; a crash between commit and flush can lose
/// the latest change.
pub struct ShopService {
    state: ShopState,
    store: SnapshotStore,
    /// Bumped on every committed mutation; stamps queued saves so a slow
    /// background write can never clobber a newer snapshot.
    revision: u64,
}

impl ShopService {
    pub fn new(state: ShopState, store: SnapshotStore) -> Self {
        Self {
            state,
            store,
            revision: 0,
        }
    }

    /// Create a fresh, empty shop ledger at the given path.
    pub async fn init(path: &str) -> Result<Self, AppError> {
        let store = SnapshotStore::new(path);
        let mut service = Self::new(ShopState::default(), store);
        service.revision = 1;
        service.flush().await?;
        Ok(service)
    }

    /// Open an existing shop ledger from its snapshot file.
    pub async fn open(path: &str) -> Result<Self, AppError> {
        let store = SnapshotStore::new(path);
        let snapshot = store.load().await?;
        Ok(Self::new(ShopState::from_snapshot(snapshot), store))
    }

    /// Point-in-time copy of all ledger collections. Exporters and report
    /// generators read these copies and can never mutate ledger state.
    pub fn snapshot(&self) -> Snapshot {
        self.state.to_snapshot()
    }

    /// Write the current state out and wait for it. Callers use this at
    /// teardown; routine mutations rely on the queued background save. If a
    /// queued save already wrote this revision the flush is a no-op.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.store.save(&self.snapshot(), self.revision).await?;
        Ok(())
    }

    /// Fire-and-forget persistence after a committed mutation. Failures are
    /// logged, never propagated into the mutation result.
    fn queue_save(&mut self) {
        self.revision += 1;
        let revision = self.revision;
        let store = self.store.clone();
        let snapshot = self.snapshot();
        tokio::spawn(async move {
            if let Err(err) = store.save(&snapshot, revision).await {
                tracing::warn!(
                    path = %store.path().display(),
                    "background snapshot save failed: {err:#}"
                );
            }
        });
    }

    // ========================
    // Product operations
    // ========================

    pub fn add_or_merge_stock(
        &mut self,
        name: &str,
        description: Option<String>,
        cost_price: f64,
        retail_price: f64,
        qty: i64,
    ) -> Result<StockIntake, AppError> {
        let intake = self
            .state
            .products
            .add_or_merge_stock(name, description, cost_price, retail_price, qty)?;
        self.queue_save();
        Ok(intake)
    }

    pub fn update_stock_wac(
        &mut self,
        id: ProductId,
        qty: i64,
        unit_cost: f64,
        retail_override: Option<f64>,
        description_override: Option<String>,
    ) -> Result<Product, AppError> {
        let product = self
            .state
            .products
            .update_stock_wac(id, qty, unit_cost, retail_override, description_override)?
            .clone();
        self.queue_save();
        Ok(product)
    }

    pub fn deduct_stock(&mut self, id: ProductId, qty: i64) -> Result<Product, AppError> {
        let product = self.state.products.deduct_stock(id, qty)?.clone();
        self.queue_save();
        Ok(product)
    }

    pub fn restock_product(&mut self, id: ProductId, qty: i64) -> Result<Product, AppError> {
        let product = self.state.products.restock_item(id, qty)?.clone();
        self.queue_save();
        Ok(product)
    }

    pub fn delete_product(&mut self, id: ProductId, reason: &str) -> Result<(), AppError> {
        self.state.products.delete(id, reason)?;
        self.queue_save();
        Ok(())
    }

    pub fn restore_product(&mut self, id: ProductId) -> Result<(), AppError> {
        self.state.products.restore(id)?;
        self.queue_save();
        Ok(())
    }

    pub fn purge_product(&mut self, id: ProductId) -> Result<Product, AppError> {
        let product = self.state.products.permanently_delete(id)?;
        self.queue_save();
        Ok(product)
    }

    pub fn empty_product_bin(&mut self) -> usize {
        let purged = self.state.products.empty_bin();
        self.queue_save();
        purged
    }

    pub fn active_products(&self) -> Vec<Product> {
        self.state.products.active().cloned().collect()
    }

    pub fn deleted_products(&self) -> Vec<Product> {
        self.state.products.deleted().cloned().collect()
    }

    pub fn get_product(&self, id: ProductId) -> Option<Product> {
        self.state.products.get(id).cloned()
    }

    // ========================
    // Sales operations
    // ========================

    /// Checkout: snapshot prices and costs from the live catalog, validate
    /// stock for every line, then deduct all lines and append the invoice.
    /// Two-phase: nothing is mutated if any line would overdraw stock.
    pub fn record_sale(
        &mut self,
        lines: &[SaleLine],
        discount_value: f64,
        discount_type: DiscountType,
        customer_name: Option<String>,
        customer_phone: Option<String>,
        notes: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Invoice, AppError> {
        if lines.is_empty() {
            return Err(LedgerError::InvalidQuantity("a sale needs at least one line".into()).into());
        }
        validate_discount(discount_value, discount_type)?;

        // Phase 1: validate every line against the active catalog and build
        // the immutable sale item snapshots.
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self
                .state
                .products
                .get(line.product_id)
                .filter(|p| !p.is_deleted())
                .ok_or_else(|| LedgerError::not_found(Entity::Product, line.product_id))?;
            if line.quantity <= 0 {
                return Err(LedgerError::InvalidQuantity(format!(
                    "sale quantity for {} must be positive (got {})",
                    product.name, line.quantity
                ))
                .into());
            }
            items.push(SaleItem::new(
                product.id,
                product.name.clone(),
                line.quantity,
                product.retail_price,
                product.wholesale_price,
            ));
        }
        for (product_id, required) in aggregate_quantities(lines) {
            let product = self
                .state
                .products
                .get(product_id)
                .ok_or_else(|| LedgerError::not_found(Entity::Product, product_id))?;
            if required > product.stock {
                return Err(LedgerError::InsufficientStock {
                    product_id,
                    name: product.name.clone(),
                    available: product.stock,
                    requested: required,
                }
                .into());
            }
        }

        // Phase 2: apply. The invoice id is resolved against the journal
        // before any deduction so the append below cannot fail on an id
        // collision after stock has already moved.
        let id = self.state.sales.next_invoice_id();
        for line in lines {
            self.state.products.deduct_stock(line.product_id, line.quantity)?;
        }
        let invoice = Invoice::new(items, discount_value, discount_type, timestamp)
            .with_id(id)
            .with_customer(customer_name, customer_phone);
        let invoice = match notes {
            Some(notes) => invoice.with_notes(notes),
            None => invoice,
        };
        let invoice = self.state.sales.save_invoice(invoice)?.clone();
        self.queue_save();
        Ok(invoice)
    }

    /// Append a pre-built invoice. Pure insert; stock is not touched.
    pub fn save_invoice(&mut self, invoice: Invoice) -> Result<Invoice, AppError> {
        let invoice = self.state.sales.save_invoice(invoice)?.clone();
        self.queue_save();
        Ok(invoice)
    }

    /// Soft-delete an invoice, optionally putting its goods back on the
    /// shelf. The restock direction has no capacity ceiling and always
    /// succeeds; products that have since been purged are skipped.
    pub fn delete_invoice_with_stock(
        &mut self,
        id: &str,
        reason: &str,
        restore_stock: bool,
    ) -> Result<(), AppError> {
        if reason.trim().is_empty() {
            return Err(LedgerError::MissingReason.into());
        }
        let invoice = self
            .state
            .sales
            .get(id)
            .ok_or_else(|| LedgerError::not_found(Entity::Invoice, id))?;
        if invoice.is_deleted() {
            return Err(LedgerError::AlreadyDeleted {
                entity: Entity::Invoice,
                id: id.to_string(),
            }
            .into());
        }

        if restore_stock {
            let items: Vec<(ProductId, i64)> = invoice
                .items
                .iter()
                .map(|item| (item.product_id, item.quantity))
                .collect();
            for (product_id, quantity) in items {
                if quantity > 0 && self.state.products.get(product_id).is_some() {
                    self.state.products.restock_item(product_id, quantity)?;
                }
            }
        }
        self.state.sales.delete(id, reason)?;
        self.queue_save();
        Ok(())
    }

    /// Restore a soft-deleted invoice, optionally re-deducting its goods.
    /// Two-phase: a read-only pre-flight checks every line against current
    /// stock and aborts on the first insufficient item with no mutation; only
    /// then are the deductions applied and the invoice flipped Active.
    pub fn restore_invoice_with_stock(
        &mut self,
        id: &str,
        deduct_stock: bool,
    ) -> Result<(), AppError> {
        let invoice = self
            .state
            .sales
            .get(id)
            .ok_or_else(|| LedgerError::not_found(Entity::Invoice, id))?;
        if !invoice.is_deleted() {
            return Err(LedgerError::NotDeleted {
                entity: Entity::Invoice,
                id: id.to_string(),
            }
            .into());
        }

        if deduct_stock {
            let items = invoice.items.clone();
            let lines: Vec<SaleLine> = items
                .iter()
                .map(|item| SaleLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect();
            let required_per_product = aggregate_quantities(&lines);

            // Pre-flight: no mutation happens in this loop. A product that
            // vanished since the sale counts as zero available.
            for (product_id, required) in &required_per_product {
                let available = self
                    .state
                    .products
                    .get(*product_id)
                    .map(|p| p.stock)
                    .unwrap_or(0);
                if *required > available {
                    let name = items
                        .iter()
                        .find(|i| i.product_id == *product_id)
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| product_id.to_string());
                    return Err(LedgerError::InsufficientStock {
                        product_id: *product_id,
                        name,
                        available,
                        requested: *required,
                    }
                    .into());
                }
            }
            for (product_id, required) in required_per_product {
                if required > 0 {
                    self.state.products.deduct_stock(product_id, required)?;
                }
            }
        }
        self.state.sales.restore(id)?;
        self.queue_save();
        Ok(())
    }

    pub fn purge_invoice(&mut self, id: &str) -> Result<Invoice, AppError> {
        let invoice = self.state.sales.permanently_delete(id)?;
        self.queue_save();
        Ok(invoice)
    }

    pub fn empty_invoice_bin(&mut self) -> usize {
        let purged = self.state.sales.empty_bin();
        self.queue_save();
        purged
    }

    pub fn active_invoices(&self) -> Vec<Invoice> {
        self.state.sales.active().cloned().collect()
    }

    pub fn deleted_invoices(&self) -> Vec<Invoice> {
        self.state.sales.deleted().cloned().collect()
    }

    pub fn get_invoice(&self, id: &str) -> Option<Invoice> {
        self.state.sales.get(id).cloned()
    }

    // ========================
    // Return operations
    // ========================

    /// Record a return against an invoice: validate the sold-quantity ceiling,
    /// append the record, put the goods back on the shelf (never recomputing
    /// cost), and refresh the invoice's returned status.
    pub fn add_return(
        &mut self,
        invoice_id: &str,
        lines: &[ReturnLine],
        timestamp: DateTime<Utc>,
    ) -> Result<ReturnRecord, AppError> {
        let invoice = self
            .state
            .sales
            .get(invoice_id)
            .ok_or_else(|| LedgerError::not_found(Entity::Invoice, invoice_id))?
            .clone();

        // Names and cost snapshots come from the original sale lines, not the
        // live catalog.
        let items: Vec<ReturnItem> = lines
            .iter()
            .map(|line| {
                let sold = invoice.items.iter().find(|i| i.product_id == line.product_id);
                ReturnItem {
                    product_id: line.product_id,
                    name: sold
                        .map(|i| i.name.clone())
                        .unwrap_or_else(|| line.product_id.to_string()),
                    quantity: line.quantity,
                    refund_amount: line.refund_amount,
                    wholesale_price_at_sale: sold.map(|i| i.wholesale_price_at_sale).unwrap_or(0.0),
                }
            })
            .collect();

        let record = self
            .state
            .returns
            .add_return(&invoice, items, timestamp)?
            .clone();

        // Unconditional restock of returned goods; a purged product simply
        // has nowhere to go back to.
        for item in &record.items {
            if item.quantity > 0 && self.state.products.get(item.product_id).is_some() {
                self.state.products.restock_item(item.product_id, item.quantity)?;
            }
        }
        self.refresh_invoice_status(invoice_id)?;
        self.queue_save();
        Ok(record)
    }

    /// Lifecycle only: deleting a return never touches stock.
    pub fn delete_return(&mut self, id: &str, reason: &str) -> Result<(), AppError> {
        let invoice_id = self
            .state
            .returns
            .get(id)
            .map(|r| r.invoice_id.clone())
            .ok_or_else(|| LedgerError::not_found(Entity::Return, id))?;
        self.state.returns.delete(id, reason)?;
        self.refresh_invoice_status(&invoice_id)?;
        self.queue_save();
        Ok(())
    }

    /// Restoring a return re-occupies its quota, so the sold-quantity ceiling
    /// is re-validated against the invoice (when it still exists).
    pub fn restore_return(&mut self, id: &str) -> Result<(), AppError> {
        let record = self
            .state
            .returns
            .get(id)
            .ok_or_else(|| LedgerError::not_found(Entity::Return, id))?
            .clone();
        if !record.is_deleted() {
            return Err(LedgerError::NotDeleted {
                entity: Entity::Return,
                id: id.to_string(),
            }
            .into());
        }
        if let Some(invoice) = self.state.sales.get(&record.invoice_id) {
            crate::domain::validate_return(invoice, &record.items, self.state.returns.records())?;
        }
        self.state.returns.restore(id)?;
        self.refresh_invoice_status(&record.invoice_id)?;
        self.queue_save();
        Ok(())
    }

    pub fn purge_return(&mut self, id: &str) -> Result<ReturnRecord, AppError> {
        let record = self.state.returns.permanently_delete(id)?;
        self.refresh_invoice_status(&record.invoice_id)?;
        self.queue_save();
        Ok(record)
    }

    pub fn empty_return_bin(&mut self) -> usize {
        let purged = self.state.returns.empty_bin();
        self.queue_save();
        purged
    }

    pub fn active_returns(&self) -> Vec<ReturnRecord> {
        self.state.returns.active().cloned().collect()
    }

    pub fn deleted_returns(&self) -> Vec<ReturnRecord> {
        self.state.returns.deleted().cloned().collect()
    }

    pub fn get_return(&self, id: &str) -> Option<ReturnRecord> {
        self.state.returns.get(id).cloned()
    }

    /// Derive the invoice's status from its non-deleted returns. A missing
    /// invoice (dangling weak reference after purge) is fine and a no-op.
    fn refresh_invoice_status(&mut self, invoice_id: &str) -> Result<(), AppError> {
        let Some(invoice) = self.state.sales.get(invoice_id) else {
            return Ok(());
        };
        let status = if is_fully_returned(invoice, self.state.returns.records()) {
            InvoiceStatus::Returned
        } else {
            InvoiceStatus::Completed
        };
        self.state.sales.set_status(invoice_id, status)?;
        Ok(())
    }

    // ========================
    // Expense operations
    // ========================

    pub fn add_expense(
        &mut self,
        description: &str,
        amount: f64,
        category: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Expense, AppError> {
        let expense = self
            .state
            .expenses
            .add(Expense::new(description, amount, category, timestamp))
            .clone();
        self.queue_save();
        Ok(expense)
    }

    pub fn expenses(&self) -> Vec<Expense> {
        self.state.expenses.records().to_vec()
    }

    // ========================
    // Snapshot operations
    // ========================

    /// Full replacement of all ledger state from an external document.
    /// This is an overwrite, not a merge.
    pub fn import_snapshot(&mut self, snapshot: Snapshot) {
        self.state = ShopState::from_snapshot(snapshot);
        self.queue_save();
    }

    /// Irreversibly wipe every ledger back to the empty initial state.
    pub fn execute_reset(&mut self) {
        self.state = ShopState::default();
        self.queue_save();
    }

    // ========================
    // Reports
    // ========================

    pub fn sales_report(
        &self,
        from_date: Option<DateTime<Utc>>,
        to_date: Option<DateTime<Utc>>,
    ) -> SalesReport {
        build_sales_report(
            self.state.sales.records(),
            self.state.returns.records(),
            self.state.expenses.records(),
            from_date,
            to_date,
        )
    }

    pub fn inventory_report(&self) -> InventoryReport {
        build_inventory_report(self.state.products.records())
    }
}

/// Collapse duplicate product lines into one required quantity per product,
/// preserving first-seen order so error reports name the earliest offender.
fn aggregate_quantities(lines: &[SaleLine]) -> Vec<(ProductId, i64)> {
    let mut totals: Vec<(ProductId, i64)> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => totals.push((line.product_id, line.quantity)),
        }
    }
    totals
}

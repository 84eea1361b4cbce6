use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{ReturnLine, SaleLine, ShopService};
use crate::domain::{DiscountType, Invoice, Product, ProductId, ReturnRecord};
use crate::io::{Exporter, Importer};

/// Dukkan - Retail Shop Ledger
#[derive(Parser)]
#[command(name = "dukkan")]
#[command(about = "A local-first point-of-sale and inventory ledger for a single shop")]
#[command(version)]
pub struct Cli {
    /// Snapshot file path
    #[arg(short, long, default_value = "dukkan.json")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new shop ledger
    Init,

    /// Product and stock management commands
    #[command(subcommand)]
    Product(ProductCommands),

    /// Record a sale and print the invoice
    Sell {
        /// Line item as PRODUCT_ID:QTY (repeatable)
        #[arg(short, long = "item", required = true)]
        items: Vec<String>,

        /// Discount value (percent or fixed amount, see --discount-type)
        #[arg(long, default_value = "0")]
        discount: f64,

        /// Discount type: percentage, fixed
        #[arg(long, default_value = "percentage")]
        discount_type: String,

        /// Customer name
        #[arg(long)]
        customer: Option<String>,

        /// Customer phone
        #[arg(long)]
        phone: Option<String>,

        /// Free-form note on the invoice
        #[arg(long)]
        note: Option<String>,
    },

    /// Invoice management commands
    #[command(subcommand)]
    Invoice(InvoiceCommands),

    /// Return management commands
    #[command(subcommand)]
    Return(ReturnCommands),

    /// Expense tracking commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Reports and analytics
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: products, invoices, returns, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import a full JSON snapshot (overwrites all current data)
    Import {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Validate without importing
        #[arg(long)]
        validate: bool,
    },

    /// Irreversibly wipe all ledgers to the empty initial state
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// Take in stock: merges into a same-named active product (weighted
    /// average cost) or creates a new one
    Add {
        /// Product name
        name: String,

        /// Unit cost price
        #[arg(long)]
        cost: f64,

        /// Retail price
        #[arg(long)]
        retail: f64,

        /// Quantity taken in
        #[arg(long)]
        qty: i64,

        /// Product description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List products
    List {
        /// Show the recycle bin instead of the active catalog
        #[arg(long)]
        deleted: bool,
    },

    /// Merge stock into an existing product at a unit cost (weighted average)
    Stock {
        /// Product id
        id: String,

        /// Quantity to merge in
        qty: i64,

        /// Unit cost of the new stock
        cost: f64,

        /// New retail price (kept if omitted)
        #[arg(long)]
        retail: Option<f64>,

        /// New description (kept if omitted)
        #[arg(long)]
        description: Option<String>,
    },

    /// Deduct stock (all or nothing)
    Deduct {
        /// Product id
        id: String,

        /// Quantity to deduct
        qty: i64,
    },

    /// Put stock back on the shelf without touching cost
    Restock {
        /// Product id
        id: String,

        /// Quantity to restock
        qty: i64,
    },

    /// Move a product to the recycle bin
    Delete {
        /// Product id
        id: String,

        /// Reason for deletion (required)
        #[arg(short, long)]
        reason: String,
    },

    /// Restore a product from the recycle bin
    Restore {
        /// Product id
        id: String,
    },

    /// Permanently delete a product from the recycle bin
    Purge {
        /// Product id
        id: String,
    },

    /// Permanently delete every product in the recycle bin
    EmptyBin,
}

#[derive(Subcommand)]
pub enum InvoiceCommands {
    /// List invoices
    List {
        /// Show the recycle bin instead of active invoices
        #[arg(long)]
        deleted: bool,
    },

    /// Show one invoice with its line items
    Show {
        /// Invoice id
        id: String,
    },

    /// Move an invoice to the recycle bin, restocking its items by default
    Delete {
        /// Invoice id
        id: String,

        /// Reason for deletion (required)
        #[arg(short, long)]
        reason: String,

        /// Keep stock as-is instead of restocking the invoice's items
        #[arg(long)]
        no_restock: bool,
    },

    /// Restore an invoice from the recycle bin, re-deducting its items by
    /// default (aborts untouched if any item lacks stock)
    Restore {
        /// Invoice id
        id: String,

        /// Skip re-deducting stock
        #[arg(long)]
        no_deduct: bool,
    },

    /// Permanently delete an invoice from the recycle bin
    Purge {
        /// Invoice id
        id: String,
    },

    /// Permanently delete every invoice in the recycle bin
    EmptyBin,
}

#[derive(Subcommand)]
pub enum ReturnCommands {
    /// Record a return against an invoice and restock the goods
    Add {
        /// Invoice id the goods came from
        invoice_id: String,

        /// Returned item as PRODUCT_ID:QTY:REFUND (repeatable)
        #[arg(short, long = "item", required = true)]
        items: Vec<String>,
    },

    /// List returns
    List {
        /// Show the recycle bin instead of active returns
        #[arg(long)]
        deleted: bool,
    },

    /// Move a return to the recycle bin (stock is not adjusted)
    Delete {
        /// Return id
        id: String,

        /// Reason for deletion (required)
        #[arg(short, long)]
        reason: String,
    },

    /// Restore a return from the recycle bin
    Restore {
        /// Return id
        id: String,
    },

    /// Permanently delete a return from the recycle bin
    Purge {
        /// Return id
        id: String,
    },

    /// Permanently delete every return in the recycle bin
    EmptyBin,
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shop expense
    Add {
        /// What the money went on
        description: String,

        /// Amount spent
        amount: f64,

        /// Expense category
        #[arg(short, long, default_value = "general")]
        category: String,
    },

    /// List expenses
    List,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Sales, refunds, cost of goods and net profit
    Sales {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Catalog valuation and stock health
    Inventory,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                ShopService::init(&self.database).await?;
                println!("Shop ledger initialized: {}", self.database);
                Ok(())
            }

            Commands::Product(cmd) => {
                let mut service = ShopService::open(&self.database).await?;
                run_product_command(&mut service, cmd)?;
                service.flush().await?;
                Ok(())
            }

            Commands::Sell {
                items,
                discount,
                discount_type,
                customer,
                phone,
                note,
            } => {
                let mut service = ShopService::open(&self.database).await?;
                let lines = items
                    .iter()
                    .map(|raw| parse_sale_line(raw))
                    .collect::<Result<Vec<_>>>()?;
                let discount_type = DiscountType::from_str(&discount_type)
                    .with_context(|| format!("Unknown discount type '{discount_type}'"))?;

                let invoice = service.record_sale(
                    &lines,
                    discount,
                    discount_type,
                    customer,
                    phone,
                    note,
                    Utc::now(),
                )?;
                print_invoice(&invoice);
                service.flush().await?;
                Ok(())
            }

            Commands::Invoice(cmd) => {
                let mut service = ShopService::open(&self.database).await?;
                run_invoice_command(&mut service, cmd)?;
                service.flush().await?;
                Ok(())
            }

            Commands::Return(cmd) => {
                let mut service = ShopService::open(&self.database).await?;
                run_return_command(&mut service, cmd)?;
                service.flush().await?;
                Ok(())
            }

            Commands::Expense(cmd) => {
                let mut service = ShopService::open(&self.database).await?;
                run_expense_command(&mut service, cmd)?;
                service.flush().await?;
                Ok(())
            }

            Commands::Report(cmd) => {
                let service = ShopService::open(&self.database).await?;
                run_report_command(&service, cmd)?;
                Ok(())
            }

            Commands::Export {
                export_type,
                output,
            } => {
                let service = ShopService::open(&self.database).await?;
                run_export(&service, &export_type, output)?;
                Ok(())
            }

            Commands::Import { input, validate } => {
                let mut service = ShopService::open(&self.database).await?;
                run_import(&mut service, input, validate)?;
                service.flush().await?;
                Ok(())
            }

            Commands::Reset { yes } => {
                if !yes {
                    bail!("Reset wipes all data permanently. Re-run with --yes to confirm.");
                }
                let mut service = ShopService::open(&self.database).await?;
                service.execute_reset();
                service.flush().await?;
                println!("All ledgers wiped to the empty initial state.");
                Ok(())
            }
        }
    }
}

fn run_product_command(service: &mut ShopService, cmd: ProductCommands) -> Result<()> {
    match cmd {
        ProductCommands::Add {
            name,
            cost,
            retail,
            qty,
            description,
        } => {
            let intake = service.add_or_merge_stock(&name, description, cost, retail, qty)?;
            let product = service
                .get_product(intake.product_id())
                .context("Product vanished after intake")?;
            match intake {
                crate::domain::StockIntake::Created(_) => {
                    println!(
                        "Created product {} ({}), stock {}, cost {:.2}",
                        product.name, product.code, product.stock, product.wholesale_price
                    );
                }
                crate::domain::StockIntake::Merged(_) => {
                    println!(
                        "Merged stock into {}: stock {}, average cost {:.2}",
                        product.name, product.stock, product.wholesale_price
                    );
                }
            }
        }

        ProductCommands::List { deleted } => {
            let products = if deleted {
                service.deleted_products()
            } else {
                service.active_products()
            };
            if products.is_empty() {
                println!("No products.");
            }
            for product in products {
                print_product(&product);
            }
        }

        ProductCommands::Stock {
            id,
            qty,
            cost,
            retail,
            description,
        } => {
            let id = parse_product_id(&id)?;
            let product = service.update_stock_wac(id, qty, cost, retail, description)?;
            println!(
                "{}: stock {}, average cost {:.2}",
                product.name, product.stock, product.wholesale_price
            );
        }

        ProductCommands::Deduct { id, qty } => {
            let id = parse_product_id(&id)?;
            let product = service.deduct_stock(id, qty)?;
            println!("{}: stock {}", product.name, product.stock);
        }

        ProductCommands::Restock { id, qty } => {
            let id = parse_product_id(&id)?;
            let product = service.restock_product(id, qty)?;
            println!("{}: stock {}", product.name, product.stock);
        }

        ProductCommands::Delete { id, reason } => {
            let id = parse_product_id(&id)?;
            service.delete_product(id, &reason)?;
            println!("Product moved to the recycle bin.");
        }

        ProductCommands::Restore { id } => {
            let id = parse_product_id(&id)?;
            service.restore_product(id)?;
            println!("Product restored.");
        }

        ProductCommands::Purge { id } => {
            let id = parse_product_id(&id)?;
            let product = service.purge_product(id)?;
            println!("Permanently deleted {}.", product.name);
        }

        ProductCommands::EmptyBin => {
            let purged = service.empty_product_bin();
            println!("Purged {purged} product(s) from the recycle bin.");
        }
    }
    Ok(())
}

fn run_invoice_command(service: &mut ShopService, cmd: InvoiceCommands) -> Result<()> {
    match cmd {
        InvoiceCommands::List { deleted } => {
            let invoices = if deleted {
                service.deleted_invoices()
            } else {
                service.active_invoices()
            };
            if invoices.is_empty() {
                println!("No invoices.");
            }
            for invoice in invoices {
                println!(
                    "{}  {}  {}  items: {}  net: {:.2}",
                    invoice.id,
                    invoice.timestamp.format("%Y-%m-%d %H:%M"),
                    invoice.status.as_str(),
                    invoice.items.len(),
                    invoice.net_total
                );
            }
        }

        InvoiceCommands::Show { id } => {
            let invoice = service
                .get_invoice(&id)
                .with_context(|| format!("Invoice not found: {id}"))?;
            print_invoice(&invoice);
        }

        InvoiceCommands::Delete {
            id,
            reason,
            no_restock,
        } => {
            service.delete_invoice_with_stock(&id, &reason, !no_restock)?;
            if no_restock {
                println!("Invoice {id} moved to the recycle bin.");
            } else {
                println!("Invoice {id} moved to the recycle bin; items restocked.");
            }
        }

        InvoiceCommands::Restore { id, no_deduct } => {
            service.restore_invoice_with_stock(&id, !no_deduct)?;
            println!("Invoice {id} restored.");
        }

        InvoiceCommands::Purge { id } => {
            service.purge_invoice(&id)?;
            println!("Invoice {id} permanently deleted.");
        }

        InvoiceCommands::EmptyBin => {
            let purged = service.empty_invoice_bin();
            println!("Purged {purged} invoice(s) from the recycle bin.");
        }
    }
    Ok(())
}

fn run_return_command(service: &mut ShopService, cmd: ReturnCommands) -> Result<()> {
    match cmd {
        ReturnCommands::Add { invoice_id, items } => {
            let lines = items
                .iter()
                .map(|raw| parse_return_line(raw))
                .collect::<Result<Vec<_>>>()?;
            let record = service.add_return(&invoice_id, &lines, Utc::now())?;
            println!(
                "Recorded return {} against {}: refund {:.2}",
                record.id, record.invoice_id, record.total_refund
            );
        }

        ReturnCommands::List { deleted } => {
            let returns = if deleted {
                service.deleted_returns()
            } else {
                service.active_returns()
            };
            if returns.is_empty() {
                println!("No returns.");
            }
            for record in returns {
                print_return(&record);
            }
        }

        ReturnCommands::Delete { id, reason } => {
            service.delete_return(&id, &reason)?;
            println!("Return {id} moved to the recycle bin.");
        }

        ReturnCommands::Restore { id } => {
            service.restore_return(&id)?;
            println!("Return {id} restored.");
        }

        ReturnCommands::Purge { id } => {
            service.purge_return(&id)?;
            println!("Return {id} permanently deleted.");
        }

        ReturnCommands::EmptyBin => {
            let purged = service.empty_return_bin();
            println!("Purged {purged} return(s) from the recycle bin.");
        }
    }
    Ok(())
}

fn run_expense_command(service: &mut ShopService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            description,
            amount,
            category,
        } => {
            let expense = service.add_expense(&description, amount, &category, Utc::now())?;
            println!("Recorded expense {:.2} ({})", expense.amount, expense.category);
        }

        ExpenseCommands::List => {
            let expenses = service.expenses();
            if expenses.is_empty() {
                println!("No expenses.");
            }
            for expense in &expenses {
                println!(
                    "{}  {:.2}  {}  {}",
                    expense.timestamp.format("%Y-%m-%d"),
                    expense.amount,
                    expense.category,
                    expense.description
                );
            }
        }
    }
    Ok(())
}

fn run_report_command(service: &ShopService, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Sales { from, to } => {
            let from_date = from.as_deref().map(parse_from_date).transpose()?;
            let to_date = to.as_deref().map(parse_to_date).transpose()?;
            let report = service.sales_report(from_date, to_date);
            println!("Transactions:   {}", report.transaction_count);
            println!("Units sold:     {}", report.units_sold);
            println!("Net revenue:    {:.2}", report.net_revenue);
            println!("Refunds:        {:.2}", report.total_refunds);
            println!("Cost of goods:  {:.2}", report.cost_of_goods);
            println!("Expenses:       {:.2}", report.total_expenses);
            println!("Net profit:     {:.2}", report.net_profit);
        }

        ReportCommands::Inventory => {
            let report = service.inventory_report();
            println!("Products:         {}", report.product_count);
            println!("Total pieces:     {}", report.total_pieces);
            println!("Value at cost:    {:.2}", report.stock_value_at_cost);
            println!("Value at retail:  {:.2}", report.stock_value_at_retail);
            println!("Out of stock:     {}", report.out_of_stock);
            println!("Low stock:        {}", report.low_stock);
        }
    }
    Ok(())
}

fn run_export(service: &ShopService, export_type: &str, output: Option<String>) -> Result<()> {
    let exporter = Exporter::new(service);

    let writer: Box<dyn std::io::Write> = match &output {
        Some(path) => Box::new(
            std::fs::File::create(path).with_context(|| format!("Failed to create {path}"))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    match export_type {
        "products" => {
            let count = exporter.export_products_csv(writer)?;
            eprintln!("Exported {count} product(s).");
        }
        "invoices" => {
            let count = exporter.export_invoices_csv(writer)?;
            eprintln!("Exported {count} invoice line(s).");
        }
        "returns" => {
            let count = exporter.export_returns_csv(writer)?;
            eprintln!("Exported {count} return line(s).");
        }
        "full" => {
            exporter.export_full_json(writer)?;
            eprintln!("Exported full snapshot.");
        }
        other => bail!("Unknown export type '{other}'. Use products, invoices, returns or full."),
    }
    Ok(())
}

fn run_import(service: &mut ShopService, input: Option<String>, validate: bool) -> Result<()> {
    let reader: Box<dyn std::io::Read> = match &input {
        Some(path) => {
            Box::new(std::fs::File::open(path).with_context(|| format!("Failed to open {path}"))?)
        }
        None => Box::new(std::io::stdin()),
    };

    let mut importer = Importer::new(service);
    let summary = if validate {
        importer.validate_full_json(reader)?
    } else {
        importer.import_full_json(reader)?
    };
    let verb = if validate { "Validated" } else { "Imported" };
    println!(
        "{verb} {} product(s), {} invoice(s), {} return(s), {} expense(s).",
        summary.products, summary.invoices, summary.returns, summary.expenses
    );
    Ok(())
}

fn parse_product_id(s: &str) -> Result<ProductId> {
    Uuid::parse_str(s).with_context(|| format!("Invalid product id '{s}'"))
}

/// Parse "PRODUCT_ID:QTY".
fn parse_sale_line(raw: &str) -> Result<SaleLine> {
    let (id, qty) = raw
        .split_once(':')
        .with_context(|| format!("Invalid line '{raw}'. Use PRODUCT_ID:QTY"))?;
    Ok(SaleLine {
        product_id: parse_product_id(id)?,
        quantity: qty
            .parse()
            .with_context(|| format!("Invalid quantity '{qty}'"))?,
    })
}

/// Parse "PRODUCT_ID:QTY:REFUND".
fn parse_return_line(raw: &str) -> Result<ReturnLine> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        bail!("Invalid line '{raw}'. Use PRODUCT_ID:QTY:REFUND");
    }
    Ok(ReturnLine {
        product_id: parse_product_id(parts[0])?,
        quantity: parts[1]
            .parse()
            .with_context(|| format!("Invalid quantity '{}'", parts[1]))?,
        refund_amount: parts[2]
            .parse()
            .with_context(|| format!("Invalid refund '{}'", parts[2]))?,
    })
}

fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD"))
}

/// Report range start: midnight of the named day.
fn parse_from_date(s: &str) -> Result<DateTime<Utc>> {
    parse_day(s)?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .context("Invalid time of day")
}

/// Report range end: the last instant of the named day, so `--to` includes
/// that day's sales instead of cutting off at its midnight.
fn parse_to_date(s: &str) -> Result<DateTime<Utc>> {
    parse_day(s)?
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .context("Invalid time of day")
}

fn print_product(product: &Product) {
    println!(
        "{}  {}  {}  stock: {}  cost: {:.2}  retail: {:.2}",
        product.id, product.code, product.name, product.stock, product.wholesale_price,
        product.retail_price
    );
    if let Some(reason) = &product.deletion_reason {
        println!("    deleted: {reason}");
    }
}

fn print_invoice(invoice: &Invoice) {
    println!(
        "Invoice {}  {}  {}",
        invoice.id,
        invoice.timestamp.format("%Y-%m-%d %H:%M"),
        invoice.status.as_str()
    );
    if let Some(customer) = &invoice.customer_name {
        println!("Customer: {customer}");
    }
    for item in &invoice.items {
        println!(
            "  {} x{} @ {:.2} = {:.2}",
            item.name, item.quantity, item.unit_price, item.subtotal
        );
    }
    println!("Subtotal: {:.2}", invoice.total_before_discount);
    if invoice.discount_value > 0.0 {
        println!(
            "Discount: {} ({})",
            invoice.discount_value,
            invoice.discount_type.as_str()
        );
    }
    println!("Net total: {:.2}", invoice.net_total);
}

fn print_return(record: &ReturnRecord) {
    println!(
        "{}  invoice: {}  {}  refund: {:.2}",
        record.id,
        record.invoice_id,
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.total_refund
    );
    for item in &record.items {
        println!("  {} x{} refund {:.2}", item.name, item.quantity, item.refund_amount);
    }
}

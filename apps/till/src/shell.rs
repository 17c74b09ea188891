//! # Till Shell
//!
//! A line-oriented front end over the commands. One line in, one block of
//! text out. A line of digits alone is treated as a barcode scan.
//!
//! ```text
//! > 6001234            scan
//! > add p-amox 2       add by id or barcode with a quantity
//! > +  /  -            adjust the last scanned line
//! > pay cash Mama Asha checkout, prints the receipt
//! ```

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use rxdesk_core::{CurrencyFormat, CustomerSelection, HeldTransaction, PaymentDetails, PaymentMethod};

use crate::commands::cart::{self, CartView};
use crate::commands::checkout::{self, CheckoutRequest};
use crate::commands::{held, invoice, product, sync};
use crate::error::{ApiError, ApiResult};
use crate::state::Till;

const HELP: &str = "\
Commands:
  <barcode>                 scan one unit
  add <code> [qty]          add by barcode or product id
  + | -                     adjust the last line by one
  qty <product> <n>         set a quantity (0 removes)
  rm <product>              remove a line
  clear                     empty the cart
  cart                      show the cart
  search [text]             list products in stock
  refresh                   re-read branch inventory
  hold [customer]           park the cart
  held                      list parked carts
  resume <id>               bring a parked cart back
  drop <id>                 discard a parked cart
  pay <method> [customer]   checkout (cash, card, mobile, insurance, credit)
  invoice [customer]        print an unpaid invoice slip
  sync                      replay offline sales
  status                    connection and journal status
  rejected                  offline sales the server refused
  quit";

/// What one shell line produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutput {
    Text(String),
    Quit,
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run(till: &Till) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"RxDesk till ready. Type 'help' for commands.\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        match execute(till, &line).await {
            ShellOutput::Quit => break,
            ShellOutput::Text(text) => {
                if !text.is_empty() {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}

/// Runs one shell line against the till.
pub async fn execute(till: &Till, line: &str) -> ShellOutput {
    let line = line.trim();
    if line.is_empty() {
        return ShellOutput::Text(String::new());
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    debug!(command = %command, "shell command");

    let result = match command.to_lowercase().as_str() {
        "quit" | "exit" => return ShellOutput::Quit,
        "help" | "?" => Ok(HELP.to_string()),
        "add" | "scan" => add(till, rest).await,
        "+" => cart_text(till, cart::adjust_last_item(&till.cart, true).await),
        "-" => cart_text(till, cart::adjust_last_item(&till.cart, false).await),
        "qty" => set_quantity(till, rest).await,
        "rm" | "remove" => cart_text(till, cart::remove_from_cart(&till.cart, rest).await),
        "clear" => Ok(render_cart(&cart::clear_cart(&till.cart).await, &money(till))),
        "cart" => Ok(render_cart(&cart::get_cart(&till.cart).await, &money(till))),
        "search" => search(till, rest).await,
        "refresh" => product::refresh_inventory(&till.inventory)
            .await
            .map(|count| format!("{} products in stock", count)),
        "hold" => held::hold_cart(&till.cart, rest)
            .await
            .map(|h| format!("Held as {} ({} lines)", h.id, h.items.len())),
        "held" => Ok(render_held(&held::list_held(&till.cart).await, &money(till))),
        "resume" => cart_text(till, held::resume_held(&till.cart, rest).await),
        "drop" => held::delete_held(&till.cart, rest)
            .await
            .map(|_| "Held cart deleted".to_string()),
        "pay" => pay(till, rest).await,
        "invoice" => issue_invoice(till, rest).await,
        "sync" => sync::sync_offline_sales(&till.inventory).await.map(|r| {
            format!(
                "Synced {}, rejected {}, still pending {}{}",
                r.synced,
                r.rejected,
                r.remaining,
                if r.interrupted { " (server unreachable)" } else { "" }
            )
        }),
        "status" => sync::sync_status(&till.inventory).await.map(|s| {
            format!(
                "{} | pending offline sales: {} | rejected: {}",
                if s.offline { "OFFLINE" } else { "online" },
                s.pending,
                s.rejected
            )
        }),
        "rejected" => list_rejected(till).await,
        _ if line.chars().all(|c| c.is_ascii_digit()) => add(till, line).await,
        _ => Err(ApiError::validation(format!(
            "Unknown command '{}'. Type 'help' for commands.",
            command
        ))),
    };

    ShellOutput::Text(match result {
        Ok(text) => text,
        Err(e) => format!("error: {}", e.message),
    })
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn add(till: &Till, args: &str) -> ApiResult<String> {
    let mut parts = args.split_whitespace();
    let code = parts
        .next()
        .ok_or_else(|| ApiError::validation("Usage: add <code> [qty]"))?;
    let quantity = match parts.next() {
        Some(qty) => parse_quantity(qty)?,
        None => 1,
    };

    cart_text(till, cart::add_to_cart(&till.cart, &till.inventory, code, quantity).await)
}

async fn set_quantity(till: &Till, args: &str) -> ApiResult<String> {
    let mut parts = args.split_whitespace();
    let (Some(id), Some(qty)) = (parts.next(), parts.next()) else {
        return Err(ApiError::validation("Usage: qty <product> <n>"));
    };
    let quantity = parse_quantity(qty)?;

    cart_text(till, cart::set_item_quantity(&till.cart, id, quantity).await)
}

async fn search(till: &Till, query: &str) -> ApiResult<String> {
    let listings = product::search_products(&till.inventory, query, None).await?;
    if listings.is_empty() {
        return Ok("No products found".to_string());
    }

    let format = money(till);
    Ok(listings
        .iter()
        .map(|p| {
            format!(
                "{:<12} {:<28} {:>12}  stock {}{}",
                p.product_id,
                p.name,
                format.format(p.price),
                p.stock,
                if p.low_stock { " (low)" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

async fn pay(till: &Till, args: &str) -> ApiResult<String> {
    let (method, customer) = match args.split_once(char::is_whitespace) {
        Some((method, customer)) => (method, customer.trim()),
        None => (args, ""),
    };
    if method.is_empty() {
        return Err(ApiError::validation("Usage: pay <method> [customer]"));
    }
    let method: PaymentMethod = method
        .parse()
        .map_err(|e: rxdesk_core::ValidationError| ApiError::validation(e.to_string()))?;

    let payment = PaymentDetails {
        method,
        customer: CustomerSelection::WalkIn {
            name: Some(customer.to_string()).filter(|n| !n.is_empty()),
        },
        prescription_images: Vec::new(),
    };

    let outcome = checkout::checkout(
        &till.cart,
        &till.checkout,
        &till.inventory,
        &till.config,
        CheckoutRequest::new(payment),
    )
    .await?;

    let mut text = String::new();
    if let Some(notice) = &outcome.notice {
        text.push_str(notice);
        text.push_str("\n\n");
    }
    text.push_str(&outcome.receipt.render_text(till.config.receipt.width));
    Ok(text)
}

async fn issue_invoice(till: &Till, customer: &str) -> ApiResult<String> {
    let customer = Some(customer.to_string()).filter(|c| !c.is_empty());
    let document =
        invoice::generate_invoice(&till.cart, &till.inventory, &till.config, customer).await?;
    Ok(document.render_text(till.config.receipt.width))
}

async fn list_rejected(till: &Till) -> ApiResult<String> {
    let entries = sync::list_rejected_sales(&till.inventory, 50).await?;
    if entries.is_empty() {
        return Ok("No rejected offline sales".to_string());
    }

    let format = money(till);
    Ok(entries
        .iter()
        .map(|e| {
            format!(
                "{}  {}  {}  {}",
                e.receipt_id,
                e.created_at.format("%Y-%m-%d %H:%M"),
                format.format(e.total),
                e.last_error.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

// =============================================================================
// Rendering
// =============================================================================

fn money(till: &Till) -> CurrencyFormat {
    till.config.currency_format()
}

fn parse_quantity(text: &str) -> ApiResult<i64> {
    text.parse()
        .map_err(|_| ApiError::validation(format!("'{}' is not a quantity", text)))
}

fn cart_text(till: &Till, view: ApiResult<CartView>) -> ApiResult<String> {
    view.map(|v| render_cart(&v, &money(till)))
}

fn render_cart(view: &CartView, format: &CurrencyFormat) -> String {
    if view.lines.is_empty() {
        return "Cart is empty".to_string();
    }

    let mut out: Vec<String> = view
        .lines
        .iter()
        .map(|line| {
            let marker = if view.last_item_id.as_deref() == Some(line.product_id.as_str()) {
                '*'
            } else {
                ' '
            };
            format!(
                "{} {:<28} x{:<4} {:>14}",
                marker,
                line.product.name,
                line.quantity,
                format.format(line.line_total())
            )
        })
        .collect();

    out.push(format!(
        "  {} items, total {}",
        view.totals.total_items,
        format.format(view.totals.total)
    ));
    out.join("\n")
}

fn render_held(held: &[HeldTransaction], format: &CurrencyFormat) -> String {
    if held.is_empty() {
        return "No held carts".to_string();
    }

    held.iter()
        .map(|h| {
            format!(
                "{}  {}  {:<20} {:>14}",
                h.id,
                h.held_at.format("%H:%M"),
                if h.customer_name.is_empty() { "-" } else { h.customer_name.as_str() },
                format.format(h.total)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rxdesk_backend::InMemoryBackend;
    use rxdesk_core::{InventorySnapshotItem, Money};
    use rxdesk_db::{Database, DbConfig};

    use crate::state::{InventoryProvider, TillConfig};

    async fn till() -> Till {
        let backend = InMemoryBackend::new();
        backend
            .set_inventory(
                "b1",
                vec![InventorySnapshotItem {
                    product_id: "p1".to_string(),
                    name: "Paracetamol 500mg".to_string(),
                    branch_stock: 20,
                    selling_price: Some(Money::from_minor(500)),
                    unit_price: Money::from_minor(400),
                    expiry_date: None,
                    reorder_level: 0,
                    batch_number: None,
                    barcode: Some("6001".to_string()),
                }],
            )
            .await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut config = TillConfig::default();
        config.branch.id = "b1".to_string();
        config.pharmacy.name = "Uzima Pharmacy".to_string();

        Till::new(config, InventoryProvider::new("b1", Arc::new(backend), db))
    }

    fn text(output: ShellOutput) -> String {
        match output {
            ShellOutput::Text(text) => text,
            ShellOutput::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn test_digits_scan_and_pay() {
        let till = till().await;

        let cart = text(execute(&till, "6001").await);
        assert!(cart.contains("Paracetamol 500mg"));
        text(execute(&till, "+").await);

        let receipt = text(execute(&till, "pay cash Mama Asha").await);
        assert!(receipt.contains("Uzima Pharmacy"));
        assert!(receipt.contains("RCPT-0001"));
        assert_eq!(text(execute(&till, "cart").await), "Cart is empty");
    }

    #[tokio::test]
    async fn test_errors_are_printed_not_fatal() {
        let till = till().await;

        assert!(text(execute(&till, "pay bitcoin").await).starts_with("error:"));
        assert!(text(execute(&till, "pay cash").await).starts_with("error:"));
        assert!(text(execute(&till, "frobnicate").await).contains("Unknown command"));
        assert_eq!(execute(&till, "quit").await, ShellOutput::Quit);
    }
}

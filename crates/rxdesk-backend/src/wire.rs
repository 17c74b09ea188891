//! # Wire Format
//!
//! The backend's JSON is loosely typed: the same field shows up under
//! different keys depending on which view or RPC produced it, and numbers
//! arrive as JSON numbers or as strings. This module is the one place
//! that tolerates that.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  serde_json::Value (untyped)                                            │
//! │       │                                                                 │
//! │       ▼  parse_inventory / parse_sale_receipt / parse_pending_...       │
//! │  ┌───────────────────────────────────────────────────────────────┐     │
//! │  │ alias keys       id | product_id | productId                   │     │
//! │  │ numbers          12 | 12.5 | "12.50"  → Money (exact)          │     │
//! │  │ dates            "2026-01-31" | "2026-01-31T00:00:00Z"         │     │
//! │  │ validation       ids, stock >= 0, prices >= 0                  │     │
//! │  └───────────────────────────────────────────────────────────────┘     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InventorySnapshotItem / SaleReceipt / PendingTransaction (typed)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An inventory row that fails to parse is dropped with a warning rather
//! than failing the whole read; at checkout a dropped row reads as "no
//! longer available", which blocks the sale instead of guessing.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tracing::warn;

use rxdesk_core::validation::{validate_price, validate_product_id, validate_stock};
use rxdesk_core::{
    CurrencyFormat, InventorySnapshotItem, Money, PendingTransaction, PendingTransactionRequest,
    SaleReceipt, SaleRequest, SaleRequestItem,
};

use crate::error::{BackendError, BackendResult};

const ID_KEYS: &[&str] = &["product_id", "productId", "id"];
const NAME_KEYS: &[&str] = &["name", "product_name", "productName"];
const STOCK_KEYS: &[&str] = &["branch_stock", "branchStock", "stock", "quantity"];
const SELLING_PRICE_KEYS: &[&str] = &["selling_price", "sellingPrice"];
const UNIT_PRICE_KEYS: &[&str] = &["unit_price", "unitPrice", "price"];
const EXPIRY_KEYS: &[&str] = &["expiry_date", "expiryDate", "expires_on"];
const REORDER_KEYS: &[&str] = &["reorder_level", "reorderLevel"];
const BATCH_KEYS: &[&str] = &["batch_number", "batchNumber"];
const BARCODE_KEYS: &[&str] = &["barcode", "barcode_id", "barcodeId"];
const RECEIPT_KEYS: &[&str] = &[
    "receipt_id",
    "receiptId",
    "receipt_number",
    "receiptNumber",
    "sale_id",
    "id",
];
const SHORT_CODE_KEYS: &[&str] = &["short_code", "shortCode", "code"];
const PENDING_BARCODE_KEYS: &[&str] = &["barcode", "barcode_data", "barcodeData"];
const MESSAGE_KEYS: &[&str] = &["message", "error_description", "error", "msg"];

// =============================================================================
// Responses
// =============================================================================

/// Parses the branch inventory read.
pub fn parse_inventory(payload: &Value, decimals: u8) -> BackendResult<Vec<InventorySnapshotItem>> {
    let rows = rows_of(payload)?;
    let mut items = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        match parse_inventory_item(row, decimals) {
            Ok(item) => items.push(item),
            Err(reason) => warn!(row = index, reason = %reason, "Skipping malformed inventory row"),
        }
    }

    Ok(items)
}

/// Parses one inventory row.
pub fn parse_inventory_item(row: &Value, decimals: u8) -> Result<InventorySnapshotItem, String> {
    let obj = row.as_object().ok_or("row is not an object")?;

    let product_id = field(obj, ID_KEYS)
        .and_then(as_text)
        .ok_or("missing product id")?;
    validate_product_id(&product_id).map_err(|e| e.to_string())?;

    let name = field(obj, NAME_KEYS)
        .and_then(as_text)
        .ok_or_else(|| format!("{}: missing name", product_id))?;

    let branch_stock = match field(obj, STOCK_KEYS) {
        Some(v) => as_integer(v).map_err(|e| format!("{}: stock {}", product_id, e))?,
        None => return Err(format!("{}: missing stock", product_id)),
    };
    validate_stock(branch_stock).map_err(|e| format!("{}: {}", product_id, e))?;

    let unit_price = match field(obj, UNIT_PRICE_KEYS) {
        Some(v) => as_money(v, decimals).map_err(|e| format!("{}: unit price {}", product_id, e))?,
        None => return Err(format!("{}: missing unit price", product_id)),
    };
    validate_price("unit price", unit_price).map_err(|e| format!("{}: {}", product_id, e))?;

    let selling_price = field(obj, SELLING_PRICE_KEYS)
        .map(|v| as_money(v, decimals))
        .transpose()
        .map_err(|e| format!("{}: selling price {}", product_id, e))?;
    if let Some(price) = selling_price {
        validate_price("selling price", price).map_err(|e| format!("{}: {}", product_id, e))?;
    }

    let expiry_date = field(obj, EXPIRY_KEYS)
        .map(as_date)
        .transpose()
        .map_err(|e| format!("{}: expiry {}", product_id, e))?;

    let reorder_level = field(obj, REORDER_KEYS)
        .map(as_integer)
        .transpose()
        .map_err(|e| format!("{}: reorder level {}", product_id, e))?
        .unwrap_or(0)
        .max(0);

    Ok(InventorySnapshotItem {
        product_id,
        name,
        branch_stock,
        selling_price,
        unit_price,
        expiry_date,
        reorder_level,
        batch_number: field(obj, BATCH_KEYS).and_then(as_text),
        barcode: field(obj, BARCODE_KEYS).and_then(as_text),
    })
}

/// Parses the commit answer. Accepts a bare id, an object, or a one-row
/// array.
pub fn parse_sale_receipt(payload: &Value) -> BackendResult<SaleReceipt> {
    if let Some(receipt_id) = as_text(payload) {
        return Ok(SaleReceipt { receipt_id });
    }

    let obj = first_object(payload)?;
    let receipt_id = field(obj, RECEIPT_KEYS)
        .and_then(as_text)
        .ok_or_else(|| BackendError::invalid_payload("sale response has no receipt id"))?;

    Ok(SaleReceipt { receipt_id })
}

/// Parses the pending-transaction answer. The short code doubles as the
/// barcode payload when the backend sends none.
pub fn parse_pending_transaction(payload: &Value) -> BackendResult<PendingTransaction> {
    let obj = first_object(payload)?;

    let short_code = field(obj, SHORT_CODE_KEYS)
        .and_then(as_text)
        .ok_or_else(|| BackendError::invalid_payload("pending transaction has no short code"))?;
    let barcode = field(obj, PENDING_BARCODE_KEYS)
        .and_then(as_text)
        .unwrap_or_else(|| short_code.clone());

    Ok(PendingTransaction {
        short_code,
        barcode,
    })
}

/// Human-readable message for a refused request. Never echoes raw codes.
pub fn rejection_message(status: u16, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            let obj = first_object(&value).ok()?;
            field(obj, MESSAGE_KEYS).and_then(as_text)
        })
        .filter(|message| message.contains(' '));

    from_body.unwrap_or_else(|| {
        match status {
            401 | 403 => "You are not allowed to do this. Please sign in again.",
            404 => "The server does not support this operation.",
            500..=599 => "The server had a problem. Please try again.",
            _ => "The server rejected the request.",
        }
        .to_string()
    })
}

// =============================================================================
// Requests
// =============================================================================

pub fn inventory_body(branch_id: &str) -> Value {
    json!({ "p_branch_id": branch_id })
}

pub fn sale_request_body(request: &SaleRequest, decimals: u8) -> BackendResult<Value> {
    Ok(json!({
        "p_client_reference": request.client_reference,
        "p_branch_id": request.branch_id,
        "p_items": items_value(&request.items, decimals),
        "p_total": money_value(request.total, decimals),
        "p_customer_name": request.customer_name,
        "p_customer_id": request.customer_id,
        "p_shift_id": request.shift_id,
        "p_staff_name": request.staff_name,
        "p_payment_method": serde_json::to_value(request.payment_method)?,
        "p_prescription_images": request.prescription_images,
        "p_force_offline": request.force_offline,
    }))
}

pub fn pending_request_body(request: &PendingTransactionRequest, decimals: u8) -> Value {
    json!({
        "p_branch_id": request.branch_id,
        "p_items": items_value(&request.items, decimals),
        "p_total": money_value(request.total, decimals),
    })
}

fn items_value(items: &[SaleRequestItem], decimals: u8) -> Value {
    Value::Array(
        items
            .iter()
            .map(|item| {
                json!({
                    "product_id": item.product_id,
                    "qty": item.qty,
                    "unit_price": money_value(item.unit_price, decimals),
                })
            })
            .collect(),
    )
}

/// Whole-unit currencies go out as integers, others as exact decimal strings.
fn money_value(amount: Money, decimals: u8) -> Value {
    if decimals == 0 {
        Value::from(amount.minor())
    } else {
        Value::String(CurrencyFormat::new("", decimals).format_amount(amount))
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn rows_of(payload: &Value) -> BackendResult<&Vec<Value>> {
    match payload {
        Value::Array(rows) => Ok(rows),
        Value::Object(obj) => ["data", "items"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .ok_or_else(|| BackendError::invalid_payload("expected a list of inventory rows")),
        _ => Err(BackendError::invalid_payload("expected a list of inventory rows")),
    }
}

fn first_object(payload: &Value) -> BackendResult<&Map<String, Value>> {
    match payload {
        Value::Object(obj) => Ok(obj),
        Value::Array(rows) => rows
            .first()
            .and_then(Value::as_object)
            .ok_or_else(|| BackendError::invalid_payload("expected a single row")),
        _ => Err(BackendError::invalid_payload("expected an object")),
    }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| format!("'{}' is not a whole number", n)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{}' is not a whole number", s)),
        other => Err(format!("unexpected {}", kind(other))),
    }
}

fn as_money(value: &Value, decimals: u8) -> Result<Money, String> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(format!("unexpected {}", kind(other))),
    };
    Money::parse_decimal(&text, decimals).map_err(|e| e.to_string())
}

fn as_date(value: &Value) -> Result<NaiveDate, String> {
    let text = value
        .as_str()
        .map(str::trim)
        .ok_or_else(|| format!("unexpected {}", kind(value)))?;
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| format!("'{}' is not a date", text))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rxdesk_core::PaymentMethod;

    #[test]
    fn test_inventory_accepts_alias_keys_and_string_numbers() {
        let payload = json!([
            {
                "id": "p1",
                "name": "Paracetamol 500mg",
                "branchStock": "12",
                "sellingPrice": 600,
                "unit_price": "450.00",
                "expiryDate": "2026-08-31T00:00:00Z",
                "reorder_level": 5,
                "batchNumber": "B-77",
                "barcodeId": 6001234567u64
            },
            {
                "product_id": 42,
                "product_name": "ORS Sachet",
                "stock": 0,
                "price": 150.0
            }
        ]);

        let items = parse_inventory(&payload, 0).unwrap();
        assert_eq!(items.len(), 2);

        let para = &items[0];
        assert_eq!(para.product_id, "p1");
        assert_eq!(para.branch_stock, 12);
        assert_eq!(para.selling_price, Some(Money::from_minor(600)));
        assert_eq!(para.unit_price, Money::from_minor(450));
        assert_eq!(para.expiry_date, NaiveDate::from_ymd_opt(2026, 8, 31));
        assert_eq!(para.barcode.as_deref(), Some("6001234567"));

        let ors = &items[1];
        assert_eq!(ors.product_id, "42");
        assert_eq!(ors.branch_stock, 0);
        assert_eq!(ors.selling_price, None);
        assert_eq!(ors.unit_price, Money::from_minor(150));
    }

    #[test]
    fn test_inventory_drops_malformed_rows() {
        let payload = json!({ "data": [
            { "id": "ok", "name": "Good", "stock": 1, "unit_price": 100 },
            { "id": "neg", "name": "Negative", "stock": -3, "unit_price": 100 },
            { "id": "noprice", "name": "No price", "stock": 1 },
            { "name": "No id", "stock": 1, "unit_price": 100 },
            "not an object"
        ]});

        let items = parse_inventory(&payload, 0).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, "ok");
    }

    #[test]
    fn test_inventory_rejects_non_list() {
        assert!(parse_inventory(&json!("nope"), 0).is_err());
        assert!(parse_inventory(&json!({ "rows": [] }), 0).is_err());
    }

    #[test]
    fn test_two_decimal_currency() {
        let row = json!({ "id": "p", "name": "Vitamin C", "stock": 3, "unit_price": "12.5", "selling_price": 14.99 });
        let item = parse_inventory_item(&row, 2).unwrap();
        assert_eq!(item.unit_price, Money::from_minor(1250));
        assert_eq!(item.selling_price, Some(Money::from_minor(1499)));
    }

    #[test]
    fn test_receipt_shapes() {
        assert_eq!(parse_sale_receipt(&json!("R-1")).unwrap().receipt_id, "R-1");
        assert_eq!(
            parse_sale_receipt(&json!({ "receiptId": "R-2", "total": 100 })).unwrap().receipt_id,
            "R-2"
        );
        assert_eq!(
            parse_sale_receipt(&json!([{ "receipt_number": 1003 }])).unwrap().receipt_id,
            "1003"
        );
        assert!(parse_sale_receipt(&json!({ "ok": true })).is_err());
    }

    #[test]
    fn test_pending_transaction_barcode_fallback() {
        let pending = parse_pending_transaction(&json!({ "shortCode": "INV-42" })).unwrap();
        assert_eq!(pending.short_code, "INV-42");
        assert_eq!(pending.barcode, "INV-42");

        let pending =
            parse_pending_transaction(&json!([{ "short_code": "INV-7", "barcode": "PT7" }])).unwrap();
        assert_eq!(pending.barcode, "PT7");
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message(400, r#"{"code":"P0001","message":"Insufficient stock for Amoxicillin"}"#),
            "Insufficient stock for Amoxicillin"
        );
        assert_eq!(
            rejection_message(400, r#"{"code":"P0001","message":"P0001"}"#),
            "The server rejected the request."
        );
        assert_eq!(
            rejection_message(503, "<html>gateway</html>"),
            "The server had a problem. Please try again."
        );
    }

    #[test]
    fn test_sale_request_body() {
        let request = SaleRequest {
            client_reference: "ref-1".to_string(),
            branch_id: "b1".to_string(),
            items: vec![SaleRequestItem {
                product_id: "p1".to_string(),
                qty: 2,
                unit_price: Money::from_minor(1250),
            }],
            total: Money::from_minor(2500),
            customer_name: None,
            customer_id: Some("c1".to_string()),
            shift_id: None,
            staff_name: Some("Neema".to_string()),
            payment_method: PaymentMethod::MobileMoney,
            prescription_images: vec![],
            force_offline: true,
        };

        let body = sale_request_body(&request, 2).unwrap();
        assert_eq!(body["p_items"][0]["unit_price"], json!("12.50"));
        assert_eq!(body["p_total"], json!("25.00"));
        assert_eq!(body["p_payment_method"], json!("mobile_money"));
        assert_eq!(body["p_force_offline"], json!(true));

        let body = sale_request_body(&request, 0).unwrap();
        assert_eq!(body["p_total"], json!(2500));
    }
}

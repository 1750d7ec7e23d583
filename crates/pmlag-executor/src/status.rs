//! Venue payload normalization.
//!
//! Venue responses are inconsistent about where fill quantities live. All
//! field sniffing happens here, against fixed, ordered field lists.

use pmlag_core::{OrderStatus, OutcomeStatus, Size};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Direct filled-quantity fields. The largest present value wins.
const FILLED_FIELDS: &[&str] = &[
    "filledSize",
    "filled",
    "totalFilled",
    "filledAmount",
    "fillAmount",
    "size_matched",
];

/// Lists of individual fill records.
const FILL_LIST_FIELDS: &[&str] = &["fills", "recentFills"];

/// Quantity fields of one fill record, first present wins.
const FILL_RECORD_FIELDS: &[&str] = &["size", "filled", "makerAmount", "takerAmount"];

const REMAINING_FIELDS: &[&str] = &["remainingSize", "remaining"];

/// Original-size fields, used to derive remaining when not reported.
const SIZE_FIELDS: &[&str] = &["size", "quantity", "amount", "original_size"];

/// Order id fields of a post-order response, in priority order.
const ORDER_ID_FIELDS: &[&str] = &["orderId", "orderID", "id", "orderHash"];

/// One status poll, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatus {
    /// Lowercased venue status string (may be empty).
    pub raw: String,
    pub status: OrderStatus,
    pub filled: Size,
    pub remaining: Option<Decimal>,
}

impl NormalizedStatus {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Normalize a status payload for an order of `requested` size.
pub fn normalize_order_status(payload: &Value, requested: Size) -> NormalizedStatus {
    let raw = payload
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let mut filled = FILLED_FIELDS
        .iter()
        .filter_map(|field| payload.get(*field).and_then(decimal_from_value))
        .chain(std::iter::once(sum_fill_records(payload)))
        .fold(Decimal::ZERO, Decimal::max);

    let remaining = first_decimal(payload, REMAINING_FIELDS)
        .or_else(|| first_decimal(payload, SIZE_FIELDS).map(|size| size - filled));

    let status = match raw.as_str() {
        "filled" | "closed" | "matched" => OrderStatus::Filled,
        "cancelled" | "canceled" => OrderStatus::Cancelled,
        "expired" => OrderStatus::Expired,
        _ if remaining.is_some_and(|r| r <= Decimal::ZERO) => OrderStatus::Filled,
        _ if filled > Decimal::ZERO => OrderStatus::PartiallyFilled,
        _ => OrderStatus::Submitted,
    };

    if status == OrderStatus::Filled && filled <= Decimal::ZERO {
        filled = requested.inner();
    }

    NormalizedStatus {
        raw,
        status,
        filled: Size::new(filled),
        remaining,
    }
}

fn sum_fill_records(payload: &Value) -> Decimal {
    let Some(records) = FILL_LIST_FIELDS
        .iter()
        .find_map(|field| payload.get(*field).and_then(Value::as_array).filter(|l| !l.is_empty()))
    else {
        return Decimal::ZERO;
    };

    records
        .iter()
        .filter(|record| record.is_object())
        .filter_map(|record| {
            FILL_RECORD_FIELDS
                .iter()
                .filter_map(|field| record.get(*field).and_then(decimal_from_value))
                .find(|v| !v.is_zero())
        })
        .sum()
}

fn first_decimal(payload: &Value, fields: &[&str]) -> Option<Decimal> {
    fields
        .iter()
        .filter_map(|field| payload.get(*field).and_then(decimal_from_value))
        .next()
}

/// Decimal from a JSON number or numeric string.
fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        _ => None,
    }
}

/// Venue order id from a post-order response.
///
/// Known id fields first, then any key naming both "order" and "id".
pub fn extract_order_id(response: &Value) -> Option<String> {
    let object = response.as_object()?;

    let as_id = |value: &Value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    ORDER_ID_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(as_id))
        .or_else(|| {
            object.iter().find_map(|(key, value)| {
                let key = key.to_ascii_lowercase();
                if key.contains("order") && key.contains("id") {
                    as_id(value)
                } else {
                    None
                }
            })
        })
}

/// Map a submission error message to its terminal outcome.
pub fn classify_submit_error(message: &str) -> OutcomeStatus {
    let lower = message.to_ascii_lowercase();
    if lower.contains("balance") {
        OutcomeStatus::InsufficientBalance
    } else if lower.contains("allowance") || lower.contains("approval") {
        OutcomeStatus::AllowanceNeeded
    } else {
        OutcomeStatus::SubmitError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn requested() -> Size {
        Size::new(dec!(9))
    }

    #[test]
    fn test_matched_with_filled_size() {
        let s = normalize_order_status(&json!({ "status": "MATCHED", "filledSize": 9.0 }), requested());
        assert_eq!(s.status, OrderStatus::Filled);
        assert_eq!(s.filled, Size::new(dec!(9)));
        assert_eq!(s.raw, "matched");
    }

    #[test]
    fn test_terminal_fill_without_quantity_falls_back_to_requested() {
        let s = normalize_order_status(&json!({ "status": "filled" }), requested());
        assert_eq!(s.filled, requested());
    }

    #[test]
    fn test_fill_records_are_summed() {
        let payload = json!({
            "status": "live",
            "fills": [
                { "size": "2.5" },
                { "size": "0", "takerAmount": "1.5" },
                "junk",
            ],
        });
        let s = normalize_order_status(&payload, requested());
        assert_eq!(s.filled, Size::new(dec!(4.0)));
        assert_eq!(s.status, OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_largest_candidate_wins() {
        let payload = json!({ "status": "live", "filled": "1", "size_matched": "3" });
        assert_eq!(normalize_order_status(&payload, requested()).filled, Size::new(dec!(3)));
    }

    #[test]
    fn test_remaining_derived_from_original_size() {
        let payload = json!({ "status": "live", "original_size": "9", "size_matched": "9" });
        let s = normalize_order_status(&payload, requested());
        assert_eq!(s.remaining, Some(dec!(0)));
        assert_eq!(s.status, OrderStatus::Filled);
    }

    #[test]
    fn test_zero_remaining_without_fill_fields_is_filled() {
        let s = normalize_order_status(
            &json!({ "status": "live", "remainingSize": "0" }),
            Size::new(dec!(9)),
        );
        assert_eq!(s.status, OrderStatus::Filled);
        assert_eq!(s.filled, Size::new(dec!(9)));
        assert!(s.is_terminal());
    }

    #[test]
    fn test_cancel_spellings() {
        for raw in ["cancelled", "CANCELED"] {
            let s = normalize_order_status(&json!({ "status": raw }), requested());
            assert_eq!(s.status, OrderStatus::Cancelled);
            assert_eq!(s.filled, Size::ZERO);
        }
        let s = normalize_order_status(&json!({ "status": "expired" }), requested());
        assert_eq!(s.status, OrderStatus::Expired);
    }

    #[test]
    fn test_live_is_open() {
        let s = normalize_order_status(&json!({ "status": "live", "size": "9" }), requested());
        assert_eq!(s.status, OrderStatus::Submitted);
        assert_eq!(s.remaining, Some(dec!(9)));
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_extract_order_id_priority() {
        assert_eq!(
            extract_order_id(&json!({ "id": "b", "orderID": "a" })),
            Some("a".to_string())
        );
        assert_eq!(
            extract_order_id(&json!({ "success": true, "newOrderId": "c" })),
            Some("c".to_string())
        );
        assert_eq!(extract_order_id(&json!({ "orderID": "" })), None);
        assert_eq!(extract_order_id(&json!(["x"])), None);
    }

    #[test]
    fn test_classify_submit_error() {
        assert_eq!(
            classify_submit_error("not enough balance / allowance"),
            OutcomeStatus::InsufficientBalance
        );
        assert_eq!(
            classify_submit_error("token Approval required"),
            OutcomeStatus::AllowanceNeeded
        );
        assert_eq!(classify_submit_error("invalid tick size"), OutcomeStatus::SubmitError);
    }
}

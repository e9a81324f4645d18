use crate::value::{TextMode, Value};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::cmp::Ordering;

/// Total canonical comparator used for sorting and grouping.
///
/// Ordering rules:
/// 1. Null sorts before everything else
/// 2. Orderable values of compatible kinds compare by value
/// 3. Mixed, non-comparable kinds fall back to a fixed kind rank
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = canonical_cmp(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a.len().cmp(&b.len())
        }
        (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
        _ => strict_order_cmp(left, right).unwrap_or_else(|| rank(left).cmp(&rank(right))),
    }
}

/// Strict comparator for orderable values of compatible kinds.
///
/// Numeric kinds compare across Int/Float/Decimal. Returns `None` for
/// mismatched or non-orderable kinds.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
        (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&Decimal::from(*b))),
        #[allow(clippy::cast_precision_loss)]
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        #[allow(clippy::cast_precision_loss)]
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Decimal(a), Value::Float(b)) => a.to_f64()?.partial_cmp(b),
        (Value::Float(a), Value::Decimal(b)) => a.partial_cmp(&b.to_f64()?),
        (Value::Text(a), Value::Text(b)) | (Value::Enum(a), Value::Enum(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Equality under an optional case-insensitive text mode.
///
/// `Null` equals `Null` here; SQL null semantics are applied by predicate
/// evaluation, not by this helper.
#[must_use]
pub fn values_equal(left: &Value, right: &Value, mode: TextMode) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) if mode == TextMode::Insensitive => {
            a.to_lowercase() == b.to_lowercase()
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y, mode))
        }
        (Value::Json(a), Value::Json(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ if left.is_numeric() && right.is_numeric() => {
            strict_order_cmp(left, right) == Some(Ordering::Equal)
        }
        _ => left == right,
    }
}

const fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => 2,
        Value::Text(_) => 3,
        Value::Enum(_) => 4,
        Value::DateTime(_) => 5,
        Value::Json(_) => 6,
        Value::List(_) => 7,
    }
}

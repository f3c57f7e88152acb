//! Converts alloy `DynSolValue` into the JSON stored in `event_logs.args`.
//!
//! - integers that fit in 64 bits become JSON numbers, wider ones decimal
//!   strings (wei amounts routinely exceed `u64`)
//! - addresses are EIP-55 checksummed
//! - fixed and dynamic bytes are `0x` hex
//! - arrays and tuples become JSON arrays

use alloy_dyn_abi::DynSolValue;
use serde_json::Value;

/// Convert a decoded `DynSolValue` into a JSON value.
pub fn normalize(val: DynSolValue) -> Value {
    match val {
        DynSolValue::Bool(b) => Value::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => match i64::try_from(v) {
                Ok(small) => Value::from(small),
                Err(_) => Value::String(v.to_string()),
            },
            Err(_) => Value::String(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => match u64::try_from(v) {
                Ok(small) => Value::from(small),
                Err(_) => Value::String(v.to_string()),
            },
            Err(_) => Value::String(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => hex_value(&word[..size.min(32)]),

        DynSolValue::Bytes(b) => hex_value(&b),

        DynSolValue::String(s) => Value::String(s),

        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) | DynSolValue::Tuple(vals) => {
            Value::Array(vals.into_iter().map(normalize).collect())
        }

        DynSolValue::Function(f) => hex_value(f.as_slice()),
    }
}

fn hex_value(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

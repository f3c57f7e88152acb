//! Contract interface loading.
//!
//! Accepts either a hardhat-deploy artifact (`{"address": …, "abi": […]}`)
//! or a bare ABI array.

use std::path::Path;

use alloy_json_abi::JsonAbi;
use serde_json::Value;

use crate::error::AbiError;

/// Read and parse the ABI at `path`.
pub fn load_abi(path: impl AsRef<Path>) -> Result<JsonAbi, AbiError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| AbiError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&text)?;
    let abi = parse_abi(doc)?;
    tracing::debug!(path = %path.display(), events = abi.events.len(), "ABI loaded");
    Ok(abi)
}

/// Parse an ABI from an already-loaded JSON document.
pub fn parse_abi(doc: Value) -> Result<JsonAbi, AbiError> {
    let items = match doc {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut obj) => obj.remove("abi").ok_or(AbiError::MissingAbi)?,
        _ => return Err(AbiError::MissingAbi),
    };
    if !items.is_array() {
        return Err(AbiError::MissingAbi);
    }
    Ok(serde_json::from_value(items)?)
}

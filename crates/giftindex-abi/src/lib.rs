//! giftindex-abi: turns raw contract logs into named, decoded events.
//!
//! The [`EventDecoder`] holds one typed decoder per known event, in a fixed
//! priority order, built once from the contract ABI. Decoding a log is a
//! single pass that returns the first decoder's `Ok`.

pub mod abi;
pub mod decoder;
pub mod error;
pub mod normalizer;

pub use abi::{load_abi, parse_abi};
pub use decoder::{DecodedLog, EventDecoder, TypedEventDecoder};
pub use error::{AbiError, DecodeError};

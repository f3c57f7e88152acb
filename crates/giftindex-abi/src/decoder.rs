//! `EventDecoder`: ordered, first-match dispatch over typed event decoders.
//!
//! Every known event gets a [`TypedEventDecoder`] built from its ABI
//! definition. A log is offered to each decoder in declaration order and
//! the first one that decodes it wins. Layouts are assumed to be
//! distinguishable by this order (in practice topic0 already separates
//! them, since every decoder checks its selector).

use alloy_dyn_abi::EventExt;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::B256;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use giftindex_core::RawLog;

use crate::error::{AbiError, DecodeError};
use crate::normalizer;

/// A successfully decoded log.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// ABI event name, e.g. `"Tipped"`.
    pub event_name: String,
    /// Decoded parameters in ABI declaration order.
    pub args: IndexMap<String, Value>,
}

/// Decoder for one ABI event.
#[derive(Debug, Clone)]
pub struct TypedEventDecoder {
    event: Event,
    selector: B256,
}

impl TypedEventDecoder {
    pub fn new(event: Event) -> Self {
        let selector = event.selector();
        Self { event, selector }
    }

    pub fn name(&self) -> &str {
        &self.event.name
    }

    /// keccak256 of the canonical signature (topic0).
    pub fn selector(&self) -> B256 {
        self.selector
    }

    /// Canonical signature, e.g. `"Tipped(address,address,uint256,uint256,uint256)"`.
    pub fn signature(&self) -> String {
        self.event.signature()
    }

    /// Decode `topics` + `data` as this event.
    pub fn try_decode(
        &self,
        topics: &[B256],
        data: &[u8],
    ) -> Result<IndexMap<String, Value>, DecodeError> {
        let mismatch = |reason: String| DecodeError::Mismatch {
            event: self.event.name.clone(),
            reason,
        };

        if !self.event.anonymous && topics.first() != Some(&self.selector) {
            return Err(mismatch("selector mismatch".into()));
        }

        let decoded = self
            .event
            .decode_log_parts(topics.iter().copied(), data, true)
            .map_err(|e| mismatch(e.to_string()))?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut args = IndexMap::with_capacity(self.event.inputs.len());

        for (i, param) in self.event.inputs.iter().enumerate() {
            let value = if param.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let value = value.ok_or_else(|| mismatch(format!("no value for input #{i}")))?;
            let key = if param.name.is_empty() {
                i.to_string()
            } else {
                param.name.clone()
            };
            args.insert(key, normalizer::normalize(value));
        }

        Ok(args)
    }
}

/// The immutable, ordered set of known event decoders.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    decoders: Vec<TypedEventDecoder>,
}

impl EventDecoder {
    /// Build decoders for `names` (in that priority order) from `abi`.
    ///
    /// Every name must be declared in the ABI. For overloaded events the
    /// first declaration is used.
    pub fn from_abi<S: AsRef<str>>(abi: &JsonAbi, names: &[S]) -> Result<Self, AbiError> {
        if names.is_empty() {
            return Err(AbiError::NoEvents);
        }
        let decoders = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                abi.event(name)
                    .and_then(|overloads| overloads.first())
                    .cloned()
                    .map(TypedEventDecoder::new)
                    .ok_or_else(|| AbiError::EventNotFound {
                        name: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { decoders })
    }

    /// Build from explicit decoders (already in priority order).
    pub fn new(decoders: Vec<TypedEventDecoder>) -> Self {
        Self { decoders }
    }

    /// Event names in priority order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decoders.iter().map(TypedEventDecoder::name)
    }

    pub fn decoders(&self) -> &[TypedEventDecoder] {
        &self.decoders
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode a raw log with the first decoder that accepts it.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedLog, DecodeError> {
        let topics = log
            .topics
            .iter()
            .map(|t| parse_topic(t))
            .collect::<Result<Vec<_>, _>>()?;
        let data = parse_data(&log.data)?;

        for decoder in &self.decoders {
            match decoder.try_decode(&topics, &data) {
                Ok(args) => {
                    return Ok(DecodedLog {
                        event_name: decoder.name().to_string(),
                        args,
                    })
                }
                Err(e) => trace!(event = decoder.name(), error = %e, "decoder rejected log"),
            }
        }

        Err(DecodeError::UnknownEvent {
            topic0: log.topic0().unwrap_or("none").to_string(),
            log: Box::new(log.clone()),
        })
    }
}

fn parse_topic(topic: &str) -> Result<B256, DecodeError> {
    topic.parse::<B256>().map_err(|e| DecodeError::InvalidTopic {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

fn parse_data(data: &str) -> Result<Vec<u8>, DecodeError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(hex).map_err(|e| DecodeError::InvalidData(e.to_string()))
}

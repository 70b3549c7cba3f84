//! Event-log decoding.

use alloc::vec::Vec;

use crate::{decode, decode_static, keccak256, AbiError, Address, ParamType, Token};

/// One input of an event.
#[derive(Clone, Copy, Debug)]
pub struct EventParam {
    pub name: &'static str,
    pub kind: ParamType,
    pub indexed: bool,
}

/// An event declaration, e.g. `ChatbotCreated(address,address,string)`.
#[derive(Clone, Copy, Debug)]
pub struct EventSpec {
    pub name: &'static str,
    /// Canonical signature hashed into topic0.
    pub signature: &'static str,
    pub params: &'static [EventParam],
}

impl EventSpec {
    pub fn topic0(&self) -> [u8; 32] {
        keccak256(self.signature.as_bytes())
    }

    fn indexed_count(&self) -> usize {
        self.params.iter().filter(|p| p.indexed).count()
    }
}

/// A raw log entry from a transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<[u8; 32]>,
    pub data: Vec<u8>,
}

/// A log successfully decoded against an [`EventSpec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedEvent {
    pub name: &'static str,
    pub args: Vec<(&'static str, Token)>,
}

impl DecodedEvent {
    pub fn arg(&self, name: &str) -> Option<&Token> {
        self.args
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t)
    }
}

/// Decode `log` as an instance of `spec`.
///
/// The topic count must equal `1 + indexed inputs`, which keeps events that
/// share a topic0 but differ in indexing (ERC-20 vs ERC-721 `Transfer`) apart.
pub fn decode_log(spec: &EventSpec, log: &LogEntry) -> Result<DecodedEvent, AbiError> {
    let topic0 = log.topics.first().ok_or(AbiError::MissingTopic(0))?;
    if *topic0 != spec.topic0() || log.topics.len() != 1 + spec.indexed_count() {
        return Err(AbiError::TopicMismatch);
    }

    let data_types: Vec<ParamType> = spec
        .params
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.kind)
        .collect();
    let mut data_tokens = decode(&data_types, &log.data)?.into_iter();

    let mut topic_index = 1;
    let mut args = Vec::with_capacity(spec.params.len());
    for param in spec.params {
        let token = if param.indexed {
            let topic = log
                .topics
                .get(topic_index)
                .ok_or(AbiError::MissingTopic(topic_index))?;
            topic_index += 1;
            decode_static(param.kind, topic)?
        } else {
            data_tokens.next().ok_or(AbiError::TopicMismatch)?
        };
        args.push((param.name, token));
    }

    Ok(DecodedEvent {
        name: spec.name,
        args,
    })
}

/// The event half of a contract interface.
#[derive(Clone, Copy, Debug)]
pub struct Interface {
    pub events: &'static [EventSpec],
}

impl Interface {
    /// Decode a log against whichever known event its topic0 names.
    pub fn parse_log(&self, log: &LogEntry) -> Result<DecodedEvent, AbiError> {
        let topic0 = log.topics.first().ok_or(AbiError::MissingTopic(0))?;
        let spec = self
            .events
            .iter()
            .find(|e| e.topic0() == *topic0)
            .ok_or(AbiError::UnknownEvent)?;
        decode_log(spec, log)
    }

    /// First log that decodes as the event called `name`; logs that fail to
    /// decode are skipped.
    pub fn find_event<'a, I>(&self, logs: I, name: &str) -> Option<DecodedEvent>
    where
        I: IntoIterator<Item = &'a LogEntry>,
    {
        logs.into_iter()
            .filter_map(|log| self.parse_log(log).ok())
            .find(|event| event.name == name)
    }
}

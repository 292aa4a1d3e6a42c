use std::collections::BTreeMap;

use rmp_serde::{decode::Error as DecodeError, encode::Error as EncodeError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Leading byte of every persisted snapshot.
pub const SNAPSHOT_FORMAT_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to convert snapshot to JSON value: {0}")]
    JsonSerialize(#[source] serde_json::Error),
    #[error("failed to encode snapshot as messagepack: {0}")]
    MessagePackEncode(#[source] EncodeError),
    #[error("failed to decode snapshot messagepack: {0}")]
    MessagePackDecode(#[source] DecodeError),
    #[error("decoded snapshot does not match the expected shape: {0}")]
    JsonDeserialize(#[source] serde_json::Error),
    #[error("snapshot is empty")]
    Empty,
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u8),
}

/// Encodes a value as `[version] ++ messagepack`, with map keys sorted so equal
/// drafts always produce equal bytes.
pub fn encode_snapshot<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_value(value).map_err(CodecError::JsonSerialize)?;
    let body = rmp_serde::to_vec_named(&sort_keys(json)).map_err(CodecError::MessagePackEncode)?;

    let mut out = Vec::with_capacity(body.len() + 1);
    out.push(SNAPSHOT_FORMAT_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn decode_snapshot<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (version, body) = bytes.split_first().ok_or(CodecError::Empty)?;
    if *version != SNAPSHOT_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(*version));
    }
    let decoded: Value = rmp_serde::from_slice(body).map_err(CodecError::MessagePackDecode)?;
    serde_json::from_value(decoded).map_err(CodecError::JsonDeserialize)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(obj) => {
            let sorted: BTreeMap<String, Value> = obj
                .into_iter()
                .map(|(key, item)| (key, sort_keys(item)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        primitive => primitive,
    }
}

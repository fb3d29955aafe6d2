//! Self-describing JSON envelopes for everything persisted in the store.
//!
//! Every payload carries `{recordType, recordVersion, ...fields}`. Decoding reads the
//! two header fields first and rejects the wrong kind or the wrong record version
//! before any body field is interpreted.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Current schema version of the store. Embedded in the version marker, in every
/// sealed envelope and in every record envelope.
pub const SCHEMA_VERSION: u32 = 1;

/// Reserved key holding the version marker.
pub const VERSION_KEY: &str = "userversion";

/// Record-kind tag written into every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Invalid = 0,
    User = 1,
    Version = 2,
}

impl RecordType {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Unknown tags map to `Invalid`.
    pub fn from_u32(tag: u32) -> Self {
        match tag {
            1 => Self::User,
            2 => Self::Version,
            _ => Self::Invalid,
        }
    }
}

/// A typed record that can travel through the envelope codec.
pub trait Codec: Serialize + DeserializeOwned {
    /// Tag stamped on encode and required on decode.
    const RECORD_TYPE: RecordType;
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    #[serde(rename = "recordType")]
    record_type: u32,
    #[serde(rename = "recordVersion")]
    record_version: u32,
    #[serde(flatten)]
    body: &'a T,
}

/// Envelope header; body fields are ignored while reading it.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EnvelopeHeader {
    #[serde(rename = "recordType", default)]
    pub record_type: u32,
    #[serde(rename = "recordVersion", default)]
    pub record_version: u32,
}

impl EnvelopeHeader {
    #[inline]
    pub fn kind(&self) -> RecordType {
        RecordType::from_u32(self.record_type)
    }
}

/// Encodes `record`, stamping its record type and the current schema version.
pub fn encode<T: Codec>(record: &T) -> StoreResult<Vec<u8>> {
    let envelope = EnvelopeOut {
        record_type: T::RECORD_TYPE.as_u32(),
        record_version: SCHEMA_VERSION,
        body: record,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Reads only the envelope header.
pub fn peek_header(payload: &[u8]) -> StoreResult<EnvelopeHeader> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decodes a payload into `T` after checking record version, then record type.
pub fn decode<T: Codec>(payload: &[u8]) -> StoreResult<T> {
    let header = peek_header(payload)?;
    if header.record_version != SCHEMA_VERSION {
        return Err(StoreError::WrongRecordVersion {
            expected: SCHEMA_VERSION,
            found: header.record_version,
        });
    }
    if header.record_type != T::RECORD_TYPE.as_u32() {
        return Err(StoreError::WrongRecordType {
            expected: T::RECORD_TYPE.as_u32(),
            found: header.record_type,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

/// The version marker stored under [`VERSION_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Schema version the store was created with.
    pub version: u32,
    /// Unix time (seconds) the marker was written.
    pub time: i64,
}

impl VersionRecord {
    /// Marker for the current schema version, stamped now.
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            time: chrono::Utc::now().timestamp(),
        }
    }
}

impl Codec for VersionRecord {
    const RECORD_TYPE: RecordType = RecordType::Version;
}

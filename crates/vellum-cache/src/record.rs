//! Record model mirrored from the write path, and the status state machine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{CacheError, CacheResult};

/// Version every token starts at.
pub const INITIAL_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum RecordStatus {
    Invalid = 0,
    /// Lookup sentinel; never persisted.
    NotFound = 1,
    NotReviewed = 2,
    Censored = 3,
    Public = 4,
    UnreviewedChanges = 5,
    Archived = 6,
}

impl RecordStatus {
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Legal transitions driven by the write path:
    /// `NotReviewed -> {Censored, Public}`, `Public -> {UnreviewedChanges, Archived}`,
    /// `UnreviewedChanges -> {Censored, Public}`. `Censored` and `Archived` are terminal.
    pub fn can_transition_to(self, target: RecordStatus) -> bool {
        use RecordStatus::*;
        matches!(
            (self, target),
            (NotReviewed, Censored)
                | (NotReviewed, Public)
                | (Public, UnreviewedChanges)
                | (Public, Archived)
                | (UnreviewedChanges, Censored)
                | (UnreviewedChanges, Public)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Censored | Self::Archived)
    }

    /// Everything except the `NotFound` sentinel may be stored.
    pub fn is_persistable(self) -> bool {
        self != Self::NotFound
    }
}

impl From<RecordStatus> for i64 {
    fn from(s: RecordStatus) -> i64 {
        s.code()
    }
}

impl TryFrom<i64> for RecordStatus {
    type Error = CacheError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Invalid,
            1 => Self::NotFound,
            2 => Self::NotReviewed,
            3 => Self::Censored,
            4 => Self::Public,
            5 => Self::UnreviewedChanges,
            6 => Self::Archived,
            other => return Err(CacheError::InvalidStatus(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    pub mime: String,
    /// SHA-256 of the decoded payload, hex.
    pub digest: String,
    /// Base64 file body.
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStream {
    pub id: u64,
    pub payload: String,
}

/// Proof of acceptance: the token, merkle root of the files and the server signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensorshipRecord {
    pub token: String,
    pub merkle: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub version: String,
    pub status: RecordStatus,
    pub timestamp: i64,
    pub censorship_record: CensorshipRecord,
    #[serde(default)]
    pub metadata: Vec<MetadataStream>,
    #[serde(default)]
    pub files: Vec<File>,
}

impl Record {
    #[inline]
    pub fn token(&self) -> &str {
        &self.censorship_record.token
    }
}

/// Orders two versions of the same token: numerically when both are unsigned
/// integers, otherwise lexicographically.
pub fn version_ord(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Record counts by status over the latest version of every token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    pub invalid: u64,
    pub not_reviewed: u64,
    pub censored: u64,
    pub public: u64,
    pub unreviewed_changes: u64,
    pub archived: u64,
    pub total: u64,
}

impl InventoryStats {
    /// Adds `count` records of `status`. The `NotFound` sentinel cannot be counted.
    pub fn add(&mut self, status: RecordStatus, count: u64) -> CacheResult<()> {
        let slot = match status {
            RecordStatus::Invalid => &mut self.invalid,
            RecordStatus::NotReviewed => &mut self.not_reviewed,
            RecordStatus::Censored => &mut self.censored,
            RecordStatus::Public => &mut self.public,
            RecordStatus::UnreviewedChanges => &mut self.unreviewed_changes,
            RecordStatus::Archived => &mut self.archived,
            RecordStatus::NotFound => return Err(CacheError::InvalidStatus(status.code())),
        };
        *slot += count;
        self.total += count;
        Ok(())
    }

    pub fn by_status_sum(&self) -> u64 {
        self.invalid
            + self.not_reviewed
            + self.censored
            + self.public
            + self.unreviewed_changes
            + self.archived
    }
}

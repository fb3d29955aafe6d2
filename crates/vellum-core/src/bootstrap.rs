//! Version-marker bootstrap run on every store open.
//!
//! `Unopened → Opening → {Bootstrapped | Failed}`. A missing marker is written
//! with the current schema version; an existing marker must open under the
//! configured key and carry the current schema version. There is no migration
//! path: a mismatch is terminal for the store instance.

use crate::codec::{self, VersionRecord, SCHEMA_VERSION, VERSION_KEY};
use crate::crypto::EncryptionContext;
use crate::error::{StoreError, StoreResult};
use crate::store::Backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapFailure {
    /// The marker could not be opened with this key.
    WrongEncryptionKey,
    /// The marker (or its envelope) names another schema version.
    WrongVersion,
    /// The marker opened but is not a valid version record.
    Integrity,
    /// The backend failed while reading or writing the marker.
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Unopened,
    Opening,
    Bootstrapped,
    Failed(BootstrapFailure),
}

/// Result of a successful bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrapped {
    pub marker: VersionRecord,
    /// True when this open wrote the marker (first run).
    pub created: bool,
}

/// Drives the bootstrap state machine for one open attempt.
#[derive(Debug)]
pub struct Bootstrapper {
    state: BootstrapState,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Bootstrapper {
    pub fn new() -> Self {
        Self {
            state: BootstrapState::Unopened,
        }
    }

    #[inline]
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Ensures or validates the version marker in `backend`.
    pub fn run<B: Backend>(
        &mut self,
        backend: &B,
        crypto: &EncryptionContext,
    ) -> StoreResult<Bootstrapped> {
        self.state = BootstrapState::Opening;
        let result = Self::ensure_marker(backend, crypto);
        self.state = match &result {
            Ok(_) => BootstrapState::Bootstrapped,
            Err(e) => BootstrapState::Failed(classify(e)),
        };
        match &result {
            Ok(b) => tracing::info!(
                target: "vellum::bootstrap",
                backend = backend.name(),
                version = b.marker.version,
                created = b.created,
                "store bootstrapped"
            ),
            Err(e) => tracing::error!(
                target: "vellum::bootstrap",
                backend = backend.name(),
                error = %e,
                "store bootstrap failed"
            ),
        }
        result
    }

    fn ensure_marker<B: Backend>(
        backend: &B,
        crypto: &EncryptionContext,
    ) -> StoreResult<Bootstrapped> {
        let Some(sealed) = backend.get_raw(VERSION_KEY)? else {
            let marker = VersionRecord::current();
            let encoded = codec::encode(&marker)?;
            backend.put_raw(VERSION_KEY, &crypto.seal(SCHEMA_VERSION, &encoded)?)?;
            return Ok(Bootstrapped {
                marker,
                created: true,
            });
        };

        let (plain, envelope_version) = crypto
            .open(&sealed)
            .map_err(|_| StoreError::WrongEncryptionKey)?;
        if envelope_version != SCHEMA_VERSION {
            return Err(StoreError::WrongVersion {
                expected: SCHEMA_VERSION,
                found: envelope_version,
            });
        }
        let marker: VersionRecord = codec::decode(&plain)?;
        if marker.version != SCHEMA_VERSION {
            return Err(StoreError::WrongVersion {
                expected: SCHEMA_VERSION,
                found: marker.version,
            });
        }
        Ok(Bootstrapped {
            marker,
            created: false,
        })
    }
}

fn classify(e: &StoreError) -> BootstrapFailure {
    match e {
        StoreError::WrongEncryptionKey => BootstrapFailure::WrongEncryptionKey,
        StoreError::WrongVersion { .. } => BootstrapFailure::WrongVersion,
        StoreError::WrongRecordVersion { .. }
        | StoreError::WrongRecordType { .. }
        | StoreError::Json(_) => BootstrapFailure::Integrity,
        _ => BootstrapFailure::Backend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::crypto::EncryptionKey;

    fn ctx(seed: u8) -> EncryptionContext {
        EncryptionContext::new(&EncryptionKey::from_bytes([seed; 32]))
    }

    #[test]
    fn first_run_writes_marker_once() {
        let backend = MemoryBackend::new();
        let crypto = ctx(1);
        let mut boot = Bootstrapper::new();
        assert_eq!(boot.state(), BootstrapState::Unopened);

        let first = boot.run(&backend, &crypto).unwrap();
        assert!(first.created);
        assert_eq!(boot.state(), BootstrapState::Bootstrapped);
        assert_eq!(backend.len(), 1);

        let second = Bootstrapper::new().run(&backend, &crypto).unwrap();
        assert!(!second.created);
        assert_eq!(second.marker, first.marker);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn wrong_key_fails() {
        let backend = MemoryBackend::new();
        Bootstrapper::new().run(&backend, &ctx(1)).unwrap();

        let mut boot = Bootstrapper::new();
        let err = boot.run(&backend, &ctx(2)).unwrap_err();
        assert!(matches!(err, StoreError::WrongEncryptionKey));
        assert_eq!(
            boot.state(),
            BootstrapState::Failed(BootstrapFailure::WrongEncryptionKey)
        );
    }

    #[test]
    fn stale_schema_fails() {
        let backend = MemoryBackend::new();
        let crypto = ctx(1);
        let stale = serde_json::to_vec(&serde_json::json!({
            "recordType": 2,
            "recordVersion": SCHEMA_VERSION,
            "version": SCHEMA_VERSION + 1,
            "time": 0,
        }))
        .unwrap();
        backend
            .put_raw(VERSION_KEY, &crypto.seal(SCHEMA_VERSION, &stale).unwrap())
            .unwrap();

        let mut boot = Bootstrapper::new();
        let err = boot.run(&backend, &crypto).unwrap_err();
        assert!(matches!(err, StoreError::WrongVersion { found, .. } if found == SCHEMA_VERSION + 1));
        assert_eq!(boot.state(), BootstrapState::Failed(BootstrapFailure::WrongVersion));
    }

    #[test]
    fn stale_envelope_version_fails() {
        let backend = MemoryBackend::new();
        let crypto = ctx(1);
        let encoded = codec::encode(&VersionRecord::current()).unwrap();
        backend
            .put_raw(VERSION_KEY, &crypto.seal(SCHEMA_VERSION + 3, &encoded).unwrap())
            .unwrap();

        let err = Bootstrapper::new().run(&backend, &crypto).unwrap_err();
        assert!(matches!(err, StoreError::WrongVersion { found, .. } if found == SCHEMA_VERSION + 3));
    }
}

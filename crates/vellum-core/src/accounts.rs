//! Account (user) records persisted through any [`KeyValueStore`].
//!
//! Users are keyed by lower-cased email and travel through the codec as
//! `RecordType::User` envelopes, then through the store's sealing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{self, Codec, RecordType};
use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;

/// A public key bound to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Hex-encoded public key.
    pub key: String,
    /// Unix time the identity was activated, 0 if never.
    pub activated: i64,
    /// Unix time the identity was deactivated, 0 if still live.
    pub deactivated: i64,
}

impl Identity {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.activated != 0 && self.deactivated == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub hashed_password: Vec<u8>,
    pub admin: bool,
    pub last_login_time: i64,
    pub failed_login_attempts: u64,
    pub deactivated: bool,
    #[serde(default)]
    pub identities: Vec<Identity>,
}

impl User {
    /// A fresh, non-admin user. The id is replaced by [`Accounts::user_new`].
    pub fn new(email: impl Into<String>, username: impl Into<String>, hashed_password: Vec<u8>) -> Self {
        Self {
            id: Uuid::nil(),
            email: email.into(),
            username: username.into(),
            hashed_password,
            admin: false,
            last_login_time: 0,
            failed_login_attempts: 0,
            deactivated: false,
            identities: Vec::new(),
        }
    }

    /// The single active identity, if any.
    pub fn active_identity(&self) -> Option<&Identity> {
        self.identities.iter().find(|id| id.is_active())
    }
}

impl Codec for User {
    const RECORD_TYPE: RecordType = RecordType::User;
}

fn user_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User operations over a [`KeyValueStore`].
pub struct Accounts<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> Accounts<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Stores a new user under its email. Fails with `UserExists` if taken,
    /// including when another caller wins a concurrent create.
    pub fn user_new(&self, mut user: User) -> StoreResult<User> {
        let key = user_key(&user.email);
        user.id = Uuid::new_v4();
        match self.store.put_new(&key, &codec::encode(&user)?) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists) => return Err(StoreError::UserExists),
            Err(e) => return Err(e),
        }
        tracing::info!(target: "vellum::store", user_id = %user.id, "user created");
        Ok(user)
    }

    /// Looks a user up by email (case-insensitive).
    pub fn user_get(&self, email: &str) -> StoreResult<User> {
        let payload = self.store.get(&user_key(email))?;
        codec::decode(&payload)
    }

    pub fn user_get_by_username(&self, username: &str) -> StoreResult<User> {
        let wanted = username.to_lowercase();
        self.find(|u| u.username.to_lowercase() == wanted)
    }

    pub fn user_get_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.find(|u| u.id == id)
    }

    /// Overwrites an existing user. `NotFound` if the email is unknown.
    pub fn user_update(&self, user: &User) -> StoreResult<()> {
        let key = user_key(&user.email);
        if !self.store.has(&key)? {
            return Err(StoreError::NotFound);
        }
        self.store.put(&key, &codec::encode(user)?)
    }

    /// Every user record. Entries of other kinds are skipped.
    pub fn all_users(&self) -> StoreResult<Vec<User>> {
        let mut payloads = Vec::new();
        self.store.get_all(&mut |_, payload| payloads.push(payload.to_vec()))?;

        let mut users = Vec::with_capacity(payloads.len());
        for payload in payloads {
            if codec::peek_header(&payload)?.kind() != RecordType::User {
                continue;
            }
            users.push(codec::decode(&payload)?);
        }
        Ok(users)
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> StoreResult<User> {
        self.all_users()?
            .into_iter()
            .find(|u| pred(u))
            .ok_or(StoreError::NotFound)
    }
}

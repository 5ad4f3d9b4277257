//! Credential checking: turning a login form into an [`Identity`].
//!
//! Two traits split the job:
//!
//! - [`IdentityStore`]: where user records live (a database table in
//!   production, [`MemoryIdentityStore`] in tests and demos). Read-only.
//! - [`Authenticator`]: decides whether a login/password pair is valid.
//!   [`PasswordAuthenticator`] checks argon2 hashes from an identity store;
//!   tests can plug in anything else.
//!
//! Both an unknown login and a wrong password produce the same
//! [`SessionError::InvalidCredentials`] after the same argon2 work (an
//! unknown login is checked against a throwaway hash), so neither the
//! response nor its timing tells an attacker which logins exist.

use std::collections::HashMap;
use std::future::Future;
use std::sync::LazyLock;

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use mindtable_protocol::{Role, UserId};
use rand::Rng;

use crate::{Identity, SessionError};

// ---------------------------------------------------------------------------
// UserRecord / IdentityStore
// ---------------------------------------------------------------------------

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub login: String,
    /// PHC-format argon2 hash, e.g. `$argon2id$v=19$...`.
    pub credential_hash: String,
    pub role: Role,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

impl UserRecord {
    /// The part of the record that goes into a session.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            display_name: self.login.clone(),
            role: self.role,
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Read-only access to user records.
pub trait IdentityStore: Send + Sync + 'static {
    /// Looks a user up by login identifier. `Ok(None)` if there is none.
    fn find_by_login(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, SessionError>> + Send;
}

/// [`IdentityStore`] over a fixed set of users.
#[derive(Debug, Default, Clone)]
pub struct MemoryIdentityStore {
    users: HashMap<String, UserRecord>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a user, builder style.
    pub fn with_user(mut self, record: UserRecord) -> Self {
        self.users.insert(record.login.clone(), record);
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl IdentityStore for MemoryIdentityStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<UserRecord>, SessionError> {
        Ok(self.users.get(login).cloned())
    }
}

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

/// Validates a login/password pair and returns who it belongs to.
///
/// # Example
///
/// ```rust
/// use mindtable_protocol::{Role, UserId};
/// use mindtable_session::{Authenticator, Identity, SessionError};
///
/// /// Accepts "guest"/"guest" only. Handy for local development.
/// struct GuestAuthenticator;
///
/// impl Authenticator for GuestAuthenticator {
///     async fn authenticate(
///         &self,
///         login: &str,
///         password: &str,
///     ) -> Result<Identity, SessionError> {
///         if login != "guest" || password != "guest" {
///             return Err(SessionError::InvalidCredentials);
///         }
///         Ok(Identity {
///             user_id: UserId(0),
///             display_name: "guest".into(),
///             role: Role::Player,
///             email: None,
///             avatar: None,
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the matching identity, or
    /// [`SessionError::InvalidCredentials`] when the pair is wrong.
    fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Checks passwords against argon2 hashes held by an [`IdentityStore`].
#[derive(Debug, Clone)]
pub struct PasswordAuthenticator<I: IdentityStore> {
    identities: I,
}

impl<I: IdentityStore> PasswordAuthenticator<I> {
    pub fn new(identities: I) -> Self {
        Self { identities }
    }

    pub fn identities(&self) -> &I {
        &self.identities
    }
}

impl<I: IdentityStore> Authenticator for PasswordAuthenticator<I> {
    async fn authenticate(&self, login: &str, password: &str) -> Result<Identity, SessionError> {
        let Some(record) = self.identities.find_by_login(login).await? else {
            verify_off_thread(password, None).await?;
            tracing::debug!("login rejected: unknown user");
            return Err(SessionError::InvalidCredentials);
        };

        let valid = verify_off_thread(password, Some(record.credential_hash.clone())).await?;
        if !valid {
            tracing::debug!(user_id = %record.id, "login rejected: bad password");
            return Err(SessionError::InvalidCredentials);
        }
        Ok(record.identity())
    }
}

/// Stand-in hash for logins that do not exist. Same parameters as real
/// credentials, so verifying against it costs the same.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("mindtable unknown login").ok());

/// Runs [`verify_password`] on the blocking pool, keeping argon2 off the
/// async worker threads. `None` verifies against [`DUMMY_HASH`] and is
/// always `false`.
async fn verify_off_thread(password: &str, hash: Option<String>) -> Result<bool, SessionError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(&password, dummy);
            }
            false
        }
    })
    .await
    .map_err(|e| SessionError::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// Password hashing
// ---------------------------------------------------------------------------

/// Hashes `password` with argon2id and a random salt, in PHC string format.
///
/// Used to seed identity stores; the login path only ever verifies.
pub fn hash_password(password: &str) -> Result<String, SessionError> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| SessionError::Internal(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SessionError::Internal(e.to_string()))
}

/// `true` if `password` matches the PHC-format `hash`. A hash that cannot
/// be parsed matches nothing.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored credential hash is malformed");
            false
        }
    }
}

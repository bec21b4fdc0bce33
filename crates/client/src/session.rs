//! Session state: credentials, bearer token, nonce issuance, and request
//! signing.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

pub(crate) const API_KEY_NAME: &str = "apiKeyName";
pub(crate) const NONCE_NAME: &str = "nonce";
pub(crate) const HASH_KEY_NAME: &str = "hashkey";

/// Per-client session state.
///
/// Owned exclusively by the [`Client`](crate::Client) instance and mutated
/// only here; cleared on disconnect.
#[derive(Debug)]
pub(crate) struct Session {
    api_key: String,
    secret_key: String,
    user: String,
    password: String,
    token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
    connected: bool,
    last_nonce: u128,
}

impl Session {
    pub(crate) fn new(api_key: &str, secret_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            user: String::new(),
            password: String::new(),
            token: None,
            token_expires_at: None,
            connected: false,
            last_nonce: 0,
        }
    }

    /// Stores user credentials for login and later re-login.
    pub(crate) fn set_credentials(&mut self, user: &str, password: &str) {
        self.user = user.to_string();
        self.password = password.to_string();
    }

    pub(crate) fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub(crate) fn store_token(&mut self, token: String, expires_at: Option<DateTime<Utc>>) {
        self.token = Some(token);
        self.token_expires_at = expires_at;
        self.connected = true;
    }

    /// Clears token, expiry, and the connected flag. Credentials are kept so
    /// a later call can re-login.
    pub(crate) fn clear(&mut self) {
        self.token = None;
        self.token_expires_at = None;
        self.connected = false;
    }

    /// True when a login (or re-login) must happen before the next call:
    /// never connected, no token, or the token expires within the one-hour
    /// safety margin.
    pub(crate) fn needs_login(&self) -> bool {
        if !self.connected || self.token.is_none() {
            return true;
        }
        match self.token_expires_at {
            Some(expiry) => expiry < Utc::now() + Duration::hours(1),
            None => false,
        }
    }

    /// Signing parameters for one outbound call.
    ///
    /// Every call gets its own nonce and signature; the returned parameters
    /// must not be reused.
    pub(crate) fn sign_request(&mut self) -> Vec<(String, String)> {
        let nonce = self.next_nonce();
        let canonical = format!(
            "{API_KEY_NAME}|{}|{NONCE_NAME}|{nonce}|{}",
            self.api_key, self.secret_key
        );
        vec![
            (API_KEY_NAME.to_string(), self.api_key.clone()),
            (NONCE_NAME.to_string(), nonce.to_string()),
            (HASH_KEY_NAME.to_string(), self.hmac_hex(&canonical)),
        ]
    }

    /// Issues a nonce: nanoseconds since the epoch, bumped past the previous
    /// value when the clock granularity would repeat one.
    fn next_nonce(&mut self) -> u128 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let nonce = if now > self.last_nonce {
            now
        } else {
            self.last_nonce + 1
        };
        self.last_nonce = nonce;
        nonce
    }

    fn hmac_hex(&self, data: &str) -> String {
        let mut mac = HmacSha512::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

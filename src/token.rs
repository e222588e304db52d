use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::ApiConfig;
use crate::storage::KeyValueStore;
use crate::utils::error::{GuardError, Result};
use crate::{ip_block, rate_limit};

/// Fixed storage key for the sealed token bundle
const TOKEN_KEY: &str = "webguard.auth.token";

/// The credential pair issued at login/registration plus its expiry instant.
///
/// Exactly one bundle is active per client profile; a refresh replaces it
/// wholesale and a logout deletes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBundle {
    /// Bearer token attached to outbound API calls
    pub access_token: String,
    /// Long-lived token exchanged at the refresh endpoint
    pub refresh_token: String,
    /// Expiry instant in epoch milliseconds
    pub expires_at: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
struct ExpiryClaims {
    exp: i64,
}

/// Token lifecycle management over the key-value store.
///
/// The bundle is sealed with CHACHA20_POLY1305 under a key generated per
/// process and zeroized after key construction. Protection is best-effort:
/// the key never leaves process memory, so a bundle persisted by a previous
/// process fails closed and reads as absent.
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    sealing_key: LessSafeKey,
    rng: SystemRandom,
    http: Client,
    api: ApiConfig,
}

impl TokenStore {
    /// Create a token store over the given store and API endpoints
    pub fn new(store: Arc<dyn KeyValueStore>, api: ApiConfig) -> Result<Self> {
        let rng = SystemRandom::new();
        let mut key_bytes = Zeroizing::new([0u8; 32]);
        rng.fill(&mut key_bytes[..])
            .map_err(|_| GuardError::crypto("failed to generate sealing key"))?;
        let unbound = UnboundKey::new(&aead::CHACHA20_POLY1305, &key_bytes[..])
            .map_err(|_| GuardError::crypto("failed to build sealing key"))?;

        Ok(Self {
            store,
            sealing_key: LessSafeKey::new(unbound),
            rng,
            http: Client::new(),
            api,
        })
    }

    /// Seal `bundle` and persist it under the fixed key, unconditionally
    /// overwriting any prior value
    pub fn set_token(&self, bundle: &TokenBundle) -> Result<()> {
        let plain = serde_json::to_string(bundle)?;
        let sealed = self.seal(&plain)?;
        self.store.set(TOKEN_KEY, &sealed)
    }

    /// The stored access token, or `None` when nothing is stored or the
    /// entry cannot be decoded. Expiry is not checked here.
    pub fn get_token(&self) -> Option<String> {
        self.get_bundle().map(|bundle| bundle.access_token)
    }

    /// The whole stored bundle, or `None` when absent or undecodable
    pub fn get_bundle(&self) -> Option<TokenBundle> {
        let sealed = self.store.get(TOKEN_KEY).ok().flatten()?;
        match self.unseal(&sealed) {
            Ok(plain) => serde_json::from_str(&plain).ok(),
            Err(e) => {
                debug!(error = %e, "discarding undecodable token bundle");
                None
            }
        }
    }

    /// Delete the persisted bundle; succeeds if absent
    pub fn remove_token(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)
    }

    /// Exchange the stored refresh token for a new bundle.
    ///
    /// On success the bundle is replaced wholesale and `true` is returned.
    /// Every failure (no stored bundle, rejected call, non-success status,
    /// malformed body) leaves the existing bundle untouched and returns
    /// `false`; refresh failures are common and the caller falls back to the
    /// existing credentials.
    pub async fn refresh_token(&self) -> bool {
        match self.try_refresh().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "token refresh failed, keeping existing bundle");
                false
            }
        }
    }

    async fn try_refresh(&self) -> Result<()> {
        let bundle = self
            .get_bundle()
            .ok_or_else(|| GuardError::token("no refresh token stored"))?;

        let url = format!("{}{}", self.api.base_url, self.api.refresh_path);
        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: bundle.refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GuardError::token(format!(
                "refresh endpoint returned {}",
                response.status()
            )));
        }

        let refreshed: TokenBundle = response.json().await?;
        self.set_token(&refreshed)
    }

    /// Remove the token bundle plus all rate-limit and attempt-block state,
    /// returning the module to first-run state. Idempotent.
    pub fn clear_security_data(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)?;
        for prefix in [rate_limit::KEY_PREFIX, ip_block::KEY_PREFIX] {
            for key in self.store.keys_with_prefix(prefix)? {
                self.store.remove(&key)?;
            }
        }
        Ok(())
    }

    fn seal(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; aead::NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| GuardError::crypto("failed to generate nonce"))?;

        let nonce = Nonce::assume_unique_for_key(nonce_bytes);
        let mut in_out = plaintext.as_bytes().to_vec();
        self.sealing_key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GuardError::crypto("failed to seal token bundle"))?;

        let mut payload = nonce_bytes.to_vec();
        payload.extend_from_slice(&in_out);
        Ok(general_purpose::STANDARD.encode(payload))
    }

    fn unseal(&self, sealed: &str) -> Result<String> {
        let payload = general_purpose::STANDARD
            .decode(sealed)
            .map_err(|e| GuardError::crypto(format!("invalid sealed payload: {}", e)))?;
        if payload.len() < aead::NONCE_LEN {
            return Err(GuardError::crypto("sealed payload too short"));
        }

        let (nonce_bytes, ciphertext) = payload.split_at(aead::NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| GuardError::crypto("invalid nonce"))?;
        let mut in_out = ciphertext.to_vec();
        let plain = self
            .sealing_key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| GuardError::crypto("failed to unseal token bundle"))?;

        String::from_utf8(plain.to_vec())
            .map_err(|_| GuardError::crypto("sealed payload is not utf-8"))
    }
}

/// Check whether a token's expiry claim is strictly in the future.
///
/// The client holds no verification key, so only the `exp` claim is read;
/// signature validation is explicitly disabled. Any parse failure (not a
/// JWT, no expiry claim, malformed payload) reads as invalid. Never panics.
pub fn is_token_valid(token: &str) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    match decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => data.claims.exp > Utc::now().timestamp(),
        Err(e) => {
            debug!(error = %e, "token failed expiry extraction");
            false
        }
    }
}

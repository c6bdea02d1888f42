//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! Keys are cached per JWKS endpoint with a time-based expiry. Concurrent
//! misses on the same endpoint share a single fetch.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Key cache failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyCacheError {
    /// The JWKS endpoint could not be reached or returned garbage.
    #[error("JWKS fetch failed: {0}")]
    Fetch(String),

    /// The key set contained no usable signing key.
    #[error("no usable signing keys in JWKS")]
    NoUsableKeys,

    /// No key matches the token's `kid`.
    #[error("key '{0}' not found in JWKS")]
    KeyNotFound(String),
}

/// JWKS response from the endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, oct)
    pub kty: String,
    /// Key ID
    pub kid: Option<String>,
    /// Algorithm
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub key_use: Option<String>,

    // RSA parameters
    /// RSA modulus (base64url)
    pub n: Option<String>,
    /// RSA exponent (base64url)
    pub e: Option<String>,

    // EC parameters
    /// EC curve
    pub crv: Option<String>,
    /// EC x coordinate (base64url)
    pub x: Option<String>,
    /// EC y coordinate (base64url)
    pub y: Option<String>,

    // Symmetric parameters
    /// Shared secret (base64url)
    pub k: Option<String>,
}

/// Where key sets come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Jwks, KeyCacheError>;
}

/// Fetches key sets over HTTP.
pub struct HttpKeySource {
    http_client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(timeout: Duration) -> Result<Self, KeyCacheError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyCacheError::Fetch(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self, url: &str) -> Result<Jwks, KeyCacheError> {
        debug!(url = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| KeyCacheError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyCacheError::Fetch(format!(
                "JWKS endpoint returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KeyCacheError::Fetch(format!("failed to parse JWKS: {}", e)))
    }
}

type KeySet = Arc<HashMap<String, DecodingKey>>;
type InflightFetch = Shared<BoxFuture<'static, Result<KeySet, KeyCacheError>>>;

struct CachedKeySet {
    keys: KeySet,
    fetched_at: Instant,
}

/// Minimum time between two refreshes of the same key set triggered by an
/// unknown `kid`.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Concurrency-safe JWKS cache with single-flight population.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    min_refresh_interval: Duration,
    /// Cached key sets: JWKS url -> keys
    entries: RwLock<HashMap<String, CachedKeySet>>,
    /// Fetches in progress: JWKS url -> shared fetch
    inflight: Mutex<HashMap<String, InflightFetch>>,
}

impl KeyCache {
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get a decoding key from the JWKS at `url`.
    ///
    /// Without a `kid` the first usable key is returned. A miss on a fresh
    /// key set triggers a refresh to pick up rotated keys, at most once per
    /// minimum refresh interval.
    pub async fn get_key(&self, url: &str, kid: Option<&str>) -> Result<DecodingKey, KeyCacheError> {
        if let Some((keys, fetched_at)) = self.fresh_keys(url) {
            if let Some(key) = select_key(&keys, kid) {
                return Ok(key);
            }
            if fetched_at.elapsed() < self.min_refresh_interval {
                debug!(url = %url, kid = ?kid, "Key not found, JWKS refreshed recently");
                return Err(key_not_found(kid));
            }
            debug!(url = %url, kid = ?kid, "Key not found in cache, refreshing JWKS");
        }

        let keys = self.refresh(url).await?;
        select_key(&keys, kid).ok_or_else(|| key_not_found(kid))
    }

    fn fresh_keys(&self, url: &str) -> Option<(KeySet, Instant)> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(url)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| (Arc::clone(&entry.keys), entry.fetched_at))
    }

    /// Fetch the key set at `url`, sharing any fetch already in progress.
    async fn refresh(&self, url: &str) -> Result<KeySet, KeyCacheError> {
        let fetch = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(url) {
                // A completed fetch left behind by a cancelled caller is stale.
                Some(fetch) if fetch.peek().is_none() => fetch.clone(),
                _ => {
                    let source = Arc::clone(&self.source);
                    let owned_url = url.to_string();
                    let fetch = async move {
                        let jwks = source.fetch(&owned_url).await?;
                        decode_key_set(&owned_url, jwks).map(Arc::new)
                    }
                    .boxed()
                    .shared();
                    inflight.insert(url.to_string(), fetch.clone());
                    fetch
                }
            }
        };

        let result = fetch.clone().await;

        {
            let mut inflight = self.inflight.lock().await;
            if inflight.get(url).is_some_and(|f| f.ptr_eq(&fetch)) {
                inflight.remove(url);
            }
        }

        let keys = result?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }
}

fn key_not_found(kid: Option<&str>) -> KeyCacheError {
    KeyCacheError::KeyNotFound(kid.unwrap_or("default").to_string())
}

fn select_key(keys: &HashMap<String, DecodingKey>, kid: Option<&str>) -> Option<DecodingKey> {
    match kid {
        Some(kid) => keys.get(kid).cloned(),
        None => keys
            .get("default")
            .or_else(|| keys.values().next())
            .cloned(),
    }
}

fn decode_key_set(url: &str, jwks: Jwks) -> Result<HashMap<String, DecodingKey>, KeyCacheError> {
    let mut keys = HashMap::new();
    for jwk in jwks.keys {
        // Skip encryption keys
        if jwk.key_use.as_deref() == Some("enc") {
            continue;
        }

        match jwk_to_decoding_key(&jwk) {
            Ok(key) => {
                let kid = jwk.kid.clone().unwrap_or_else(|| "default".to_string());
                debug!(kid = %kid, kty = %jwk.kty, "Loaded JWK");
                keys.insert(kid, key);
            }
            Err(e) => {
                warn!(kid = ?jwk.kid, kty = %jwk.kty, error = %e, "Failed to parse JWK, skipping");
            }
        }
    }

    if keys.is_empty() {
        return Err(KeyCacheError::NoUsableKeys);
    }

    info!(url = %url, key_count = keys.len(), "JWKS cache refreshed");
    Ok(keys)
}

/// Required JWK parameter.
fn param<'a>(jwk: &Jwk, value: &'a Option<String>, name: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .ok_or_else(|| format!("{} key missing '{}'", jwk.kty, name))
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, String> {
    match jwk.kty.as_str() {
        "RSA" => DecodingKey::from_rsa_components(
            param(jwk, &jwk.n, "n")?,
            param(jwk, &jwk.e, "e")?,
        )
        .map_err(|e| format!("invalid RSA key: {}", e)),
        "EC" => match param(jwk, &jwk.crv, "crv")? {
            "P-256" | "P-384" => DecodingKey::from_ec_components(
                param(jwk, &jwk.x, "x")?,
                param(jwk, &jwk.y, "y")?,
            )
            .map_err(|e| format!("invalid EC key: {}", e)),
            crv => Err(format!("unsupported EC curve: {}", crv)),
        },
        "oct" => URL_SAFE_NO_PAD
            .decode(param(jwk, &jwk.k, "k")?)
            .map(|secret| DecodingKey::from_secret(&secret))
            .map_err(|e| format!("invalid symmetric key: {}", e)),
        kty => Err(format!("unsupported key type: {}", kty)),
    }
}

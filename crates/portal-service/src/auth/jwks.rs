//! JWKS client for fetching and caching the identity provider's signing keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the realm's
//! `protocol/openid-connect/certs` endpoint and caches them with a
//! configurable TTL.
//!
//! # Concurrency
//!
//! Cache hits only take the read lock. Refreshes are single-flight: callers
//! that miss queue on a refresh gate, and every fetch attempt (successful or
//! not) bumps an attempt counter and records its outcome under the gate. A
//! caller that observes a newer attempt after acquiring the gate takes that
//! outcome instead of fetching again, so N concurrent logins against a cold
//! cache cost one upstream request even while the IdP is down.
//!
//! # Security
//!
//! - An unseen `kid` triggers a refresh (key rotation). An optional
//!   `min_refresh_interval` bounds how often that can happen on a fresh cache
//! - Cache is invalidated on TTL expiry to pick up key rotations

use crate::errors::PortalError;
use crate::observability::metrics;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default upstream timeout in seconds.
const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key type ("RSA" for the realm's signing keys).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is intended for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing, "enc" for encryption).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Cached JWKS data with expiry time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    fetched_at: Instant,

    expires_at: Instant,
}

enum Lookup {
    Hit(Jwk),
    Miss { refresh_allowed: bool },
}

/// JWKS client for fetching and caching public keys.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    http_client: reqwest::Client,

    cache: RwLock<Option<CachedJwks>>,

    /// Serializes upstream fetches. Holds the error of the latest attempt.
    refresh_gate: Mutex<Option<String>>,

    /// Number of completed fetch attempts. Only written while holding the gate.
    refresh_attempts: AtomicU64,

    cache_ttl: Duration,

    min_refresh_interval: Duration,
}

impl JwksClient {
    /// Create a new JWKS client with default TTL and timeout.
    pub fn new(jwks_url: String) -> Self {
        Self::with_settings(
            jwks_url,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
        )
    }

    /// Create a new JWKS client.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL to the realm's JWKS endpoint
    /// * `cache_ttl` - How long to cache JWKS before refreshing
    /// * `timeout` - Upstream request timeout
    pub fn with_settings(jwks_url: String, cache_ttl: Duration, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "portal.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_gate: Mutex::new(None),
            refresh_attempts: AtomicU64::new(0),
            cache_ttl,
            min_refresh_interval: Duration::ZERO,
        }
    }

    /// Require a fresh cache to be at least `interval` old before an unseen
    /// `kid` refetches it. Zero (the default) always refetches.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Resolve a JWK by key ID.
    ///
    /// Returns the cached key when present, otherwise refreshes the key set
    /// (single-flight) and looks again.
    ///
    /// # Errors
    ///
    /// - `PortalError::JwksFetch` if the key set cannot be fetched or parsed
    /// - `PortalError::KeyNotFound` if `kid` is absent even after a refresh
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve_key(&self, kid: &str) -> Result<Jwk, PortalError> {
        // Read before the lookup so a refresh finishing in between is not repeated
        let observed = self.refresh_attempts.load(Ordering::Acquire);

        match self.lookup(kid).await {
            Lookup::Hit(key) => {
                tracing::debug!(target: "portal.auth.jwks", kid = %kid, "JWKS cache hit");
                return Ok(key);
            }
            Lookup::Miss {
                refresh_allowed: false,
            } => {
                tracing::debug!(target: "portal.auth.jwks", kid = %kid, "Key not in recently refreshed JWKS");
                return Err(PortalError::KeyNotFound(kid.to_string()));
            }
            Lookup::Miss {
                refresh_allowed: true,
            } => {}
        }

        self.refresh_single_flight(observed).await?;

        let cache = self.cache.read().await;
        match cache.as_ref().and_then(|c| c.keys.get(kid)) {
            Some(key) => Ok(key.clone()),
            None => {
                tracing::warn!(target: "portal.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
                Err(PortalError::KeyNotFound(kid.to_string()))
            }
        }
    }

    /// Make sure a non-expired key set is cached, fetching one if needed.
    ///
    /// Used by the readiness probe.
    pub async fn ensure_fresh(&self) -> Result<(), PortalError> {
        let observed = self.refresh_attempts.load(Ordering::Acquire);
        if self.is_fresh().await {
            return Ok(());
        }
        self.refresh_single_flight(observed).await
    }

    /// Number of keys currently cached.
    pub async fn cached_key_count(&self) -> usize {
        self.cache.read().await.as_ref().map_or(0, |c| c.keys.len())
    }

    /// Fetch unless an attempt finished after `observed`, in which case its
    /// outcome is returned instead.
    async fn refresh_single_flight(&self, observed: u64) -> Result<(), PortalError> {
        let mut last_error = self.refresh_gate.lock().await;

        if self.refresh_attempts.load(Ordering::Acquire) != observed {
            tracing::debug!(target: "portal.auth.jwks", "Using result of concurrent JWKS refresh");
            return match last_error.as_ref() {
                Some(message) => Err(PortalError::JwksFetch(message.clone())),
                None => Ok(()),
            };
        }

        let result = self.refresh_cache().await;
        *last_error = match &result {
            Err(PortalError::JwksFetch(message)) => Some(message.clone()),
            Err(other) => Some(other.to_string()),
            Ok(()) => None,
        };
        self.refresh_attempts.fetch_add(1, Ordering::Release);

        result
    }

    async fn is_fresh(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.expires_at > Instant::now())
    }

    async fn lookup(&self, kid: &str) -> Lookup {
        let cache = self.cache.read().await;
        let Some(cached) = cache.as_ref() else {
            return Lookup::Miss {
                refresh_allowed: true,
            };
        };

        let now = Instant::now();
        if cached.expires_at <= now {
            return Lookup::Miss {
                refresh_allowed: true,
            };
        }

        match cached.keys.get(kid) {
            Some(key) => Lookup::Hit(key.clone()),
            None => Lookup::Miss {
                refresh_allowed: now.duration_since(cached.fetched_at)
                    >= self.min_refresh_interval,
            },
        }
    }

    /// Fetch the key set and replace the cache. Caller must hold the gate.
    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), PortalError> {
        tracing::debug!(target: "portal.auth.jwks", url = %self.jwks_url, "Fetching JWKS");
        let start = Instant::now();

        let result = self.fetch().await;
        metrics::record_jwks_fetch(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );
        let jwks = result?;

        // Keys without a kid can never be selected by a token header
        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key)))
            .collect();

        tracing::info!(
            target: "portal.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        let now = Instant::now();
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });

        Ok(())
    }

    async fn fetch(&self) -> Result<JwksResponse, PortalError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "portal.auth.jwks", error = %e, "Failed to fetch JWKS");
                PortalError::JwksFetch(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "portal.auth.jwks",
                status = %status,
                "JWKS endpoint returned error"
            );
            return Err(PortalError::JwksFetch(format!("HTTP {}", status.as_u16())));
        }

        response.json().await.map_err(|e| {
            tracing::error!(target: "portal.auth.jwks", error = %e, "Failed to parse JWKS response");
            PortalError::JwksFetch("invalid key set document".to_string())
        })
    }

    /// Clear the cache.
    #[cfg(test)]
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

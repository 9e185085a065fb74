//! Cached JWKS handling for the identity provider.
//!
//! The keyset is cached in memory with a TTL; refresh happens on a stale
//! cache or when a token arrives with an unknown `kid`. If a refresh fails,
//! the last known keyset keeps serving so verification keeps working.

use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{ETAG, IF_NONE_MATCH},
    Client,
};
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant, SystemTime},
};
use tokio::sync::RwLock;
use tracing::{error, info, info_span, warn, Instrument};

use crate::idp::id_token::{verify_rs256, Error, IdTokenClaims};
use crate::idp::jwks::Jwks;

const KEYSET_CACHE_TTL_SECONDS: u64 = 300;
const KEYSET_REFRESH_COOLDOWN_SECONDS: u64 = 30;

#[derive(Debug)]
enum KeysetSource {
    /// Keyset loaded from a local file or CLI string and never refreshed.
    Static,
    /// Keyset fetched from the provider's certificate endpoint and refreshed
    /// as needed.
    Remote { url: String, client: Client },
}

#[derive(Debug, Clone)]
struct KeysetCache {
    /// Last known JWKS for ID-token verification.
    keyset: Jwks,
    /// When the keyset was last successfully fetched.
    fetched_at: Instant,
    /// `ETag` from the last successful fetch, if provided.
    etag: Option<String>,
}

impl KeysetCache {
    /// Keyset is fresh if within TTL; stale keysets trigger a refresh attempt.
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < Duration::from_secs(KEYSET_CACHE_TTL_SECONDS)
    }
}

/// Verifies identity-provider ID tokens using a cached JWKS.
#[derive(Debug)]
pub struct IdpVerifier {
    /// Where the JWKS comes from (static file or the provider's URL).
    keyset_source: KeysetSource,
    /// In-memory cached keyset and last fetch timestamp.
    keyset_cache: RwLock<KeysetCache>,
    /// Expected token audience (the OAuth client id).
    audience: String,
    /// Timestamp to throttle refresh attempts on unknown kid.
    last_refresh_unix: AtomicU64,
}

impl IdpVerifier {
    /// Build from a static keyset (file/inline), no remote refresh.
    #[must_use]
    pub fn new(keyset: Jwks, audience: String) -> Self {
        Self {
            keyset_source: KeysetSource::Static,
            keyset_cache: RwLock::new(KeysetCache {
                keyset,
                fetched_at: Instant::now(),
                etag: None,
            }),
            audience,
            last_refresh_unix: AtomicU64::new(0),
        }
    }

    /// Build a verifier that fetches the JWKS from the provider's
    /// certificate endpoint.
    ///
    /// The startup fetch is best-effort: if the endpoint is unreachable the
    /// verifier starts with an empty, stale cache so verification fails
    /// closed until a refresh succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub async fn new_remote(url: String, audience: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::api::APP_USER_AGENT)
            .build()
            .context("Failed to build JWKS HTTP client")?;

        let (keyset, fetched_at, last_refresh_unix, etag) =
            match fetch_keyset(&client, &url, None).await {
                Ok(FetchOutcome::Updated { keyset, etag }) => {
                    (keyset, Instant::now(), now_unix_seconds_u64(), etag)
                }
                Ok(FetchOutcome::NotModified) => {
                    warn!("JWKS fetch returned not-modified during startup");
                    (empty_keyset(), stale_instant(), 0, None)
                }
                Err(err) => {
                    warn!(
                        url = %url,
                        error = %err,
                        "JWKS fetch failed during startup; continuing with empty keyset"
                    );
                    (empty_keyset(), stale_instant(), 0, None)
                }
            };

        Ok(Self {
            keyset_source: KeysetSource::Remote { url, client },
            keyset_cache: RwLock::new(KeysetCache {
                keyset,
                fetched_at,
                etag,
            }),
            audience,
            last_refresh_unix: AtomicU64::new(last_refresh_unix),
        })
    }

    /// Return the configured audience for ID-token verification.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Verify an ID token against the cached keyset.
    ///
    /// Flow: use cached keyset; on unknown `kid`, refresh (with cooldown)
    /// and retry once.
    ///
    /// # Errors
    ///
    /// Returns a token error for any decode/signature/audience/expiry
    /// failure, or `KeysetUnavailable` when no keyset can be obtained.
    pub async fn verify(&self, token: &str) -> Result<IdTokenClaims, Error> {
        let keyset = self.keyset_snapshot().await.map_err(|e| {
            error!("JWKS snapshot failed: {e}");
            Error::KeysetUnavailable
        })?;

        match verify_rs256(token, &keyset, &self.audience, now_unix_seconds()) {
            Err(Error::UnknownKid(kid)) => match self.refresh_on_unknown_kid().await {
                Ok(true) => {
                    let keyset = self.keyset_snapshot().await.map_err(|e| {
                        error!("JWKS snapshot failed after refresh: {e}");
                        Error::KeysetUnavailable
                    })?;
                    verify_rs256(token, &keyset, &self.audience, now_unix_seconds())
                }
                Ok(false) => {
                    warn!(kid = %kid, "token kid not found and refresh suppressed");
                    Err(Error::UnknownKid(kid))
                }
                Err(e) => {
                    error!("JWKS refresh failed: {e}");
                    Err(Error::KeysetUnavailable)
                }
            },
            other => other,
        }
    }

    /// Return a keyset snapshot; refresh if stale, keep cache if refresh fails.
    async fn keyset_snapshot(&self) -> Result<Jwks> {
        let (cached, fresh) = {
            let cache = self.keyset_cache.read().await;
            (cache.keyset.clone(), cache.is_fresh())
        };

        if fresh {
            return Ok(cached);
        }

        if let KeysetSource::Remote { url, .. } = &self.keyset_source {
            if let Err(err) = self.refresh_keyset().await {
                // Refresh failure shouldn't break verification; keep using
                // the last cached keyset.
                warn!(
                    error = %err,
                    url = %url,
                    "failed to refresh JWKS cache"
                );
                return Ok(cached);
            }
        }

        let cache = self.keyset_cache.read().await;
        Ok(cache.keyset.clone())
    }

    /// Fetch the JWKS from the provider and update the in-memory cache.
    async fn refresh_keyset(&self) -> Result<()> {
        let (url, client, etag) = match &self.keyset_source {
            KeysetSource::Static => return Ok(()),
            KeysetSource::Remote { url, client } => {
                let etag = self.keyset_cache.read().await.etag.clone();
                (url.clone(), client.clone(), etag)
            }
        };

        match fetch_keyset(&client, &url, etag.as_deref()).await? {
            FetchOutcome::NotModified => {
                let mut cache = self.keyset_cache.write().await;
                cache.fetched_at = Instant::now();
            }
            FetchOutcome::Updated { keyset, etag } => {
                let mut cache = self.keyset_cache.write().await;
                cache.keyset = keyset;
                cache.fetched_at = Instant::now();
                cache.etag = etag;
                info!(keyset_keys = cache.keyset.keys.len(), "JWKS cache refreshed");
            }
        }
        Ok(())
    }

    /// Refresh if a token `kid` is unknown, with cooldown to avoid hammering
    /// the provider.
    async fn refresh_on_unknown_kid(&self) -> Result<bool> {
        if matches!(&self.keyset_source, KeysetSource::Static) {
            return Ok(false);
        }
        let now = now_unix_seconds_u64();
        let last = self.last_refresh_unix.load(Ordering::Relaxed);
        if now.saturating_sub(last) < KEYSET_REFRESH_COOLDOWN_SECONDS {
            return Ok(false);
        }
        self.last_refresh_unix.store(now, Ordering::Relaxed);
        self.refresh_keyset().await?;
        Ok(true)
    }
}

/// Unix seconds for token expiry validation.
fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Convenience for cooldown tracking (unsigned).
fn now_unix_seconds_u64() -> u64 {
    u64::try_from(now_unix_seconds()).unwrap_or(0)
}

/// Empty keyset used when the startup fetch fails; forces verification to
/// fail closed.
fn empty_keyset() -> Jwks {
    Jwks { keys: Vec::new() }
}

/// Produce an Instant that is already stale to trigger an early refresh.
fn stale_instant() -> Instant {
    Instant::now()
        .checked_sub(Duration::from_secs(KEYSET_CACHE_TTL_SECONDS + 1))
        .unwrap_or_else(Instant::now)
}

enum FetchOutcome {
    NotModified,
    Updated {
        keyset: Jwks,
        etag: Option<String>,
    },
}

/// Fetch the JWKS document and parse its JSON response.
async fn fetch_keyset(client: &Client, url: &str, etag: Option<&str>) -> Result<FetchOutcome> {
    let span = info_span!(
        "idp.keyset.fetch",
        http.method = "GET",
        url = %url
    );
    async {
        let mut request = client.get(url);
        if let Some(etag_value) = etag {
            request = request.header(IF_NONE_MATCH, etag_value);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 304 {
            return Ok(FetchOutcome::NotModified);
        }
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("JWKS fetch failed: {status}"));
        }

        let keyset = Jwks::from_json(&body).context("Invalid JWKS JSON")?;
        Ok(FetchOutcome::Updated { keyset, etag })
    }
    .instrument(span)
    .await
}

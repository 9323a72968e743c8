//! Position resolver — cache shortcut, then the provider chain.
//!
//! Sequential: cache → P1 → P2 → … → last error
//! Race:       cache → all providers at once → first well-formed answer wins,
//!             the rest are aborted

use super::cache::{Clock, PositionCache, SystemClock};
use super::providers::{Provider, ProviderOptions};
use super::types::{Fix, LocationError, Position, PositionSource, ProviderError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, Id, JoinSet};
use tracing::{debug, info, warn};

pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAXIMUM_CACHE_AGE_MS: u64 = 86_400_000;

/// How a resolver drives its providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One at a time, in order, until one succeeds.
    #[default]
    Sequential,
    /// All at once; first well-formed success wins.
    Race,
}

/// Resolver settings. Fixed for the lifetime of a [`Resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub provider_timeout_ms: u64,
    pub maximum_cache_age_ms: u64,
    /// Abort a provider that overruns its timeout instead of waiting on it.
    pub enforce_timeout: bool,
    pub strategy: Strategy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            maximum_cache_age_ms: DEFAULT_MAXIMUM_CACHE_AGE_MS,
            enforce_timeout: true,
            strategy: Strategy::Sequential,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), LocationError> {
        check_positive("provider_timeout_ms", self.provider_timeout_ms)?;
        check_positive("maximum_cache_age_ms", self.maximum_cache_age_ms)
    }
}

fn check_positive(field: &str, value: u64) -> Result<(), LocationError> {
    if value == 0 {
        return Err(LocationError::InvalidConfig(format!("{} must be greater than 0", field)));
    }
    Ok(())
}

/// Per-call overrides. Unset fields fall back to the resolver's own values.
#[derive(Debug, Clone, Default)]
pub struct ResolveOverrides {
    pub provider_timeout_ms: Option<u64>,
    pub maximum_cache_age_ms: Option<u64>,
    pub providers: Option<Vec<Arc<dyn Provider>>>,
}

/// Resolves the caller's position from the cache or a provider chain.
#[derive(Clone)]
pub struct Resolver {
    config: ResolverConfig,
    providers: Vec<Arc<dyn Provider>>,
    cache: PositionCache,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        providers: Vec<Arc<dyn Provider>>,
        cache: PositionCache,
    ) -> Result<Self, LocationError> {
        config.validate()?;
        Ok(Self::from_parts(config, providers, cache, Arc::new(SystemClock)))
    }

    /// Assemble without validating `config`.
    pub(crate) fn from_parts(
        config: ResolverConfig,
        providers: Vec<Arc<dyn Provider>>,
        cache: PositionCache,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, providers, cache, clock }
    }

    /// Replace the clock (for testing cache age).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Same settings and cache, different provider list.
    pub fn use_providers(&self, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Resolve with the resolver's own settings.
    pub async fn resolve(&self) -> Result<Position, LocationError> {
        self.locate_with(ResolveOverrides::default()).await.map(|fix| fix.position)
    }

    /// Resolve with per-call overrides.
    pub async fn resolve_with(&self, overrides: ResolveOverrides) -> Result<Position, LocationError> {
        self.locate_with(overrides).await.map(|fix| fix.position)
    }

    /// Like [`resolve`](Self::resolve), also reporting where the position came from.
    pub async fn locate(&self) -> Result<Fix, LocationError> {
        self.locate_with(ResolveOverrides::default()).await
    }

    pub async fn locate_with(&self, overrides: ResolveOverrides) -> Result<Fix, LocationError> {
        let max_age = overrides.maximum_cache_age_ms.unwrap_or(self.config.maximum_cache_age_ms);
        let timeout_ms = overrides.provider_timeout_ms.unwrap_or(self.config.provider_timeout_ms);
        check_positive("maximum_cache_age_ms", max_age)?;
        check_positive("provider_timeout_ms", timeout_ms)?;

        if let Some(position) = self.check_cache(max_age) {
            return Ok(Fix { position, source: PositionSource::Cache });
        }

        let providers = overrides.providers.as_deref().unwrap_or(self.providers.as_slice());
        let options = ProviderOptions { timeout: Duration::from_millis(timeout_ms) };

        let (provider, position) = match self.config.strategy {
            Strategy::Sequential => self.run_sequential(providers, options).await?,
            Strategy::Race => self.run_race(providers, options).await?,
        };

        self.commit(&provider, position);
        Ok(Fix { position, source: PositionSource::Provider(provider) })
    }

    // ─── Shared prefix / suffix ─────────────────────────────────

    fn check_cache(&self, max_age_ms: u64) -> Option<Position> {
        match self.cache.read_at(max_age_ms, self.clock.now_millis()) {
            Ok(Some(position)) => {
                debug!(%position, "cache hit");
                Some(position)
            }
            Ok(None) => {
                debug!("cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn commit(&self, provider: &str, position: Position) {
        if let Err(e) = self.cache.write(position, self.clock.now_millis()) {
            warn!(error = %e, "failed to cache resolved position");
        }
        info!(provider, %position, "position resolved");
    }

    // ─── Strategies ─────────────────────────────────────────────

    async fn run_sequential(
        &self,
        providers: &[Arc<dyn Provider>],
        options: ProviderOptions,
    ) -> Result<(String, Position), LocationError> {
        let mut last_error = None;

        for (index, provider) in providers.iter().enumerate() {
            debug!(provider = provider.name(), index, "trying provider");
            match attempt(Arc::clone(provider), options, self.config.enforce_timeout).await {
                Ok(position) => return Ok((provider.name().to_string(), position)),
                Err(e) => {
                    let remaining = providers.len() - index - 1;
                    warn!(provider = provider.name(), error = %e, remaining, "provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LocationError::NoProviders))
    }

    async fn run_race(
        &self,
        providers: &[Arc<dyn Provider>],
        options: ProviderOptions,
    ) -> Result<(String, Position), LocationError> {
        if providers.is_empty() {
            return Err(LocationError::NoProviders);
        }

        let enforce = self.config.enforce_timeout;
        let mut set = JoinSet::new();
        let mut in_flight: HashMap<Id, (String, AbortHandle)> = HashMap::with_capacity(providers.len());

        for provider in providers {
            let provider = Arc::clone(provider);
            let name = provider.name().to_string();
            let handle = set.spawn(async move { attempt(provider, options, enforce).await });
            debug!(provider = %name, id = %handle.id(), "starting provider");
            in_flight.insert(handle.id(), (name, handle));
        }

        let mut last_error = None;
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let provider = in_flight
                        .remove(&e.id())
                        .map(|(name, _)| name)
                        .unwrap_or_else(|| "unknown".into());
                    warn!(provider = %provider, error = %e, outstanding = set.len(), "provider task failed");
                    last_error = Some(LocationError::Provider {
                        provider,
                        source: ProviderError::Other(e.to_string()),
                    });
                    continue;
                }
            };
            let name = in_flight
                .remove(&id)
                .map(|(name, _)| name)
                .unwrap_or_else(|| "unknown".into());

            match result {
                Ok(position) => {
                    for (_, (other, handle)) in in_flight.drain() {
                        debug!(provider = %other, "aborting losing provider");
                        handle.abort();
                    }
                    // Wait for the aborted tasks to be dropped so nothing outlives the race.
                    set.shutdown().await;
                    return Ok((name, position));
                }
                Err(e) => {
                    warn!(provider = %name, error = %e, outstanding = set.len(), "provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LocationError::NoProviders))
    }
}

/// One provider request: timeout watchdog, error attribution, shape check.
async fn attempt(
    provider: Arc<dyn Provider>,
    options: ProviderOptions,
    enforce_timeout: bool,
) -> Result<Position, LocationError> {
    let request = provider.get_position(options);
    let outcome = if enforce_timeout {
        match tokio::time::timeout(options.timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProviderError::Timeout(options.timeout)),
        }
    } else {
        request.await
    };

    match outcome {
        Ok(position) => position.validate(provider.name()),
        Err(source) => Err(LocationError::Provider {
            provider: provider.name().to_string(),
            source,
        }),
    }
}

//! Process-wide [`Geolocator`] for callers that don't want to thread one around.
//!
//! Call [`init`] once at startup; without it the first use creates a
//! geolocator over the default file store with no providers. [`teardown`]
//! removes the instance again.

use crate::location::{FileStore, Geolocator, LocationError, Position, Provider, ResolveOverrides, Resolver};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

static GLOBAL: OnceLock<RwLock<Option<Geolocator>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Geolocator>> {
    GLOBAL.get_or_init(|| RwLock::new(None))
}

fn default_geolocator() -> Geolocator {
    Geolocator::new(Arc::new(FileStore::open_default()))
}

fn with<R>(f: impl FnOnce(&Geolocator) -> R) -> R {
    {
        let guard = slot().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(geo) = guard.as_ref() {
            return f(geo);
        }
    }
    with_mut(|geo| f(&*geo))
}

fn with_mut<R>(f: impl FnOnce(&mut Geolocator) -> R) -> R {
    let mut guard = slot().write().unwrap_or_else(PoisonError::into_inner);
    f(guard.get_or_insert_with(default_geolocator))
}

/// Install `geolocator` as the process-wide instance, replacing any previous one.
pub fn init(geolocator: Geolocator) {
    *slot().write().unwrap_or_else(PoisonError::into_inner) = Some(geolocator);
}

/// Remove and return the process-wide instance.
pub fn teardown() -> Option<Geolocator> {
    slot().write().unwrap_or_else(PoisonError::into_inner).take()
}

pub fn is_initialized() -> bool {
    slot().read().unwrap_or_else(PoisonError::into_inner).is_some()
}

pub fn register_provider(name: impl Into<String>, provider: Arc<dyn Provider>) {
    with_mut(|geo| {
        geo.register_provider(name, provider);
    });
}

pub fn provider(name: &str) -> Option<Arc<dyn Provider>> {
    with(|geo| geo.registry().get(name))
}

pub fn provider_names() -> Vec<String> {
    with(|geo| geo.registry().names().into_iter().map(str::to_string).collect())
}

pub fn set_default_providers(providers: Vec<Arc<dyn Provider>>) {
    with_mut(|geo| {
        geo.set_default_providers(providers);
    });
}

/// Resolver over the process-wide defaults.
pub fn resolver() -> Resolver {
    with(Geolocator::resolver)
}

/// Resolver over an explicit provider list.
pub fn use_providers(providers: Vec<Arc<dyn Provider>>) -> Resolver {
    with(|geo| geo.use_providers(providers))
}

pub async fn get_position() -> Result<Position, LocationError> {
    // The lock is released before awaiting.
    resolver().resolve().await
}

pub async fn get_position_with(overrides: ResolveOverrides) -> Result<Position, LocationError> {
    resolver().resolve_with(overrides).await
}

//! Location subsystem for geofix.
//!
//! Resolves the caller's position from a single cached record or, on a miss,
//! from an ordered list of interchangeable providers.

pub mod cache;
pub mod facade;
pub mod providers;
pub mod resolver;
pub mod store;
pub mod types;

pub use cache::{Clock, PositionCache, SystemClock, CACHE_KEY};
pub use facade::Geolocator;
pub use providers::{FnProvider, Provider, ProviderFuture, ProviderOptions, ProviderRegistry, StaticProvider};
pub use resolver::{ResolveOverrides, Resolver, ResolverConfig, Strategy};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{CachedRecord, Fix, LocationError, Position, PositionSource, ProviderError, StoreError};

//! Composition root: shared settings, provider registry, store and clock,
//! handing out configured [`Resolver`]s.

use super::cache::{Clock, PositionCache, SystemClock};
use super::providers::{Provider, ProviderRegistry};
use super::resolver::{ResolveOverrides, Resolver, ResolverConfig};
use super::store::KeyValueStore;
use super::types::{Fix, LocationError, Position};
use std::sync::Arc;

pub struct Geolocator {
    config: ResolverConfig,
    registry: ProviderRegistry,
    cache: PositionCache,
    clock: Arc<dyn Clock>,
}

impl Geolocator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config: ResolverConfig::default(),
            registry: ProviderRegistry::new(),
            cache: PositionCache::new(store),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Result<Self, LocationError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &PositionCache {
        &self.cache
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn register_provider(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> &mut Self {
        self.registry.register(name, provider);
        self
    }

    /// Replace the default provider list.
    pub fn set_default_providers(&mut self, providers: Vec<Arc<dyn Provider>>) -> &mut Self {
        self.registry.set_default_providers(providers);
        self
    }

    /// Replace the default provider list with registered providers, by name.
    pub fn set_default_provider_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<&mut Self, LocationError> {
        let providers = self.registry.resolve_names(names)?;
        Ok(self.set_default_providers(providers))
    }

    /// Resolver over the default providers.
    pub fn resolver(&self) -> Resolver {
        self.use_providers(self.registry.default_providers().to_vec())
    }

    /// Resolver over an explicit provider list.
    pub fn use_providers(&self, providers: Vec<Arc<dyn Provider>>) -> Resolver {
        // `config` is validated on the way in, so construction cannot fail here.
        Resolver::from_parts(self.config, providers, self.cache.clone(), Arc::clone(&self.clock))
    }

    /// One-shot resolution with the defaults.
    pub async fn get_position(&self) -> Result<Position, LocationError> {
        self.resolver().resolve().await
    }

    pub async fn get_position_with(&self, overrides: ResolveOverrides) -> Result<Position, LocationError> {
        self.resolver().resolve_with(overrides).await
    }

    pub async fn locate_with(&self, overrides: ResolveOverrides) -> Result<Fix, LocationError> {
        self.resolver().locate_with(overrides).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::providers::StaticProvider;
    use crate::location::resolver::Strategy;
    use crate::location::store::MemoryStore;
    use crate::location::types::PositionSource;

    fn geolocator() -> Geolocator {
        Geolocator::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_get_position_defaults() {
        let mut geo = geolocator();
        geo.set_default_providers(vec![Arc::new(StaticProvider::manual(21.4225, 39.8262))]);

        assert_eq!(geo.get_position().await.unwrap(), Position::new(21.4225, 39.8262));
    }

    #[tokio::test]
    async fn test_no_defaults_is_error() {
        let geo = geolocator();
        assert!(matches!(geo.get_position().await, Err(LocationError::NoProviders)));
    }

    #[tokio::test]
    async fn test_use_providers_ignores_defaults() {
        let mut geo = geolocator();
        geo.set_default_providers(vec![Arc::new(StaticProvider::new("default", Position::new(0.0, 0.0)))]);

        let resolver = geo.use_providers(vec![Arc::new(StaticProvider::new("other", Position::new(5.0, 5.0)))]);
        let fix = resolver.locate().await.unwrap();
        assert_eq!(fix.source, PositionSource::Provider("other".into()));
        assert_eq!(geo.registry().default_providers().len(), 1);
    }

    #[tokio::test]
    async fn test_defaults_by_name() {
        let mut geo = geolocator();
        geo.register_provider("home", Arc::new(StaticProvider::new("home", Position::new(1.0, 1.0))))
            .register_provider("work", Arc::new(StaticProvider::new("work", Position::new(2.0, 2.0))));

        geo.set_default_provider_names(&["work", "home"]).unwrap();
        assert_eq!(geo.get_position().await.unwrap(), Position::new(2.0, 2.0));

        assert!(matches!(
            geo.set_default_provider_names(&["gps"]),
            Err(LocationError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_with_config() {
        let config = ResolverConfig { strategy: Strategy::Race, ..ResolverConfig::default() };
        let geo = geolocator().with_config(config).unwrap();
        assert_eq!(geo.resolver().config().strategy, Strategy::Race);

        let bad = ResolverConfig { maximum_cache_age_ms: 0, ..ResolverConfig::default() };
        assert!(geolocator().with_config(bad).is_err());
    }

    #[tokio::test]
    async fn test_resolvers_share_cache() {
        let mut geo = geolocator();
        geo.set_default_providers(vec![Arc::new(StaticProvider::manual(3.0, 4.0))]);
        geo.get_position().await.unwrap();

        let fix = geo.use_providers(vec![]).locate().await.unwrap();
        assert_eq!(fix.source, PositionSource::Cache);
        assert_eq!(fix.position, Position::new(3.0, 4.0));
    }
}

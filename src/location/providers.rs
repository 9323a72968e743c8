//! Position providers: the capability contract, two generic adapters, and
//! the named registry callers pick built-in providers from.

use super::types::{LocationError, Position, ProviderError};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by [`Provider::get_position`].
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<Position, ProviderError>> + Send + 'a>>;

/// Per-request hints passed to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderOptions {
    /// How long the provider should spend before giving up on its own.
    pub timeout: Duration,
}

/// A source that can produce the caller's position.
///
/// The returned future resolves exactly once. Dropping it cancels the
/// request; providers must not report anything after that.
pub trait Provider: Send + Sync + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    fn get_position(&self, options: ProviderOptions) -> ProviderFuture<'_>;
}

impl fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}

// ─── Manual entry ───────────────────────────────────────────────

/// Always answers with the same coordinates.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    position: Position,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, position: Position) -> Self {
        Self { name: name.into(), position }
    }

    /// The conventional `manual` provider for user-entered coordinates.
    pub fn manual(latitude: f64, longitude: f64) -> Self {
        Self::new("manual", Position::new(latitude, longitude))
    }
}

impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_position(&self, _options: ProviderOptions) -> ProviderFuture<'_> {
        let position = self.position;
        Box::pin(async move { Ok(position) })
    }
}

// ─── Closure adapter ────────────────────────────────────────────

/// Wraps an async closure as a provider.
pub struct FnProvider<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnProvider<F>
where
    F: Fn(ProviderOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Position, ProviderError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F, Fut> Provider for FnProvider<F>
where
    F: Fn(ProviderOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Position, ProviderError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn get_position(&self, options: ProviderOptions) -> ProviderFuture<'_> {
        Box::pin((self.f)(options))
    }
}

// ─── Registry ───────────────────────────────────────────────────

/// Named providers plus the default ordered list used when a resolver is
/// built without an explicit one.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    named: BTreeMap<String, Arc<dyn Provider>>,
    defaults: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a provider under `name`.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> &mut Self {
        self.named.insert(name.into(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.named.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.named.keys().map(String::as_str).collect()
    }

    /// Look up providers by name, keeping the given order.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Provider>>, LocationError> {
        names
            .iter()
            .map(|n| {
                self.get(n.as_ref())
                    .ok_or_else(|| LocationError::UnknownProvider(n.as_ref().to_string()))
            })
            .collect()
    }

    pub fn set_default_providers(&mut self, providers: Vec<Arc<dyn Provider>>) -> &mut Self {
        self.defaults = providers;
        self
    }

    pub fn default_providers(&self) -> &[Arc<dyn Provider>] {
        &self.defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ProviderOptions {
        ProviderOptions { timeout: Duration::from_millis(100) }
    }

    #[tokio::test]
    async fn test_static_provider() {
        let p = StaticProvider::manual(21.4225, 39.8262);
        assert_eq!(p.name(), "manual");
        assert_eq!(p.get_position(opts()).await.unwrap(), Position::new(21.4225, 39.8262));
    }

    #[tokio::test]
    async fn test_fn_provider_sees_timeout() {
        let p = FnProvider::new("echo", |o: ProviderOptions| async move {
            Ok(Position::new(o.timeout.as_millis() as f64, 0.0))
        });
        let pos = p.get_position(opts()).await.unwrap();
        approx::assert_relative_eq!(pos.latitude, 100.0);
    }

    #[tokio::test]
    async fn test_fn_provider_error() {
        let p = FnProvider::new("denied", |_: ProviderOptions| async { Err(ProviderError::Denied("user said no".into())) });
        assert!(matches!(p.get_position(opts()).await, Err(ProviderError::Denied(_))));
    }

    #[test]
    fn test_registry_lookup() {
        let mut reg = ProviderRegistry::new();
        reg.register("manual", Arc::new(StaticProvider::manual(1.0, 2.0)))
            .register("home", Arc::new(StaticProvider::new("home", Position::new(3.0, 4.0))));

        assert_eq!(reg.names(), vec!["home", "manual"]);
        assert!(reg.get("manual").is_some());
        assert!(reg.get("gps").is_none());

        let chain = reg.resolve_names(&["manual", "home"]).unwrap();
        let names: Vec<&str> = chain.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["manual", "home"]);
    }

    #[test]
    fn test_registry_unknown_name() {
        let reg = ProviderRegistry::new();
        let err = reg.resolve_names(&["gps"]).unwrap_err();
        assert!(matches!(err, LocationError::UnknownProvider(ref n) if n == "gps"));
    }

    #[test]
    fn test_registry_defaults_replace() {
        let mut reg = ProviderRegistry::new();
        assert!(reg.default_providers().is_empty());

        reg.set_default_providers(vec![Arc::new(StaticProvider::manual(1.0, 2.0))]);
        reg.set_default_providers(vec![
            Arc::new(StaticProvider::new("a", Position::new(0.0, 0.0))),
            Arc::new(StaticProvider::new("b", Position::new(0.0, 0.0))),
        ]);
        let names: Vec<&str> = reg.default_providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}

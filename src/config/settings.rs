//! Typed settings loaded from the environment and cached per schema.
//!
//! A settings schema is any `Deserialize` struct implementing [`Settings`].
//! Keys are matched case-insensitively against environment variables
//! (`DATABASE_URL` fills a `database_url` field). Unknown keys are ignored.

use crate::error::LambdaError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A settings schema.
///
/// ```rust
/// use async_lambda::config::Settings;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct AppSettings {
///     #[serde(default)]
///     api_key: String,
///     #[serde(default)]
///     debug: bool,
/// }
///
/// impl Settings for AppSettings {}
/// ```
pub trait Settings: DeserializeOwned + Send + Sync + 'static {
    /// Only read environment variables with this prefix.
    const ENV_PREFIX: Option<&'static str> = None;

    /// Optional settings file (any format the `config` crate detects by
    /// extension), read before the environment.
    const FILE: Option<&'static str> = Some("settings");

    /// Build a fresh instance from the configured sources.
    fn load() -> Result<Self, LambdaError> {
        let mut builder = config::Config::builder();
        if let Some(file) = Self::FILE {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }
        let environment = match Self::ENV_PREFIX {
            Some(prefix) => config::Environment::with_prefix(prefix),
            None => config::Environment::default(),
        };
        let config = builder.add_source(environment.try_parsing(true)).build()?;
        Ok(config.try_deserialize::<Self>()?)
    }
}

/// Default schema: every environment variable as a string, keyed in lowercase.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct BaseSettings {
    values: HashMap<String, String>,
}

impl BaseSettings {
    /// Build from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Look up a value; the key is case-insensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Settings for BaseSettings {
    const FILE: Option<&'static str> = None;

    fn load() -> Result<Self, LambdaError> {
        // Raw names: the `config` crate would parse them as key paths.
        Ok(Self::from_pairs(std::env::vars_os().filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        })))
    }
}

/// Settings snapshots memoized per schema type.
///
/// Snapshots are immutable and shared across invocations.
#[derive(Default)]
pub struct SettingsCache {
    entries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached snapshot for `S`, loading it on first use.
    pub fn get<S: Settings>(&self) -> Result<Arc<S>, LambdaError> {
        let key = TypeId::of::<S>();
        if let Some(entry) = self.entries.read().get(&key) {
            return downcast::<S>(Arc::clone(entry));
        }

        let loaded: Arc<dyn Any + Send + Sync> = Arc::new(S::load()?);
        debug!(schema = std::any::type_name::<S>(), "Loaded settings");

        let entry = Arc::clone(self.entries.write().entry(key).or_insert(loaded));
        downcast::<S>(entry)
    }

    /// Seed the cache with an explicit snapshot, replacing any cached one.
    pub fn insert<S: Settings>(&self, settings: S) -> Arc<S> {
        let settings = Arc::new(settings);
        let entry: Arc<dyn Any + Send + Sync> = settings.clone();
        self.entries.write().insert(TypeId::of::<S>(), entry);
        settings
    }

    /// Drop every cached snapshot.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn contains<S: Settings>(&self) -> bool {
        self.entries.read().contains_key(&TypeId::of::<S>())
    }
}

impl std::fmt::Debug for SettingsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsCache")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}

fn downcast<S: Settings>(entry: Arc<dyn Any + Send + Sync>) -> Result<Arc<S>, LambdaError> {
    entry.downcast::<S>().map_err(|_| LambdaError::SettingsType {
        expected: std::any::type_name::<S>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static LOADS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Deserialize)]
    struct CountingSettings {
        region: String,
    }

    impl Settings for CountingSettings {
        fn load() -> Result<Self, LambdaError> {
            LOADS.fetch_add(1, Ordering::SeqCst);
            Ok(Self {
                region: "eu-west-1".to_string(),
            })
        }
    }

    #[test]
    fn test_cache_loads_once_per_schema() {
        let cache = SettingsCache::new();
        let first = cache.get::<CountingSettings>().unwrap();
        let second = cache.get::<CountingSettings>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.region, "eu-west-1");
        assert_eq!(LOADS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_insert_replaces_snapshot() {
        let cache = SettingsCache::new();
        cache.insert(BaseSettings::from_pairs([("API_KEY", "one")]));
        cache.insert(BaseSettings::from_pairs([("API_KEY", "two")]));

        let settings = cache.get::<BaseSettings>().unwrap();
        assert_eq!(settings.get("api_key"), Some("two"));
        assert_eq!(settings.get("API_KEY"), Some("two"));
    }

    #[test]
    fn test_clear_forgets_snapshots() {
        let cache = SettingsCache::new();
        cache.insert(BaseSettings::default());
        assert!(cache.contains::<BaseSettings>());
        cache.clear();
        assert!(!cache.contains::<BaseSettings>());
    }

    #[test]
    fn test_base_settings_reads_environment() {
        std::env::set_var("ASYNC_LAMBDA_SETTINGS_PROBE", "present");
        let settings = BaseSettings::load().unwrap();
        assert_eq!(settings.get("ASYNC_LAMBDA_SETTINGS_PROBE"), Some("present"));
    }
}

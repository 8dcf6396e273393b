//! Key/value configuration sources.
//!
//! Components that need raw configuration values (secrets in particular) take
//! a [`KeyValueSource`] parameter instead of reaching for global state. Keys use
//! the dotted path notation of the `config` crate, e.g. `cosmos.auth_key`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Read-only lookup of string configuration values by dotted key.
pub trait KeyValueSource: Send + Sync {
    /// Return the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// Shared handle to a configuration source.
pub type SharedSource = Arc<dyn KeyValueSource>;

impl KeyValueSource for config::Config {
    fn get(&self, key: &str) -> Option<String> {
        self.get_string(key).ok()
    }
}

impl KeyValueSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl KeyValueSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl<T: KeyValueSource + ?Sized> KeyValueSource for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

impl<T: KeyValueSource + ?Sized> KeyValueSource for &T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_lookup() {
        let mut map = HashMap::new();
        map.insert("cosmos.auth_key".to_string(), "secret".to_string());

        assert_eq!(KeyValueSource::get(&map, "cosmos.auth_key").as_deref(), Some("secret"));
        assert_eq!(KeyValueSource::get(&map, "cosmos.missing"), None);
    }

    #[test]
    fn config_lookup_uses_dotted_paths() {
        let cfg = config::Config::builder()
            .set_override("cosmos.account_endpoint", "https://localhost:8081/")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            KeyValueSource::get(&cfg, "cosmos.account_endpoint").as_deref(),
            Some("https://localhost:8081/")
        );
        assert_eq!(KeyValueSource::get(&cfg, "cosmos.auth_key"), None);
    }

    #[test]
    fn shared_source_delegates() {
        let map: BTreeMap<String, String> =
            [("a.b".to_string(), "c".to_string())].into_iter().collect();
        let shared: SharedSource = Arc::new(map);

        assert_eq!(shared.get("a.b").as_deref(), Some("c"));
    }
}

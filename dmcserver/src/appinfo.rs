//! Application info exposed through `/info`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Value, json};

type FactProvider = Box<dyn Fn() -> Value + Send + Sync>;

/// Name, version and a set of registered facts. Facts are providers, not
/// values, so `/info` always reports the current state (e.g. the live
/// player list).
pub struct AppInfo {
    name: String,
    version: String,
    facts: Mutex<BTreeMap<String, FactProvider>>,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let info = Self {
            name: name.into(),
            version: version.into(),
            facts: Mutex::new(BTreeMap::new()),
        };
        info.register_value("inittime", json!(chrono::Local::now().to_rfc3339()));
        info.register_value("pid", json!(std::process::id().to_string()));
        info
    }

    /// Registers a static fact.
    pub fn register_value(&self, key: &str, value: Value) {
        self.register_provider(key, move || value.clone());
    }

    /// Registers a fact evaluated at request time.
    pub fn register_provider<F>(&self, key: &str, provider: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.facts
            .lock()
            .expect("AppInfo Mutex Poisoned")
            .insert(key.to_string(), Box::new(provider));
    }

    pub fn snapshot(&self) -> Value {
        let mut info = json!({
            "name": self.name,
            "version": self.version,
        });

        let facts = self.facts.lock().expect("AppInfo Mutex Poisoned");
        for (key, provider) in facts.iter() {
            info[key] = provider();
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_base_facts() {
        let info = AppInfo::new("dmcontrol", "1.2.3");
        let snapshot = info.snapshot();
        assert_eq!(snapshot["name"], "dmcontrol");
        assert_eq!(snapshot["version"], "1.2.3");
        assert!(snapshot["inittime"].is_string());
        assert!(snapshot["pid"].is_string());
    }

    #[test]
    fn test_registered_provider_is_live() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        let info = AppInfo::new("dmcontrol", "0.0.0");
        let counter = Arc::new(AtomicU32::new(0));
        let provider_counter = Arc::clone(&counter);
        info.register_provider("calls", move || {
            json!(provider_counter.fetch_add(1, Ordering::SeqCst))
        });

        assert_eq!(info.snapshot()["calls"], 0);
        assert_eq!(info.snapshot()["calls"], 1);
    }

    #[test]
    fn test_registered_value() {
        let info = AppInfo::new("dmcontrol", "0.0.0");
        info.register_value("config", json!({"webserver_port": 8080}));
        assert_eq!(info.snapshot()["config"]["webserver_port"], 8080);
    }
}

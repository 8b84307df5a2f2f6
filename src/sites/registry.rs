//! Site registry: the process-wide front host -> route table.
//!
//! # Responsibilities
//! - Load bundles from the site root and publish their routes
//! - Carry warm caches across reloads when a front domain survives
//! - Serve concurrent lookups while reloads are in progress
//!
//! # Design Decisions
//! - Two independently locked tables (routes, bundles); write locks are held
//!   only for the swap, never while reading or parsing files
//! - All mutations go through one reload mutex so a bundle's previous state
//!   is captured and replaced atomically with respect to other reloads
//! - A failed load publishes nothing and leaves the previous bundle in place

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::observability::metrics;
use crate::sites::cache::DEFAULT_CACHE_TTL;
use crate::sites::error::{LoadAllError, SiteConfigError};
use crate::sites::site::{Bundle, BundleDescriptor, Route, RouteSpec};

#[derive(Debug)]
pub struct SiteRegistry {
    root: PathBuf,
    cache_ttl: Duration,
    routes: RwLock<HashMap<String, Arc<Route>>>,
    bundles: RwLock<HashMap<String, Arc<Bundle>>>,
    reload: Mutex<()>,
}

impl SiteRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_cache_ttl(root, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(root: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            root: root.into(),
            cache_ttl,
            routes: RwLock::new(HashMap::new()),
            bundles: RwLock::new(HashMap::new()),
            reload: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Route serving `host`, matched case-insensitively.
    pub fn lookup(&self, host: &str) -> Option<Arc<Route>> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        match routes.get(host) {
            Some(route) => Some(route.clone()),
            None => routes.get(&host.to_ascii_lowercase()).cloned(),
        }
    }

    pub fn lookup_bundle(&self, name: &str) -> Option<Arc<Bundle>> {
        self.bundles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn bundle_names(&self) -> Vec<String> {
        self.bundles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Load (or reload) the bundle stored in `<root>/<name>`.
    pub fn load_bundle(&self, name: &str) -> Result<Arc<Bundle>, SiteConfigError> {
        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);
        let result = self.load_bundle_locked(name);
        metrics::record_reload(result.is_ok());
        result
    }

    /// Remove a bundle and all of its routes.
    pub fn cleanup(&self, name: &str) -> Option<Arc<Bundle>> {
        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);
        self.cleanup_locked(name)
    }

    /// Drop every bundle, then load each directory under the site root.
    ///
    /// A bundle that fails to load does not prevent the others from loading;
    /// failures are collected into [`LoadAllError::Bundles`]. Only an
    /// unreadable site root is [`LoadAllError::Fatal`].
    pub fn load_all(&self) -> Result<(), LoadAllError> {
        let _guard = self.reload.lock().unwrap_or_else(PoisonError::into_inner);

        let loaded: Vec<String> = self
            .bundles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for name in loaded {
            self.cleanup_locked(&name);
        }

        let entries = fs::read_dir(&self.root).map_err(|source| {
            LoadAllError::Fatal(SiteConfigError::RootUnreadable {
                path: self.root.clone(),
                source,
            })
        })?;

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let mut failures = Vec::new();
        for name in names {
            let result = self.load_bundle_locked(&name);
            metrics::record_reload(result.is_ok());
            match result {
                Ok(bundle) => {
                    tracing::info!(
                        bundle = %bundle.name,
                        routes = bundle.routes.len(),
                        deactivated = bundle.deactivated,
                        "Loaded site"
                    );
                }
                Err(e) => {
                    tracing::error!(bundle = %name, error = %e, "Error loading site");
                    failures.push((name, e));
                }
            }
        }

        for route in self.routes.read().unwrap_or_else(PoisonError::into_inner).values() {
            tracing::debug!(
                bundle = %route.bundle_name,
                front_host = %route.front_host,
                target_host = %route.target_host,
                "Loaded website"
            );
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoadAllError::Bundles(failures))
        }
    }

    fn load_bundle_locked(&self, name: &str) -> Result<Arc<Bundle>, SiteConfigError> {
        let dir = self.root.join(name);
        let is_dir = fs::metadata(&dir)
            .map_err(|source| SiteConfigError::Io {
                path: dir.clone(),
                source,
            })?
            .is_dir();
        if !is_dir {
            return Err(SiteConfigError::NotADirectory(dir));
        }

        // Parse and resolve everything before touching shared state.
        let descriptor = BundleDescriptor::read(&dir)?;
        let websites = descriptor.resolve_websites()?;
        let specs = websites
            .iter()
            .map(|(upstream, front)| RouteSpec::load(&dir, upstream, front, &descriptor.vars))
            .collect::<Result<Vec<_>, _>>()?;

        let bundle = Bundle::assemble(name, descriptor, websites, specs, self.cache_ttl);

        let previous = self.lookup_bundle(name);
        if let Some(previous) = &previous {
            for (front, route) in &bundle.routes {
                if let Some(old) = previous.routes.get(front) {
                    route.cache().absorb(old.cache());
                    tracing::debug!(
                        bundle = %name,
                        front_host = %front,
                        entries = route.cache().len(),
                        "Carried cache over reload"
                    );
                }
            }
        }

        self.publish(previous.as_deref(), &bundle);
        Ok(bundle)
    }

    fn publish(&self, previous: Option<&Bundle>, bundle: &Arc<Bundle>) {
        {
            let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = previous {
                for front in previous.front_hosts() {
                    routes.remove(front);
                }
            }
            for (front, route) in &bundle.routes {
                routes.insert(front.clone(), route.clone());
            }
        }

        self.bundles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bundle.name.clone(), bundle.clone());
    }

    fn cleanup_locked(&self, name: &str) -> Option<Arc<Bundle>> {
        let bundle = self.lookup_bundle(name)?;
        {
            let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);
            for front in bundle.front_hosts() {
                // Another bundle may have claimed the same front domain since.
                if routes
                    .get(front)
                    .is_some_and(|r| r.bundle_name == bundle.name)
                {
                    routes.remove(front);
                }
            }
        }
        self.bundles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        tracing::info!(bundle = %name, "Cleaned up site");
        Some(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_bundle(root: &Path, name: &str, config: serde_json::Value, routes: &[(&str, serde_json::Value)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), config.to_string()).unwrap();
        for (upstream, descriptor) in routes {
            fs::write(dir.join(format!("{upstream}.json")), descriptor.to_string()).unwrap();
        }
    }

    fn shop_config(front: &str) -> serde_json::Value {
        json!({
            "vars": {"front": front},
            "websites": {"origin.example": "${front}.test"}
        })
    }

    #[test]
    fn test_load_and_lookup() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "shop", shop_config("shop"), &[("origin.example", json!({}))]);

        let registry = SiteRegistry::new(root.path());
        registry.load_all().unwrap();

        let route = registry.lookup("shop.test").unwrap();
        assert_eq!(route.target_host, "origin.example");
        assert_eq!(route.bundle_name, "shop");
        assert!(registry.lookup("SHOP.test").is_some());
        assert!(registry.lookup("other.test").is_none());
        assert!(registry.lookup_bundle("shop").is_some());
    }

    #[test]
    fn test_reload_preserves_cache_for_same_front() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "shop", shop_config("shop"), &[("origin.example", json!({}))]);

        let registry = SiteRegistry::new(root.path());
        registry.load_bundle("shop").unwrap();
        let before = registry.lookup("shop.test").unwrap();
        before.maybe_store("/p?q=1", b"warm", &HeaderMap::new(), StatusCode::OK);

        // edit the route descriptor, keep the front domain
        write_bundle(
            root.path(),
            "shop",
            shop_config("shop"),
            &[("origin.example", json!({"replacements": [{"from": "a", "to": "b"}]}))],
        );
        registry.load_bundle("shop").unwrap();

        let after = registry.lookup("shop.test").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.replacements.len(), 1);
        let entry = after.probe_cache("/p?q=1").unwrap();
        assert_eq!(&*entry.body, b"warm");
    }

    #[test]
    fn test_renamed_front_starts_cold() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "shop", shop_config("shop"), &[("origin.example", json!({}))]);

        let registry = SiteRegistry::new(root.path());
        registry.load_bundle("shop").unwrap();
        registry
            .lookup("shop.test")
            .unwrap()
            .maybe_store("/", b"warm", &HeaderMap::new(), StatusCode::OK);

        write_bundle(root.path(), "shop", shop_config("store"), &[("origin.example", json!({}))]);
        registry.load_bundle("shop").unwrap();

        assert!(registry.lookup("shop.test").is_none());
        let renamed = registry.lookup("store.test").unwrap();
        assert!(renamed.cache().is_empty());
    }

    #[test]
    fn test_failed_reload_keeps_previous_state() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "shop", shop_config("shop"), &[("origin.example", json!({}))]);

        let registry = SiteRegistry::new(root.path());
        registry.load_bundle("shop").unwrap();
        let before = registry.lookup("shop.test").unwrap();

        fs::write(root.path().join("shop").join("origin.example.json"), "{not json").unwrap();
        let err = registry.load_bundle("shop").unwrap_err();
        assert!(matches!(err, SiteConfigError::Parse { .. }));

        let after = registry.lookup("shop.test").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_load_all_aggregates_failures() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "good", shop_config("good"), &[("origin.example", json!({}))]);
        // route descriptor missing
        write_bundle(root.path(), "broken", shop_config("broken"), &[]);
        // bad formatter in a front domain
        write_bundle(
            root.path(),
            "badfmt",
            json!({"vars": {"x": "y"}, "websites": {"o.example": "${x:shout}.test"}}),
            &[("o.example", json!({}))],
        );
        fs::write(root.path().join("stray-file.txt"), "ignored").unwrap();

        let registry = SiteRegistry::new(root.path());
        let err = registry.load_all().unwrap_err();
        match err {
            LoadAllError::Bundles(failures) => {
                let mut names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
                names.sort();
                assert_eq!(names, vec!["badfmt", "broken"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(registry.lookup("good.test").is_some());
        assert_eq!(registry.bundle_names(), vec!["good".to_string()]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let registry = SiteRegistry::new("/nonexistent/site/root");
        assert!(matches!(registry.load_all(), Err(LoadAllError::Fatal(_))));
    }

    #[test]
    fn test_cleanup_removes_routes() {
        let root = TempDir::new().unwrap();
        write_bundle(root.path(), "shop", shop_config("shop"), &[("origin.example", json!({}))]);

        let registry = SiteRegistry::new(root.path());
        registry.load_all().unwrap();
        assert_eq!(registry.route_count(), 1);

        registry.cleanup("shop").unwrap();
        assert_eq!(registry.route_count(), 0);
        assert!(registry.lookup_bundle("shop").is_none());
        assert!(registry.cleanup("shop").is_none());
    }
}

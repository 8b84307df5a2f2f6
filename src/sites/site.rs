//! Bundles and routes.
//!
//! A bundle is one directory under the site root: a `config.json` holding the
//! shared variable dictionary and the upstream -> front domain map, plus one
//! `<upstream-domain>.json` descriptor per mapped domain. Each descriptor
//! materializes into a [`Route`] keyed by its resolved front domain.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::sites::cache::{CacheEntry, PageCache};
use crate::sites::error::SiteConfigError;
use crate::sites::format::format_template;
use crate::sites::replacement::{apply_all, ReplaceKind, Replacement};

pub const BUNDLE_DESCRIPTOR: &str = "config.json";

/// Contents of a bundle's `config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BundleDescriptor {
    pub vars: HashMap<String, String>,
    /// Upstream domain -> front domain template.
    pub websites: HashMap<String, String>,
    pub deactivated: bool,
}

/// Contents of a `<upstream-domain>.json` route descriptor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouteDescriptor {
    pub no_cache: bool,
    pub req_headers_override: HashMap<String, String>,
    pub resp_headers_override: HashMap<String, String>,
    pub replacements: Vec<Replacement>,
    pub bypass_cache_for: Vec<String>,
    pub block: Vec<String>,
    /// Upstream URL scheme, `https` unless stated.
    pub scheme: Option<String>,
}

/// Parsed, resolved and validated route settings, not yet attached to a bundle.
#[derive(Debug)]
pub struct RouteSpec {
    pub front_host: String,
    pub target_host: String,
    pub scheme: &'static str,
    pub no_cache: bool,
    pub request_overrides: HeaderMap,
    pub response_overrides: HeaderMap,
    pub replacements: Vec<Replacement>,
    pub bypass_cache_for: HashSet<String>,
    pub block: HashSet<String>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SiteConfigError> {
    let content = fs::read(path).map_err(|source| SiteConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| SiteConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn header_map(host: &str, overrides: &HashMap<String, String>) -> Result<HeaderMap, SiteConfigError> {
    let mut map = HeaderMap::with_capacity(overrides.len());
    for (name, value) in overrides {
        let invalid = || SiteConfigError::InvalidHeader {
            host: host.to_string(),
            name: name.clone(),
        };
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        map.insert(name, value);
    }
    Ok(map)
}

impl BundleDescriptor {
    pub fn read(dir: &Path) -> Result<Self, SiteConfigError> {
        read_json(&dir.join(BUNDLE_DESCRIPTOR))
    }

    /// Resolve every front domain template against the bundle variables.
    /// Returns `(upstream, front)` pairs with lowercased front domains.
    pub fn resolve_websites(&self) -> Result<Vec<(String, String)>, SiteConfigError> {
        let mut resolved = Vec::with_capacity(self.websites.len());
        for (upstream, template) in &self.websites {
            let front = format_template(template, &self.vars).map_err(|source| SiteConfigError::Format {
                context: format!("website domain {upstream}"),
                source,
            })?;
            resolved.push((upstream.clone(), front.to_ascii_lowercase()));
        }
        Ok(resolved)
    }
}

impl RouteSpec {
    /// Read `<upstream>.json` from `dir` and resolve it with `vars`.
    pub fn load(
        dir: &Path,
        upstream: &str,
        front: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Self, SiteConfigError> {
        let descriptor: RouteDescriptor = read_json(&dir.join(format!("{upstream}.json")))?;
        Self::from_descriptor(descriptor, upstream, front, vars)
    }

    pub fn from_descriptor(
        descriptor: RouteDescriptor,
        upstream: &str,
        front: &str,
        vars: &HashMap<String, String>,
    ) -> Result<Self, SiteConfigError> {
        let mut replacements = descriptor.replacements;
        for replacement in &mut replacements {
            replacement.from = format_template(&replacement.from, vars).map_err(|source| {
                SiteConfigError::Format {
                    context: format!("replacement from '{}'", replacement.from),
                    source,
                }
            })?;
            replacement.to = format_template(&replacement.to, vars).map_err(|source| {
                SiteConfigError::Format {
                    context: format!("replacement to '{}'", replacement.to),
                    source,
                }
            })?;
            if replacement.kind == ReplaceKind::Literal && replacement.from.is_empty() {
                return Err(SiteConfigError::EmptyLiteral {
                    host: upstream.to_string(),
                });
            }
            replacement
                .compile()
                .map_err(|source| SiteConfigError::InvalidPattern {
                    pattern: replacement.from.clone(),
                    source,
                })?;
        }

        let scheme = match descriptor.scheme.as_deref() {
            None | Some("https") => "https",
            Some("http") => "http",
            Some(other) => {
                return Err(SiteConfigError::InvalidScheme {
                    host: upstream.to_string(),
                    scheme: other.to_string(),
                })
            }
        };

        Ok(Self {
            front_host: front.to_string(),
            target_host: upstream.to_string(),
            scheme,
            no_cache: descriptor.no_cache,
            request_overrides: header_map(upstream, &descriptor.req_headers_override)?,
            response_overrides: header_map(upstream, &descriptor.resp_headers_override)?,
            replacements,
            bypass_cache_for: descriptor.bypass_cache_for.into_iter().collect(),
            block: descriptor.block.into_iter().collect(),
        })
    }
}

/// A named group of routes sharing one variable dictionary.
#[derive(Debug)]
pub struct Bundle {
    pub name: String,
    pub vars: HashMap<String, String>,
    /// Upstream domain -> resolved front domain.
    pub websites: HashMap<String, String>,
    pub deactivated: bool,
    /// Resolved front domain -> route.
    pub routes: HashMap<String, Arc<Route>>,
    pub loaded_at: Instant,
}

impl Bundle {
    /// Attach parsed routes to a new bundle. Every route gets a back-reference
    /// to the returned bundle and a fresh cache with the given TTL.
    pub fn assemble(
        name: &str,
        descriptor: BundleDescriptor,
        websites: Vec<(String, String)>,
        specs: Vec<RouteSpec>,
        cache_ttl: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|bundle| {
            let routes = specs
                .into_iter()
                .map(|spec| {
                    let route = Route::new(spec, bundle.clone(), name, cache_ttl);
                    (route.front_host.clone(), Arc::new(route))
                })
                .collect();
            Bundle {
                name: name.to_string(),
                vars: descriptor.vars,
                websites: websites.into_iter().collect(),
                deactivated: descriptor.deactivated,
                routes,
                loaded_at: Instant::now(),
            }
        })
    }

    pub fn front_hosts(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

/// One front domain mapped to one upstream domain.
#[derive(Debug)]
pub struct Route {
    pub front_host: String,
    pub target_host: String,
    pub scheme: &'static str,
    pub bundle_name: String,
    bundle: Weak<Bundle>,

    pub no_cache: bool,
    pub request_overrides: HeaderMap,
    pub response_overrides: HeaderMap,
    pub replacements: Vec<Replacement>,
    pub bypass_cache_for: HashSet<String>,
    pub block: HashSet<String>,

    cache: PageCache,
}

impl Route {
    fn new(spec: RouteSpec, bundle: Weak<Bundle>, bundle_name: &str, cache_ttl: Duration) -> Self {
        Self {
            front_host: spec.front_host,
            target_host: spec.target_host,
            scheme: spec.scheme,
            bundle_name: bundle_name.to_string(),
            bundle,
            no_cache: spec.no_cache,
            request_overrides: spec.request_overrides,
            response_overrides: spec.response_overrides,
            replacements: spec.replacements,
            bypass_cache_for: spec.bypass_cache_for,
            block: spec.block,
            cache: PageCache::new(cache_ttl),
        }
    }

    /// Owning bundle, if it is still alive.
    pub fn bundle(&self) -> Option<Arc<Bundle>> {
        self.bundle.upgrade()
    }

    /// False when the owning bundle is deactivated or gone.
    pub fn is_active(&self) -> bool {
        self.bundle().is_some_and(|b| !b.deactivated)
    }

    pub fn should_block(&self, path: &str) -> bool {
        self.block.contains(path)
    }

    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}", self.scheme, self.target_host, path_and_query)
    }

    /// Run the replacement list over `body`.
    pub fn rewrite(&self, body: &[u8]) -> Vec<u8> {
        apply_all(&self.replacements, body)
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Fresh cached response for `path`, unless caching is disabled.
    pub fn probe_cache(&self, path: &str) -> Option<Arc<CacheEntry>> {
        if self.no_cache {
            return None;
        }
        let entry = self.cache.probe(path)?;
        tracing::info!(
            bundle = %self.bundle_name,
            front_host = %self.front_host,
            path = %path,
            "Returned from cache"
        );
        Some(entry)
    }

    /// Store a response unless caching is disabled or bypassed for `path`.
    pub fn maybe_store(&self, path: &str, body: &[u8], headers: &HeaderMap, status: StatusCode) -> bool {
        if self.no_cache || self.bypass_cache_for.contains(path) {
            return false;
        }
        self.cache.store(CacheEntry::new(path, body, status, headers));
        tracing::info!(
            bundle = %self.bundle_name,
            front_host = %self.front_host,
            path = %path,
            "Saved to cache"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::cache::DEFAULT_CACHE_TTL;

    fn spec(descriptor: RouteDescriptor) -> RouteSpec {
        let vars = HashMap::from([("brand".to_string(), "acme".to_string())]);
        RouteSpec::from_descriptor(descriptor, "origin.example", "acme.test", &vars).unwrap()
    }

    fn single_route(descriptor: RouteDescriptor, deactivated: bool) -> (Arc<Bundle>, Arc<Route>) {
        let bundle = Bundle::assemble(
            "acme",
            BundleDescriptor {
                deactivated,
                ..Default::default()
            },
            vec![("origin.example".into(), "acme.test".into())],
            vec![spec(descriptor)],
            DEFAULT_CACHE_TTL,
        );
        let route = bundle.routes["acme.test"].clone();
        (bundle, route)
    }

    #[test]
    fn test_route_back_reference() {
        let (bundle, route) = single_route(RouteDescriptor::default(), false);
        assert!(Arc::ptr_eq(&route.bundle().unwrap(), &bundle));
        assert!(route.is_active());
        assert_eq!(route.upstream_url("/a?b=1"), "https://origin.example/a?b=1");

        drop(bundle);
        assert!(!route.is_active());
    }

    #[test]
    fn test_deactivated_bundle() {
        let (_bundle, route) = single_route(RouteDescriptor::default(), true);
        assert!(!route.is_active());
    }

    #[test]
    fn test_replacements_are_formatted_and_compiled() {
        let descriptor: RouteDescriptor = serde_json::from_str(
            r#"{"replacements": [{"from": "${brand:upper}", "to": "${brand:title}", "type": "regex"}]}"#,
        )
        .unwrap();
        let (_bundle, route) = single_route(descriptor, false);
        assert_eq!(route.replacements[0].from, "ACME");
        assert!(route.replacements[0].is_compiled());
        assert_eq!(route.rewrite(b"ACME corp"), b"Acme corp");
    }

    #[test]
    fn test_bad_pattern_fails_load() {
        let descriptor: RouteDescriptor =
            serde_json::from_str(r#"{"replacements": [{"from": "([", "type": "regex"}]}"#).unwrap();
        let err = RouteSpec::from_descriptor(descriptor, "o", "f", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SiteConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_literal_fails_load() {
        let descriptor: RouteDescriptor =
            serde_json::from_str(r#"{"replacements": [{"from": "", "to": "X"}]}"#).unwrap();
        let err = RouteSpec::from_descriptor(descriptor, "o", "f", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SiteConfigError::EmptyLiteral { .. }));
    }

    #[test]
    fn test_bad_header_override_fails_load() {
        let descriptor: RouteDescriptor =
            serde_json::from_str(r#"{"req_headers_override": {"bad header": "x"}}"#).unwrap();
        let err = RouteSpec::from_descriptor(descriptor, "o", "f", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SiteConfigError::InvalidHeader { .. }));
    }

    #[test]
    fn test_store_respects_no_cache_and_bypass() {
        let headers = HeaderMap::new();

        let (_b, cached) = single_route(
            serde_json::from_str(r#"{"bypass_cache_for": ["/live"]}"#).unwrap(),
            false,
        );
        assert!(cached.maybe_store("/page", b"x", &headers, StatusCode::OK));
        assert!(!cached.maybe_store("/live", b"x", &headers, StatusCode::OK));
        assert!(cached.probe_cache("/page").is_some());
        assert!(cached.probe_cache("/live").is_none());

        let (_b, uncached) = single_route(serde_json::from_str(r#"{"no_cache": true}"#).unwrap(), false);
        assert!(!uncached.maybe_store("/page", b"x", &headers, StatusCode::OK));
        assert!(uncached.probe_cache("/page").is_none());
    }

    #[test]
    fn test_block_list_exact_match() {
        let (_b, route) = single_route(serde_json::from_str(r#"{"block": ["/admin?x=1"]}"#).unwrap(), false);
        assert!(route.should_block("/admin?x=1"));
        assert!(!route.should_block("/admin"));
    }

    #[test]
    fn test_front_domain_templates_resolve() {
        let descriptor = BundleDescriptor {
            vars: HashMap::from([("city".into(), "Paris".into())]),
            websites: HashMap::from([("origin.example".into(), "${city:upper}.Shop.test".into())]),
            deactivated: false,
        };
        let resolved = descriptor.resolve_websites().unwrap();
        assert_eq!(resolved, vec![("origin.example".to_string(), "paris.shop.test".to_string())]);
    }
}

//! Cache-mode wiring and the route registry.
//!
//! A `BundleService` wires one bundle's cache mode:
//! - `none`: no worker, no cache - every request runs a fresh build
//!   end-to-end and blocks only on its own build
//! - `static`: one-shot worker at startup; the prepared response (with the
//!   configured `cache-control` value) is cached for the process lifetime
//! - `dynamic`: persistent watch-and-rebuild worker; requests always read
//!   the latest cached response, no `cache-control` header

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tiny_http::Request;

use super::cache::ResponseCache;
use super::pipeline;
use super::supervisor::WorkerSupervisor;
use crate::bundler::{Bundler, CommandBundler};
use crate::config::{BundleConfig, Config};
use crate::response::{self, PrepareOptions, PreparedResponse};

/// One route's serving strategy.
pub struct BundleService {
    bundle: Arc<BundleConfig>,
    bundler: Arc<dyn Bundler>,
    /// Present for the worker-backed modes (`static`, `dynamic`)
    cache: Option<Arc<ResponseCache>>,
}

impl BundleService {
    pub fn new(bundle: BundleConfig) -> Self {
        let bundle = Arc::new(bundle);
        let bundler: Arc<dyn Bundler> = Arc::new(CommandBundler::new(&bundle));
        Self::with_bundler(bundle, bundler)
    }

    /// Injection point for tests and alternative bundler implementations.
    pub fn with_bundler(bundle: Arc<BundleConfig>, bundler: Arc<dyn Bundler>) -> Self {
        let cache = bundle
            .cache
            .wants_worker()
            .then(|| Arc::new(ResponseCache::new(PrepareOptions::for_bundle(&bundle))));
        Self {
            bundle,
            bundler,
            cache,
        }
    }

    pub fn bundle(&self) -> &BundleConfig {
        &self.bundle
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// The supervisor task for this route, for worker-backed modes.
    pub(crate) fn supervisor(&self) -> Option<WorkerSupervisor> {
        self.cache.as_ref().map(|cache| {
            WorkerSupervisor::new(
                Arc::clone(&self.bundle),
                Arc::clone(&self.bundler),
                Arc::clone(cache),
            )
        })
    }

    /// Serve one request according to the cache mode.
    pub fn respond(&self, request: Request) -> anyhow::Result<()> {
        let Some(cache) = &self.cache else {
            // No caching: nothing is retained between requests.
            return match self.build_fresh() {
                Ok(prepared) => prepared.send(request),
                Err(message) => response::respond_build_error(request, &message),
            };
        };

        // Blocks only until the first result for this route; reads are
        // non-blocking snapshot loads from then on.
        cache.wait_ready();

        if let Some(prepared) = cache.response() {
            prepared.send(request)
        } else if let Some(error) = cache.last_error() {
            response::respond_build_error(request, &error)
        } else {
            response::respond_unavailable(request)
        }
    }

    /// One fresh end-to-end build (the `none` cache mode path).
    fn build_fresh(&self) -> Result<PreparedResponse, String> {
        pipeline::run(&*self.bundler, &self.bundle)
            .map(|bytes| {
                PreparedResponse::prepare(bytes, &PrepareOptions::for_bundle(&self.bundle))
            })
            .map_err(|e| e.to_string())
    }
}

// ============================================================================
// BundleRegistry
// ============================================================================

/// Route → service map built once at serve startup.
pub struct BundleRegistry {
    services: FxHashMap<String, Arc<BundleService>>,
}

impl BundleRegistry {
    pub fn build(config: &Config) -> Self {
        let services = config
            .bundles
            .iter()
            .map(|bundle| {
                (
                    bundle.route.clone(),
                    Arc::new(BundleService::new(bundle.clone())),
                )
            })
            .collect();
        Self { services }
    }

    /// Look up the service mounted at a request URL (query/fragment ignored).
    pub fn lookup(&self, url: &str) -> Option<&Arc<BundleService>> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        self.services.get(path)
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<BundleService>> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Unblock any requests still waiting on first builds (shutdown path).
    pub fn close(&self) {
        for service in self.services.values() {
            if let Some(cache) = service.cache() {
                cache.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BundleError;
    use crate::config::CacheMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBundler {
        calls: AtomicUsize,
    }

    impl Bundler for CountingBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"console.log(1);".to_vec())
        }
    }

    fn service_with_mode(cache: CacheMode) -> (BundleService, Arc<CountingBundler>) {
        let bundler = Arc::new(CountingBundler {
            calls: AtomicUsize::new(0),
        });
        let bundle = Arc::new(BundleConfig {
            route: "/app.js".into(),
            cache,
            ..Default::default()
        });
        (
            BundleService::with_bundler(bundle, Arc::clone(&bundler) as Arc<dyn Bundler>),
            bundler,
        )
    }

    #[test]
    fn test_mode_none_has_no_cache_or_worker() {
        let (service, _) = service_with_mode(CacheMode::None);
        assert!(service.cache().is_none());
        assert!(service.supervisor().is_none());
    }

    #[test]
    fn test_worker_modes_have_cache_and_supervisor() {
        let (service, _) = service_with_mode(CacheMode::Dynamic);
        assert!(service.cache().is_some());
        assert!(service.supervisor().is_some());

        let (service, _) = service_with_mode(CacheMode::Static("max-age=60".into()));
        assert!(service.cache().is_some());
        assert!(service.supervisor().is_some());
    }

    #[test]
    fn test_mode_none_builds_per_call() {
        let (service, bundler) = service_with_mode(CacheMode::None);

        // Two requests, two independent builds - nothing retained between them
        let a = service.build_fresh().unwrap();
        let b = service.build_fresh().unwrap();
        assert_eq!(bundler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(a.body(), b.body());
    }

    #[test]
    fn test_registry_lookup_strips_query() {
        let temp = tempfile::TempDir::new().unwrap();
        let entry = temp.path().join("app.js");
        std::fs::write(&entry, "console.log(1)").unwrap();

        let mut config = Config::default();
        config.bundles.push(BundleConfig {
            route: "/app.js".into(),
            entry,
            command: vec!["esbuild".into()],
            ..Default::default()
        });

        let registry = BundleRegistry::build(&config);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("/app.js").is_some());
        assert!(registry.lookup("/app.js?v=123").is_some());
        assert!(registry.lookup("/app.js#frag").is_some());
        assert!(registry.lookup("/other.js").is_none());
    }

    #[test]
    fn test_registry_close_unblocks_waiters() {
        let mut config = Config::default();
        config.bundles.push(BundleConfig {
            route: "/app.js".into(),
            cache: CacheMode::Dynamic,
            command: vec!["esbuild".into()],
            ..Default::default()
        });

        let registry = Arc::new(BundleRegistry::build(&config));
        let waiter = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let service = registry.lookup("/app.js").unwrap();
                service.cache().unwrap().wait_ready();
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        registry.close();
        waiter.join().unwrap();
    }
}

//! Development server serving bundle artifacts.

mod lifecycle;

use crate::{
    config::cfg,
    core, log, response,
    worker::{BundleRegistry, runtime},
};
use anyhow::Result;
use crossbeam::channel;
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Bind the server, start the per-bundle workers, run the request loop.
pub fn serve() -> Result<()> {
    let config = cfg();
    let registry = Arc::new(BundleRegistry::build(&config));

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    core::register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);
    for service in registry.services() {
        log!("serve"; "  {} [cache: {}]", service.bundle().route, service.bundle().cache.as_str());
    }

    let worker_handle = runtime::spawn_workers(Arc::clone(&registry), shutdown_rx);
    core::set_serving();

    run_request_loop(&server, &registry);

    lifecycle::wait_for_shutdown(worker_handle);
    Ok(())
}

fn run_request_loop(server: &Server, registry: &Arc<BundleRegistry>) {
    // Thread pool so an uncached build cannot block other requests
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .expect("failed to create thread pool");

    for request in server.incoming_requests() {
        let registry = Arc::clone(registry);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &registry) {
                log!("serve"; "request error: {e}");
            }
        });
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, registry: &BundleRegistry) -> Result<()> {
    if core::is_shutdown() || !core::is_serving() {
        return response::respond_unavailable(request);
    }

    match registry.lookup(request.url()) {
        Some(service) => service.respond(request),
        None => response::respond_not_found(request),
    }
}

//! Development server: full build, static file serving, and the watcher.
//!
//! Startup order:
//! ```text
//! subscribe (events buffer) → full build → bind → spawn dispatcher → request loop
//! ```

mod lifecycle;
mod path;
mod response;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::compiler::{Builder, MarkdownRenderer, PathMapper, Render};
use crate::config::SiteConfig;
use crate::watch::{self, Subscription};
use crate::{debug, log};

/// Worker threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// Build, then serve the output tree until Ctrl+C.
pub fn serve(config: Arc<SiteConfig>) -> Result<()> {
    // Watcher first: edits made during the full build are not lost
    let subscription = if config.serve.watch {
        let subscription = watch::subscribe(config.content_dir()).with_context(|| {
            format!("failed to watch `{}`", config.content_dir().display())
        })?;
        Some(subscription)
    } else {
        debug!("serve"; "watching disabled");
        None
    };

    let builder = Builder::new(PathMapper::new(&config), MarkdownRenderer::default());
    super::build::full_build(&builder)?;

    bind_server(&config)?.run(builder, subscription)
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    root: Arc<PathBuf>,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server without starting the request loop
pub fn bind_server(config: &SiteConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
    crate::core::register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);

    Ok(BoundServer {
        server,
        root: Arc::new(config.output_dir().to_path_buf()),
        shutdown_rx,
    })
}

impl BoundServer {
    /// Start the dispatcher (if watching) and the request loop (blocking).
    pub fn run<R: Render + 'static>(
        self,
        builder: Builder<R>,
        subscription: Option<Subscription>,
    ) -> Result<()> {
        let handle = lifecycle::spawn_watcher(builder, subscription, self.shutdown_rx);
        let served = run_request_loop(&self.server, &self.root);
        lifecycle::wait_for_shutdown(handle);
        served
    }
}

fn run_request_loop(server: &Server, root: &Arc<PathBuf>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .thread_name(|i| format!("http-{i}"))
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let root = Arc::clone(root);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &root) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
fn handle_request(request: Request, root: &Path) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    if !response::is_allowed_method(request.method()) {
        debug!("serve"; "{} {} -> 405", request.method(), request.url());
        return response::respond_method_not_allowed(request);
    }

    if let Some(path) = path::resolve_path(request.url(), root) {
        return response::respond_file(request, &path);
    }

    debug!("serve"; "{} -> 404", request.url());
    response::respond_not_found(request)
}

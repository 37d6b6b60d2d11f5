//! Server lifecycle management.

use std::{
    net::{IpAddr, SocketAddr},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Result, anyhow};
use crossbeam::channel::Receiver;
use tiny_http::Server;

use crate::compiler::{Builder, Render};
use crate::watch::{Dispatcher, Subscription};
use crate::{debug, log};

/// Bind the HTTP server to the configured interface and port.
///
/// The port is fixed: an address already in use is a startup error.
pub fn bind(interface: IpAddr, port: u16) -> Result<(Server, SocketAddr)> {
    let addr = SocketAddr::new(interface, port);
    let server = Server::http(addr).map_err(|e| {
        debug!("serve"; "bind {} failed: {}", addr, e);
        anyhow!("failed to bind {addr}: {e}")
    })?;
    Ok((server, addr))
}

/// Spawn the watch dispatcher on its own thread.
///
/// Without a subscription (`--no-watch`) the builder is dropped and
/// nothing is spawned.
pub fn spawn_watcher<R: Render + 'static>(
    builder: Builder<R>,
    subscription: Option<Subscription>,
    shutdown_rx: Receiver<()>,
) -> Option<JoinHandle<()>> {
    let subscription = subscription?;
    let source_root = builder.mapper().source_root().to_path_buf();

    Some(thread::spawn(move || {
        log!("watch"; "watching {} for changes", source_root.display());
        let mut dispatcher = Dispatcher::new(builder);
        let state = dispatcher.run(subscription, shutdown_rx);
        debug!("watch"; "dispatcher stopped: {:?}", state);
    }))
}

/// Wait for the dispatcher to finish its current batch (max 2 seconds).
pub fn wait_for_shutdown(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    debug!("watch"; "dispatcher still busy, exiting anyway");
}

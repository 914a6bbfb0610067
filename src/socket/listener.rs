//! Unix socket listener.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::net::UnixListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use crate::audit::AuditLogger;
use crate::commands::CommandRegistry;
use crate::config::Settings;
use crate::error::{DaemonError, ProtocolErrorKind};

use super::handle_connection;

/// Request and connection counters for one listener.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    pub requests_total: AtomicU64,
    pub requests_failed: AtomicU64,
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Everything a connection needs, captured when it is accepted.
///
/// Replaced wholesale on reload; connections already open keep the state
/// they started with.
pub struct ServingState {
    pub settings: Arc<Settings>,
    pub commands: Arc<CommandRegistry>,
    pub audit_logger: Option<Arc<AuditLogger>>,
}

impl ServingState {
    /// Build the command registry and audit log described by `settings`.
    pub fn from_settings(settings: Arc<Settings>) -> Self {
        let commands = Arc::new(CommandRegistry::from_settings(&settings));
        let audit_logger = open_audit_logger(&settings);
        Self {
            settings,
            commands,
            audit_logger,
        }
    }
}

fn open_audit_logger(settings: &Settings) -> Option<Arc<AuditLogger>> {
    if !settings.audit.enabled {
        info!("Audit logging disabled");
        return None;
    }

    match AuditLogger::open(&settings.audit.log_path) {
        Ok(logger) => {
            info!(path = %settings.audit.log_path.display(), "Audit logging enabled");
            Some(Arc::new(logger))
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %settings.audit.log_path.display(),
                "Failed to open audit log, audit logging disabled"
            );
            None
        }
    }
}

/// Unix socket server.
pub struct SocketListener {
    listener: UnixListener,
    state: RwLock<Arc<ServingState>>,
    metrics: Arc<ConnectionMetrics>,
    connection_semaphore: Arc<Semaphore>,
}

impl SocketListener {
    /// Create and bind a new socket listener.
    pub async fn bind(settings: Arc<Settings>) -> Result<Self, DaemonError> {
        let socket_path = &settings.socket.path;

        // A stale socket is removed; anything reached through a symlink is not.
        if let Ok(metadata) = std::fs::symlink_metadata(socket_path) {
            if metadata.file_type().is_symlink() {
                return Err(DaemonError::Socket {
                    message: format!(
                        "Socket path {} is a symlink, refusing to remove it",
                        socket_path.display()
                    ),
                });
            }

            std::fs::remove_file(socket_path).map_err(|e| DaemonError::Socket {
                message: format!(
                    "Failed to remove existing socket file {}: {}",
                    socket_path.display(),
                    e
                ),
            })?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DaemonError::Socket {
                message: format!(
                    "Failed to create socket directory {}: {}",
                    parent.display(),
                    e
                ),
            })?;
        }

        let listener = UnixListener::bind(socket_path).map_err(|e| DaemonError::Socket {
            message: format!("Failed to bind to socket {}: {}", socket_path.display(), e),
        })?;

        Self::set_socket_permissions(socket_path, &settings.socket.permissions)?;

        let connection_semaphore = Arc::new(Semaphore::new(settings.limits.max_concurrent_requests));
        info!(
            max_connections = settings.limits.max_concurrent_requests,
            "Connection limiting enabled"
        );

        info!(
            path = %socket_path.display(),
            registry = %settings.registry.path.display(),
            "Socket listener bound"
        );

        Ok(Self {
            listener,
            state: RwLock::new(Arc::new(ServingState::from_settings(Arc::clone(&settings)))),
            metrics: Arc::new(ConnectionMetrics::new()),
            connection_semaphore,
        })
    }

    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The state new connections are served with.
    pub fn state(&self) -> Arc<ServingState> {
        let guard = self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Apply reloaded settings to connections accepted from now on.
    ///
    /// The socket path, its permissions and the connection limit are fixed
    /// at bind time; changes to them are logged and ignored.
    pub fn reload(&self, settings: Settings) {
        let current = self.state();
        let old = &current.settings;
        if old.socket.path != settings.socket.path
            || old.socket.permissions != settings.socket.permissions
            || old.limits.max_concurrent_requests != settings.limits.max_concurrent_requests
        {
            warn!("Socket settings changed; they take effect after a restart");
        }

        let next = Arc::new(ServingState::from_settings(Arc::new(settings)));
        let mut guard = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = next;
        info!("Configuration reloaded");
    }

    fn set_socket_permissions(path: &Path, permissions_str: &str) -> Result<(), DaemonError> {
        let mode = u32::from_str_radix(permissions_str, 8).map_err(|e| DaemonError::Socket {
            message: format!("Invalid socket permissions '{}': {}", permissions_str, e),
        })?;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            DaemonError::Socket {
                message: format!(
                    "Failed to set socket permissions on {}: {}",
                    path.display(),
                    e
                ),
            }
        })
    }

    /// Accept connections until `shutdown` is notified.
    ///
    /// Connections already being served continue; see [`Self::wait_for_drain`].
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), DaemonError> {
        info!("Socket listener running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let stream = match result {
                        Ok((stream, _addr)) => stream,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    let permit = match Arc::clone(&self.connection_semaphore).try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!("Connection limit reached, rejecting connection");
                            continue;
                        }
                    };

                    let state = self.state();
                    let metrics = Arc::clone(&self.metrics);
                    metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                    debug!(active = metrics.active(), "New connection accepted");

                    tokio::spawn(async move {
                        let _permit = permit;
                        match handle_connection(stream, state, Arc::clone(&metrics)).await {
                            Ok(()) => {}
                            Err(DaemonError::Protocol { kind: ProtocolErrorKind::ConnectionClosed }) => {}
                            Err(e @ DaemonError::Auth { .. }) => {
                                warn!(error = %e, "Rejected connection");
                            }
                            Err(e) => {
                                error!(error = %e, "Connection handler error");
                            }
                        }
                        metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
                        debug!(active = metrics.active(), "Connection closed");
                    });
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait until no connection is being served.
    pub async fn wait_for_drain(&self) {
        let poll_interval = Duration::from_millis(100);

        while self.metrics.active() > 0 {
            debug!(active = self.metrics.active(), "Waiting for connections to drain");
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}

//! Runtime wiring.
//!
//! Builds every component from a [`Config`], connects them through one
//! [`SignalBus`] and starts/stops them in a fixed order.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::AddSchedulerJob;
use crate::handlers::{CommandRouter, ConnectionHandler};
use crate::network::{ConnectionService, DnsResolver, HostnameResolver};
use crate::proto::IrcParser;
use crate::scheduler::{Scheduler, job_action};
use crate::signals::SignalBus;
use crate::state::SessionManager;

/// Name of the job that refreshes the connected sessions gauge.
pub const SESSION_GAUGE_JOB: &str = "sessions.gauge";
const SESSION_GAUGE_INTERVAL: Duration = Duration::from_secs(30);

pub struct Server {
    config: Config,
    bus: Arc<SignalBus>,
    sessions: Arc<SessionManager>,
    scheduler: Arc<Scheduler>,
    router: Arc<CommandRouter>,
    connection_handler: Arc<ConnectionHandler>,
    connections: Arc<ConnectionService>,
    shutdown: CancellationToken,
    http: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    /// Build a server that resolves hostnames through the system resolver.
    pub fn new(config: Config) -> Self {
        Self::with_resolver(config, Arc::new(DnsResolver::new()))
    }

    pub fn with_resolver(config: Config, resolver: Arc<dyn HostnameResolver>) -> Self {
        let bus = Arc::new(SignalBus::new(
            config.signals.dispatch_tasks,
            config.signals.queue_capacity,
        ));
        let sessions = Arc::new(SessionManager::new());
        let scheduler = Arc::new(Scheduler::new());
        let router = Arc::new(CommandRouter::new(
            Arc::clone(&bus),
            Arc::clone(&sessions),
            config.server.host.clone(),
        ));
        let connection_handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&bus),
            Arc::clone(&sessions),
            resolver,
            config.server.host.clone(),
            config.network.dns_timeout(),
        ));
        let connections = Arc::new(ConnectionService::new(
            config.network.clone(),
            Arc::clone(&bus),
            Arc::clone(&router),
            Arc::clone(&sessions),
            Arc::new(IrcParser),
        ));

        Self {
            config,
            bus,
            sessions,
            scheduler,
            router,
            connection_handler,
            connections,
            shutdown: CancellationToken::new(),
            http: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    pub fn connections(&self) -> &Arc<ConnectionService> {
        &self.connections
    }

    /// Subscribe every component, activate the command handlers, bind the
    /// listeners and schedule the built-in jobs.
    pub async fn start(&self) -> anyhow::Result<()> {
        info!(
            host = %self.config.server.host,
            network = %self.config.server.network,
            "Starting abyssd"
        );

        self.scheduler.attach(&self.bus);
        self.connection_handler.attach();
        self.connections.attach();
        self.router.start()?;
        self.connections.start().await?;

        let sessions = Arc::clone(&self.sessions);
        self.bus
            .publish(AddSchedulerJob {
                name: SESSION_GAUGE_JOB.to_string(),
                interval: SESSION_GAUGE_INTERVAL,
                action: job_action(move || {
                    let sessions = Arc::clone(&sessions);
                    async move {
                        let count = sessions.len();
                        crate::metrics::set_connected_sessions(count);
                        info!(sessions = count, "Connected sessions");
                        Ok(())
                    }
                }),
            })
            .await;

        // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
        let metrics_port = self.config.server.metrics_port;
        if metrics_port != 0 {
            crate::metrics::init();
            let shutdown = self.shutdown.clone();
            *self.http.lock() = Some(tokio::spawn(crate::http::run_http_server(
                metrics_port,
                shutdown,
            )));
        }

        info!(
            plain = ?self.connections.plain_addrs(),
            tls = ?self.connections.tls_addrs(),
            "Server ready"
        );
        Ok(())
    }

    /// Stop the connection service, the router, the scheduler and finally
    /// drain the bus.
    pub async fn stop(&self) {
        info!("Shutting down");
        self.connections.stop();
        self.router.stop();
        self.scheduler.shutdown();

        self.shutdown.cancel();
        let http = self.http.lock().take();
        if let Some(task) = http
            && let Err(e) = task.await
        {
            warn!(error = %e, "Metrics server task failed");
        }

        self.bus.wait_for_completion().await;
        info!("Shutdown complete");
    }
}

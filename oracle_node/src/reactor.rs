//! Single-task event loop.
//!
//! Each tick waits (at most `tick`) for one of: a pending connection on the
//! listener, readability on any connected session, or the timeout. It then
//! runs, in order:
//!
//! 1. accept + registration of at most one new connection
//! 2. a non-blocking drain of every connected session
//! 3. a config mtime check, with rebroadcast on a successful reload
//!
//! Everything runs on one task, so the session table needs no locking.

use crate::config::OracleConfig;
use futures::future::{self, FutureExt};
use oracle_core::{
    AdjacencyMatrix, BroadcastReport, ConfigWatcher, OracleError, Registration, SessionTable,
};
use oracle_env::{TcpLink, TransportError};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// What one tick did.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Outcome of the accepted connection, if there was one
    pub accepted: Option<Result<Registration, OracleError>>,

    /// Slots dropped this tick, by a failed readiness wait or the drain pass
    pub dropped: Vec<usize>,

    /// Rebroadcast after a successful config reload
    pub reloaded: Option<BroadcastReport>,
}

/// What woke the loop up.
enum Wakeup {
    Accepted(TcpStream, SocketAddr),
    SessionFailed(usize, io::Error),
    Idle,
}

/// The Oracle Node reactor: listener, session table, and current topology.
pub struct EventLoop {
    listener: TcpListener,
    sessions: SessionTable<TcpLink>,
    matrix: AdjacencyMatrix,
    watcher: ConfigWatcher,
    tick: Duration,
}

impl EventLoop {
    /// Loads the topology, then binds the listener and sizes the session
    /// table to it.
    ///
    /// The config watcher takes its mtime baseline before the file is read,
    /// so an edit racing startup triggers a reload on the first tick.
    ///
    /// # Errors
    /// * `OracleError::Config` - the config file is unreadable or malformed
    /// * `OracleError::Transport` - the listener could not be bound
    pub async fn bind(config: &OracleConfig) -> Result<Self, OracleError> {
        let watcher = ConfigWatcher::new(&config.config_path);
        let matrix = watcher.load()?;
        info!("Loaded {}:\n{}", watcher.path().display(), matrix);

        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::bind(addr, e))?;

        info!(
            "Oracle Node listening on {} for {} VNs",
            listener.local_addr().unwrap_or(addr),
            matrix.size()
        );

        Ok(Self {
            listener,
            sessions: SessionTable::new(matrix.size()),
            matrix,
            watcher,
            tick: config.tick,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn sessions(&self) -> &SessionTable<TcpLink> {
        &self.sessions
    }

    pub fn matrix(&self) -> &AdjacencyMatrix {
        &self.matrix
    }

    /// Runs ticks until the process is terminated.
    pub async fn run(mut self) {
        loop {
            let report = self.tick().await;
            if !report.dropped.is_empty() {
                debug!("Dropped slots {:?}", report.dropped);
            }
        }
    }

    /// Runs one wait + accept + drain + reload cycle.
    ///
    /// Per-session failures are handled inside the tick and show up in the
    /// report; nothing here stops the loop.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        match self.wait_ready().await {
            Wakeup::Accepted(stream, addr) => {
                report.accepted = Some(self.handle_accept(stream, addr).await);
            }
            Wakeup::SessionFailed(index, e) => {
                self.fail_session(index, e);
                report.dropped.push(index);
            }
            Wakeup::Idle => {}
        }

        report.dropped.extend(self.sessions.drain_all());
        report.reloaded = self.poll_config().await;

        report
    }

    async fn wait_ready(&self) -> Wakeup {
        let (indices, readable): (Vec<usize>, Vec<_>) = self
            .sessions
            .links()
            .map(|(index, link)| (index, link.readable().boxed()))
            .unzip();

        let any_session = async move {
            if readable.is_empty() {
                future::pending::<(usize, io::Result<()>)>().await
            } else {
                let (ready, position, _) = future::select_all(readable).await;
                (indices[position], ready)
            }
        };

        tokio::select! {
            // Listener first, so a pending connection is accepted before
            // same-tick EOFs are drained
            biased;

            accepted = self.listener.accept() => match accepted {
                Ok((stream, addr)) => Wakeup::Accepted(stream, addr),
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    Wakeup::Idle
                }
            },
            (index, ready) = any_session => match ready {
                Ok(()) => Wakeup::Idle,
                Err(e) => Wakeup::SessionFailed(index, e),
            },
            _ = tokio::time::sleep(self.tick) => Wakeup::Idle,
        }
    }

    /// Drops a session whose socket can no longer be waited on.
    fn fail_session(&mut self, index: usize, e: io::Error) {
        if let Some(slot) = self.sessions.slot(index) {
            warn!("VN {} readiness wait failed: {}. Dropping session.", slot.identity(), e);
        }
        self.sessions.disconnect(index);
    }

    async fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) -> Result<Registration, OracleError> {
        let result = self.sessions.accept(TcpLink::new(stream, addr), &self.matrix).await;
        match &result {
            Ok(registration) => debug!(
                "Registered slot {} as VN {}: {:?}",
                registration.slot, registration.identity, registration.delivery
            ),
            Err(OracleError::Capacity { .. }) => {}
            Err(e) => warn!("Registration from {} failed: {}", addr, e),
        }
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(json) = serde_json::to_string(&self.sessions.snapshot()) {
                debug!("Sessions: {}", json);
            }
        }
        result
    }

    async fn poll_config(&mut self) -> Option<BroadcastReport> {
        match self.watcher.reload(self.matrix.size())? {
            Ok(matrix) => {
                self.matrix = matrix;
                info!(
                    "Config file {} updated. Resending LINK-STATE to all VNs.",
                    self.watcher.path().display()
                );
                info!("\n{}", self.matrix);
                Some(self.sessions.broadcast(&self.matrix).await)
            }
            Err(e) => {
                error!("Config file changed but parsing failed: {}. Ignoring change.", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::{Delivery, RegistrationMessage, SlotState};
    use oracle_env::Endpoint;
    use std::io::ErrorKind;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::Path;
    use std::time::SystemTime;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::{sleep, timeout};

    const SETTLE: Duration = Duration::from_millis(100);

    async fn event_loop(dir: &Path, topology: &str) -> EventLoop {
        let path = dir.join("topology.conf");
        std::fs::write(&path, topology).unwrap();
        let config = OracleConfig::new(path)
            .with_listen(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .with_tick(Duration::from_millis(20));
        EventLoop::bind(&config).await.unwrap()
    }

    async fn register(addr: SocketAddr, udp_port: u16) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let message = RegistrationMessage::new(Endpoint::new(Ipv4Addr::LOCALHOST, udp_port));
        stream.write_all(&message.encode()).await.unwrap();
        stream
    }

    fn touch(path: &Path, text: &str, bump: u64) {
        std::fs::write(path, text).unwrap();
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(bump)).unwrap();
    }

    #[tokio::test]
    async fn test_tick_accepts_then_drains_then_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut ev = event_loop(dir.path(), "4\n").await;
        let addr = ev.local_addr().unwrap();

        let a = register(addr, 7000).await;
        sleep(SETTLE).await;
        let report = ev.tick().await;
        let registration = report.accepted.unwrap().unwrap();
        assert_eq!(registration.delivery, Delivery::Waiting { registered: 1, capacity: 2 });
        assert!(report.dropped.is_empty());
        assert!(report.reloaded.is_none());

        // A leaves, B arrives and the config changes, all before one tick
        drop(a);
        let mut b = register(addr, 7001).await;
        touch(&dir.path().join("topology.conf"), "6\n", 10);
        sleep(SETTLE).await;

        let report = ev.tick().await;

        // Accept ran first: A was still registered, so B completed quorum
        let registration = report.accepted.unwrap().unwrap();
        assert_eq!(registration.slot, 1);
        assert!(matches!(registration.delivery, Delivery::Broadcast(_)));

        // Then the drain noticed A's EOF
        assert_eq!(report.dropped, vec![0]);
        assert_eq!(ev.sessions().slot(0).unwrap().state(), SlotState::Empty);

        // Then the reload went out to the one remaining session
        let reloaded = report.reloaded.unwrap();
        assert_eq!(reloaded.delivered, vec![1]);
        assert!(!reloaded.complete);
        assert_eq!(ev.matrix().cost(0, 1), Some(6));
        assert!(!ev.sessions().is_distributed());

        // B got the quorum view (cost 4) then the reloaded one (cost 6)
        let mut buf = [0u8; 36];
        timeout(Duration::from_secs(5), b.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(u16::from_be_bytes([buf[7], buf[8]]), 4);
        assert_eq!(u16::from_be_bytes([buf[25], buf[26]]), 6);
    }

    #[tokio::test]
    async fn test_idle_tick_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut ev = event_loop(dir.path(), "4\n").await;

        let report = timeout(Duration::from_secs(1), ev.tick()).await.unwrap();
        assert!(report.accepted.is_none());
        assert!(report.dropped.is_empty());
        assert!(report.reloaded.is_none());
    }

    #[tokio::test]
    async fn test_failed_readiness_drops_only_that_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut ev = event_loop(dir.path(), "4\n").await;
        let addr = ev.local_addr().unwrap();

        let mut a = register(addr, 7000).await;
        sleep(SETTLE).await;
        ev.tick().await;
        let _b = register(addr, 7001).await;
        sleep(SETTLE).await;
        ev.tick().await;
        assert_eq!(ev.sessions().registered_count(), 2);

        ev.fail_session(0, io::Error::new(ErrorKind::Other, "readiness lost"));
        assert_eq!(ev.sessions().slot(0).unwrap().state(), SlotState::Empty);
        assert!(ev.sessions().slot(1).unwrap().is_registered());
        assert!(!ev.sessions().is_distributed());

        // A sees its quorum view, then EOF
        let mut view = [0u8; 18];
        a.read_exact(&mut view).await.unwrap();
        let mut byte = [0u8; 1];
        let read = timeout(Duration::from_secs(5), a.read(&mut byte)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));

        // The loop keeps ticking
        let report = ev.tick().await;
        assert!(report.accepted.is_none());
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        std::fs::write(&path, "4 x\n").unwrap();

        let config = OracleConfig::new(path).with_listen(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        assert!(matches!(EventLoop::bind(&config).await, Err(OracleError::Config(_))));
    }
}

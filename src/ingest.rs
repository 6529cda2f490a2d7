//! # Ingestion Loop
//!
//! Drives link → parser → store for the lifetime of the process.
//!
//! ```text
//! Disconnected ──open ok──▶ Connected ──closed──▶ Disconnected
//!      │                        ▲
//!      └──open failed──▶ SubstituteMode ──probe ok──┘
//! ```
//!
//! No link, read or parse failure ends the loop; only the shutdown signal
//! does. A failed open degrades to substitute data, a failed read is retried
//! after a short pause while the link stays `Connected`, and a line with no
//! usable fields is a no-op.
//!
//! Hardware probes in `SubstituteMode` run as a separate task raced against
//! the substitute source, so a slow open never holds back substitute lines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::link::{LineEvent, LineSource, LinkOpener, LinkState, SubstituteSource};
use crate::parser::parse_line;
use crate::shutdown::ShutdownSignal;
use crate::telemetry::TelemetryStore;

/// Timing and substitute-data settings of the loop
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Pause after a failed read before reading again
    pub retry_delay: Duration,
    /// Wait before reopening a closed link, and between hardware probes
    /// while running on substitute data
    pub reconnect_interval: Duration,
    /// Skip the real link entirely
    pub force_substitute: bool,
    pub substitute_line: String,
    pub substitute_interval: Duration,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_delay: config.link.retry_delay(),
            reconnect_interval: config.link.reconnect_interval(),
            force_substitute: config.substitute.force,
            substitute_line: config.substitute.line.clone(),
            substitute_interval: Duration::from_millis(config.substitute.interval_ms),
        }
    }
}

/// Running counters, shared with whoever reports status
#[derive(Debug, Default)]
pub struct IngestCounters {
    lines: AtomicU64,
    applied: AtomicU64,
    empty: AtomicU64,
    read_errors: AtomicU64,
}

/// Point-in-time copy of [`IngestCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines received from the link or substitute source
    pub lines: u64,
    /// Lines that updated at least one field
    pub applied: u64,
    /// Lines with no usable field
    pub empty: u64,
    /// Transient read failures
    pub read_errors: u64,
}

impl IngestCounters {
    pub fn snapshot(&self) -> IngestStats {
        IngestStats {
            lines: self.lines.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Pending background open of the hardware link
type Probe = JoinHandle<Result<Box<dyn LineSource>>>;

/// What woke the loop
enum Step {
    Event(Result<LineEvent>),
    Probe(Result<Box<dyn LineSource>>),
}

/// Resolves with the probe result, or never when no probe is pending
async fn probe_finished(probe: &mut Option<Probe>) -> Result<Box<dyn LineSource>> {
    match probe.as_mut() {
        Some(handle) => handle
            .await
            .unwrap_or_else(|e| Err(GatewayError::LinkUnavailable(format!("probe task failed: {}", e)))),
        None => std::future::pending().await,
    }
}

/// The single writer of the telemetry store
pub struct IngestionLoop {
    opener: Arc<Mutex<Box<dyn LinkOpener>>>,
    link_name: String,
    store: Arc<TelemetryStore>,
    settings: IngestSettings,
    state_tx: watch::Sender<LinkState>,
    counters: Arc<IngestCounters>,
}

impl IngestionLoop {
    /// Create a loop in the `Disconnected` state
    ///
    /// # Arguments
    ///
    /// * `opener` - Opens the hardware link
    /// * `store` - Store receiving every parsed reading
    /// * `settings` - Timing and substitute-data settings
    pub fn new(
        opener: Box<dyn LinkOpener>,
        store: Arc<TelemetryStore>,
        settings: IngestSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            link_name: opener.describe(),
            opener: Arc::new(Mutex::new(opener)),
            store,
            settings,
            state_tx,
            counters: Arc::new(IngestCounters::default()),
        }
    }

    /// Receiver tracking the link state
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// Shared counters
    pub fn counters(&self) -> Arc<IngestCounters> {
        Arc::clone(&self.counters)
    }

    fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: LinkState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!("Link state: {} -> {}", previous, state);
        }
    }

    fn substitute(&self) -> Box<dyn LineSource> {
        Box::new(SubstituteSource::new(
            self.settings.substitute_line.clone(),
            self.settings.substitute_interval,
        ))
    }

    /// Open the hardware link, giving up early on shutdown
    ///
    /// Returns `None` when shutdown was requested while opening.
    async fn open_link(
        &self,
        shutdown: &mut ShutdownSignal,
    ) -> Option<Result<Box<dyn LineSource>>> {
        tokio::select! {
            _ = shutdown.cancelled() => None,
            result = async { self.opener.lock().await.open().await } => Some(result),
        }
    }

    /// Try the hardware link again after the reconnect interval
    fn spawn_probe(&self) -> Probe {
        let opener = Arc::clone(&self.opener);
        let delay = self.settings.reconnect_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            opener.lock().await.open().await
        })
    }

    /// Parse one line and apply it to the store
    fn ingest_line(&self, line: &str) {
        self.counters.lines.fetch_add(1, Ordering::Relaxed);

        let outcome = parse_line(line);
        let reading = outcome.reading();
        if reading.is_empty() {
            self.counters.empty.fetch_add(1, Ordering::Relaxed);
            trace!("No telemetry in line ({}): {:?}", outcome.kind(), line);
            return;
        }

        let applied = self.store.update(&reading);
        self.counters.applied.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Applied {} field(s) from {} line: {:?}",
            applied,
            outcome.kind(),
            reading
        );
    }

    /// Run until the shutdown signal fires
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut source: Option<Box<dyn LineSource>> = None;
        let mut probe: Option<Probe> = None;

        info!("Ingestion loop starting on {}", self.link_name);

        loop {
            if shutdown.is_triggered() {
                break;
            }

            if self.state() == LinkState::Disconnected {
                if self.settings.force_substitute {
                    info!("Substitute data forced by configuration");
                    source = Some(self.substitute());
                    self.set_state(LinkState::SubstituteMode);
                    continue;
                }

                match self.open_link(&mut shutdown).await {
                    None => break,
                    Some(Ok(link)) => {
                        info!("Reading telemetry from {}", link.describe());
                        source = Some(link);
                        self.set_state(LinkState::Connected);
                    }
                    Some(Err(e)) => {
                        warn!("{}; running on substitute data", e);
                        source = Some(self.substitute());
                        probe = Some(self.spawn_probe());
                        self.set_state(LinkState::SubstituteMode);
                    }
                }
                continue;
            }

            let Some(link) = source.as_mut() else {
                self.set_state(LinkState::Disconnected);
                continue;
            };

            let step = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = link.next_line() => Step::Event(event),
                opened = probe_finished(&mut probe) => Step::Probe(opened),
            };

            let event = match step {
                Step::Event(event) => event,
                Step::Probe(Ok(restored)) => {
                    info!("Link restored, reading telemetry from {}", restored.describe());
                    probe = None;
                    source = Some(restored);
                    self.set_state(LinkState::Connected);
                    continue;
                }
                Step::Probe(Err(e)) => {
                    debug!("Link still unavailable: {}", e);
                    probe = Some(self.spawn_probe());
                    continue;
                }
            };

            match event {
                Ok(LineEvent::Line(line)) => self.ingest_line(&line),
                Ok(LineEvent::Idle) => {}
                Ok(LineEvent::Closed) => {
                    warn!(
                        "{} closed; reconnecting in {:?}",
                        link.describe(),
                        self.settings.reconnect_interval
                    );
                    source = None;
                    self.set_state(LinkState::Disconnected);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.reconnect_interval) => {}
                    }
                }
                Err(e) => {
                    self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Read error on {}: {}", link.describe(), e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.retry_delay) => {}
                    }
                }
            }
        }

        if let Some(pending) = probe.take() {
            pending.abort();
        }
        self.set_state(LinkState::Disconnected);
        let stats = self.counters.snapshot();
        info!(
            "Ingestion loop stopped ({} lines, {} applied, {} read errors)",
            stats.lines, stats.applied, stats.read_errors
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::source_trait::mocks::{MockOpener, ScriptedSource};
    use crate::shutdown::Shutdown;
    use std::io;

    fn settings() -> IngestSettings {
        IngestSettings {
            retry_delay: Duration::from_millis(100),
            reconnect_interval: Duration::from_secs(1),
            force_substitute: false,
            substitute_line: "temp=25.4 hum=41.2 tilt=3.2".to_string(),
            substitute_interval: Duration::from_secs(1),
        }
    }

    struct Harness {
        store: Arc<TelemetryStore>,
        state: watch::Receiver<LinkState>,
        counters: Arc<IngestCounters>,
        shutdown: Shutdown,
        handle: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn start(opener: MockOpener, settings: IngestSettings) -> Self {
            let store = Arc::new(TelemetryStore::new());
            let ingest = IngestionLoop::new(Box::new(opener), Arc::clone(&store), settings);
            let state = ingest.link_state();
            let counters = ingest.counters();
            let shutdown = Shutdown::new();
            let handle = tokio::spawn(ingest.run(shutdown.signal()));
            Self {
                store,
                state,
                counters,
                shutdown,
                handle,
            }
        }

        async fn stop(self) {
            self.shutdown.trigger();
            tokio::time::timeout(Duration::from_secs(5), self.handle)
                .await
                .expect("loop stops after shutdown")
                .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_lines_reach_store() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::lines(&[
            r#"{"temp": 25.4, "humid": 41.2, "tilt": 3.2}"#,
            "tilt: 7.0",
        ]));
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*harness.state.borrow(), LinkState::Connected);
        let values = harness.store.snapshot().values();
        assert_eq!(values.temperature, Some(25.4));
        assert_eq!(values.humidity, Some(41.2));
        assert_eq!(values.tilt, Some(7.0));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_failure_enters_substitute_mode() {
        let harness = Harness::start(MockOpener::failing(), settings());

        // Within one substitute interval
        tokio::time::sleep(Duration::from_millis(900)).await;

        assert_eq!(*harness.state.borrow(), LinkState::SubstituteMode);
        let snapshot = harness.store.snapshot();
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.values().temperature, Some(25.4));
        assert_eq!(snapshot.values().humidity, Some(41.2));
        assert_eq!(snapshot.values().tilt, Some(3.2));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_substitute_never_opens_link() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::lines(&["temp=99"]));
        let attempts = opener.clone();

        let mut forced = settings();
        forced.force_substitute = true;
        let harness = Harness::start(opener, forced);

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(attempts.attempts(), 0);
        assert_eq!(*harness.state.borrow(), LinkState::SubstituteMode);
        assert_eq!(harness.store.snapshot().values().temperature, Some(25.4));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_substitute_mode_probes_and_recovers_link() {
        let opener = MockOpener::failing();
        let handle = opener.clone();
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*harness.state.borrow(), LinkState::SubstituteMode);

        // Hardware shows up before the next probe
        handle.push_source(ScriptedSource::lines(&["temp=-4.5"]));
        tokio::time::sleep(Duration::from_millis(1600)).await;

        assert_eq!(*harness.state.borrow(), LinkState::Connected);
        assert_eq!(harness.store.snapshot().values().temperature, Some(-4.5));
        assert!(handle.attempts() >= 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_does_not_stall_substitute_lines() {
        // Every open takes longer than the substitute interval, then fails
        let opener = MockOpener::failing().with_open_delay(Duration::from_secs(2));
        let attempts = opener.clone();
        let harness = Harness::start(opener, settings());

        // First open fails at 2 s; substitute lines follow at 2, 3, ... 32 s
        tokio::time::sleep(Duration::from_millis(32_500)).await;

        assert_eq!(*harness.state.borrow(), LinkState::SubstituteMode);
        assert!(harness.counters.snapshot().lines >= 30);
        assert!(attempts.attempts() >= 5);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_do_not_change_state() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::new(vec![
            Err(GatewayError::TransientRead(io::Error::new(io::ErrorKind::Other, "glitch"))),
            Err(GatewayError::TransientRead(io::Error::new(io::ErrorKind::Other, "glitch"))),
            Ok(LineEvent::Line("hum=55".to_string())),
        ]));
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(*harness.state.borrow(), LinkState::Connected);
        assert_eq!(harness.store.snapshot().values().humidity, Some(55.0));
        assert_eq!(harness.counters.snapshot().read_errors, 2);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_lines_are_noops() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::lines(&[
            "temp=20",
            "[RX] rssi -80",
            "",
            "{broken",
        ]));
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = harness.counters.snapshot();
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.empty, 3);
        assert_eq!(harness.store.snapshot().values().temperature, Some(20.0));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_link_reconnects() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::new(vec![
            Ok(LineEvent::Line("temp=1".to_string())),
            Ok(LineEvent::Closed),
        ]));
        opener.push_source(ScriptedSource::lines(&["temp=2"]));
        let attempts = opener.clone();
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(attempts.attempts(), 2);
        assert_eq!(*harness.state.borrow(), LinkState::Connected);
        assert_eq!(harness.store.snapshot().values().temperature, Some(2.0));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_link_without_hardware_falls_back_to_substitute() {
        let opener = MockOpener::new();
        opener.push_source(ScriptedSource::new(vec![Ok(LineEvent::Closed)]));
        let harness = Harness::start(opener, settings());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(*harness.state.borrow(), LinkState::SubstituteMode);
        assert_eq!(harness.store.snapshot().values().tilt, Some(3.2));
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop_and_reports_disconnected() {
        let harness = Harness::start(MockOpener::failing(), settings());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let state = harness.state.clone();
        harness.stop().await;
        assert_eq!(*state.borrow(), LinkState::Disconnected);
    }
}

//! SamplerActor - drives every state change of the engine
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Probe → {windows, history, threshold} → publish Snapshot
//!     ↑                                                  ↓
//!     └── Commands (Start, Stop, Reconfigure, ...)      EngineEvent broadcast
//! ```
//!
//! The actor is the only writer of the windows, the history and the
//! configuration. Hosts talk to it through an [`EngineHandle`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    Sample,
    alerts::{self, AlertEvent},
    config::{EngineConfig, Settings},
    error::{ConfigError, EngineError, LoadError, PersistenceError},
    history::{HistoryLog, export_samples},
    monitors::{Probe, SysinfoProbe, resources::sample_within},
    snapshot::{Snapshot, SnapshotPublisher, Status},
    storage::{HistoryStore, JsonFileStore},
    window::WindowStore,
};

use super::messages::{EngineEvent, SamplerCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Stopped,
    Running,
    /// Applying a new configuration; back to `Running` before the next tick
    Reconfiguring,
}

pub struct SamplerActor {
    config: EngineConfig,

    state: SamplerState,

    probe: Box<dyn Probe>,

    probe_timeout: Duration,

    windows: WindowStore,

    history: HistoryLog,

    /// Kept for the lifetime of the engine so late readers still see it
    load_error: Option<LoadError>,

    /// Ticks processed so far
    sequence: u64,

    command_rx: mpsc::Receiver<SamplerCommand>,

    snapshots: SnapshotPublisher,

    history_tx: watch::Sender<Arc<Vec<Sample>>>,

    event_tx: broadcast::Sender<EngineEvent>,
}

impl SamplerActor {
    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command is received or every handle is dropped.
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting sampler actor");

        let mut ticker = new_ticker(self.config.interval());

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        warn!("command channel closed, shutting down");
                        break;
                    };

                    if !self.handle_command(cmd, &mut ticker).await {
                        break;
                    }
                }

                _ = ticker.tick(), if self.state == SamplerState::Running => {
                    self.tick().await;
                }
            }
        }

        self.state = SamplerState::Stopped;
        self.republish();
        debug!("sampler actor stopped");
    }

    /// Returns `false` when the actor should exit.
    async fn handle_command(&mut self, cmd: SamplerCommand, ticker: &mut Interval) -> bool {
        match cmd {
            SamplerCommand::Start { config, respond_to } => {
                let result = self.start(config, ticker);
                let _ = respond_to.send(result);
            }

            SamplerCommand::Stop { respond_to } => {
                self.stop();
                let _ = respond_to.send(());
            }

            SamplerCommand::Reconfigure { config, respond_to } => {
                let result = self.reconfigure(config, ticker);
                let _ = respond_to.send(result);
            }

            SamplerCommand::ClearHistory { respond_to } => {
                let result = self.clear_history().await;
                let _ = respond_to.send(result);
            }

            SamplerCommand::SampleNow { respond_to } => {
                debug!("received SampleNow command");
                let snapshot = if self.state == SamplerState::Running {
                    Some(self.tick().await)
                } else {
                    None
                };
                let _ = respond_to.send(snapshot);
            }

            SamplerCommand::Shutdown => {
                debug!("received shutdown command");
                return false;
            }
        }

        true
    }

    fn start(
        &mut self,
        config: Option<EngineConfig>,
        ticker: &mut Interval,
    ) -> Result<(), ConfigError> {
        if let Some(config) = config {
            config.validate()?;
            self.config = config;
        }

        if self.state == SamplerState::Running {
            // only a new config needs a fresh timer
            if config.is_some() {
                *ticker = new_ticker(self.config.interval());
                self.republish();
            }
            return Ok(());
        }

        info!(
            "sampling every {} ms, warning above {}%",
            self.config.sample_interval_ms, self.config.warning_threshold_percent
        );

        self.state = SamplerState::Running;
        *ticker = new_ticker(self.config.interval());
        self.emit(EngineEvent::Started {
            config: self.config,
        });
        self.republish();

        Ok(())
    }

    fn stop(&mut self) {
        if self.state == SamplerState::Stopped {
            trace!("already stopped");
            return;
        }

        info!("sampling stopped after {} ticks", self.sequence);
        self.state = SamplerState::Stopped;
        self.emit(EngineEvent::Stopped);
        self.republish();
    }

    fn reconfigure(
        &mut self,
        config: EngineConfig,
        ticker: &mut Interval,
    ) -> Result<(), ConfigError> {
        if let Err(e) = config.validate() {
            warn!("rejected configuration {config:?}: {e}");
            return Err(e);
        }

        let previous = self.state;
        if previous == SamplerState::Running {
            self.state = SamplerState::Reconfiguring;
        }

        debug!(
            "reconfiguring: interval {} -> {} ms, threshold {} -> {}%",
            self.config.sample_interval_ms,
            config.sample_interval_ms,
            self.config.warning_threshold_percent,
            config.warning_threshold_percent
        );
        self.config = config;

        if previous == SamplerState::Running {
            *ticker = new_ticker(self.config.interval());
            self.state = SamplerState::Running;
        }

        self.emit(EngineEvent::Reconfigured { config });
        self.republish();

        Ok(())
    }

    async fn clear_history(&mut self) -> Result<(), PersistenceError> {
        let result = self.history.clear().await;
        self.publish_history();

        match &result {
            Ok(()) => self.emit(EngineEvent::HistoryCleared),
            Err(e) => {
                error!("{e}");
                self.emit(EngineEvent::PersistenceFailed(e.clone()));
            }
        }

        let mut snapshot = (*self.snapshots.current()).clone();
        snapshot.history_len = self.history.len();
        snapshot.persistence_error = result.as_ref().err().cloned();
        self.snapshots.publish(snapshot);

        result
    }

    /// One sampling cycle. Probe failures and write failures are reported,
    /// never propagated.
    #[instrument(skip(self), fields(tick = self.sequence + 1))]
    async fn tick(&mut self) -> Arc<Snapshot> {
        self.sequence += 1;

        let sample = match sample_within(self.probe.as_mut(), self.probe_timeout).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("skipping tick: {e}");
                self.emit(EngineEvent::ProbeFailed(e.clone()));

                let mut snapshot = (*self.snapshots.current()).clone();
                snapshot.sequence = self.sequence;
                snapshot.alerts = Vec::new();
                snapshot.probe_error = Some(e);
                snapshot.persistence_error = None;
                return self.publish(snapshot);
            }
        };

        self.windows.record(&sample);

        let persistence_error = self.history.append(sample.clone()).await.err();
        if let Some(e) = &persistence_error {
            error!("{e}");
            self.emit(EngineEvent::PersistenceFailed(e.clone()));
        }
        self.publish_history();

        let alerts = alerts::evaluate(&sample, self.config.warning_threshold_percent);
        for alert in &alerts {
            self.report_alert(alert);
        }

        let snapshot = Snapshot {
            sequence: self.sequence,
            state: self.state,
            config: self.config,
            status: Status::for_tick(&sample, &alerts),
            sample: Some(sample),
            windows: self.windows.clone(),
            alerts,
            probe_error: None,
            persistence_error,
            load_error: self.load_error.clone(),
            history_len: self.history.len(),
        };

        self.publish(snapshot)
    }

    fn report_alert(&self, alert: &AlertEvent) {
        debug!(
            "{} exceeded threshold ({}% > {}%)",
            alert.metric, alert.value, self.config.warning_threshold_percent
        );
        self.emit(EngineEvent::Alert(alert.clone()));
    }

    fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        self.snapshots.publish(snapshot);
        self.snapshots.current()
    }

    /// Publish the current snapshot again with updated state and config.
    fn republish(&self) {
        let mut snapshot = (*self.snapshots.current()).clone();
        snapshot.state = self.state;
        snapshot.config = self.config;
        self.snapshots.publish(snapshot);
    }

    fn publish_history(&self) {
        self.history_tx.send_replace(Arc::new(self.history.to_vec()));
    }

    fn emit(&self, event: EngineEvent) {
        // no subscribers is fine
        if let Ok(receivers) = self.event_tx.send(event) {
            trace!("published event to {receivers} receivers");
        }
    }
}

/// First tick one full period from now.
fn new_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Handle for controlling the sampler and reading its state
///
/// Cheap to clone; every clone talks to the same sampler.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<SamplerCommand>,

    snapshot_rx: watch::Receiver<Arc<Snapshot>>,

    history_rx: watch::Receiver<Arc<Vec<Sample>>>,

    event_tx: broadcast::Sender<EngineEvent>,

    export_timeout: Duration,
}

impl EngineHandle {
    /// Load the history, then spawn the sampler in the `Stopped` state.
    ///
    /// Subscribe to `event_tx` before calling this to also receive a
    /// [`EngineEvent::LoadFailed`] raised while loading.
    pub async fn spawn(
        settings: &Settings,
        probe: Box<dyn Probe>,
        store: Arc<dyn HistoryStore>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut history = HistoryLog::new(store, settings.history_capacity);
        let load_error = history.load().await.err();
        if let Some(e) = &load_error {
            let _ = event_tx.send(EngineEvent::LoadFailed(e.clone()));
        }

        let mut initial = Snapshot::initial(settings.engine, settings.window_points);
        initial.load_error = load_error.clone();
        initial.history_len = history.len();

        let snapshots = SnapshotPublisher::new(initial);
        let snapshot_rx = snapshots.subscribe();
        let (history_tx, history_rx) = watch::channel(Arc::new(history.to_vec()));
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SamplerActor {
            config: settings.engine,
            state: SamplerState::Stopped,
            probe,
            probe_timeout: settings.probe_timeout(),
            windows: WindowStore::new(settings.window_points),
            history,
            load_error,
            sequence: 0,
            command_rx: cmd_rx,
            snapshots,
            history_tx,
            event_tx: event_tx.clone(),
        };

        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            snapshot_rx,
            history_rx,
            event_tx,
            export_timeout: settings.persist_timeout(),
        })
    }

    /// Spawn with the host probe and the JSON history file from `settings`.
    pub async fn from_settings(
        settings: &Settings,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> anyhow::Result<Self> {
        let probe = Box::new(SysinfoProbe::from_settings(settings));
        let store = Arc::new(JsonFileStore::new(
            settings.history_path.clone(),
            settings.persist_timeout(),
        ));

        Self::spawn(settings, probe, store, event_tx)
            .await
            .context("invalid engine settings")
    }

    /// Start sampling with the current configuration.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.request_start(None).await
    }

    /// Start sampling with `config`. An invalid config leaves the sampler untouched.
    pub async fn start_with(&self, config: EngineConfig) -> Result<(), EngineError> {
        self.request_start(Some(config)).await
    }

    async fn request_start(&self, config: Option<EngineConfig>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SamplerCommand::Start {
            config,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|_| EngineError::Closed("no answer to Start"))??;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SamplerCommand::Stop { respond_to: tx }).await?;

        rx.await.map_err(|_| EngineError::Closed("no answer to Stop"))
    }

    /// Apply `config` from the next tick on. Windows and history are kept.
    pub async fn reconfigure(&self, config: EngineConfig) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SamplerCommand::Reconfigure {
            config,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|_| EngineError::Closed("no answer to Reconfigure"))??;
        Ok(())
    }

    /// Reconfigure from raw text input; non-numeric input is rejected.
    pub async fn reconfigure_raw(
        &self,
        interval_ms: &str,
        threshold_percent: &str,
    ) -> Result<(), EngineError> {
        let config = EngineConfig::parse(interval_ms, threshold_percent)?;
        self.reconfigure(config).await
    }

    pub async fn clear_history(&self) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SamplerCommand::ClearHistory { respond_to: tx })
            .await?;

        rx.await
            .map_err(|_| EngineError::Closed("no answer to ClearHistory"))??;
        Ok(())
    }

    /// Write the current history to `path`. Runs on the caller's task and
    /// leaves the engine untouched.
    ///
    /// The parent directory must already exist; a failed export creates
    /// nothing.
    pub async fn export_history(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let samples = self.history();
        export_samples(path.as_ref(), &samples, self.export_timeout).await?;
        Ok(())
    }

    /// Run one tick now and return the snapshot it produced.
    pub async fn sample_now(&self) -> Result<Arc<Snapshot>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(SamplerCommand::SampleNow { respond_to: tx })
            .await?;

        rx.await
            .map_err(|_| EngineError::Closed("no answer to SampleNow"))?
            .ok_or(EngineError::NotRunning)
    }

    /// Gracefully shut down the sampler
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(SamplerCommand::Shutdown).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_rx.clone()
    }

    /// Current history, oldest first
    pub fn history(&self) -> Arc<Vec<Sample>> {
        self.history_rx.borrow().clone()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Arc<Vec<Sample>>> {
        self.history_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    async fn send(&self, cmd: SamplerCommand) -> Result<(), EngineError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| EngineError::Closed("command channel closed"))
    }
}

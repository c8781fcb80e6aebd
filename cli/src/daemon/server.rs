use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gauge_platform::{SampleSource, SystemBattery, ThresholdEvent, ThresholdWatcher};
use gauge_protocol::{
    DaemonRequest, DaemonResponse, DaemonStatus, HistoryEntry, MonitorEvent, WidgetId,
    MIN_SUPPORTED_VERSION, PROTOCOL_VERSION,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::alerts::CommandAlerts;
use crate::config::{runtime_dir, LogLevel, UserConfig};
use crate::daemon::socket_path;
use crate::daemon::worker::OrchestratorWorker;
use crate::data::history_store::{days_before, now_millis};
use crate::data::normalizer::normalize;
use crate::data::{HistoryStore, SnapshotCache, UpdateOrchestrator};
use crate::widget::FileSurface;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] crate::data::CacheError),

    #[error("Already running")]
    AlreadyRunning,

    #[error("Failed to daemonize: {0}")]
    Daemonize(String),

    #[error("Orchestrator worker has stopped")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, DaemonError>;

type ClientId = u64;

enum ClientMessage {
    Request { request: DaemonRequest },
    Disconnect,
}

struct ClientHandle {
    response_tx: mpsc::Sender<DaemonResponse>,
}

struct DaemonState {
    history: Option<Arc<HistoryStore>>,
    cache: Arc<SnapshotCache>,
    worker: OrchestratorWorker,
    battery: Option<SystemBattery>,
    thresholds: ThresholdWatcher,
    targets: Vec<WidgetId>,
    config: UserConfig,
    start_time: Instant,
}

impl DaemonState {
    fn new(config: UserConfig) -> Result<Self> {
        let history = HistoryStore::open_or_log().map(Arc::new);
        let cache = Arc::new(SnapshotCache::open()?);

        let targets = config.widgets.target_ids();
        let orchestrator = UpdateOrchestrator::new(
            history.clone(),
            cache.clone(),
            Box::new(FileSurface::new(targets.clone())),
            Box::new(CommandAlerts::new(&config.alerts)),
        )
        .with_history_enabled(config.history.enabled);

        let battery = if !SystemBattery::is_available() {
            warn!("No battery found, waiting for pushed samples only");
            None
        } else {
            match SystemBattery::new() {
                Ok(battery) => Some(battery),
                Err(e) => {
                    warn!(error = %e, "Battery backend unavailable, waiting for pushed samples only");
                    None
                }
            }
        };

        Ok(Self {
            history,
            cache,
            worker: OrchestratorWorker::spawn(orchestrator),
            battery,
            thresholds: ThresholdWatcher::new(config.monitor.low_level, config.monitor.okay_level),
            targets,
            config,
            start_time: Instant::now(),
        })
    }

    /// Read the host battery and feed the sample, plus any threshold crossing.
    async fn poll(&mut self) -> Result<()> {
        let Some(battery) = self.battery.as_mut() else {
            return Ok(());
        };

        let sample = match battery.sample() {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "Failed to read battery");
                return Ok(());
            }
        };

        let level = normalize(&sample).level;
        self.worker
            .dispatch(MonitorEvent::SampleArrived { sample })
            .await?;

        match self.thresholds.observe(level) {
            Some(ThresholdEvent::Low) => self.worker.dispatch(MonitorEvent::Low).await?,
            Some(ThresholdEvent::Okay) => self.worker.dispatch(MonitorEvent::Okay).await?,
            None => {}
        }

        Ok(())
    }

    fn run_prune(&self) {
        let days = self.config.history.retention_days;
        if days == 0 {
            return;
        }

        let Some(history) = self.history.clone() else {
            return;
        };
        let cutoff = days_before(now_millis(), days);
        tokio::task::spawn_blocking(move || match history.writer().delete_before(cutoff) {
            Ok(deleted) if deleted > 0 => info!(deleted, days, "Pruned old history"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Error pruning history"),
        });
    }

    fn get_status(&self) -> DaemonStatus {
        let stats = self.history.as_ref().and_then(|h| h.stats().ok());

        DaemonStatus {
            running: true,
            uptime_secs: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION,
            min_supported_version: MIN_SUPPORTED_VERSION,
            events_handled: self.worker.events_handled(),
            history_entries: stats.as_ref().map(|s| s.entry_count).unwrap_or(0),
            last_entry_time: stats.as_ref().and_then(|s| s.newest),
            database_size_bytes: stats.map(|s| s.size_bytes).unwrap_or(0),
            history_enabled: self.config.history.enabled,
            widget_targets: self.targets.clone(),
        }
    }

    fn read_history(&self, since: Option<i64>) -> Vec<HistoryEntry> {
        let Some(history) = &self.history else {
            return Vec::new();
        };

        let entries = history.reader().and_then(|reader| match since {
            Some(since) => reader.entries_since(since),
            None => reader.entries(),
        });

        entries.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read history");
            Vec::new()
        })
    }
}

async fn client_reader_task(
    mut reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    msg_tx: mpsc::Sender<(ClientId, ClientMessage)>,
    client_id: ClientId,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                let _ = msg_tx.send((client_id, ClientMessage::Disconnect)).await;
                break;
            }
            Ok(_) => match DaemonRequest::from_json(line.trim()) {
                Ok(request) => {
                    if msg_tx
                        .send((client_id, ClientMessage::Request { request }))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(client_id, error = %e, "Invalid request from client");
                }
            },
            Err(e) => {
                debug!(client_id, error = %e, "Client read error");
                let _ = msg_tx.send((client_id, ClientMessage::Disconnect)).await;
                break;
            }
        }
    }
}

async fn client_writer_task(
    mut writer: tokio::net::unix::OwnedWriteHalf,
    mut response_rx: mpsc::Receiver<DaemonResponse>,
) {
    while let Some(response) = response_rx.recv().await {
        let json = match response.to_json() {
            Ok(j) => j,
            Err(_) => continue,
        };
        if writer
            .write_all(format!("{}\n", json).as_bytes())
            .await
            .is_err()
        {
            break;
        }
    }
}

pub fn run_daemon(
    foreground: bool,
    log_level: LogLevel,
    log_level_override: Option<LogLevel>,
) -> Result<()> {
    let socket = socket_path();

    if socket.exists() {
        if crate::daemon::is_daemon_running() {
            return Err(DaemonError::AlreadyRunning);
        }
        fs::remove_file(&socket)?;
    }

    fs::create_dir_all(runtime_dir())?;

    if !foreground {
        match daemonize::Daemonize::new()
            .working_directory(runtime_dir())
            .start()
        {
            Ok(_) => {}
            Err(e) => return Err(DaemonError::Daemonize(e.to_string())),
        }
        let guard = crate::logging::init(log_level, crate::logging::LogMode::File, log_level_override);
        std::mem::forget(guard);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Daemon starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run_daemon_async(socket))
}

async fn run_daemon_async(socket: std::path::PathBuf) -> Result<()> {
    let mut state = DaemonState::new(UserConfig::load())?;

    let listener = UnixListener::bind(&socket)?;
    info!(socket = ?socket, "Listening for connections");

    // Widget files exist as soon as the daemon is up.
    state
        .worker
        .dispatch(MonitorEvent::WidgetRefreshRequest {
            target_ids: state.targets.clone(),
        })
        .await?;

    let poll_interval = Duration::from_secs(state.config.monitor.poll_interval_secs.max(1));
    let prune_interval = Duration::from_secs(86400);

    let mut poll_tick = tokio::time::interval(poll_interval);
    let mut prune_tick = tokio::time::interval(prune_interval);
    poll_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    prune_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut sigterm = signal(SignalKind::terminate())?;

    let (msg_tx, mut msg_rx) = mpsc::channel::<(ClientId, ClientMessage)>(256);
    let mut clients: HashMap<ClientId, ClientHandle> = HashMap::new();
    let mut next_client_id: ClientId = 1;

    loop {
        tokio::select! {
            _ = poll_tick.tick() => {
                if let Err(e) = state.poll().await {
                    error!(error = %e, "Error polling battery");
                    break;
                }
            }
            _ = prune_tick.tick() => {
                state.run_prune();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let client_id = next_client_id;
                        next_client_id += 1;
                        debug!(client_id, "Client connected");

                        let (reader, writer) = stream.into_split();
                        let (response_tx, response_rx) = mpsc::channel::<DaemonResponse>(64);

                        clients.insert(client_id, ClientHandle { response_tx });

                        tokio::task::spawn_local(client_reader_task(
                            BufReader::new(reader),
                            msg_tx.clone(),
                            client_id,
                        ));
                        tokio::task::spawn_local(client_writer_task(writer, response_rx));
                    }
                    Err(e) => {
                        error!(error = %e, "Socket accept error");
                    }
                }
            }
            Some((client_id, msg)) = msg_rx.recv() => {
                match msg {
                    ClientMessage::Disconnect => {
                        if clients.remove(&client_id).is_some() {
                            debug!(client_id, count = clients.len(), "Client disconnected");
                        }
                    }
                    ClientMessage::Request { request } => {
                        debug!(client_id, request = ?request, "Handling request");

                        let Some(response_tx) = clients.get(&client_id).map(|c| c.response_tx.clone()) else {
                            continue;
                        };

                        let response = match request {
                            DaemonRequest::GetStatus => DaemonResponse::Status(state.get_status()),
                            DaemonRequest::GetSnapshot => DaemonResponse::Snapshot(state.cache.read()),
                            DaemonRequest::GetHistory { since } => {
                                DaemonResponse::History(state.read_history(since))
                            }
                            DaemonRequest::Event(event) => {
                                match state.worker.submit(event).await {
                                    Ok(reply) => {
                                        // Reply once handled without holding up the loop.
                                        tokio::task::spawn_local(async move {
                                            let response = match reply.await {
                                                Ok(outcome) => DaemonResponse::Handled(outcome),
                                                Err(_) => DaemonResponse::Error("Event was dropped".to_string()),
                                            };
                                            let _ = response_tx.send(response).await;
                                        });
                                        continue;
                                    }
                                    Err(e) => DaemonResponse::Error(e.to_string()),
                                }
                            }
                            DaemonRequest::Shutdown => {
                                info!("Shutdown requested by client");
                                let _ = response_tx.send(DaemonResponse::Ok).await;
                                break;
                            }
                        };

                        let _ = response_tx.send(response).await;
                    }
                }
            }
        }
    }

    info!("Daemon shutting down");
    let DaemonState { worker, cache, .. } = state;
    worker.shutdown().await;
    if let Err(e) = cache.flush() {
        warn!(error = %e, "Failed to flush snapshot cache");
    }
    fs::remove_file(&socket).ok();

    Ok(())
}

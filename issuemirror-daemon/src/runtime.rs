use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;

use issuemirror_core::{config, NotificationLevel};
use issuemirror_sync::{
    pipeline::{self, SyncScope},
    NoticeAction, RemoteSource, SyncError, SyncGuard, SyncReport,
};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse, DaemonStatus, SyncSummary, Trigger};

/// Remote source shared between the runtime's tasks and its blocking passes.
pub type SharedRemote = Arc<dyn RemoteSource + Send + Sync>;

impl SyncSummary {
    pub(crate) fn from_report(
        trigger: Trigger,
        repository: Option<String>,
        report: &SyncReport,
        duration: Duration,
    ) -> Self {
        SyncSummary {
            trigger,
            repository,
            finished_at_unix: unix_seconds_now(),
            created: report.count(NoticeAction::Created),
            updated: report.count(NoticeAction::Updated),
            appended: report.count(NoticeAction::Appended),
            deleted: report.count(NoticeAction::Deleted),
            errors: report.count(NoticeAction::Error),
            summary: report.summary(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

struct DaemonState {
    home: PathBuf,
    remote: SharedRemote,
    guard: SyncGuard,
    notification_level: NotificationLevel,
    started_at_unix: u64,
    last_sync: RwLock<Option<SyncSummary>>,
}

type SharedState = Arc<DaemonState>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, remote: SharedRemote) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), remote))
}

/// Run the daemon until a `stop` request or ctrl-c.
///
/// The config is read once here for the trigger settings; every pass reloads
/// it, so repositories added while the daemon runs are picked up.
pub async fn run(home: PathBuf, remote: SharedRemote) -> Result<(), DaemonError> {
    let config = {
        let home = home.clone();
        tokio::task::spawn_blocking(move || config::load_at(&home))
            .await
            .map_err(|err| DaemonError::Protocol(format!("config load join error: {err}")))??
    };
    let settings = config.settings;
    tracing::info!(
        repositories = config.repositories.len(),
        sync_on_startup = settings.sync_on_startup,
        interval_minutes = settings.sync_interval_minutes,
        "daemon starting",
    );

    let state: SharedState = Arc::new(DaemonState {
        home,
        remote,
        guard: SyncGuard::new(),
        notification_level: settings.notification_level,
        started_at_unix: unix_seconds_now(),
        last_sync: RwLock::new(None),
    });

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let trigger_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let startup = settings.sync_on_startup;
        let interval = settings.sync_interval_minutes;
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = trigger_task(state, startup, interval, shutdown_rx).await;
            if result.is_err() {
                let _ = shutdown.send(());
            }
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (trigger_result, socket_result, signal_result) =
        tokio::join!(trigger_handle, socket_handle, signal_handle);

    handle_join("triggers", trigger_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// Startup pass (if enabled), then one pass per interval tick (if enabled).
async fn trigger_task(
    state: SharedState,
    sync_on_startup: bool,
    interval_minutes: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if sync_on_startup {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            outcome = run_sync(&state, Trigger::Startup, SyncScope::All) => {
                log_outcome(Trigger::Startup, &outcome);
            }
        }
    }

    if interval_minutes == 0 {
        let _ = shutdown_rx.recv().await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // the first tick is immediate

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let outcome = run_sync(&state, Trigger::Interval, SyncScope::All).await;
                log_outcome(Trigger::Interval, &outcome);
            }
        }
    }
    Ok(())
}

/// Run one pass on a blocking worker if the guard admits it.
async fn run_sync(
    state: &SharedState,
    trigger: Trigger,
    scope: SyncScope,
) -> Result<SyncSummary, DaemonError> {
    let permit = state.guard.try_begin().ok_or(SyncError::Busy)?;
    let started = Instant::now();
    let repository = match &scope {
        SyncScope::Repository(name) => Some(name.clone()),
        SyncScope::All => None,
    };

    let home = state.home.clone();
    let remote = Arc::clone(&state.remote);
    let report = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline::run(&home, remote.as_ref(), scope, false)
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("sync task join error: {err}")))??;

    for notice in report.visible(state.notification_level) {
        tracing::info!(action = %notice.action, "{notice}");
    }

    let summary = SyncSummary::from_report(trigger, repository, &report, started.elapsed());
    *state.last_sync.write().await = Some(summary.clone());
    Ok(summary)
}

fn log_outcome(trigger: Trigger, outcome: &Result<SyncSummary, DaemonError>) {
    match outcome {
        Ok(summary) => tracing::info!(
            trigger = %trigger,
            duration_ms = summary.duration_ms,
            errors = summary.errors,
            "sync completed: {}",
            summary.summary,
        ),
        Err(DaemonError::Sync(SyncError::Busy)) => {
            tracing::info!(trigger = %trigger, "sync already running; trigger skipped")
        }
        Err(err) => tracing::error!(trigger = %trigger, error = %err, "sync failed"),
    }
}

async fn socket_server_task(
    state: SharedState,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    if let Some(parent) = socket.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: SharedState,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let reply = DaemonResponse::rejected(format!("invalid request: {err}"));
                write_response(&mut writer, &reply).await?;
                continue;
            }
        };

        match request {
            DaemonRequest::Status => {
                write_response(&mut writer, &DaemonResponse::Status(status(&state).await)).await?;
            }
            DaemonRequest::Sync { repository } => {
                let reply = match run_sync(&state, Trigger::Socket, SyncScope::from_option(repository)).await {
                    Ok(summary) => DaemonResponse::Synced(summary),
                    Err(err) => DaemonResponse::rejected(err.to_string()),
                };
                write_response(&mut writer, &reply).await?;
            }
            DaemonRequest::Stop => {
                let _ = shutdown_tx.send(());
                write_response(&mut writer, &DaemonResponse::Stopping).await?;
                break;
            }
        }
    }

    Ok(())
}

async fn status(state: &DaemonState) -> DaemonStatus {
    DaemonStatus {
        syncing: state.guard.is_syncing(),
        started_at_unix: state.started_at_unix,
        last_sync: state.last_sync.read().await.clone(),
        socket: socket_path(&state.home),
    }
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber: `RUST_LOG` or `info`, human-readable or
/// JSON lines. `log` records from the library crates are captured too.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

//! File watching for automatic property reloads.

use crate::core::{ResourceListener, WatchOptions};
use crate::error::{PropertyError, Result};
use crate::sources::{PropertySource, Snapshot};
use ::notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Size and modification time of a file, used by the poll fallback.
type Fingerprint = Option<(SystemTime, u64)>;

fn fingerprint(path: &Path) -> Fingerprint {
    let metadata = fs::metadata(path).ok()?;
    Some((metadata.modified().ok()?, metadata.len()))
}

/// Outcome of re-checking a resource once the debounce period has elapsed.
#[derive(Debug, PartialEq, Eq)]
enum Settled {
    Applied,
    Unchanged,
    Failed,
    Gone,
    Stopped,
}

/// State owned by one watch task.
struct WatchedResource {
    source: Arc<dyn PropertySource>,
    listener: Arc<dyn ResourceListener>,
    stopped: Arc<AtomicBool>,
    path: PathBuf,
    debounce: Duration,
    /// Content the listener last applied, never merely seen on disk.
    last_known: Option<Snapshot>,
    fingerprint: Fingerprint,
}

impl WatchedResource {
    fn poll_changed(&mut self) -> bool {
        let current = fingerprint(&self.path);
        if current == self.fingerprint {
            return false;
        }
        self.fingerprint = current;
        true
    }

    /// Load the resource and signal the listener if it differs from the last
    /// applied content. Blocks on file I/O and on the listener.
    fn settle(&mut self) -> Settled {
        if !self.path.exists() {
            return Settled::Gone;
        }
        self.fingerprint = fingerprint(&self.path);

        match self.source.load() {
            Ok(snapshot) if self.last_known.as_ref() == Some(&snapshot) => return Settled::Unchanged,
            Ok(_) => {}
            Err(e) => {
                debug!(resource = %self.source.name(), error = %e, "Changed resource failed to load");
            }
        }

        if self.stopped.load(Ordering::SeqCst) {
            return Settled::Stopped;
        }
        match self.listener.on_resource_changed(self.source.as_ref()) {
            Some(applied) => {
                self.last_known = Some(applied);
                Settled::Applied
            }
            None => Settled::Failed,
        }
    }
}

/// Handles of a started watch, released by [`ResourceWatcher::stop`].
struct RunningWatch {
    stopped: Arc<AtomicBool>,
    os_watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
    shutdown: watch::Sender<bool>,
}

impl RunningWatch {
    fn release(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.os_watcher.lock().take();
        let _ = self.shutdown.send(true);
    }
}

/// Watches a single file-backed [`PropertySource`] and tells a
/// [`ResourceListener`] when its content has changed.
///
/// OS notifications for the file's directory are filtered down to content
/// modifications of the file itself; creations and removals of other entries
/// (editor temp files, for instance) are ignored. File metadata is also
/// compared every `check_interval`, which catches changes on file systems
/// without notification support. Any detected change opens a debounce window
/// that is pushed back by every further change, so a burst of writes produces
/// a single signal once the file has been quiet for `debounce`. The listener is
/// only called when the settled content differs from the content it last
/// applied, or when it no longer loads. A change the listener fails to apply is
/// retried on the next change, even if the file is rewritten with the same
/// content.
///
/// On start the file is compared once against the listener's
/// [`applied_snapshot`](ResourceListener::applied_snapshot), so edits made
/// between loading and watching are not lost. The listener runs on Tokio's
/// blocking pool, never on the watch task.
///
/// If the file disappears, the watcher stops itself.
///
/// # Examples
///
/// ```rust,no_run
/// use reloadable_properties::core::{ResourceListener, WatchOptions};
/// use reloadable_properties::notify::ResourceWatcher;
/// use reloadable_properties::sources::{PropertiesFile, PropertySource, Snapshot};
/// use std::sync::Arc;
///
/// struct Log;
///
/// impl ResourceListener for Log {
///     fn on_resource_changed(&self, source: &dyn PropertySource) -> Option<Snapshot> {
///         println!("{} changed", source.name());
///         source.load().ok()
///     }
/// }
///
/// # async fn example() -> reloadable_properties::error::Result<()> {
/// let watcher = ResourceWatcher::new(
///     Arc::new(PropertiesFile::new("app.properties")),
///     WatchOptions::default(),
///     Arc::new(Log),
/// );
/// watcher.start()?;
/// # Ok(())
/// # }
/// ```
pub struct ResourceWatcher {
    source: Arc<dyn PropertySource>,
    options: WatchOptions,
    listener: Arc<dyn ResourceListener>,
    running: Mutex<Option<RunningWatch>>,
}

impl ResourceWatcher {
    /// Create a stopped watcher.
    pub fn new(
        source: Arc<dyn PropertySource>,
        options: WatchOptions,
        listener: Arc<dyn ResourceListener>,
    ) -> Self {
        Self {
            source,
            options,
            listener,
            running: Mutex::new(None),
        }
    }

    /// Name of the watched resource.
    pub fn resource_name(&self) -> String {
        self.source.name()
    }

    /// Returns `true` while the watch task is active.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.stopped.load(Ordering::SeqCst))
    }

    /// Start watching. Calling `start` on a running watcher does nothing.
    ///
    /// Must be called from within a Tokio runtime; the watch task is spawned
    /// on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PropertyError::WatchSetupError`] if there is no runtime, if
    /// the source is not backed by a file, or if the file cannot be resolved
    /// or watched.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running
            .as_ref()
            .is_some_and(|r| !r.stopped.load(Ordering::SeqCst))
        {
            return Ok(());
        }

        let name = self.source.name();
        let handle = Handle::try_current()
            .map_err(|e| PropertyError::watch_setup(&name, format!("no async runtime: {}", e)))?;

        let path = self
            .source
            .path()
            .ok_or_else(|| PropertyError::watch_setup(&name, "resource is not backed by a file"))?
            .canonicalize()
            .map_err(|e| PropertyError::watch_setup(&name, format!("failed to resolve path: {}", e)))?;
        let directory = path
            .parent()
            .ok_or_else(|| PropertyError::watch_setup(&name, "file has no parent directory"))?
            .to_path_buf();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let target = path.clone();
        let callback_name = name.clone();
        let mut os_watcher = ::notify::recommended_watcher(move |res: ::notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !event.paths.iter().any(|p| *p == target) {
                return;
            }
            match event.kind {
                EventKind::Modify(_) => {
                    let _ = event_tx.send(());
                }
                kind => {
                    debug!(resource = %callback_name, ?kind, "Ignoring file event");
                }
            }
        })
        .map_err(|e| PropertyError::watch_setup(&name, format!("failed to create watcher: {}", e)))?;

        // Watching the directory keeps the watch alive across atomic replaces.
        os_watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| PropertyError::watch_setup(&name, format!("failed to watch path: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watch = RunningWatch {
            stopped: Arc::new(AtomicBool::new(false)),
            os_watcher: Arc::new(Mutex::new(Some(os_watcher))),
            shutdown: shutdown_tx,
        };

        let last_known = self
            .listener
            .applied_snapshot(self.source.as_ref())
            .or_else(|| self.source.load().ok());
        let state = WatchedResource {
            source: Arc::clone(&self.source),
            listener: Arc::clone(&self.listener),
            stopped: Arc::clone(&watch.stopped),
            fingerprint: fingerprint(&path),
            last_known,
            path,
            debounce: self.options.debounce,
        };

        handle.spawn(run_watch_loop(
            state,
            self.options.check_interval,
            event_rx,
            shutdown_rx,
            Arc::clone(&watch.os_watcher),
        ));

        info!(resource = %name, debounce = ?self.options.debounce, "Started watching resource");
        *running = Some(watch);
        Ok(())
    }

    /// Stop watching and release the OS watch handle.
    ///
    /// Idempotent. No signal is delivered once this returns, although a reload
    /// already in progress finishes.
    pub fn stop(&self) {
        if let Some(watch) = self.running.lock().take() {
            let was_running = !watch.stopped.load(Ordering::SeqCst);
            watch.release();
            if was_running {
                info!(resource = %self.source.name(), "Stopped watching resource");
            }
        }
    }
}

impl Drop for ResourceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_watch_loop(
    mut state: WatchedResource,
    check_interval: Duration,
    mut events: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
    os_watcher: Arc<Mutex<Option<RecommendedWatcher>>>,
) {
    let name = state.source.name();
    let stopped = Arc::clone(&state.stopped);
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    // Settle once right away to catch edits made before watching started.
    let mut deadline: Option<Instant> = Some(Instant::now());

    loop {
        let settle_at = deadline;
        let settle = async move {
            match settle_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            Some(()) = events.recv() => {
                deadline = Some(Instant::now() + state.debounce);
            }
            _ = ticker.tick() => {
                if state.poll_changed() {
                    debug!(resource = %name, "File metadata changed");
                    deadline = Some(Instant::now() + state.debounce);
                }
            }
            _ = settle => {
                deadline = None;
                let task = tokio::task::spawn_blocking(move || {
                    let outcome = state.settle();
                    (state, outcome)
                });
                let outcome = match task.await {
                    Ok((returned, outcome)) => {
                        state = returned;
                        outcome
                    }
                    Err(e) => {
                        error!(resource = %name, error = %e, "Reload task failed, stopping watcher");
                        stopped.store(true, Ordering::SeqCst);
                        os_watcher.lock().take();
                        break;
                    }
                };

                match outcome {
                    Settled::Applied => {
                        debug!(resource = %name, "Resource change applied");
                    }
                    Settled::Failed => {
                        debug!(resource = %name, "Resource change not applied, retrying on next change");
                    }
                    Settled::Unchanged => {
                        debug!(resource = %name, "Resource rewritten without content change");
                    }
                    Settled::Stopped => break,
                    Settled::Gone => {
                        warn!(resource = %name, "Watched file disappeared, stopping watcher");
                        stopped.store(true, Ordering::SeqCst);
                        os_watcher.lock().take();
                        break;
                    }
                }
            }
        }
    }

    debug!(resource = %name, "Watch task exited");
}

/// Watches a set of resources, one [`ResourceWatcher`] each.
///
/// A resource that cannot be watched is logged and skipped; the others are
/// unaffected.
pub struct PropertiesWatcher {
    watchers: Vec<ResourceWatcher>,
}

impl PropertiesWatcher {
    /// Create a stopped watcher over `sources`.
    pub fn new(
        sources: Vec<Arc<dyn PropertySource>>,
        options: WatchOptions,
        listener: Arc<dyn ResourceListener>,
    ) -> Self {
        let watchers = sources
            .into_iter()
            .map(|source| ResourceWatcher::new(source, options, Arc::clone(&listener)))
            .collect();
        Self { watchers }
    }

    /// Start every watcher and return how many are running.
    pub fn start(&self) -> usize {
        for watcher in &self.watchers {
            if let Err(e) = watcher.start() {
                error!(resource = %watcher.resource_name(), error = %e, "Resource will not be watched");
            }
        }
        self.watching_count()
    }

    /// Stop every watcher. Idempotent.
    pub fn stop(&self) {
        for watcher in &self.watchers {
            watcher.stop();
        }
    }

    /// Number of watchers currently running.
    pub fn watching_count(&self) -> usize {
        self.watchers.iter().filter(|w| w.is_running()).count()
    }

    /// Names of the resources currently watched.
    pub fn watched_resources(&self) -> Vec<String> {
        self.watchers
            .iter()
            .filter(|w| w.is_running())
            .map(ResourceWatcher::resource_name)
            .collect()
    }
}

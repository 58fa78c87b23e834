//! Reconciles the in-memory forest with the local cache and the external target.
//!
//! The owner of the store is the only writer. Saves take `&mut self`, so two
//! saves can never be in flight at once, and every save serializes the forest
//! as it is when the save starts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{StorageError, TargetError};
use crate::fields::AutosaveMode;
use crate::persist::cache::{LocalCache, PersistenceSettings};
use crate::persist::codec;
use crate::persist::external::ExternalTarget;
use crate::task::Task;

/// External target connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Disconnected,
    /// A location was granted in an earlier session; the user must grant it again.
    AwaitingGrant { name: String },
    Connected { name: String },
}

/// Single status readout for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Disconnected,
    AwaitingGrant,
    /// Connected with changes not yet written.
    Pending,
    Saving,
    Synced,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Disconnected => "disconnected",
            SyncStatus::AwaitingGrant => "awaiting grant",
            SyncStatus::Pending => "pending",
            SyncStatus::Saving => "saving",
            SyncStatus::Synced => "synced",
        };
        f.write_str(s)
    }
}

/// User-visible persistence events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PermissionLost { name: String },
    ExternalSaveFailed(String),
    CacheQuotaExceeded,
    CacheWriteFailed(String),
    CacheUnreadable(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PermissionLost { name } => {
                write!(f, "Access to {name} was lost; the backup is disconnected. Connect again to resume.")
            }
            Notice::ExternalSaveFailed(e) => write!(f, "Backup save failed: {e}"),
            Notice::CacheQuotaExceeded => write!(
                f,
                "Local storage is full. Your changes are kept in memory; export or trim your tasks."
            ),
            Notice::CacheWriteFailed(e) => write!(f, "Could not write local storage: {e}"),
            Notice::CacheUnreadable(e) => write!(f, "Local storage was unreadable and has been set aside: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub connection: Connection,
    pub autosave: AutosaveMode,
    pub last_saved: Option<DateTime<Utc>>,
    pub cache_ok: bool,
}

/// Fixed-interval ticker. Dropping it stops the timer.
#[derive(Debug)]
struct AutosaveTimer {
    handle: JoinHandle<()>,
    ticks: mpsc::Receiver<()>,
}

impl AutosaveTimer {
    fn start(period: Duration) -> Option<Self> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let (tx, ticks) = mpsc::channel(1);
        let handle = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                // A tick still waiting to be handled covers this one.
                if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(()) {
                    break;
                }
            }
        });
        Some(AutosaveTimer { handle, ticks })
    }
}

impl Drop for AutosaveTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
pub struct Reconciler {
    cache: LocalCache,
    settings: PersistenceSettings,
    target: Option<Arc<dyn ExternalTarget>>,
    interval: Duration,
    timer: Option<AutosaveTimer>,
    loaded: bool,
    dirty: bool,
    saving: bool,
    cache_ok: bool,
    last_saved: Option<DateTime<Utc>>,
    notices: Vec<Notice>,
}

impl Reconciler {
    pub fn new(cache: LocalCache, interval: Duration) -> Self {
        let mut notices = Vec::new();
        let settings = cache.load_settings().unwrap_or_else(|e| {
            warn!(error = %e, "persistence settings unreadable, using defaults");
            notices.push(Notice::CacheUnreadable(e.to_string()));
            PersistenceSettings::default()
        });
        Reconciler {
            cache,
            settings,
            target: None,
            interval,
            timer: None,
            loaded: false,
            dirty: false,
            saving: false,
            cache_ok: true,
            last_saved: None,
            notices,
        }
    }

    /// Read the forest from the local cache. Cache writes are enabled from here on.
    pub fn load_initial(&mut self) -> Vec<Task> {
        let forest = match self.cache.load_forest() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "local cache unreadable, starting fresh");
                if let Err(qe) = self.cache.quarantine() {
                    warn!(error = %qe, "could not move unreadable cache aside");
                }
                self.notices.push(Notice::CacheUnreadable(e.to_string()));
                Vec::new()
            }
        };
        self.loaded = true;
        debug!(roots = forest.len(), key = self.cache.key(), "loaded local cache");
        forest
    }

    pub fn connection(&self) -> Connection {
        match (&self.target, &self.settings.external_name) {
            (Some(t), _) => Connection::Connected { name: t.display_name() },
            (None, Some(name)) => Connection::AwaitingGrant { name: name.clone() },
            (None, None) => Connection::Disconnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    pub fn autosave(&self) -> AutosaveMode {
        self.settings.autosave
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn status(&self) -> SyncStatus {
        match self.connection() {
            Connection::Disconnected => SyncStatus::Disconnected,
            Connection::AwaitingGrant { .. } => SyncStatus::AwaitingGrant,
            Connection::Connected { .. } if self.saving => SyncStatus::Saving,
            Connection::Connected { .. } if self.dirty => SyncStatus::Pending,
            Connection::Connected { .. } => SyncStatus::Synced,
        }
    }

    pub fn report(&self) -> SyncReport {
        SyncReport {
            status: self.status(),
            connection: self.connection(),
            autosave: self.settings.autosave,
            last_saved: self.last_saved,
            cache_ok: self.cache_ok,
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn persist_settings(&mut self) {
        if let Err(e) = self.cache.save_settings(&self.settings) {
            warn!(error = %e, "could not persist settings");
            self.notices.push(Notice::CacheWriteFailed(e.to_string()));
        }
    }

    /// Record a forest change: write the cache now, mark the external target pending.
    pub fn after_change(&mut self, forest: &[Task]) {
        if !self.loaded {
            return;
        }
        match self.cache.save_forest(forest) {
            Ok(()) => self.cache_ok = true,
            Err(e) => {
                self.cache_ok = false;
                warn!(error = %e, "local cache write failed; keeping changes in memory");
                let notice = match e {
                    StorageError::QuotaExceeded { .. } => Notice::CacheQuotaExceeded,
                    other => Notice::CacheWriteFailed(other.to_string()),
                };
                if !self.notices.contains(&notice) {
                    self.notices.push(notice);
                }
            }
        }
        if self.target.is_some() {
            self.dirty = true;
        }
    }

    /// Write to the external target if the autosave mode asks for it on every change.
    pub async fn flush(&mut self, forest: &[Task]) {
        if self.dirty && self.settings.autosave == AutosaveMode::EveryChange {
            // failures are already turned into notices
            let _ = self.save_external(forest).await;
        }
    }

    /// Wait for the next autosave tick. Never resolves without a running timer.
    pub async fn next_tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                if timer.ticks.recv().await.is_none() {
                    self.timer = None;
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Handle a timer tick: save if anything changed since the last write.
    pub async fn on_tick(&mut self, forest: &[Task]) {
        if self.dirty {
            debug!("interval autosave");
            let _ = self.save_external(forest).await;
        }
    }

    /// Explicit save request.
    pub async fn save_now(&mut self, forest: &[Task]) -> Result<(), TargetError> {
        self.save_external(forest).await
    }

    async fn save_external(&mut self, forest: &[Task]) -> Result<(), TargetError> {
        let target = self.target.clone().ok_or(TargetError::NotConnected)?;
        let data = codec::encode_forest(forest).map_err(|e| TargetError::Io(e.into()))?;
        self.saving = true;
        let result = target.write(&data).await;
        self.saving = false;
        match &result {
            Ok(()) => {
                self.dirty = false;
                self.last_saved = Some(Utc::now());
                info!(target = %target.display_name(), bytes = data.len(), "saved external backup");
            }
            Err(TargetError::PermissionDenied(_)) => self.drop_target(),
            Err(e) => {
                warn!(error = %e, "external save failed");
                self.notices.push(Notice::ExternalSaveFailed(e.to_string()));
            }
        }
        result
    }

    /// Read the raw document from the external target.
    pub async fn load_external(&mut self) -> Result<Option<String>, TargetError> {
        let target = self.target.clone().ok_or(TargetError::NotConnected)?;
        let result = target.read().await;
        if let Err(TargetError::PermissionDenied(_)) = &result {
            self.drop_target();
        }
        result
    }

    /// The forest was replaced by what the target holds; nothing is pending.
    pub fn mark_synced(&mut self) {
        self.dirty = false;
        self.last_saved = Some(Utc::now());
    }

    /// Attach a freshly granted target and write the current forest to it.
    pub async fn connect(&mut self, target: Arc<dyn ExternalTarget>, forest: &[Task]) -> Result<(), TargetError> {
        let name = target.display_name();
        info!(target = %name, "external target connected");
        self.target = Some(target);
        self.settings.external_name = Some(name);
        self.persist_settings();
        self.dirty = true;
        self.reschedule();
        self.save_external(forest).await
    }

    pub fn disconnect(&mut self) {
        info!("external target disconnected");
        self.target = None;
        self.settings.external_name = None;
        self.dirty = false;
        self.timer = None;
        self.persist_settings();
    }

    pub fn set_autosave(&mut self, mode: AutosaveMode) {
        self.settings.autosave = mode;
        self.persist_settings();
        self.reschedule();
    }

    /// Start or stop the interval timer to match mode and connection.
    fn reschedule(&mut self) {
        self.timer = None;
        if self.settings.autosave == AutosaveMode::Every5Minutes && self.target.is_some() {
            self.timer = AutosaveTimer::start(self.interval);
            if self.timer.is_none() {
                warn!("no async runtime; interval autosave is inactive");
            }
        }
    }

    fn drop_target(&mut self) {
        let name = self
            .target
            .take()
            .map(|t| t.display_name())
            .or_else(|| self.settings.external_name.clone())
            .unwrap_or_default();
        warn!(target = %name, "external target permission lost");
        self.settings.external_name = None;
        self.dirty = false;
        self.timer = None;
        self.persist_settings();
        self.notices.push(Notice::PermissionLost { name });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    /// In-memory target whose permission can be revoked.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryTarget {
        pub contents: Mutex<Option<String>>,
        pub writes: Mutex<usize>,
        pub revoked: Mutex<bool>,
    }

    #[async_trait]
    impl ExternalTarget for MemoryTarget {
        fn display_name(&self) -> String {
            "memory".into()
        }

        async fn write(&self, contents: &str) -> Result<(), TargetError> {
            if *self.revoked.lock().unwrap() {
                return Err(TargetError::PermissionDenied("memory".into()));
            }
            *self.contents.lock().unwrap() = Some(contents.to_string());
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        async fn read(&self) -> Result<Option<String>, TargetError> {
            if *self.revoked.lock().unwrap() {
                return Err(TargetError::PermissionDenied("memory".into()));
            }
            Ok(self.contents.lock().unwrap().clone())
        }
    }

    fn reconciler(dir: &TempDir) -> Reconciler {
        let mut r = Reconciler::new(LocalCache::new(dir.path(), "tasks", None), Duration::from_secs(300));
        r.load_initial();
        r
    }

    #[tokio::test]
    async fn test_connect_writes_and_reports_synced() {
        let dir = TempDir::new().unwrap();
        let mut r = reconciler(&dir);
        assert_eq!(r.status(), SyncStatus::Disconnected);
        let target = Arc::new(MemoryTarget::default());
        r.connect(target.clone(), &[Task::new("a")]).await.unwrap();
        assert_eq!(r.status(), SyncStatus::Synced);
        assert!(r.report().last_saved.is_some());
        assert!(target.contents.lock().unwrap().as_deref().unwrap().contains("\"a\""));
    }

    #[tokio::test]
    async fn test_every_change_flushes_and_manual_does_not() {
        let dir = TempDir::new().unwrap();
        let mut r = reconciler(&dir);
        let target = Arc::new(MemoryTarget::default());
        r.connect(target.clone(), &[]).await.unwrap();

        let forest = vec![Task::new("a")];
        r.after_change(&forest);
        assert_eq!(r.status(), SyncStatus::Pending);
        r.flush(&forest).await;
        assert_eq!(*target.writes.lock().unwrap(), 2);
        assert_eq!(r.status(), SyncStatus::Synced);

        r.set_autosave(AutosaveMode::Manual);
        r.after_change(&forest);
        r.flush(&forest).await;
        assert_eq!(*target.writes.lock().unwrap(), 2);
        assert_eq!(r.status(), SyncStatus::Pending);
        r.save_now(&forest).await.unwrap();
        assert_eq!(r.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn test_permission_loss_downgrades_to_disconnected() {
        let dir = TempDir::new().unwrap();
        let mut r = reconciler(&dir);
        let target = Arc::new(MemoryTarget::default());
        r.connect(target.clone(), &[]).await.unwrap();
        r.set_autosave(AutosaveMode::Every5Minutes);
        assert!(r.has_timer());

        *target.revoked.lock().unwrap() = true;
        let forest = vec![Task::new("a")];
        r.after_change(&forest);
        assert!(matches!(r.save_now(&forest).await, Err(TargetError::PermissionDenied(_))));

        assert_eq!(r.connection(), Connection::Disconnected);
        assert!(!r.has_timer());
        assert_eq!(r.take_notices(), vec![Notice::PermissionLost { name: "memory".into() }]);
        // local cache is unaffected
        assert_eq!(LocalCache::new(dir.path(), "tasks", None).load_forest().unwrap(), forest);
        assert!(LocalCache::new(dir.path(), "tasks", None).load_settings().unwrap().external_name.is_none());
    }

    #[tokio::test]
    async fn test_timer_follows_mode_and_connection() {
        let dir = TempDir::new().unwrap();
        let mut r = reconciler(&dir);
        r.set_autosave(AutosaveMode::Every5Minutes);
        assert!(!r.has_timer(), "no timer while disconnected");

        r.connect(Arc::new(MemoryTarget::default()), &[]).await.unwrap();
        assert!(r.has_timer());
        r.set_autosave(AutosaveMode::EveryChange);
        assert!(!r.has_timer());
        r.set_autosave(AutosaveMode::Every5Minutes);
        assert!(r.has_timer());
        r.disconnect();
        assert!(!r.has_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_tick_saves_pending_changes() {
        let dir = TempDir::new().unwrap();
        let mut r = reconciler(&dir);
        let target = Arc::new(MemoryTarget::default());
        r.connect(target.clone(), &[]).await.unwrap();
        r.set_autosave(AutosaveMode::Every5Minutes);

        let forest = vec![Task::new("a")];
        r.after_change(&forest);
        r.flush(&forest).await;
        assert_eq!(*target.writes.lock().unwrap(), 1, "interval mode does not write per change");

        r.next_tick().await;
        r.on_tick(&forest).await;
        assert_eq!(*target.writes.lock().unwrap(), 2);
        assert_eq!(r.status(), SyncStatus::Synced);
    }

    #[test]
    fn test_display_name_survives_restart_as_awaiting_grant() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path(), "tasks", None);
        cache
            .save_settings(&PersistenceSettings {
                autosave: AutosaveMode::Manual,
                external_name: Some("/backups".into()),
            })
            .unwrap();
        let r = Reconciler::new(cache, Duration::from_secs(300));
        assert_eq!(r.connection(), Connection::AwaitingGrant { name: "/backups".into() });
        assert_eq!(r.status(), SyncStatus::AwaitingGrant);
        assert_eq!(r.autosave(), AutosaveMode::Manual);
    }

    #[test]
    fn test_quota_failure_is_flagged() {
        let dir = TempDir::new().unwrap();
        let mut r = Reconciler::new(LocalCache::new(dir.path(), "tasks", Some(8)), Duration::from_secs(300));
        r.load_initial();
        r.after_change(&[Task::new("too big")]);
        assert!(!r.report().cache_ok);
        assert_eq!(r.take_notices(), vec![Notice::CacheQuotaExceeded]);
    }
}

//! One open page: its timers, its converters and the store round-trips
//! that keep them in line with the backend.
//!
//! ## Consistency
//!
//! Every successful create or delete is followed by a full reload of the
//! page, reconciled into the local collections so running timers and typed
//! converter values survive. Remote failures never leave a half-applied
//! local change: timer deletes are rolled back, converter saves and deletes
//! only touch local state once the store has accepted them.
//!
//! ## Concurrency
//!
//! All methods take `&self`. Local state sits behind a mutex that is never
//! held across an await. A second save or delete aimed at an entity that
//! already has one in flight is rejected with
//! [`SessionError::OperationInFlight`].

mod auth;

pub use auth::{close_on_session_end, AuthSession};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::conversion::{Category, ConverterCollection, ConverterView, Side};
use crate::error::{ConverterError, SessionError, StoreError};
use crate::events::Event;
use crate::ids::EntityId;
use crate::notify::CompletionNotifier;
use crate::store::{PageRecord, PageStore};
use crate::timer::{TickScheduler, TimerCollection, TimerSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No successful load yet.
    Loading,
    Ready,
    /// The store has no such page. Terminal until a reload finds it.
    NotFound,
    /// The first load failed; reload to retry.
    Failed,
    Closed,
}

/// Read-only picture of a page session.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub id: EntityId,
    pub label: Option<String>,
    pub status: SessionStatus,
    pub timers: Vec<TimerSnapshot>,
    pub converters: Vec<ConverterView>,
}

struct State {
    status: SessionStatus,
    label: Option<String>,
    timers: TimerCollection,
    converters: ConverterCollection,
}

pub struct PageSession {
    page_id: EntityId,
    store: Arc<dyn PageStore>,
    default_category: Category,
    state: Mutex<State>,
    in_flight: Mutex<HashSet<EntityId>>,
}

/// Marks an entity busy until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<EntityId>>,
    id: EntityId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl PageSession {
    pub fn new(
        page_id: EntityId,
        store: Arc<dyn PageStore>,
        scheduler: Arc<dyn TickScheduler>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        Self::with_default_category(page_id, store, scheduler, notifier, Category::default())
    }

    pub fn with_default_category(
        page_id: EntityId,
        store: Arc<dyn PageStore>,
        scheduler: Arc<dyn TickScheduler>,
        notifier: Arc<dyn CompletionNotifier>,
        default_category: Category,
    ) -> Self {
        Self {
            page_id,
            store,
            default_category,
            state: Mutex::new(State {
                status: SessionStatus::Loading,
                label: None,
                timers: TimerCollection::new(scheduler, notifier),
                converters: ConverterCollection::new(default_category),
            }),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn page_id(&self) -> &EntityId {
        &self.page_id
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn label(&self) -> Option<String> {
        self.lock().label.clone()
    }

    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.lock().timers.snapshots()
    }

    pub fn timer(&self, id: &EntityId) -> Option<TimerSnapshot> {
        self.lock().timers.get(id).map(|t| t.snapshot())
    }

    pub fn converters(&self) -> Vec<ConverterView> {
        self.lock().converters.iter().map(|c| c.view()).collect()
    }

    pub fn converter(&self, id: &EntityId) -> Option<ConverterView> {
        self.lock().converters.find(id).map(|c| c.view())
    }

    pub fn view(&self) -> PageView {
        let state = self.lock();
        PageView {
            id: self.page_id.clone(),
            label: state.label.clone(),
            status: state.status,
            timers: state.timers.snapshots(),
            converters: state.converters.iter().map(|c| c.view()).collect(),
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Fetch the page and reconcile local state with it.
    ///
    /// A failed reload of a page that was already shown keeps what is on
    /// screen; a failed first load moves to [`SessionStatus::Failed`].
    ///
    /// # Errors
    ///
    /// [`SessionError::PageNotFound`] if the store has no such page,
    /// [`SessionError::LoadFailed`] on any store failure.
    pub async fn load(&self) -> Result<(), SessionError> {
        self.ensure_open()?;
        tracing::debug!(page_id = %self.page_id, "loading page");

        let fetched = self.store.get_page(&self.page_id).await;
        let mut state = self.lock();
        if state.status == SessionStatus::Closed {
            return Err(SessionError::Closed);
        }

        match fetched {
            Ok(Some(page)) => {
                self.apply(&mut state, &page);
                tracing::info!(
                    page_id = %self.page_id,
                    timers = page.timers.len(),
                    converters = page.converters.len(),
                    "page loaded"
                );
                Ok(())
            }
            Ok(None) => {
                tracing::warn!(page_id = %self.page_id, "page not found");
                state.timers.reconcile(&[]);
                state.status = SessionStatus::NotFound;
                Err(SessionError::PageNotFound(self.page_id.to_string()))
            }
            Err(err) => {
                tracing::warn!(page_id = %self.page_id, error = %err, "page load failed");
                if state.status != SessionStatus::Ready {
                    state.status = SessionStatus::Failed;
                }
                Err(SessionError::LoadFailed(err))
            }
        }
    }

    /// Same as [`load`](Self::load).
    pub async fn reload(&self) -> Result<(), SessionError> {
        self.load().await
    }

    fn apply(&self, state: &mut State, page: &PageRecord) {
        if state.status == SessionStatus::Ready {
            state.converters.reconcile(&page.converters);
        } else {
            state.converters = ConverterCollection::from_records(&page.converters, self.default_category);
        }
        state.timers.reconcile(&page.timers);
        state.label = Some(page.label.clone());
        state.status = SessionStatus::Ready;
    }

    /// Reload after a mutation the store already accepted. A failure here
    /// only means the view is stale, so it is logged rather than returned.
    async fn resync(&self) {
        if let Err(err) = self.load().await {
            tracing::warn!(page_id = %self.page_id, error = %err, "resync failed");
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Create a timer in the store and show it idle.
    ///
    /// # Errors
    ///
    /// Label and duration are checked before any remote call.
    pub async fn add_timer(&self, label: &str, duration_secs: i64) -> Result<TimerSnapshot, SessionError> {
        self.ensure_ready()?;
        TimerCollection::validate_new(label, duration_secs)?;

        let record = match self.store.create_timer(&self.page_id, label, duration_secs).await {
            Ok(record) => record,
            Err(err) => return Err(self.remote_failure(err, None).await),
        };
        tracing::info!(page_id = %self.page_id, timer_id = %record.id, label, "timer added");

        let snapshot = {
            let mut state = self.lock();
            if !state.timers.contains(&record.id) {
                state.timers.add(record.id.clone(), &record.label, record.duration)?;
            }
            state.timers.get(&record.id).map(|t| t.snapshot())
        };
        self.resync().await;
        self.timer(&record.id)
            .or(snapshot)
            .ok_or(SessionError::NotFound(record.id))
    }

    /// Stop the timer, then delete it remotely. If the store refuses, the
    /// timer is put back where it was and resumes if it was running.
    pub async fn delete_timer(&self, id: &EntityId) -> Result<Event, SessionError> {
        self.ensure_ready()?;
        let _busy = self.begin(id)?;

        let (index, timer) = self.lock().timers.detach(id)?;
        match self.store.delete_timer(id).await {
            Ok(()) => {
                drop(timer);
                tracing::info!(page_id = %self.page_id, timer_id = %id, "timer deleted");
                self.resync().await;
                Ok(Event::TimerRemoved {
                    timer_id: id.clone(),
                    at: chrono::Utc::now(),
                })
            }
            Err(StoreError::NotFound(_)) => {
                drop(timer);
                Err(self.remote_failure(StoreError::NotFound(id.to_string()), Some(id)).await)
            }
            Err(err) => {
                self.lock().timers.restore(index, timer);
                Err(self.remote_failure(err, Some(id)).await)
            }
        }
    }

    pub fn start_timer(&self, id: &EntityId) -> Result<Option<Event>, SessionError> {
        self.ensure_ready()?;
        Ok(self.lock().timers.start(id)?)
    }

    pub fn pause_timer(&self, id: &EntityId) -> Result<Option<Event>, SessionError> {
        self.ensure_ready()?;
        Ok(self.lock().timers.pause(id)?)
    }

    pub fn reset_timer(&self, id: &EntityId) -> Result<Event, SessionError> {
        self.ensure_ready()?;
        Ok(self.lock().timers.reset(id)?)
    }

    // ── Converters ───────────────────────────────────────────────────

    /// Append an unsaved converter in the default category.
    pub fn add_converter(&self) -> Result<EntityId, SessionError> {
        self.ensure_ready()?;
        Ok(self.lock().converters.add())
    }

    pub fn set_converter_field(&self, id: &EntityId, side: Side, text: &str) -> Result<ConverterView, SessionError> {
        self.ensure_ready()?;
        let mut state = self.lock();
        let converter = state
            .converters
            .find_mut(id)
            .ok_or_else(|| ConverterError::NotFound(id.clone()))?;
        converter.set_field(side, text);
        Ok(converter.view())
    }

    /// Change an unsaved converter's category.
    ///
    /// # Errors
    ///
    /// `UnknownCategory` for an unregistered key, `ImmutableOnceSaved` for a
    /// saved converter, `OperationInFlight` while it is being saved.
    pub fn set_converter_category(&self, id: &EntityId, category: &str) -> Result<ConverterView, SessionError> {
        self.ensure_ready()?;
        let category: Category = category.parse()?;
        if self.is_busy(id) {
            return Err(SessionError::OperationInFlight(id.clone()));
        }
        let mut state = self.lock();
        let converter = state
            .converters
            .find_mut(id)
            .ok_or_else(|| ConverterError::NotFound(id.clone()))?;
        converter.set_category(category)?;
        Ok(converter.view())
    }

    /// Persist an unsaved converter. On success its id becomes the store's
    /// and its category is locked; on failure it stays local and editable.
    pub async fn save_converter(&self, id: &EntityId) -> Result<ConverterView, SessionError> {
        self.ensure_ready()?;
        let _busy = self.begin(id)?;

        let request = {
            let state = self.lock();
            let converter = state
                .converters
                .find(id)
                .ok_or_else(|| ConverterError::NotFound(id.clone()))?;
            converter.save_request()?
        };

        let record = match self.store.create_converter(&self.page_id, &request).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(page_id = %self.page_id, converter_id = %id, error = %err, "converter save rejected");
                if matches!(err, StoreError::NotFound(_)) {
                    self.resync().await;
                }
                return Err(SessionError::SaveRejected(err));
            }
        };

        let view = self.lock().converters.adopt_saved(id, &record)?.view();
        tracing::info!(page_id = %self.page_id, converter_id = %record.id, label = %view.label, "converter saved");
        self.resync().await;
        Ok(self.converter(&record.id).unwrap_or(view))
    }

    /// Remove a converter. Unsaved ones go immediately; saved ones only
    /// after the store deletes them.
    ///
    /// # Errors
    ///
    /// `LastConverterProtected` before any remote call if it is the only one.
    pub async fn delete_converter(&self, id: &EntityId) -> Result<(), SessionError> {
        self.ensure_ready()?;
        let _busy = self.begin(id)?;

        let saved = {
            let mut state = self.lock();
            state.converters.ensure_removable(id)?;
            let saved = state.converters.find(id).is_some_and(|c| c.is_saved());
            if !saved {
                state.converters.remove(id)?;
            }
            saved
        };
        if !saved {
            tracing::debug!(page_id = %self.page_id, converter_id = %id, "local converter removed");
            return Ok(());
        }

        match self.store.delete_converter(&self.page_id, id).await {
            Ok(()) => {
                // Losing a race to become the last one is settled by the resync.
                if let Err(err) = self.lock().converters.remove(id) {
                    tracing::debug!(page_id = %self.page_id, converter_id = %id, error = %err, "local copy kept until resync");
                }
                tracing::info!(page_id = %self.page_id, converter_id = %id, "converter deleted");
                self.resync().await;
                Ok(())
            }
            Err(err) => Err(self.remote_failure(err, Some(id)).await),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop every timer and refuse further work.
    pub fn close(&self) {
        let mut state = self.lock();
        if state.status == SessionStatus::Closed {
            return;
        }
        state.timers.cancel_all();
        state.status = SessionStatus::Closed;
        tracing::info!(page_id = %self.page_id, "page session closed");
    }

    /// Turn a store failure into a session error. A stale id triggers a
    /// resync first.
    async fn remote_failure(&self, err: StoreError, id: Option<&EntityId>) -> SessionError {
        tracing::warn!(page_id = %self.page_id, error = %err, "store request failed");
        match err {
            StoreError::Validation(message) => SessionError::Validation(message),
            StoreError::NotFound(_) => {
                self.resync().await;
                SessionError::NotFound(id.cloned().unwrap_or_else(|| self.page_id.clone()))
            }
            other => SessionError::Store(other),
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.lock().status {
            SessionStatus::Closed => Err(SessionError::Closed),
            _ => Ok(()),
        }
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        match self.lock().status {
            SessionStatus::Ready => Ok(()),
            SessionStatus::Closed => Err(SessionError::Closed),
            SessionStatus::NotFound => Err(SessionError::PageNotFound(self.page_id.to_string())),
            SessionStatus::Loading | SessionStatus::Failed => Err(SessionError::NotLoaded),
        }
    }

    fn begin(&self, id: &EntityId) -> Result<InFlight<'_>, SessionError> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id.clone()) {
            return Err(SessionError::OperationInFlight(id.clone()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id: id.clone(),
        })
    }

    fn is_busy(&self, id: &EntityId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimerError;
    use crate::notify::LogNotifier;
    use crate::store::{Failure, InMemoryStore, StoreOp};
    use crate::timer::{ManualScheduler, TimerStatus};

    struct Fixture {
        store: Arc<InMemoryStore>,
        scheduler: ManualScheduler,
        session: PageSession,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let page = store.seed_page("Bread");
        let scheduler = ManualScheduler::new();
        let session = PageSession::new(
            page,
            store.clone(),
            Arc::new(scheduler.clone()),
            Arc::new(LogNotifier),
        );
        session.load().await.unwrap();
        Fixture {
            store,
            scheduler,
            session,
        }
    }

    #[tokio::test]
    async fn fresh_page_has_one_local_converter() {
        let f = fixture().await;
        assert_eq!(f.session.status(), SessionStatus::Ready);
        assert_eq!(f.session.label().as_deref(), Some("Bread"));
        let converters = f.session.converters();
        assert_eq!(converters.len(), 1);
        assert!(!converters[0].saved);
    }

    #[tokio::test]
    async fn mutations_before_load_are_refused() {
        let store = Arc::new(InMemoryStore::new());
        let page = store.seed_page("Bread");
        let session = PageSession::new(page, store, Arc::new(ManualScheduler::new()), Arc::new(LogNotifier));
        assert_eq!(session.status(), SessionStatus::Loading);
        assert_eq!(session.add_timer("Boil", 5).await.unwrap_err(), SessionError::NotLoaded);
    }

    #[tokio::test]
    async fn invalid_timer_never_reaches_store() {
        let f = fixture().await;
        let err = f.session.add_timer("", 30).await.unwrap_err();
        assert_eq!(err, SessionError::Timer(TimerError::InvalidLabel));
        let err = f.session.add_timer("Boil", -1).await.unwrap_err();
        assert_eq!(err, SessionError::Timer(TimerError::InvalidDuration(-1)));
        assert_eq!(f.store.calls(StoreOp::CreateTimer), 0);
    }

    #[tokio::test]
    async fn added_timer_comes_back_from_store() {
        let f = fixture().await;
        let snap = f.session.add_timer("Boil", 90).await.unwrap();
        assert!(!snap.id.is_local());
        assert_eq!(snap.display, "01:30");
        assert_eq!(f.session.timers().len(), 1);
        assert_eq!(f.store.pages()[0].timers.len(), 1);
    }

    #[tokio::test]
    async fn failed_timer_delete_is_rolled_back() {
        let f = fixture().await;
        let a = f.session.add_timer("Boil", 10).await.unwrap().id;
        let b = f.session.add_timer("Rest", 10).await.unwrap().id;
        f.session.start_timer(&a).unwrap();

        f.store.fail(StoreOp::DeleteTimer, StoreError::Transport("offline".into()), Failure::Once);
        let err = f.session.delete_timer(&a).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(StoreError::Transport(_))));

        let ids: Vec<_> = f.session.timers().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.clone(), b]);
        f.scheduler.advance(1);
        let snap = f.session.timer(&a).unwrap();
        assert_eq!(snap.status, TimerStatus::Running);
        assert_eq!(snap.remaining_secs, 9);
    }

    #[tokio::test]
    async fn stale_timer_delete_resyncs() {
        let f = fixture().await;
        let a = f.session.add_timer("Boil", 10).await.unwrap().id;
        f.store.edit(|pages| pages[0].timers.clear());

        let err = f.session.delete_timer(&a).await.unwrap_err();
        assert_eq!(err, SessionError::NotFound(a));
        assert!(f.session.timers().is_empty());
    }

    #[tokio::test]
    async fn last_converter_is_protected_locally() {
        let f = fixture().await;
        let only = f.session.converters()[0].id.clone();
        let err = f.session.delete_converter(&only).await.unwrap_err();
        assert_eq!(err, SessionError::Converter(ConverterError::LastConverterProtected));
        assert_eq!(f.store.calls(StoreOp::DeleteConverter), 0);
        assert_eq!(f.session.converters().len(), 1);
    }

    #[tokio::test]
    async fn rejected_save_leaves_converter_local() {
        let f = fixture().await;
        let id = f.session.converters()[0].id.clone();
        f.session.set_converter_category(&id, "grams").unwrap();
        f.store.fail(StoreOp::CreateConverter, StoreError::Transport("offline".into()), Failure::Once);

        let err = f.session.save_converter(&id).await.unwrap_err();
        assert!(matches!(err, SessionError::SaveRejected(_)));
        let view = f.session.converter(&id).unwrap();
        assert!(!view.saved);
        f.session.set_converter_category(&id, "pounds").unwrap();
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let f = fixture().await;
        let id = f.session.converters()[0].id.clone();
        let err = f.session.set_converter_category(&id, "furlongs").unwrap_err();
        assert_eq!(err, SessionError::Converter(ConverterError::UnknownCategory("furlongs".into())));
    }

    #[tokio::test]
    async fn saved_converter_delete_failure_keeps_it() {
        let f = fixture().await;
        let local = f.session.converters()[0].id.clone();
        let saved = f.session.save_converter(&local).await.unwrap().id;
        f.session.add_converter().unwrap();

        f.store.fail(StoreOp::DeleteConverter, StoreError::Transport("offline".into()), Failure::Once);
        assert!(f.session.delete_converter(&saved).await.is_err());
        assert!(f.session.converter(&saved).is_some());

        f.session.delete_converter(&saved).await.unwrap();
        assert!(f.session.converter(&saved).is_none());
        assert!(f.store.pages()[0].converters.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_saves_of_one_converter_are_refused() {
        let f = fixture().await;
        let id = f.session.converters()[0].id.clone();
        f.store.set_latency(Some(std::time::Duration::from_millis(200)));

        let (first, second) = tokio::join!(f.session.save_converter(&id), f.session.save_converter(&id));
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err(), SessionError::OperationInFlight(id));
        assert_eq!(f.store.pages()[0].converters.len(), 1);
    }

    #[tokio::test]
    async fn close_cancels_every_timer() {
        let f = fixture().await;
        let a = f.session.add_timer("Boil", 10).await.unwrap().id;
        let b = f.session.add_timer("Rest", 10).await.unwrap().id;
        f.session.start_timer(&a).unwrap();
        f.session.start_timer(&b).unwrap();

        f.session.close();
        assert_eq!(f.scheduler.pending(), 0);
        assert_eq!(f.session.start_timer(&a).unwrap_err(), SessionError::Closed);
        assert_eq!(f.session.load().await.unwrap_err(), SessionError::Closed);
    }
}

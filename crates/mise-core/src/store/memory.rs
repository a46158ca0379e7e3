//! In-process page store.
//!
//! Validates and assigns ids the way the backend does, and can be told to
//! fail or stall specific operations.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{ConverterRecord, NewConverter, PageRecord, PageStore, TimerRecord};
use crate::error::StoreError;
use crate::ids::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    ListPages,
    CreatePage,
    DeletePage,
    CreateTimer,
    DeleteTimer,
    CreateConverter,
    DeleteConverter,
}

/// How long an injected failure lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Once,
    Always,
}

#[derive(Debug, Default)]
struct Inner {
    pages: Vec<PageRecord>,
    next_id: u64,
    queued: HashMap<StoreOp, VecDeque<StoreError>>,
    sticky: HashMap<StoreOp, StoreError>,
    calls: HashMap<StoreOp, usize>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> EntityId {
        self.next_id += 1;
        EntityId::new(format!("{prefix}-{}", self.next_id))
    }

    fn enter(&mut self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        if let Some(err) = self.queued.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        match self.sticky.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn page_mut(&mut self, page_id: &EntityId) -> Result<&mut PageRecord, StoreError> {
        self.pages
            .iter_mut()
            .find(|p| &p.id == page_id)
            .ok_or_else(|| StoreError::NotFound(format!("Page {page_id} not found")))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<PageRecord>) -> Self {
        let store = Self::new();
        store.lock().pages = pages;
        store
    }

    /// Add an empty page and return its id.
    pub fn seed_page(&self, label: &str) -> EntityId {
        let mut inner = self.lock();
        let id = inner.next_id("page");
        inner.pages.push(PageRecord {
            id: id.clone(),
            label: label.to_string(),
            timers: Vec::new(),
            converters: Vec::new(),
        });
        id
    }

    /// Current contents.
    pub fn pages(&self) -> Vec<PageRecord> {
        self.lock().pages.clone()
    }

    /// Change the store behind the client's back, as another device would.
    pub fn edit(&self, f: impl FnOnce(&mut Vec<PageRecord>)) {
        f(&mut self.lock().pages);
    }

    /// Make `op` fail with `err`.
    pub fn fail(&self, op: StoreOp, err: StoreError, how: Failure) {
        let mut inner = self.lock();
        match how {
            Failure::Once => inner.queued.entry(op).or_default().push_back(err),
            Failure::Always => {
                inner.sticky.insert(op, err);
            }
        }
    }

    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.queued.clear();
        inner.sticky.clear();
    }

    /// Delay every call by `latency` before it is applied.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// How many times `op` was attempted, failures included.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn validation(message: &str) -> StoreError {
    StoreError::Validation(message.to_string())
}

#[async_trait]
impl PageStore for InMemoryStore {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::ListPages)?;
        Ok(inner.pages.clone())
    }

    async fn create_page(&self, label: &str) -> Result<PageRecord, StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::CreatePage)?;
        if label.trim().is_empty() {
            return Err(validation("Page label is required"));
        }
        let page = PageRecord {
            id: inner.next_id("page"),
            label: label.to_string(),
            timers: Vec::new(),
            converters: Vec::new(),
        };
        inner.pages.push(page.clone());
        Ok(page)
    }

    async fn delete_page(&self, page_id: &EntityId) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::DeletePage)?;
        let before = inner.pages.len();
        inner.pages.retain(|p| &p.id != page_id);
        if inner.pages.len() == before {
            return Err(StoreError::NotFound(format!("Page {page_id} not found")));
        }
        Ok(())
    }

    async fn create_timer(
        &self,
        page_id: &EntityId,
        label: &str,
        duration_secs: i64,
    ) -> Result<TimerRecord, StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::CreateTimer)?;
        if label.trim().is_empty() {
            return Err(validation("Timer label is required"));
        }
        if duration_secs <= 0 {
            return Err(validation("Duration must be a positive number of seconds"));
        }
        let id = inner.next_id("timer");
        let timer = TimerRecord {
            id,
            label: label.to_string(),
            duration: duration_secs,
        };
        inner.page_mut(page_id)?.timers.push(timer.clone());
        Ok(timer)
    }

    async fn delete_timer(&self, timer_id: &EntityId) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::DeleteTimer)?;
        for page in &mut inner.pages {
            if let Some(index) = page.timers.iter().position(|t| &t.id == timer_id) {
                page.timers.remove(index);
                return Ok(());
            }
        }
        Err(StoreError::NotFound(format!("Timer {timer_id} not found")))
    }

    async fn create_converter(
        &self,
        page_id: &EntityId,
        converter: &NewConverter,
    ) -> Result<ConverterRecord, StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::CreateConverter)?;
        if converter.category.trim().is_empty() {
            return Err(validation("Category is required"));
        }
        if !(converter.conversion_factor.is_finite() && converter.conversion_factor > 0.0) {
            return Err(validation("Conversion factor must be positive"));
        }
        let record = ConverterRecord {
            id: inner.next_id("conv"),
            category: converter.category.clone(),
            from_unit: converter.from_unit.clone(),
            to_unit: converter.to_unit.clone(),
            conversion_factor: converter.conversion_factor,
        };
        inner.page_mut(page_id)?.converters.push(record.clone());
        Ok(record)
    }

    async fn delete_converter(
        &self,
        page_id: &EntityId,
        converter_id: &EntityId,
    ) -> Result<(), StoreError> {
        self.delay().await;
        let mut inner = self.lock();
        inner.enter(StoreOp::DeleteConverter)?;
        let page = inner.page_mut(page_id)?;
        let index = page
            .converters
            .iter()
            .position(|c| &c.id == converter_id)
            .ok_or_else(|| StoreError::NotFound(format!("Converter {converter_id} not found")))?;
        page.converters.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validates_like_the_backend() {
        let store = InMemoryStore::new();
        let page = store.seed_page("Bread");

        assert!(matches!(
            store.create_timer(&page, " ", 10).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_timer(&page, "Proof", 0).await,
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_timer(&EntityId::new("missing"), "Proof", 10).await,
            Err(StoreError::NotFound(_))
        ));

        let timer = store.create_timer(&page, "Proof", 10).await.unwrap();
        assert_eq!(store.get_page(&page).await.unwrap().unwrap().timers, vec![timer.clone()]);
        store.delete_timer(&timer.id).await.unwrap();
        assert!(matches!(store.delete_timer(&timer.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn injected_failures_fire_as_configured() {
        let store = InMemoryStore::new();
        store.fail(StoreOp::ListPages, StoreError::Transport("down".into()), Failure::Once);
        assert!(store.list_pages().await.is_err());
        assert!(store.list_pages().await.is_ok());

        store.fail(StoreOp::ListPages, StoreError::Unauthorized, Failure::Always);
        assert!(store.list_pages().await.is_err());
        assert!(store.list_pages().await.is_err());
        store.clear_failures();
        assert!(store.list_pages().await.is_ok());
        assert_eq!(store.calls(StoreOp::ListPages), 5);
    }

    #[tokio::test]
    async fn converters_get_fresh_ids() {
        let store = InMemoryStore::new();
        let page = store.seed_page("Cakes");
        let request = NewConverter {
            category: "grams".into(),
            from_unit: "oz".into(),
            to_unit: "g".into(),
            conversion_factor: 28.35,
        };
        let a = store.create_converter(&page, &request).await.unwrap();
        let b = store.create_converter(&page, &request).await.unwrap();
        assert_ne!(a.id, b.id);

        store.delete_converter(&page, &a.id).await.unwrap();
        let remaining = store.get_page(&page).await.unwrap().unwrap().converters;
        assert_eq!(remaining, vec![b]);
    }
}

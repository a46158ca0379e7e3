//! The remote page store.
//!
//! [`PageStore`] is the only way the core reaches the backend. Two
//! implementations ship: [`HttpStore`] talks to the REST service and
//! [`InMemoryStore`] keeps everything in process for tests and offline use.

mod http;
mod memory;

pub use http::{AuthResponse, HttpStore, DEFAULT_BASE_URL};
pub use memory::{Failure, InMemoryStore, StoreOp};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::ids::EntityId;

/// A page as the store returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub label: String,
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
    #[serde(default, rename = "unitConverters")]
    pub converters: Vec<ConverterRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub label: String,
    /// Seconds.
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterRecord {
    #[serde(rename = "_id")]
    pub id: EntityId,
    pub category: String,
    pub from_unit: String,
    pub to_unit: String,
    pub conversion_factor: f64,
}

/// Payload for creating a converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConverter {
    pub category: String,
    pub from_unit: String,
    pub to_unit: String,
    pub conversion_factor: f64,
}

/// Backend operations used by a page session.
///
/// Every call is authenticated by whatever credential the implementation
/// holds; an expired or missing credential surfaces as
/// [`StoreError::Unauthorized`].
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, StoreError>;

    /// Fetch one page. Returns `Ok(None)` when the page is absent.
    async fn get_page(&self, page_id: &EntityId) -> Result<Option<PageRecord>, StoreError> {
        let pages = self.list_pages().await?;
        Ok(pages.into_iter().find(|p| &p.id == page_id))
    }

    async fn create_page(&self, label: &str) -> Result<PageRecord, StoreError>;

    async fn delete_page(&self, page_id: &EntityId) -> Result<(), StoreError>;

    async fn create_timer(
        &self,
        page_id: &EntityId,
        label: &str,
        duration_secs: i64,
    ) -> Result<TimerRecord, StoreError>;

    async fn delete_timer(&self, timer_id: &EntityId) -> Result<(), StoreError>;

    async fn create_converter(
        &self,
        page_id: &EntityId,
        converter: &NewConverter,
    ) -> Result<ConverterRecord, StoreError>;

    async fn delete_converter(
        &self,
        page_id: &EntityId,
        converter_id: &EntityId,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_record_reads_dashboard_shape() {
        let json = r#"{
            "_id": "p1",
            "label": "Bread",
            "timers": [{"_id": "t1", "label": "Proof", "duration": 3600}],
            "unitConverters": [{
                "_id": "c1",
                "category": "grams",
                "fromUnit": "oz",
                "toUnit": "g",
                "conversionFactor": 28.35
            }]
        }"#;
        let page: PageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(page.id.as_str(), "p1");
        assert_eq!(page.timers[0].duration, 3600);
        assert_eq!(page.converters[0].from_unit, "oz");
        assert_eq!(page.converters[0].conversion_factor, 28.35);
    }

    #[test]
    fn page_without_children_defaults_to_empty() {
        let page: PageRecord = serde_json::from_str(r#"{"_id":"p","label":"Soup"}"#).unwrap();
        assert!(page.timers.is_empty());
        assert!(page.converters.is_empty());
    }

    #[test]
    fn new_converter_serializes_camel_case() {
        let body = serde_json::to_value(NewConverter {
            category: "grams".into(),
            from_unit: "oz".into(),
            to_unit: "g".into(),
            conversion_factor: 28.35,
        })
        .unwrap();
        assert_eq!(body["fromUnit"], "oz");
        assert_eq!(body["conversionFactor"], 28.35);
    }
}

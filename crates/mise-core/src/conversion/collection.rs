use super::converter::ConverterInstance;
use super::registry::Category;
use crate::error::ConverterError;
use crate::ids::EntityId;
use crate::store::ConverterRecord;

/// Ordered converters of one page. Never empty.
#[derive(Debug, Clone)]
pub struct ConverterCollection {
    items: Vec<ConverterInstance>,
    default_category: Category,
}

impl ConverterCollection {
    /// A collection holding a single unsaved converter.
    pub fn new(default_category: Category) -> Self {
        Self {
            items: vec![ConverterInstance::new_local(default_category)],
            default_category,
        }
    }

    /// Build from the store's converters; falls back to one unsaved
    /// converter when the page has none. Records the store should never
    /// have accepted are skipped with a warning.
    pub fn from_records(records: &[ConverterRecord], default_category: Category) -> Self {
        let mut collection = Self {
            items: records.iter().filter_map(converter_from_record).collect(),
            default_category,
        };
        collection.ensure_not_empty();
        collection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConverterInstance> {
        self.items.iter()
    }

    pub fn find(&self, id: &EntityId) -> Option<&ConverterInstance> {
        self.items.iter().find(|c| c.id() == id)
    }

    pub fn find_mut(&mut self, id: &EntityId) -> Option<&mut ConverterInstance> {
        self.items.iter_mut().find(|c| c.id() == id)
    }

    /// Append a new unsaved converter and return its id.
    pub fn add(&mut self) -> EntityId {
        let converter = ConverterInstance::new_local(self.default_category);
        let id = converter.id().clone();
        self.items.push(converter);
        id
    }

    /// Turn the local converter `local_id` into the store's `record`. A copy
    /// of the record that a concurrent resync already appended is dropped.
    ///
    /// # Errors
    ///
    /// [`ConverterError::NotFound`] if `local_id` is gone, or whatever
    /// [`ConverterInstance::mark_saved`] rejects.
    pub fn adopt_saved(
        &mut self,
        local_id: &EntityId,
        record: &ConverterRecord,
    ) -> Result<&ConverterInstance, ConverterError> {
        let idx = self
            .items
            .iter()
            .position(|c| c.id() == local_id)
            .ok_or_else(|| ConverterError::NotFound(local_id.clone()))?;
        self.items[idx].mark_saved(record)?;

        let mut position = 0;
        self.items.retain(|c| {
            let keep = position == idx || c.id() != &record.id;
            position += 1;
            keep
        });
        self.find(&record.id)
            .ok_or_else(|| ConverterError::NotFound(record.id.clone()))
    }

    /// Check that `id` exists and may be removed, without removing it.
    ///
    /// # Errors
    ///
    /// [`ConverterError::NotFound`] or [`ConverterError::LastConverterProtected`].
    pub fn ensure_removable(&self, id: &EntityId) -> Result<(), ConverterError> {
        if self.find(id).is_none() {
            return Err(ConverterError::NotFound(id.clone()));
        }
        if self.items.len() <= 1 {
            return Err(ConverterError::LastConverterProtected);
        }
        Ok(())
    }

    /// Remove a converter. The collection is unchanged on error.
    ///
    /// # Errors
    ///
    /// [`ConverterError::NotFound`] or [`ConverterError::LastConverterProtected`].
    pub fn remove(&mut self, id: &EntityId) -> Result<ConverterInstance, ConverterError> {
        self.ensure_removable(id)?;
        let idx = self
            .items
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| ConverterError::NotFound(id.clone()))?;
        Ok(self.items.remove(idx))
    }

    /// Align membership with the store after a resync.
    ///
    /// Saved converters still present keep their typed values, saved ones the
    /// store no longer has are dropped, unsaved ones stay, new store entries
    /// are appended in store order. Unusable new records are skipped.
    pub fn reconcile(&mut self, records: &[ConverterRecord]) {
        let fresh: Vec<_> = records
            .iter()
            .filter(|r| self.find(&r.id).is_none())
            .filter_map(converter_from_record)
            .collect();

        self.items
            .retain(|c| !c.is_saved() || records.iter().any(|r| &r.id == c.id()));
        self.items.extend(fresh);
        self.ensure_not_empty();
    }

    fn ensure_not_empty(&mut self) {
        if self.items.is_empty() {
            self.items
                .push(ConverterInstance::new_local(self.default_category));
        }
    }
}

fn converter_from_record(record: &ConverterRecord) -> Option<ConverterInstance> {
    match ConverterInstance::from_record(record) {
        Ok(converter) => Some(converter),
        Err(err) => {
            tracing::warn!(converter_id = %record.id, error = %err, "skipping invalid converter record");
            None
        }
    }
}

impl Default for ConverterCollection {
    fn default() -> Self {
        Self::new(Category::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ConverterRecord {
        ConverterRecord {
            id: EntityId::new(id),
            category: "grams".into(),
            from_unit: "oz".into(),
            to_unit: "g".into(),
            conversion_factor: 28.35,
        }
    }

    #[test]
    fn starts_with_one_local_converter() {
        let c = ConverterCollection::default();
        assert_eq!(c.len(), 1);
        let only = c.iter().next().unwrap();
        assert!(only.id().is_local());
        assert_eq!(only.category(), "Fahrenheit");
    }

    #[test]
    fn add_appends_in_order_with_unique_ids() {
        let mut c = ConverterCollection::default();
        let a = c.add();
        let b = c.add();
        assert_ne!(a, b);
        let ids: Vec<_> = c.iter().map(|x| x.id().clone()).collect();
        assert_eq!(&ids[1..], &[a, b]);
    }

    #[test]
    fn removing_the_last_converter_is_rejected() {
        let mut c = ConverterCollection::default();
        let only = c.iter().next().unwrap().id().clone();
        assert_eq!(c.remove(&only).unwrap_err(), ConverterError::LastConverterProtected);
        assert_eq!(c.len(), 1);
        assert!(c.find(&only).is_some());
    }

    #[test]
    fn remove_unknown_id() {
        let mut c = ConverterCollection::default();
        c.add();
        let missing = EntityId::new("nope");
        assert_eq!(c.remove(&missing).unwrap_err(), ConverterError::NotFound(missing));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn from_empty_records_adds_default() {
        let c = ConverterCollection::from_records(&[], Category::OuncesToGrams);
        assert_eq!(c.len(), 1);
        assert_eq!(c.iter().next().unwrap().category(), "grams");
    }

    #[test]
    fn reconcile_keeps_locals_and_surviving_values() {
        let mut c = ConverterCollection::from_records(&[record("a"), record("b")], Category::default());
        c.find_mut(&EntityId::new("a")).unwrap().set_field1("2");
        let local = c.add();

        c.reconcile(&[record("a"), record("c")]);

        let ids: Vec<_> = c.iter().map(|x| x.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["a".to_string(), local.to_string(), "c".to_string()]);
        assert_eq!(c.find(&EntityId::new("a")).unwrap().field2(), "56.70");
    }

    #[test]
    fn reconcile_to_nothing_leaves_default() {
        let mut c = ConverterCollection::from_records(&[record("a")], Category::default());
        c.reconcile(&[]);
        assert_eq!(c.len(), 1);
        assert!(!c.iter().next().unwrap().is_saved());
    }

    #[test]
    fn unusable_records_are_skipped() {
        let mut zero = record("z");
        zero.conversion_factor = 0.0;
        let c = ConverterCollection::from_records(&[zero, record("a")], Category::default());
        assert_eq!(c.len(), 1);
        assert!(c.find(&EntityId::new("a")).is_some());

        let mut c = ConverterCollection::from_records(&[record("a")], Category::default());
        let mut bad = record("b");
        bad.conversion_factor = f64::NAN;
        c.reconcile(&[record("a"), bad]);
        assert_eq!(c.len(), 1);
        assert!(c.find(&EntityId::new("b")).is_none());
    }

    #[test]
    fn adopt_saved_drops_copy_from_concurrent_resync() {
        let mut c = ConverterCollection::new(Category::OuncesToGrams);
        let local = c.iter().next().unwrap().id().clone();
        c.find_mut(&local).unwrap().set_field1("3");
        c.reconcile(&[record("a")]);
        assert_eq!(c.len(), 2);

        let adopted = c.adopt_saved(&local, &record("a")).unwrap();
        assert_eq!(adopted.field1(), "3");
        assert_eq!(adopted.label(), "oz to g");
        assert_eq!(c.len(), 1);
    }
}

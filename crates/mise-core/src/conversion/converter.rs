//! A single bidirectional converter.
//!
//! ## State Transitions
//!
//! ```text
//! Empty <-> Forward (field 1 drives field 2)
//! Empty <-> Reverse (field 2 drives field 1)
//! Forward <-> Reverse
//! ```
//!
//! The field the user typed into is stored exactly as typed; only the derived
//! field is rounded (two decimals), so repeated edits never accumulate drift.

use serde::Serialize;

use super::registry::{Category, Conversion};
use crate::error::ConverterError;
use crate::ids::EntityId;
use crate::store::{ConverterRecord, NewConverter};

/// How a converter maps between its two sides.
#[derive(Debug, Clone, Copy)]
pub enum ConversionRule {
    /// Built-in category formulas.
    Builtin(&'static Conversion),
    /// Plain `value2 = value1 * factor`, for saved converters whose category
    /// is not built in.
    Linear { factor: f64 },
}

impl ConversionRule {
    pub fn forward(&self, value: f64) -> f64 {
        match self {
            ConversionRule::Builtin(c) => c.forward(value),
            ConversionRule::Linear { factor } => value * factor,
        }
    }

    pub fn reverse(&self, value: f64) -> f64 {
        match self {
            ConversionRule::Builtin(c) => c.reverse(value),
            ConversionRule::Linear { factor } => value / factor,
        }
    }
}

impl From<Category> for ConversionRule {
    fn from(category: Category) -> Self {
        ConversionRule::Builtin(category.conversion())
    }
}

/// Which field currently drives the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterMode {
    Empty,
    Forward,
    Reverse,
}

/// One of the two input fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

/// Parse user input. Blank, non-numeric and non-finite text yields `None`.
pub fn parse_value(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Rounded display form of a derived value. Ties round away from zero.
pub fn format_derived(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.is_finite() {
        format!("{rounded:.2}")
    } else {
        format!("{value:.2}")
    }
}

/// Derive the opposite field's text from the text typed into `side`.
///
/// Pure: depends only on the rule and the input text.
pub fn derive_counterpart(rule: &ConversionRule, side: Side, text: &str) -> Option<String> {
    let value = parse_value(text)?;
    let derived = match side {
        Side::First => rule.forward(value),
        Side::Second => rule.reverse(value),
    };
    Some(format_derived(derived))
}

/// Converter bound to a category.
#[derive(Debug, Clone)]
pub struct ConverterInstance {
    id: EntityId,
    category: String,
    rule: ConversionRule,
    from_unit: String,
    to_unit: String,
    factor: f64,
    field1: String,
    field2: String,
    mode: ConverterMode,
    /// `Some("from to to")` once saved.
    saved_label: Option<String>,
}

/// Serializable view of a converter for front ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConverterView {
    pub id: EntityId,
    pub category: String,
    pub label: String,
    pub from_unit: String,
    pub to_unit: String,
    pub conversion_factor: f64,
    pub field1: String,
    pub field2: String,
    pub mode: ConverterMode,
    pub saved: bool,
}

impl ConverterInstance {
    /// A new unsaved converter with a fresh local id.
    pub fn new_local(category: Category) -> Self {
        let conversion = category.conversion();
        Self {
            id: EntityId::local(),
            category: category.key().to_string(),
            rule: ConversionRule::Builtin(conversion),
            from_unit: conversion.unit1.to_string(),
            to_unit: conversion.unit2.to_string(),
            factor: conversion.factor,
            field1: String::new(),
            field2: String::new(),
            mode: ConverterMode::Empty,
            saved_label: None,
        }
    }

    /// A saved converter as returned by the store.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::InvalidFactor`] for a non-positive or
    /// non-finite stored factor.
    pub fn from_record(record: &ConverterRecord) -> Result<Self, ConverterError> {
        let rule = rule_for_record(record)?;
        Ok(Self {
            id: record.id.clone(),
            category: record.category.clone(),
            rule,
            from_unit: record.from_unit.clone(),
            to_unit: record.to_unit.clone(),
            factor: record.conversion_factor,
            field1: String::new(),
            field2: String::new(),
            mode: ConverterMode::Empty,
            saved_label: Some(saved_label(&record.from_unit, &record.to_unit)),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn rule(&self) -> &ConversionRule {
        &self.rule
    }

    pub fn from_unit(&self) -> &str {
        &self.from_unit
    }

    pub fn to_unit(&self) -> &str {
        &self.to_unit
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn field1(&self) -> &str {
        &self.field1
    }

    pub fn field2(&self) -> &str {
        &self.field2
    }

    pub fn mode(&self) -> ConverterMode {
        self.mode
    }

    pub fn is_saved(&self) -> bool {
        self.saved_label.is_some()
    }

    /// "`fromUnit` to `toUnit`" once saved, the category label before that.
    pub fn label(&self) -> String {
        match (&self.saved_label, &self.rule) {
            (Some(label), _) => label.clone(),
            (None, ConversionRule::Builtin(c)) => c.label.to_string(),
            (None, ConversionRule::Linear { .. }) => saved_label(&self.from_unit, &self.to_unit),
        }
    }

    pub fn view(&self) -> ConverterView {
        ConverterView {
            id: self.id.clone(),
            category: self.category.clone(),
            label: self.label(),
            from_unit: self.from_unit.clone(),
            to_unit: self.to_unit.clone(),
            conversion_factor: self.factor,
            field1: self.field1.clone(),
            field2: self.field2.clone(),
            mode: self.mode,
            saved: self.is_saved(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn set_field1(&mut self, text: &str) {
        self.field1 = text.to_string();
        match derive_counterpart(&self.rule, Side::First, text) {
            Some(derived) => {
                self.field2 = derived;
                self.mode = ConverterMode::Forward;
            }
            None => {
                self.field2.clear();
                self.mode = ConverterMode::Empty;
            }
        }
    }

    pub fn set_field2(&mut self, text: &str) {
        self.field2 = text.to_string();
        match derive_counterpart(&self.rule, Side::Second, text) {
            Some(derived) => {
                self.field1 = derived;
                self.mode = ConverterMode::Reverse;
            }
            None => {
                self.field1.clear();
                self.mode = ConverterMode::Empty;
            }
        }
    }

    pub fn set_field(&mut self, side: Side, text: &str) {
        match side {
            Side::First => self.set_field1(text),
            Side::Second => self.set_field2(text),
        }
    }

    /// Switch category; a numeric field 1 is kept and field 2 re-derived.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::ImmutableOnceSaved`] for saved converters.
    pub fn set_category(&mut self, category: Category) -> Result<(), ConverterError> {
        if self.is_saved() {
            return Err(ConverterError::ImmutableOnceSaved(self.id.clone()));
        }
        let conversion = category.conversion();
        self.category = category.key().to_string();
        self.rule = ConversionRule::Builtin(conversion);
        self.from_unit = conversion.unit1.to_string();
        self.to_unit = conversion.unit2.to_string();
        self.factor = conversion.factor;

        if parse_value(&self.field1).is_some() {
            let text = self.field1.clone();
            self.set_field1(&text);
        }
        Ok(())
    }

    /// Payload to submit when saving this converter.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::AlreadySaved`] if it was saved before.
    pub fn save_request(&self) -> Result<NewConverter, ConverterError> {
        if self.is_saved() {
            return Err(ConverterError::AlreadySaved(self.id.clone()));
        }
        Ok(NewConverter {
            category: self.category.clone(),
            from_unit: self.from_unit.clone(),
            to_unit: self.to_unit.clone(),
            conversion_factor: self.factor,
        })
    }

    /// Adopt the store's copy after a successful save. Category is locked
    /// from here on; the typed field values survive.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::InvalidFactor`] if the stored factor is unusable.
    pub fn mark_saved(&mut self, record: &ConverterRecord) -> Result<(), ConverterError> {
        let rule = rule_for_record(record)?;
        self.id = record.id.clone();
        self.category = record.category.clone();
        self.rule = rule;
        self.from_unit = record.from_unit.clone();
        self.to_unit = record.to_unit.clone();
        self.factor = record.conversion_factor;
        self.saved_label = Some(saved_label(&record.from_unit, &record.to_unit));
        Ok(())
    }
}

fn rule_for_record(record: &ConverterRecord) -> Result<ConversionRule, ConverterError> {
    let factor = record.conversion_factor;
    if !(factor.is_finite() && factor > 0.0) {
        return Err(ConverterError::InvalidFactor(factor));
    }
    Ok(match record.category.parse::<Category>() {
        Ok(category) => ConversionRule::from(category),
        Err(_) => ConversionRule::Linear { factor },
    })
}

fn saved_label(from_unit: &str, to_unit: &str) -> String {
    format!("{from_unit} to {to_unit}")
}

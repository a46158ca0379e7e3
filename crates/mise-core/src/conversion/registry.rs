//! Built-in conversion categories.
//!
//! Each category pairs a forward formula (unit1 -> unit2) with its exact
//! algebraic inverse. The table is static; nothing mutates it at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConverterError;

/// Key of a built-in conversion category.
///
/// Serialized with the same keys the store uses (`"mL"`, `"Fahrenheit"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "mL")]
    CupsToMilliliters,
    #[serde(rename = "Fahrenheit")]
    CelsiusToFahrenheit,
    #[serde(rename = "grams")]
    OuncesToGrams,
    #[serde(rename = "pounds")]
    KilogramsToPounds,
    #[serde(rename = "tbsp")]
    TablespoonsToMilliliters,
    #[serde(rename = "tsp")]
    TeaspoonsToMilliliters,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::CupsToMilliliters,
        Category::CelsiusToFahrenheit,
        Category::OuncesToGrams,
        Category::KilogramsToPounds,
        Category::TablespoonsToMilliliters,
        Category::TeaspoonsToMilliliters,
    ];

    /// Store key for this category.
    pub fn key(self) -> &'static str {
        match self {
            Category::CupsToMilliliters => "mL",
            Category::CelsiusToFahrenheit => "Fahrenheit",
            Category::OuncesToGrams => "grams",
            Category::KilogramsToPounds => "pounds",
            Category::TablespoonsToMilliliters => "tbsp",
            Category::TeaspoonsToMilliliters => "tsp",
        }
    }

    /// Registry entry for this category.
    pub fn conversion(self) -> &'static Conversion {
        ConversionRegistry::builtin().get(self)
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::CelsiusToFahrenheit
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| ConverterError::UnknownCategory(s.to_string()))
    }
}

/// One registry entry: units, linear factor and the formula pair.
#[derive(Debug, Clone, Copy)]
pub struct Conversion {
    pub category: Category,
    pub label: &'static str,
    pub unit1: &'static str,
    pub unit2: &'static str,
    /// Scale between the two units (slope of the forward formula).
    pub factor: f64,
    forward: fn(f64) -> f64,
    reverse: fn(f64) -> f64,
}

impl Conversion {
    /// unit1 -> unit2
    pub fn forward(&self, value: f64) -> f64 {
        (self.forward)(value)
    }

    /// unit2 -> unit1
    pub fn reverse(&self, value: f64) -> f64 {
        (self.reverse)(value)
    }
}

const CUP_ML: f64 = 236.588;
const OZ_G: f64 = 28.35;
const KG_LB: f64 = 2.20462;
const TBSP_ML: f64 = 14.787;
const TSP_ML: f64 = 4.929;

fn cups_to_ml(v: f64) -> f64 {
    v * CUP_ML
}
fn ml_to_cups(v: f64) -> f64 {
    v / CUP_ML
}
fn celsius_to_fahrenheit(v: f64) -> f64 {
    v * 9.0 / 5.0 + 32.0
}
fn fahrenheit_to_celsius(v: f64) -> f64 {
    (v - 32.0) * 5.0 / 9.0
}
fn oz_to_g(v: f64) -> f64 {
    v * OZ_G
}
fn g_to_oz(v: f64) -> f64 {
    v / OZ_G
}
fn kg_to_lb(v: f64) -> f64 {
    v * KG_LB
}
fn lb_to_kg(v: f64) -> f64 {
    v / KG_LB
}
fn tbsp_to_ml(v: f64) -> f64 {
    v * TBSP_ML
}
fn ml_to_tbsp(v: f64) -> f64 {
    v / TBSP_ML
}
fn tsp_to_ml(v: f64) -> f64 {
    v * TSP_ML
}
fn ml_to_tsp(v: f64) -> f64 {
    v / TSP_ML
}

static BUILTIN: [Conversion; 6] = [
    Conversion {
        category: Category::CupsToMilliliters,
        label: "Cups to Milliliters",
        unit1: "Cups",
        unit2: "mL",
        factor: CUP_ML,
        forward: cups_to_ml,
        reverse: ml_to_cups,
    },
    Conversion {
        category: Category::CelsiusToFahrenheit,
        label: "Celsius to Fahrenheit",
        unit1: "Celsius",
        unit2: "Fahrenheit",
        factor: 1.8,
        forward: celsius_to_fahrenheit,
        reverse: fahrenheit_to_celsius,
    },
    Conversion {
        category: Category::OuncesToGrams,
        label: "Ounces to Grams",
        unit1: "oz",
        unit2: "g",
        factor: OZ_G,
        forward: oz_to_g,
        reverse: g_to_oz,
    },
    Conversion {
        category: Category::KilogramsToPounds,
        label: "Kilograms to Pounds",
        unit1: "kg",
        unit2: "lb",
        factor: KG_LB,
        forward: kg_to_lb,
        reverse: lb_to_kg,
    },
    Conversion {
        category: Category::TablespoonsToMilliliters,
        label: "Tablespoons to Milliliters",
        unit1: "tbsp",
        unit2: "mL",
        factor: TBSP_ML,
        forward: tbsp_to_ml,
        reverse: ml_to_tbsp,
    },
    Conversion {
        category: Category::TeaspoonsToMilliliters,
        label: "Teaspoons to Milliliters",
        unit1: "tsp",
        unit2: "mL",
        factor: TSP_ML,
        forward: tsp_to_ml,
        reverse: ml_to_tsp,
    },
];

/// Read-only view over the built-in categories.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRegistry {
    entries: &'static [Conversion],
}

impl ConversionRegistry {
    pub fn builtin() -> Self {
        Self { entries: &BUILTIN }
    }

    /// Look up a category by its store key.
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::UnknownCategory`] if the key is not registered.
    pub fn lookup(&self, key: &str) -> Result<&'static Conversion, ConverterError> {
        self.entries
            .iter()
            .find(|c| c.category.key() == key)
            .ok_or_else(|| ConverterError::UnknownCategory(key.to_string()))
    }

    pub fn get(&self, category: Category) -> &'static Conversion {
        match category {
            Category::CupsToMilliliters => &BUILTIN[0],
            Category::CelsiusToFahrenheit => &BUILTIN[1],
            Category::OuncesToGrams => &BUILTIN[2],
            Category::KilogramsToPounds => &BUILTIN[3],
            Category::TablespoonsToMilliliters => &BUILTIN[4],
            Category::TeaspoonsToMilliliters => &BUILTIN[5],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static Conversion> {
        self.entries.iter()
    }
}

impl Default for ConversionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fahrenheit_fixed_points() {
        let f = Category::CelsiusToFahrenheit.conversion();
        assert_eq!(f.forward(0.0), 32.0);
        assert_eq!(f.reverse(32.0), 0.0);
        assert_eq!(f.forward(100.0), 212.0);
        assert_eq!(f.reverse(212.0), 100.0);
    }

    #[test]
    fn lookup_by_key() {
        let registry = ConversionRegistry::builtin();
        let grams = registry.lookup("grams").unwrap();
        assert_eq!(grams.unit1, "oz");
        assert_eq!(grams.unit2, "g");
        assert_eq!(grams.factor, 28.35);
    }

    #[test]
    fn lookup_unknown_key_fails() {
        let registry = ConversionRegistry::builtin();
        assert_eq!(
            registry.lookup("furlongs").unwrap_err(),
            ConverterError::UnknownCategory("furlongs".into())
        );
    }

    #[test]
    fn entries_align_with_enum_order() {
        let registry = ConversionRegistry::builtin();
        for category in Category::ALL {
            assert_eq!(registry.get(category).category, category);
            assert_eq!(category.key().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn category_serializes_to_store_key() {
        let json = serde_json::to_string(&Category::KilogramsToPounds).unwrap();
        assert_eq!(json, "\"pounds\"");
        let parsed: Category = serde_json::from_str("\"mL\"").unwrap();
        assert_eq!(parsed, Category::CupsToMilliliters);
    }

    proptest! {
        #[test]
        fn reverse_inverts_forward(x in -1.0e5f64..1.0e5) {
            for conversion in ConversionRegistry::builtin().iter() {
                let back = conversion.reverse(conversion.forward(x));
                prop_assert!((back - x).abs() < 1e-9, "{}: {} -> {}", conversion.label, x, back);
            }
        }

        #[test]
        fn forward_slope_matches_factor(x in -1.0e3f64..1.0e3) {
            for conversion in ConversionRegistry::builtin().iter() {
                let slope = conversion.forward(x + 1.0) - conversion.forward(x);
                prop_assert!((slope - conversion.factor).abs() < 1e-6);
            }
        }
    }
}

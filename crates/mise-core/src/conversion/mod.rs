//! Unit conversion: built-in categories, bidirectional converters and the
//! per-page converter collection.

mod collection;
mod converter;
mod registry;

pub use collection::ConverterCollection;
pub use converter::{
    derive_counterpart, format_derived, parse_value, ConversionRule, ConverterInstance,
    ConverterMode, ConverterView, Side,
};
pub use registry::{Category, Conversion, ConversionRegistry};

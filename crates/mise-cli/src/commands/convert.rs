use mise_core::conversion::ConverterInstance;
use mise_core::{Category, ConversionRegistry, Side};
use serde_json::json;

/// Convert one value offline with a built-in category.
pub fn convert(
    category: &str,
    from: Option<String>,
    to: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let category: Category = category.parse()?;
    let Some((side, text)) = driving_side(from, to)? else {
        return Err("pass exactly one of --from or --to".into());
    };

    let mut converter = ConverterInstance::new_local(category);
    converter.set_field(side, &text);
    if converter.field1().is_empty() || converter.field2().is_empty() {
        return Err(format!("not a number: {text}").into());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&converter.view())?);
    } else {
        println!(
            "{} {} = {} {}",
            converter.field1(),
            converter.from_unit(),
            converter.field2(),
            converter.to_unit()
        );
    }
    Ok(())
}

/// The field a value was given for, if any.
pub fn driving_side(
    from: Option<String>,
    to: Option<String>,
) -> Result<Option<(Side, String)>, Box<dyn std::error::Error>> {
    match (from, to) {
        (Some(v), None) => Ok(Some((Side::First, v))),
        (None, Some(v)) => Ok(Some((Side::Second, v))),
        (None, None) => Ok(None),
        (Some(_), Some(_)) => Err("pass exactly one of --from or --to".into()),
    }
}

/// List the built-in categories.
pub fn categories(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ConversionRegistry::builtin();
    if json {
        let list: Vec<_> = registry
            .iter()
            .map(|c| {
                json!({
                    "category": c.category.key(),
                    "label": c.label,
                    "fromUnit": c.unit1,
                    "toUnit": c.unit2,
                    "conversionFactor": c.factor,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for c in registry.iter() {
            println!("{:<12} {:<28} {} -> {}", c.category.key(), c.label, c.unit1, c.unit2);
        }
    }
    Ok(())
}

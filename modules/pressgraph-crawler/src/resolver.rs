use serde_json::Value;

use pressgraph_common::{ExtractionRecord, ExtractionShapeError, RawExtraction};

/// Reduce one page's raw extraction to at most one record.
///
/// `Ok(None)` means the extractor produced nothing and the page is skipped.
/// Error-shaped objects are discarded; of the remaining candidates the most
/// complete wins, earliest first on ties. Anything that is not an object, or
/// a payload with no usable object left, is a shape error.
pub fn resolve(raw: RawExtraction, url: &str) -> Result<Option<ExtractionRecord>, ExtractionShapeError> {
    let shape_error = |reason: String| ExtractionShapeError {
        url: url.to_string(),
        reason,
    };

    let candidates = match raw {
        RawExtraction::Empty => return Ok(None),
        RawExtraction::Malformed(text) => {
            return Err(shape_error(format!("undecodable content: {}", preview(&text))))
        }
        RawExtraction::Single(value) => vec![value],
        RawExtraction::Many(values) => values,
    };

    let mut records = Vec::with_capacity(candidates.len());
    let mut error_shaped = 0;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let Value::Object(mut map) = candidate else {
            return Err(shape_error(format!("element {index} is not an object")));
        };
        if is_error_shaped(&map) {
            error_shaped += 1;
            continue;
        }
        map.retain(|_, v| !v.is_null());
        let record: ExtractionRecord = serde_json::from_value(Value::Object(map))
            .map_err(|e| shape_error(format!("element {index} does not fit the schema: {e}")))?;
        records.push(record);
    }

    let mut best: Option<ExtractionRecord> = None;
    for record in records {
        match &best {
            Some(current) if current.completeness() >= record.completeness() => {}
            _ => best = Some(record),
        }
    }

    match best {
        Some(record) => Ok(Some(record)),
        None => Err(shape_error(format!(
            "no usable record ({error_shaped} error-shaped)"
        ))),
    }
}

fn is_error_shaped(map: &serde_json::Map<String, Value>) -> bool {
    match map.get("error") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn preview(text: &str) -> &str {
    ai_client::truncate_to_char_boundary(text, 120)
}

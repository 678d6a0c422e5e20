//! Normalizes caption source responses into segments.
//!
//! Caption sources do not agree on a response shape. A bare JSON array is taken as the
//! segment list; otherwise an object is searched for the first array-valued field in
//! [`SEGMENT_LIST_FIELDS`] order. Anything else yields no segments.
//!
//! Every list element becomes a segment, so it counts toward the segment total. Missing
//! text reads as empty and missing timings as zero.

use serde_json::{Map, Value};

use super::CaptionSegment;

/// Field names that may hold the segment list, in priority order
pub const SEGMENT_LIST_FIELDS: [&str; 5] = ["transcript", "transcripts", "data", "items", "segments"];

/// Extract the ordered segment list from a caption source response
pub fn extract_segment_list(response: &Value) -> Vec<CaptionSegment> {
    let items = match response {
        Value::Array(items) => Some(items),
        Value::Object(map) => SEGMENT_LIST_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array)),
        _ => None,
    };

    items
        .map(|items| items.iter().map(parse_segment).collect())
        .unwrap_or_default()
}

fn parse_segment(item: &Value) -> CaptionSegment {
    let empty = Map::new();
    let obj = item.as_object().unwrap_or(&empty);

    CaptionSegment {
        text: obj.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        offset: number(obj, &["offset", "start"]).unwrap_or(0.0),
        duration: number(obj, &["duration", "dur"]).unwrap_or(0.0),
        lang: obj
            .get("lang")
            .and_then(Value::as_str)
            .filter(|lang| !lang.is_empty())
            .map(str::to_string),
    }
}

/// First of `keys` holding a number or a numeric string
fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

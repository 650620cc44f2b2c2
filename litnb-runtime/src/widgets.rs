//! Persisted interactive-widget state.

use serde_json::{Map, Value};

/// Notebook metadata key holding widget state
pub const WIDGETS_KEY: &str = "widgets";

/// Mime type of the widget-state entry under [`WIDGETS_KEY`]
pub const WIDGET_STATE_MIME: &str = "application/vnd.jupyter.widget-state+json";

/// Merge `state` into
/// `metadata.widgets["application/vnd.jupyter.widget-state+json"].state`.
///
/// Prior entries are kept; an entry in `state` replaces a prior one with the
/// same key. Missing or malformed containers are replaced with objects.
pub fn merge_widget_state(metadata: &mut Map<String, Value>, state: Map<String, Value>) {
    if state.is_empty() {
        return;
    }

    let widgets = object_entry(metadata, WIDGETS_KEY);
    let entry = object_entry(widgets, WIDGET_STATE_MIME);
    if !entry.contains_key("version_major") {
        entry.insert("version_major".into(), Value::from(2));
        entry.insert("version_minor".into(), Value::from(0));
    }
    let existing = object_entry(entry, "state");
    let added = state.len();
    existing.extend(state);
    tracing::debug!(added, total = existing.len(), "Merged widget state");
}

fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(object) => object,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

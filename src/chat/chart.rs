//! Chart specification processing
//!
//! The API returns charts as a Vega-Lite config. The frontend renders it
//! directly, so it is turned into a standalone spec: a JSON object with a
//! view definition and a `$schema`. Explicit nulls are kept; Vega-Lite
//! reads them as "disable" (`"sort": null`, `"axis": null`).

use serde_json::Value;

/// Schema URL added to specs that lack one
pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Keys of which at least one defines a renderable view
const VIEW_KEYS: [&str; 8] = [
    "mark", "layer", "concat", "hconcat", "vconcat", "facet", "repeat", "spec",
];

/// Convert a Vega-Lite config into a renderable spec
///
/// Returns `None` when the config is not an object or defines no view.
pub fn process_chart(vega_config: &Value) -> Option<Value> {
    let Value::Object(mut spec) = vega_config.clone() else {
        tracing::warn!("Chart config is not a JSON object");
        return None;
    };

    if !VIEW_KEYS.iter().any(|key| spec.contains_key(*key)) {
        tracing::warn!(
            keys = ?spec.keys().collect::<Vec<_>>(),
            "Chart config defines no view"
        );
        return None;
    }

    spec.entry("$schema")
        .or_insert_with(|| Value::String(VEGA_LITE_SCHEMA.to_string()));
    Some(Value::Object(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_chart_adds_schema_and_keeps_nulls() {
        let config = json!({
            "mark": "bar",
            "encoding": {
                "x": {"field": "region", "type": "nominal", "sort": null, "axis": null},
                "y": {"field": "total", "type": "quantitative"},
                "color": {"field": "region", "legend": null}
            },
            "data": {"values": [{"region": "EU", "total": null}]}
        });

        let spec = process_chart(&config).unwrap();
        assert_eq!(spec["$schema"], VEGA_LITE_SCHEMA);
        assert_eq!(spec["encoding"]["x"].get("sort"), Some(&Value::Null));
        assert_eq!(spec["encoding"]["x"].get("axis"), Some(&Value::Null));
        assert_eq!(spec["encoding"]["color"].get("legend"), Some(&Value::Null));
        assert_eq!(
            spec["data"]["values"][0].get("total"),
            Some(&Value::Null)
        );
    }

    #[test]
    fn test_existing_schema_is_kept() {
        let config = json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v4.json",
            "layer": []
        });
        let spec = process_chart(&config).unwrap();
        assert_eq!(spec["$schema"], "https://vega.github.io/schema/vega-lite/v4.json");
    }

    #[test]
    fn test_invalid_configs() {
        assert!(process_chart(&json!("bar chart")).is_none());
        assert!(process_chart(&json!([1, 2])).is_none());
        assert!(process_chart(&json!({"encoding": {}})).is_none());
    }
}

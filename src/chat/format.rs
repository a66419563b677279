//! Chat message formatting
//!
//! Converts Data Analytics messages into the flat JSON shapes the frontend
//! renders. Every system message becomes
//! `{"type": "assistant", "message_type", "content", "timestamp"}` where
//! `content.type` is one of `text`, `schema`, `data`, `chart`, `error` or
//! `unknown`.

use crate::analytics::types::{
    ChartMessage, DataMessage, Datasource, Field, Message, SchemaMessage, SystemMessage,
};
use crate::chat::chart::process_chart;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Format any message from history or from the chat stream
pub fn format_message(message: &Message) -> Value {
    let timestamp = format_timestamp(message.timestamp.as_ref());

    if let Some(user) = &message.user_message {
        return json!({
            "type": "user",
            "content": {"text": user.text},
            "timestamp": timestamp,
        });
    }

    if let Some(system) = &message.system_message {
        return format_system_message(system, timestamp);
    }

    json!({
        "type": "unknown",
        "content": {"raw": serde_json::to_value(message).unwrap_or(Value::Null)},
        "timestamp": Value::Null,
    })
}

/// Format a system message according to its kind
pub fn format_system_message(system: &SystemMessage, timestamp: Value) -> Value {
    let content = if let Some(text) = &system.text {
        json!({"type": "text", "text": text.parts.concat()})
    } else if let Some(schema) = &system.schema {
        Value::Object(format_schema(schema))
    } else if let Some(data) = &system.data {
        Value::Object(format_data(data))
    } else if let Some(chart) = &system.chart {
        Value::Object(format_chart(chart))
    } else if let Some(error) = &system.error {
        json!({"type": "error", "text": error.text})
    } else {
        json!({
            "type": "unknown",
            "raw": serde_json::to_value(system).unwrap_or(Value::Null),
        })
    };

    let message_type = content["type"].clone();
    json!({
        "type": "assistant",
        "message_type": message_type,
        "content": content,
        "timestamp": timestamp,
    })
}

/// Schema resolution: the question, or the resolved data sources
pub fn format_schema(schema: &SchemaMessage) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("type".into(), json!("schema"));

    if let Some(query) = &schema.query {
        result.insert("query".into(), json!({"question": query.question}));
    } else if let Some(resolved) = &schema.result {
        result.insert("status".into(), json!("Schema resolved"));
        result.insert(
            "datasources".into(),
            resolved.datasources.iter().map(format_datasource).collect(),
        );
    }

    result
}

/// Data step: query, generated SQL and the result pivoted into columns
pub fn format_data(data: &DataMessage) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("type".into(), json!("data"));

    if let Some(query) = &data.query {
        let datasources: Vec<Value> = query.datasources.iter().map(format_datasource).collect();
        result.insert(
            "query".into(),
            json!({
                "name": query.name,
                "question": query.question,
                "datasources": datasources,
            }),
        );
    }

    if let Some(sql) = data.generated_sql.as_deref().filter(|s| !s.is_empty()) {
        result.insert("generated_sql".into(), json!(sql));
    }

    if let Some(rows) = &data.result {
        result.insert("data_retrieved".into(), json!(true));

        let mut fields: Vec<String> = rows
            .schema
            .as_ref()
            .map(|s| s.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();
        if fields.is_empty() {
            // No schema: take columns in first-seen order
            for row in &rows.data {
                for key in row.keys() {
                    if !fields.contains(key) {
                        fields.push(key.clone());
                    }
                }
            }
        }

        let columns: Map<String, Value> = fields
            .iter()
            .map(|field| {
                let values: Vec<Value> = rows
                    .data
                    .iter()
                    .map(|row| row.get(field).cloned().unwrap_or(Value::Null))
                    .collect();
                (field.clone(), Value::Array(values))
            })
            .collect();

        result.insert(
            "data".into(),
            json!({
                "fields": fields,
                "columns": columns,
            }),
        );
    }

    result
}

/// Chart step: instructions and the processed Vega-Lite spec
pub fn format_chart(chart: &ChartMessage) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("type".into(), json!("chart"));

    if let Some(query) = &chart.query {
        result.insert("instructions".into(), json!(query.instructions));
    }

    if let Some(generated) = &chart.result {
        match generated.vega_config.as_ref().and_then(process_chart) {
            Some(spec) => {
                result.insert("vega_config".into(), spec);
            }
            None => {
                result.insert(
                    "error".into(),
                    json!("Failed to process chart specification"),
                );
            }
        }
    }

    result
}

/// Data source name and schema
pub fn format_datasource(datasource: &Datasource) -> Value {
    let source_name = if let Some(id) = datasource
        .studio_datasource_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        id.to_string()
    } else if let Some(looker) = &datasource.looker_explore_reference {
        format!(
            "lookmlModel: {}, explore: {}, lookerInstanceUri: {}",
            looker.lookml_model, looker.explore, looker.looker_instance_uri
        )
    } else if let Some(bq) = &datasource.bigquery_table_reference {
        format!("{}.{}.{}", bq.project_id, bq.dataset_id, bq.table_id)
    } else {
        "Unknown".to_string()
    };

    let mut info = Map::new();
    info.insert("source_name".into(), json!(source_name));
    if let Some(schema) = &datasource.schema {
        let fields: Vec<Value> = schema.fields.iter().map(format_field).collect();
        info.insert("schema".into(), json!({"fields": fields}));
    }
    Value::Object(info)
}

fn format_field(field: &Field) -> Value {
    json!({
        "name": field.name,
        "type": field.field_type,
        "description": field.description.as_deref().unwrap_or("-"),
        "mode": field.mode,
    })
}

/// RFC 3339 timestamp, or null
pub fn format_timestamp(timestamp: Option<&DateTime<Utc>>) -> Value {
    timestamp
        .map(|ts| Value::String(ts.to_rfc3339()))
        .unwrap_or(Value::Null)
}

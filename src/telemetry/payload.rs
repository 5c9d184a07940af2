//! Chat-webhook embed built from an event

use serde_json::{json, Value};

use super::event::Event;
use crate::constants::TELEMETRY_STACK_LIMIT;

/// Build the `{"embeds": [...]}` body for one event
pub fn build(event: &Event, version: &str, installation_id: &str) -> Value {
    let mut description = format!("**Message:** {}\n", event.message);
    if !event.metadata.is_empty() {
        let pretty = serde_json::to_string_pretty(&event.metadata).unwrap_or_default();
        description.push_str(&format!("**Metadata:**\n```json\n{}\n```", pretty));
    }

    let short_id: String = installation_id.chars().take(8).collect();
    let mut fields = vec![
        json!({"name": "Version", "value": version, "inline": true}),
        json!({
            "name": "OS",
            "value": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
            "inline": true
        }),
        json!({"name": "Installation ID", "value": format!("`{}`", short_id), "inline": true}),
    ];
    if let Some(stack) = &event.stack {
        fields.push(json!({
            "name": "Stack Trace",
            "value": format!("```\n{}\n```", truncate_stack(stack)),
        }));
    }

    json!({
        "embeds": [{
            "title": event.kind.title(),
            "description": description,
            "color": event.kind.color(),
            "fields": fields,
            "timestamp": event.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }]
    })
}

fn truncate_stack(stack: &str) -> String {
    match stack.char_indices().nth(TELEMETRY_STACK_LIMIT) {
        Some((cut, _)) => format!("{}...", &stack[..cut]),
        None => stack.to_string(),
    }
}

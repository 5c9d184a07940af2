//! JavaScript `fetch` snippet

use crate::resolve::EffectiveRequest;

fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Headers are merged into one object, so the derived Authorization
/// replaces a user header spelled the same way.
pub fn render(effective: &EffectiveRequest) -> String {
    let mut fields = vec![format!("  method: {}", js_string(&effective.method))];

    let headers = effective.merged_headers();
    if !headers.is_empty() {
        let entries: Vec<String> = headers
            .iter()
            .map(|(name, value)| format!("    {}: {}", js_string(name), js_string(value)))
            .collect();
        fields.push(format!("  headers: {{\n{}\n  }}", entries.join(",\n")));
    }

    if !effective.body.is_empty() {
        fields.push(format!("  body: {}", js_string(effective.body.as_str())));
    }

    format!(
        "fetch({}, {{\n{}\n}})",
        js_string(&effective.url),
        fields.join(",\n")
    )
}

//! Python `requests` snippet

use crate::resolve::{EffectiveRequest, ResolvedBody};

fn py_string(s: &str) -> String {
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

fn py_dict<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let entries: Vec<String> = pairs
        .into_iter()
        .map(|(k, v)| format!("{}: {}", py_string(k), py_string(v)))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Form pairs as a dict, or a list of tuples when keys repeat so that
/// every pair still reaches the body.
fn form_argument(pairs: &[(String, String)]) -> String {
    let repeated = pairs
        .iter()
        .enumerate()
        .any(|(i, (key, _))| pairs[..i].iter().any(|(k, _)| k == key));
    if repeated {
        let tuples: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("({}, {})", py_string(k), py_string(v)))
            .collect();
        format!("[{}]", tuples.join(", "))
    } else {
        py_dict(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Form bodies go through `data=`, raw bodies through `json=` verbatim.
pub fn render(effective: &EffectiveRequest) -> String {
    let mut args = vec![format!("    {}", py_string(&effective.url))];

    let headers = effective.merged_headers();
    if !headers.is_empty() {
        args.push(format!("    headers={}", py_dict(headers)));
    }

    match &effective.body {
        ResolvedBody::Form { pairs, encoded } if !encoded.is_empty() => {
            args.push(format!("    data={}", form_argument(pairs)));
        }
        ResolvedBody::Raw(body) => args.push(format!("    json={}", body)),
        _ => {}
    }

    format!(
        "import requests\n\nresponse = requests.{}(\n{}\n)\nprint(response.text)",
        effective.method.to_lowercase(),
        args.join(",\n")
    )
}

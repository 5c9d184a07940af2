use base64::Engine;
use url::form_urlencoded;

use crate::constants::FORM_CONTENT_TYPE;
use crate::error::{Error, Result};
use crate::models::{AuthType, BasicAuth, BodyType, FormField, Request};
use crate::resolve::EffectiveRequest;

/// Parse a cURL command into a Request
pub fn parse_curl(input: &str) -> Result<Request> {
    let mut request = Request {
        method: String::new(),
        url: String::new(),
        ..Request::default()
    };
    let mut form_body = false;

    // Remove line continuations and normalize
    let normalized = input.replace("\\\r\n", " ").replace("\\\n", " ");

    let mut tokens = tokenize(&normalized)?;

    // Skip 'curl' command if present
    if tokens.first().map(|s| s.as_str()) == Some("curl") {
        tokens.remove(0);
    }
    if tokens.is_empty() {
        return Err(Error::InvalidCurl(String::from("empty command")));
    }

    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        let value = tokens.get(i + 1);

        match (token.as_str(), value) {
            ("-X" | "--request", Some(method)) => {
                request.method = method.to_uppercase();
                i += 1;
            }
            ("-H" | "--header", Some(header)) => {
                let (name, value) = parse_header(header)?;
                if name.eq_ignore_ascii_case("authorization") {
                    apply_authorization(&mut request, value);
                } else if name.eq_ignore_ascii_case("content-type") && value == FORM_CONTENT_TYPE {
                    form_body = true;
                } else if !request.headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                    // Don't add duplicate headers
                    request.headers.insert(name.to_string(), value.to_string());
                }
                i += 1;
            }
            ("-d" | "--data" | "--data-raw" | "--data-binary", Some(body)) => {
                request.body = body.clone();
                request.body_type = BodyType::Raw;
                i += 1;
            }
            ("-u" | "--user", Some(credentials)) => {
                request.auth_type = AuthType::Basic;
                request.basic_auth = parse_basic_auth(credentials);
                i += 1;
            }
            (
                "-A" | "--user-agent" | "-o" | "--output" | "-m" | "--max-time" | "-b"
                | "--cookie",
                Some(_),
            ) => {
                // Ignored flags that take an argument
                i += 1;
            }
            (
                "--compressed" | "-k" | "--insecure" | "-L" | "--location" | "-s" | "--silent"
                | "-v" | "--verbose",
                _,
            ) => {
                // Ignored flags
            }
            (other, _) if !other.starts_with('-') => {
                request.url = other.to_string();
            }
            _ => {}
        }
        i += 1;
    }

    if request.url.is_empty() {
        return Err(Error::InvalidCurl(String::from("missing URL")));
    }
    if form_body && request.body_type == BodyType::Raw {
        request.form_data = form_urlencoded::parse(request.body.as_bytes())
            .map(|(k, v)| FormField::new(k, v))
            .collect();
        request.body.clear();
        request.body_type = BodyType::Form;
    } else if form_body {
        request
            .headers
            .insert(String::from("Content-Type"), String::from(FORM_CONTENT_TYPE));
    }
    // Infer POST if a body was given without a method
    if request.method.is_empty() {
        request.method = if request.body_type == BodyType::None {
            String::from("GET")
        } else {
            String::from("POST")
        };
    }

    Ok(request)
}

fn parse_header(s: &str) -> Result<(&str, &str)> {
    match s.split_once(':') {
        Some((name, value)) => Ok((name.trim(), value.trim())),
        None => Err(Error::InvalidCurl(format!("invalid header format: {}", s))),
    }
}

/// Map an Authorization header back onto the auth settings where possible
fn apply_authorization(request: &mut Request, value: &str) {
    if let Some(token) = strip_scheme(value, "bearer ") {
        request.auth_type = AuthType::Bearer;
        request.bearer_token = token.to_string();
        return;
    }
    if let Some(encoded) = strip_scheme(value, "basic ") {
        if let Some(decoded) = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            request.auth_type = AuthType::Basic;
            request.basic_auth = parse_basic_auth(&decoded);
            return;
        }
    }
    request
        .headers
        .insert(String::from("Authorization"), value.to_string());
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> Option<&'a str> {
    let head = value.get(..scheme.len())?;
    head.eq_ignore_ascii_case(scheme)
        .then(|| &value[scheme.len()..])
}

fn parse_basic_auth(s: &str) -> BasicAuth {
    match s.split_once(':') {
        Some((user, pass)) => BasicAuth {
            username: user.to_string(),
            password: pass.to_string(),
        },
        None => BasicAuth {
            username: s.to_string(),
            password: String::new(),
        },
    }
}

/// Tokenize a curl command, respecting quotes
fn tokenize(input: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        match c {
            '\\' if !in_single_quote => {
                escape_next = true;
                in_token = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                in_token = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                in_token = true;
            }
            ' ' | '\t' | '\n' | '\r' if !in_single_quote && !in_double_quote => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_single_quote || in_double_quote {
        return Err(Error::InvalidCurl(String::from("unterminated quote")));
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Wrap in double quotes, escaping what the shell would expand
fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Format request as cURL command
pub fn to_curl(effective: &EffectiveRequest) -> String {
    let mut parts = vec![format!("curl -X {}", effective.method)];

    // Headers, including the derived Authorization and form content type
    for header in effective.snippet_headers() {
        parts.push(format!(
            "-H {}",
            double_quote(&format!("{}: {}", header.name, header.value))
        ));
    }

    // Body
    if !effective.body.is_empty() {
        parts.push(format!("-d {}", single_quote(effective.body.as_str())));
    }

    // URL
    parts.push(double_quote(&effective.url));

    parts.join(" \\\n  ")
}

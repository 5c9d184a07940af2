//! Request resolution - turns a saved [`Request`] into the request that is
//! actually sent or rendered.
//!
//! Every renderer and the executor consume the same [`EffectiveRequest`], so
//! URL, header and body derivation lives here and nowhere else.

use base64::Engine;
use url::{form_urlencoded, Url};

use crate::constants::{FORM_CONTENT_TYPE, USER_AGENT};
use crate::models::{AuthType, BodyType, Request};

/// Where a resolved header came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderOrigin {
    /// Client identification, always first
    Identification,
    /// Copied verbatim from the request definition
    User,
    /// Derived from the auth settings
    Auth,
    /// Injected for form bodies when the user set no content type
    FormContentType,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedHeader {
    pub name: String,
    pub value: String,
    pub origin: HeaderOrigin,
}

impl ResolvedHeader {
    fn new(name: impl Into<String>, value: impl Into<String>, origin: HeaderOrigin) -> Self {
        ResolvedHeader {
            name: name.into(),
            value: value.into(),
            origin,
        }
    }
}

/// Final request body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedBody {
    Empty,
    Raw(String),
    Form {
        /// Entries with non-empty keys, in definition order
        pairs: Vec<(String, String)>,
        encoded: String,
    },
}

impl ResolvedBody {
    pub fn as_str(&self) -> &str {
        match self {
            ResolvedBody::Empty => "",
            ResolvedBody::Raw(body) => body,
            ResolvedBody::Form { encoded, .. } => encoded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

/// Fully resolved method, URL, headers and body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveRequest {
    pub method: String,
    /// Final URL with enabled query parameters merged in
    pub url: String,
    /// Authority (`host[:port]`), empty when the URL has none
    pub host: String,
    /// Path plus query, as written on the request line
    pub target: String,
    /// Identification, user, auth, then form content-type headers
    pub headers: Vec<ResolvedHeader>,
    pub body: ResolvedBody,
}

impl EffectiveRequest {
    /// Headers minus the identification header, as shown in code snippets
    pub fn snippet_headers(&self) -> impl Iterator<Item = &ResolvedHeader> {
        self.headers
            .iter()
            .filter(|h| h.origin != HeaderOrigin::Identification)
    }

    /// Name/value map as seen by a caller merging headers by exact name.
    /// Later entries overwrite earlier ones, so a derived Authorization
    /// replaces a user-supplied one of the same spelling.
    pub fn merged_headers(&self) -> Vec<(&str, &str)> {
        let mut merged: Vec<(&str, &str)> = Vec::new();
        for header in self.snippet_headers() {
            match merged.iter_mut().find(|(name, _)| *name == header.name) {
                Some(slot) => slot.1 = header.value.as_str(),
                None => merged.push((header.name.as_str(), header.value.as_str())),
            }
        }
        merged
    }
}

/// Resolve a request definition. Never fails: an unparsable URL is treated
/// as a bare path with no host.
pub fn resolve(request: &Request) -> EffectiveRequest {
    let params: Vec<(&str, &str)> = request
        .query_params
        .iter()
        .filter(|p| p.enabled && !p.key.is_empty())
        .map(|p| (p.key.as_str(), p.value.as_str()))
        .collect();
    let location = Location::resolve(&request.url, &params);

    let mut headers = vec![ResolvedHeader::new(
        "User-Agent",
        USER_AGENT,
        HeaderOrigin::Identification,
    )];
    headers.extend(
        request
            .headers
            .iter()
            .map(|(name, value)| ResolvedHeader::new(name, value, HeaderOrigin::User)),
    );
    if let Some(value) = authorization(request) {
        headers.push(ResolvedHeader::new("Authorization", value, HeaderOrigin::Auth));
    }

    let body = if request.body_type == BodyType::Form && !request.form_data.is_empty() {
        let has_content_type = request
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.push(ResolvedHeader::new(
                "Content-Type",
                FORM_CONTENT_TYPE,
                HeaderOrigin::FormContentType,
            ));
        }
        let pairs: Vec<(String, String)> = request
            .form_data
            .iter()
            .filter(|f| !f.key.is_empty())
            .map(|f| (f.key.clone(), f.value.clone()))
            .collect();
        let encoded = form_encode(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        ResolvedBody::Form { pairs, encoded }
    } else if request.body_type != BodyType::Form && !request.body.is_empty() {
        ResolvedBody::Raw(request.body.clone())
    } else {
        ResolvedBody::Empty
    };

    let method = match request.method.as_str() {
        "" => String::from("GET"),
        method => method.to_string(),
    };

    EffectiveRequest {
        method,
        url: location.url,
        host: location.host,
        target: location.target,
        headers,
        body,
    }
}

/// `application/x-www-form-urlencoded` serialization (space becomes `+`)
pub fn form_encode<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// Authorization header value derived from the auth settings, if any
fn authorization(request: &Request) -> Option<String> {
    match request.auth_type {
        AuthType::Bearer if !request.bearer_token.is_empty() => {
            Some(format!("Bearer {}", request.bearer_token))
        }
        AuthType::Basic if !request.basic_auth.is_empty() => {
            let credentials = format!(
                "{}:{}",
                request.basic_auth.username, request.basic_auth.password
            );
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            Some(format!("Basic {}", encoded))
        }
        _ => None,
    }
}

struct Location {
    url: String,
    host: String,
    target: String,
}

impl Location {
    fn resolve(raw: &str, params: &[(&str, &str)]) -> Self {
        match Url::parse(raw) {
            Ok(mut url) => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(params.iter().copied());
                }
                let host = match (url.host_str(), url.port()) {
                    (Some(host), Some(port)) => format!("{}:{}", host, port),
                    (Some(host), None) => host.to_string(),
                    _ => String::new(),
                };
                let path = match url.path() {
                    "" => "/",
                    path => path,
                };
                let target = match url.query() {
                    Some(query) => format!("{}?{}", path, query),
                    None => path.to_string(),
                };
                Location {
                    url: url.to_string(),
                    host,
                    target,
                }
            }
            Err(_) => Self::fallback(raw, params),
        }
    }

    /// The whole string is a path; an existing `?query` is kept and extended.
    /// An empty path becomes `/` in both the URL and the request target.
    fn fallback(raw: &str, params: &[(&str, &str)]) -> Self {
        let (path, existing) = match raw.split_once('?') {
            Some((path, query)) => (path, query),
            None => (raw, ""),
        };
        let added = form_encode(params.iter().copied());
        let query = match (existing.is_empty(), added.is_empty()) {
            (true, _) => added,
            (false, true) => existing.to_string(),
            (false, false) => format!("{}&{}", existing, added),
        };
        let path = if path.is_empty() { "/" } else { path };
        let target = if query.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, query)
        };

        Location {
            url: target.clone(),
            host: String::new(),
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryParam;

    #[test]
    fn test_query_params_merge_with_existing_query() {
        let req = Request::new("GET", "https://api.example.com/users?page=2")
            .with_query("q", "john doe")
            .with_query("", "ignored");
        let eff = resolve(&req);
        assert_eq!(eff.url, "https://api.example.com/users?page=2&q=john+doe");
        assert_eq!(eff.target, "/users?page=2&q=john+doe");
        assert_eq!(eff.host, "api.example.com");
    }

    #[test]
    fn test_disabled_query_params_are_skipped() {
        let mut req = Request::new("GET", "http://localhost:8080/api");
        req.query_params.push(QueryParam::new("a", "1").disabled());
        req.query_params.push(QueryParam::new("b", "2"));
        let eff = resolve(&req);
        assert_eq!(eff.url, "http://localhost:8080/api?b=2");
        assert_eq!(eff.host, "localhost:8080");
    }

    #[test]
    fn test_query_param_order_is_preserved() {
        let req = Request::new("GET", "http://x.test/")
            .with_query("z", "1")
            .with_query("a", "2");
        assert_eq!(resolve(&req).target, "/?z=1&a=2");
    }

    #[test]
    fn test_empty_path_defaults_to_root() {
        let eff = resolve(&Request::new("GET", "https://example.com"));
        assert_eq!(eff.target, "/");
    }

    #[test]
    fn test_unparsable_url_is_treated_as_path() {
        let eff = resolve(&Request::new("GET", "/relative/path").with_query("k", "v"));
        assert_eq!(eff.host, "");
        assert_eq!(eff.url, "/relative/path?k=v");
        assert_eq!(eff.target, "/relative/path?k=v");

        let empty = resolve(&Request::new("GET", ""));
        assert_eq!(empty.host, "");
        assert_eq!(empty.url, "/");
        assert_eq!(empty.target, "/");

        let bare_query = resolve(&Request::new("GET", "?a=1").with_query("b", "2"));
        assert_eq!(bare_query.url, "/?a=1&b=2");
        assert_eq!(bare_query.url, bare_query.target);
    }

    #[test]
    fn test_unparsable_url_keeps_existing_query() {
        let eff = resolve(&Request::new("GET", "api/items?x=1").with_query("y", "2"));
        assert_eq!(eff.url, "api/items?x=1&y=2");
    }

    #[test]
    fn test_empty_method_resolves_to_get() {
        assert_eq!(resolve(&Request::new("", "http://x.test/")).method, "GET");
        assert_eq!(resolve(&Request::new("PURGE", "http://x.test/")).method, "PURGE");
    }

    #[test]
    fn test_bearer_header_appended_after_user_authorization() {
        let req = Request::new("GET", "http://x.test/")
            .with_header("Authorization", "Token abc")
            .with_bearer("xyz");
        let eff = resolve(&req);
        let auth: Vec<_> = eff
            .headers
            .iter()
            .filter(|h| h.name == "Authorization")
            .map(|h| h.value.as_str())
            .collect();
        assert_eq!(auth, vec!["Token abc", "Bearer xyz"]);
        assert_eq!(
            eff.merged_headers(),
            vec![("Authorization", "Bearer xyz")]
        );
    }

    #[test]
    fn test_basic_auth_encodes_credentials() {
        let eff = resolve(&Request::new("GET", "http://x.test/").with_basic("user", "pass"));
        let auth = eff.headers.iter().find(|h| h.origin == HeaderOrigin::Auth).unwrap();
        assert_eq!(auth.value, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_empty_credentials_add_no_authorization() {
        let eff = resolve(&Request::new("GET", "http://x.test/").with_basic("", ""));
        assert!(eff.headers.iter().all(|h| h.origin != HeaderOrigin::Auth));
        let eff = resolve(&Request::new("GET", "http://x.test/").with_bearer(""));
        assert!(eff.headers.iter().all(|h| h.origin != HeaderOrigin::Auth));
    }

    #[test]
    fn test_form_body_injects_content_type() {
        let req = Request::new("POST", "http://x.test/")
            .with_form("a", "1")
            .with_form("", "skipped")
            .with_form("b", "two words");
        let eff = resolve(&req);
        assert_eq!(eff.body.as_str(), "a=1&b=two+words");
        let last = eff.headers.last().unwrap();
        assert_eq!(last.origin, HeaderOrigin::FormContentType);
        assert_eq!(last.value, FORM_CONTENT_TYPE);
    }

    #[test]
    fn test_user_content_type_suppresses_injection() {
        let req = Request::new("POST", "http://x.test/")
            .with_header("content-type", "text/plain")
            .with_form("a", "1");
        let eff = resolve(&req);
        assert!(eff
            .headers
            .iter()
            .all(|h| h.origin != HeaderOrigin::FormContentType));
    }

    #[test]
    fn test_body_type_selects_body_source() {
        let mut req = Request::new("POST", "http://x.test/").with_form("a", "1");
        req.body = String::from("ignored raw");
        assert_eq!(resolve(&req).body.as_str(), "a=1");

        let mut req = Request::new("POST", "http://x.test/").with_body("{\"k\":1}");
        req.form_data.push(crate::models::FormField::new("ignored", "form"));
        assert_eq!(resolve(&req).body, ResolvedBody::Raw(String::from("{\"k\":1}")));

        let mut req = Request::new("POST", "http://x.test/");
        req.body_type = BodyType::Form;
        req.body = String::from("raw but form selected");
        assert_eq!(resolve(&req).body, ResolvedBody::Empty);
    }

    #[test]
    fn test_identification_header_comes_first() {
        let req = Request::new("GET", "http://x.test/").with_header("User-Agent", "custom");
        let eff = resolve(&req);
        assert_eq!(eff.headers[0].origin, HeaderOrigin::Identification);
        assert_eq!(eff.headers[0].value, USER_AGENT);
        assert_eq!(eff.headers[1].value, "custom");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Authentication type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum AuthType {
    #[default]
    None,
    Bearer,
    Basic,
}

impl AuthType {
    pub fn as_str(&self) -> &str {
        match self {
            AuthType::None => "none",
            AuthType::Bearer => "bearer",
            AuthType::Basic => "basic",
        }
    }
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "bearer" => AuthType::Bearer,
            "basic" => AuthType::Basic,
            _ => AuthType::None,
        }
    }
}

/// Selects which body field contributes to the request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum BodyType {
    #[default]
    None,
    Raw,
    Form,
}

impl BodyType {
    pub fn as_str(&self) -> &str {
        match self {
            BodyType::None => "none",
            BodyType::Raw => "raw",
            BodyType::Form => "form",
        }
    }
}

impl From<String> for BodyType {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "raw" => BodyType::Raw,
            "form" => BodyType::Form,
            _ => BodyType::None,
        }
    }
}

/// Query parameter row. Disabled rows are kept for display only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl QueryParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        QueryParam {
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Form body row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    pub value: String,
}

impl FormField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl BasicAuth {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// A saved HTTP request definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub project_id: u64,
    #[serde(default)]
    pub folder_id: Option<u64>,
    #[serde(default)]
    pub name: String,
    pub method: String,
    pub url: String,
    /// Last write wins on duplicate names
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub query_params: Vec<QueryParam>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub basic_auth: BasicAuth,
    #[serde(default)]
    pub body_type: BodyType,
    #[serde(default)]
    pub form_data: Vec<FormField>,
    /// Ordering among siblings under the same parent
    #[serde(default)]
    pub position: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Request {
            method: method.into(),
            url: url.into(),
            ..Request::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push(QueryParam::new(key, value));
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth_type = AuthType::Bearer;
        self.bearer_token = token.into();
        self
    }

    pub fn with_basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_type = AuthType::Basic;
        self.basic_auth = BasicAuth {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Sets a raw body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body_type = BodyType::Raw;
        self.body = body.into();
        self
    }

    /// Appends a form field and switches the body to form encoding
    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.body_type = BodyType::Form;
        self.form_data.push(FormField::new(key, value));
        self
    }
}

impl Default for Request {
    fn default() -> Self {
        use crate::constants::DEFAULT_HTTP_URL;
        let now = Utc::now();
        Request {
            id: 0,
            project_id: 0,
            folder_id: None,
            name: String::from("New Request"),
            method: String::from("GET"),
            url: String::from(DEFAULT_HTTP_URL),
            headers: BTreeMap::new(),
            body: String::new(),
            query_params: Vec::new(),
            auth_type: AuthType::None,
            bearer_token: String::new(),
            basic_auth: BasicAuth::default(),
            body_type: BodyType::None,
            form_data: Vec::new(),
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Project {
            id: 0,
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(default)]
    pub id: u64,
    pub project_id: u64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(default)]
    pub position: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(project_id: u64, name: impl Into<String>, parent_id: Option<u64>) -> Self {
        let now = Utc::now();
        Folder {
            id: 0,
            project_id,
            name: name.into(),
            parent_id,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Normalized result of executing a request.
///
/// `status == 0` marks a transport failure; `status_text` then carries the
/// classified failure label and `body` the transport's error text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: String,
    /// Wall-clock milliseconds from send to completion or failure
    pub duration_ms: u64,
    pub size: u64,
    /// Raw-wire rendering of the request that produced this outcome
    pub raw_request: String,
}

impl Outcome {
    pub fn is_transport_failure(&self) -> bool {
        self.status == 0
    }
}

/// History entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub request_id: u64,
    pub outcome: Outcome,
    pub executed_at: DateTime<Utc>,
}

/// Persisted telemetry switch, sink override and installation identity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub installation_id: String,
}

fn default_enabled() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            enabled: true,
            webhook_url: String::new(),
            installation_id: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_enum_values_fall_back_to_none() {
        let json = r#"{"method":"GET","url":"http://x","auth_type":"digest","body_type":"binary"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert_eq!(req.auth_type, AuthType::None);
        assert_eq!(req.body_type, BodyType::None);
    }

    #[test]
    fn test_enum_values_serialize_lowercase() {
        let req = Request::new("POST", "http://x").with_bearer("t").with_form("a", "1");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["auth_type"], "bearer");
        assert_eq!(value["body_type"], "form");
    }

    #[test]
    fn test_telemetry_config_defaults_to_enabled() {
        let config: TelemetryConfig = serde_json::from_str("{}").unwrap();
        assert!(config.enabled);
        assert!(config.installation_id.is_empty());
    }
}

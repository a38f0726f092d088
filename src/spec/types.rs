use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use super::schema::ResolvedSchema;

/// Tag assigned to operations that declare no tags.
pub const UNTAGGED: &str = "Untagged";

/// The unmodified parsed OpenAPI document.
///
/// Treated as an untyped, possibly incomplete tree. Every query in the
/// [`spec`](crate::spec) module borrows it immutably.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSpec(Value);

impl RawSpec {
    pub fn new(value: Value) -> Self {
        RawSpec(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// `openapi` version string, e.g. `3.1.0`.
    pub fn openapi_version(&self) -> Option<&str> {
        self.0.get("openapi").and_then(Value::as_str)
    }

    /// Whether the document declares an OpenAPI 3.x version.
    pub fn is_v3(&self) -> bool {
        self.openapi_version()
            .map(|v| v.trim().starts_with("3."))
            .unwrap_or(false)
    }

    /// Trimmed `info.title`, if non-empty.
    pub fn title(&self) -> Option<&str> {
        self.0
            .pointer("/info/title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn version(&self) -> Option<&str> {
        self.0.pointer("/info/version").and_then(Value::as_str)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Value> for RawSpec {
    fn from(value: Value) -> Self {
        RawSpec(value)
    }
}

/// HTTP methods an OpenAPI path item may declare, in display priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    /// Case-insensitive parse of a path-item key.
    pub fn parse(s: &str) -> Option<Self> {
        HttpMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_lower().eq_ignore_ascii_case(s))
    }

    pub fn as_lower(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
            HttpMethod::Trace => "trace",
        }
    }

    pub fn as_upper(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upper())
    }
}

impl From<HttpMethod> for http::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Put => http::Method::PUT,
            HttpMethod::Patch => http::Method::PATCH,
            HttpMethod::Delete => http::Method::DELETE,
            HttpMethod::Head => http::Method::HEAD,
            HttpMethod::Options => http::Method::OPTIONS,
            HttpMethod::Trace => http::Method::TRACE,
        }
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_upper())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }
}

/// One example value with the name it was declared under, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub value: Value,
}

impl Example {
    pub fn unnamed(value: Value) -> Self {
        Example {
            name: None,
            summary: None,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub description: String,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explode: Option<bool>,
    pub schema: Option<ResolvedSchema>,
    /// Ordered: explicit `example`, named `examples`, then schema-level examples.
    pub examples: Vec<Example>,
}

impl Parameter {
    /// Path parameters must always be supplied, whatever the document says.
    pub fn is_required(&self) -> bool {
        self.required || self.location == ParameterLocation::Path
    }

    /// Highest-precedence example value.
    pub fn example(&self) -> Option<&Value> {
        self.examples.first().map(|e| &e.value)
    }
}

/// One `(mediaType, schema, examples)` entry of a `content` map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
    pub media_type: String,
    pub schema: Option<ResolvedSchema>,
    pub examples: Vec<Example>,
}

impl MediaContent {
    pub fn is_json(&self) -> bool {
        is_json_media_type(&self.media_type)
    }
}

/// `application/json` or any `+json` structured syntax suffix.
pub fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

fn pick_json(content: &[MediaContent]) -> Option<&MediaContent> {
    content
        .iter()
        .find(|c| c.media_type.eq_ignore_ascii_case("application/json"))
        .or_else(|| content.iter().find(|c| c.is_json()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub description: String,
    pub required: bool,
    pub content: Vec<MediaContent>,
}

impl RequestBody {
    pub fn json_content(&self) -> Option<&MediaContent> {
        pick_json(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: Option<ResolvedSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Status code key as declared (`200`, `4XX`, `default`).
    pub status: String,
    pub description: String,
    pub headers: Vec<Header>,
    pub content: Vec<MediaContent>,
}

impl Response {
    pub fn json_content(&self) -> Option<&MediaContent> {
        pick_json(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerVariable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub enum_values: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// URL template as declared.
    pub url_template: String,
    /// URL with variables substituted.
    pub url: String,
    pub description: String,
    pub variables: Vec<ServerVariable>,
}

/// Typed `components.securitySchemes` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecuritySchemeKind {
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: String,
    },
    Http {
        scheme: String,
        #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 { flows: Value },
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        url: String,
    },
    #[serde(rename = "mutualTLS")]
    MutualTls,
    Other {
        declared: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityScheme {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: SecuritySchemeKind,
}

/// One scheme entry of a security requirement object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecuritySchemeRef {
    pub name: String,
    pub scopes: Vec<String>,
    /// `None` when the name does not match a declared scheme.
    pub scheme: Option<SecurityScheme>,
}

/// All schemes of one requirement must be satisfied together; a requirement
/// with no schemes means authentication is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SecurityRequirement {
    pub schemes: Vec<SecuritySchemeRef>,
}

impl SecurityRequirement {
    pub fn is_anonymous(&self) -> bool {
        self.schemes.is_empty()
    }
}

/// Security as declared on an operation, before inheritance is applied.
pub type DeclaredSecurity = Option<Vec<Map<String, Value>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub path: String,
    pub method: HttpMethod,
    pub operation_id: String,
    /// `true` when `operation_id` was synthesized from method and path.
    pub operation_id_derived: bool,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: Vec<Response>,
    pub servers: Vec<Server>,
    /// `None` inherits the document default; `Some(vec![])` disables auth.
    #[serde(skip)]
    pub security: DeclaredSecurity,
}

impl Operation {
    pub fn response(&self, status: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.status == status)
    }

    pub fn parameters_in(&self, location: ParameterLocation) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Identity used for ordering and lookups.
    pub fn key(&self) -> (&str, HttpMethod) {
        (self.path.as_str(), self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("Delete"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("parameters"), None);
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_method_priority_order() {
        let mut methods = vec![HttpMethod::Trace, HttpMethod::Delete, HttpMethod::Get, HttpMethod::Put];
        methods.sort();
        assert_eq!(
            methods,
            vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete, HttpMethod::Trace]
        );
    }

    #[test]
    fn test_json_media_type_detection() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("application/problem+json; charset=utf-8"));
        assert!(!is_json_media_type("text/plain"));
    }

    #[test]
    fn test_raw_spec_accessors() {
        let spec = RawSpec::new(json!({"openapi": "3.0.3", "info": {"title": "  Pets  ", "version": "1"}}));
        assert!(spec.is_v3());
        assert_eq!(spec.title(), Some("Pets"));
        assert_eq!(spec.version(), Some("1"));
        assert!(!RawSpec::new(json!({"swagger": "2.0"})).is_v3());
    }

    #[test]
    fn test_path_parameter_always_required() {
        let param = Parameter {
            name: "id".into(),
            location: ParameterLocation::Path,
            required: false,
            description: String::new(),
            deprecated: false,
            style: None,
            explode: None,
            schema: None,
            examples: vec![],
        };
        assert!(param.is_required());
    }
}

use serde_json::Value as JsonValue;

/// Request body, exactly one variant per descriptor.
///
/// The variant decides serialization: `UrlEncoded` data travels in the URL
/// query string for GET/HEAD and as an `application/x-www-form-urlencoded`
/// body for every other method.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// No payload.
    None,
    /// Urlencoded key/value pairs (query string or form body).
    UrlEncoded(Vec<(String, String)>),
    /// JSON payload.
    Json(JsonValue),
    /// Multipart form: plain fields plus `(field name, file path)` parts.
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<(String, String)>,
    },
    /// Raw bytes with an explicit content type.
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// One queued request, identified by a caller-chosen id.
///
/// Descriptors are immutable once enqueued; re-adding the same id replaces
/// the earlier descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct CallRequest {
    /// Result and callback key, unique within one queue generation.
    pub id: String,
    /// Target URL.
    pub url: String,
    /// Upper-cased HTTP method. Custom verbs are allowed.
    pub method: String,
    /// Payload variant.
    pub body: Body,
    /// Request headers, merged over the client's defaults (request wins).
    pub headers: Vec<(String, String)>,
    /// Advisory transport options. Recognized key: `timeout_ms`.
    pub options: Vec<(String, String)>,
}

impl CallRequest {
    /// Creates a bodyless descriptor. The method is trimmed and
    /// upper-cased; an empty method defaults to GET.
    pub fn new(id: impl Into<String>, url: impl Into<String>, method: &str) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            method: normalize_method(method),
            body: Body::None,
            headers: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Replaces the body variant.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Replaces the request headers.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Replaces the advisory options.
    pub fn with_options(mut self, options: Vec<(String, String)>) -> Self {
        self.options = options;
        self
    }
}

pub(crate) fn normalize_method(method: &str) -> String {
    let trimmed = method.trim();
    if trimmed.is_empty() {
        "GET".to_owned()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_method, Body, CallRequest};

    #[test]
    fn method_is_upper_cased() {
        assert_eq!(normalize_method("post"), "POST");
        assert_eq!(normalize_method(" Patch "), "PATCH");
        assert_eq!(normalize_method("PURGE"), "PURGE");
    }

    #[test]
    fn empty_method_defaults_to_get() {
        assert_eq!(normalize_method(""), "GET");
        assert_eq!(normalize_method("   "), "GET");
    }

    #[test]
    fn new_descriptor_has_no_body() {
        let request = CallRequest::new("a", "http://localhost/", "get");
        assert_eq!(request.method, "GET");
        assert_eq!(request.body, Body::None);
        assert!(request.headers.is_empty());
        assert!(request.options.is_empty());
    }
}

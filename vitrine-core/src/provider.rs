//! Remote data provider abstraction.
//!
//! The cache and the gateway only ever reach the network through
//! [`DataProvider`]. The payload is opaque to them: a status code and a body.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::FetchError;

/// Request parameters. Insertion order carries no meaning.
pub type RequestParams = HashMap<String, Value>;

/// Request verb, used to split reads from writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the verb changes remote state and must bypass the cache.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call to the remote provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub method: Method,
    pub address: String,
    pub params: Option<RequestParams>,
    pub body: Option<Value>,
}

impl ProviderRequest {
    pub fn get(address: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            method: Method::Get,
            address: address.into(),
            params,
            body: None,
        }
    }

    /// Parameters as query pairs, sorted by name.
    ///
    /// Strings are sent verbatim; every other value is sent as its JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(params) = &self.params else {
            return Vec::new();
        };
        let mut pairs: Vec<(String, String)> = params
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), text)
            })
            .collect();
        pairs.sort();
        pairs
    }
}

/// Raw answer from the provider. Decoding is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort human message for a failed response.
    ///
    /// Looks for a `message` or `error` string in a JSON body and falls
    /// back to a generic message naming the status.
    pub fn error_message(&self) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            message: Option<String>,
            error: Option<String>,
        }

        serde_json::from_str::<ErrorBody>(&self.body)
            .ok()
            .and_then(|body| {
                let usable = |m: &String| !m.trim().is_empty();
                body.message.filter(usable).or(body.error.filter(usable))
            })
            .unwrap_or_else(|| format!("Request failed with status {}", self.status))
    }

    /// Decode the body as JSON. An empty body decodes to `null`.
    pub fn json(&self, address: &str) -> Result<Value, FetchError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body).map_err(|e| FetchError::parse(address, e))
    }
}

/// The remote data provider.
///
/// Implementations return `Err` only for transport failures. A non-success
/// status is still an `Ok(ProviderResponse)`; classifying it is up to the
/// caller.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_mutation_split() {
        assert!(!Method::Get.is_mutating());
        assert!(!Method::Head.is_mutating());
        assert!(Method::Post.is_mutating());
        assert!(Method::Put.is_mutating());
        assert!(Method::Patch.is_mutating());
        assert!(Method::Delete.is_mutating());
        assert_eq!(Method::default(), Method::Get);
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }

    #[test]
    fn test_query_pairs_sorted_and_stringified() {
        let mut params = RequestParams::new();
        params.insert("page".to_string(), json!(2));
        params.insert("category".to_string(), json!("shades"));
        params.insert("in_stock".to_string(), json!(true));

        let request = ProviderRequest::get("/products", Some(params));
        assert_eq!(
            request.query_pairs(),
            vec![
                ("category".to_string(), "shades".to_string()),
                ("in_stock".to_string(), "true".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
        assert!(ProviderRequest::get("/products", None).query_pairs().is_empty());
    }

    #[test]
    fn test_response_json() {
        let response = ProviderResponse::new(200, r#"[{"id":1}]"#);
        assert!(response.is_success());
        assert_eq!(response.json("/x").unwrap(), json!([{"id": 1}]));

        let empty = ProviderResponse::new(204, "");
        assert_eq!(empty.json("/x").unwrap(), Value::Null);

        let broken = ProviderResponse::new(200, "{not json");
        assert!(matches!(broken.json("/x"), Err(FetchError::Parse { .. })));

        assert!(!ProviderResponse::new(404, "").is_success());
        assert!(!ProviderResponse::new(301, "").is_success());
    }

    #[test]
    fn test_error_message_extraction() {
        let structured = ProviderResponse::new(422, r#"{"message":"SKU already exists"}"#);
        assert_eq!(structured.error_message(), "SKU already exists");

        let error_field = ProviderResponse::new(401, r#"{"error":"Not authenticated"}"#);
        assert_eq!(error_field.error_message(), "Not authenticated");

        let html = ProviderResponse::new(502, "<html>Bad Gateway</html>");
        assert_eq!(html.error_message(), "Request failed with status 502");

        let blank = ProviderResponse::new(500, r#"{"message":""}"#);
        assert_eq!(blank.error_message(), "Request failed with status 500");

        let blank_message = ProviderResponse::new(400, r#"{"message":"","error":"Invalid SKU"}"#);
        assert_eq!(blank_message.error_message(), "Invalid SKU");
    }
}

//! Request description handed to the dispatcher.

use std::collections::HashMap;
use std::fmt::Display;

use reqwest::Method;
use serde_json::Value;
use url::form_urlencoded;

use super::endpoints::EndpointDescriptor;
use crate::error::GatewayError;

/// One logical gateway call: method, endpoint name, parameters and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    path_params: HashMap<String, String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    /// Create a request for a logical endpoint.
    #[must_use]
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            path_params: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Create a GET request.
    #[must_use]
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// Create a POST request.
    #[must_use]
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// Supply a value for a `{name}` placeholder.
    #[must_use]
    pub fn path_param(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.path_params.insert(name.into(), value.to_string());
        self
    }

    /// Append a query parameter. Order is preserved.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when a value is present.
    #[must_use]
    pub fn query_opt<V: Display>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Logical endpoint name.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query parameters in insertion order.
    #[must_use]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    /// Value supplied for a path placeholder.
    #[must_use]
    pub fn path_param_value(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// JSON body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Substitute path parameters into a template.
    ///
    /// Values are percent-encoded as single path segments.
    pub fn resolve_path(&self, template: &str) -> Result<String, GatewayError> {
        let mut resolved = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            resolved.push_str(&rest[..open]);
            let name = &rest[open + 1..close];
            let value =
                self.path_params
                    .get(name)
                    .ok_or_else(|| GatewayError::MissingPathParameter {
                        endpoint: self.endpoint.clone(),
                        parameter: name.to_string(),
                    })?;
            push_segment(&mut resolved, value);
            rest = &rest[close + 1..];
        }
        resolved.push_str(rest);

        Ok(resolved)
    }

    /// URL-encoded query string without the leading `?`.
    #[must_use]
    pub fn encoded_query(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            serializer.append_pair(key, value);
        }
        Some(serializer.finish())
    }

    /// Full URL for this request against a base URL.
    pub fn build_url(
        &self,
        base_url: &str,
        descriptor: &EndpointDescriptor,
    ) -> Result<String, GatewayError> {
        let path = self.resolve_path(descriptor.path_template())?;
        let mut url = format!("{}{path}", base_url.trim_end_matches('/'));
        if let Some(query) = self.encoded_query() {
            url.push('?');
            url.push_str(&query);
        }
        Ok(url)
    }
}

fn push_segment(out: &mut String, value: &str) {
    for chunk in form_urlencoded::byte_serialize(value.as_bytes()) {
        // Form encoding turns spaces into `+`; paths need `%20`.
        if chunk == "+" {
            out.push_str("%20");
        } else {
            out.push_str(chunk);
        }
    }
}

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use crate::error::{ConfigError, DeliveryError};

/// Outbound HTTP hook fired once per matched message.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
    method: Method,
    headers: HeaderMap,
    auth: Option<(String, String)>,
}

impl WebhookClient {
    pub fn new(client: Client, url: &str, method: &str) -> Result<Self, ConfigError> {
        if url.is_empty() {
            return Err(ConfigError::MissingParameter("url"));
        }
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(method.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            method,
            headers: HeaderMap::new(),
            auth: None,
        })
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Basic auth is only sent when `user` is non-empty.
    pub fn with_basic_auth(mut self, user: &str, pass: &str) -> Self {
        self.auth = (!user.is_empty()).then(|| (user.to_string(), pass.to_string()));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request with `payload` as body (no body when empty).
    pub async fn deliver(&self, payload: &str) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }
        if !payload.is_empty() {
            request = request.body(payload.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|source| DeliveryError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                url: self.url.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue), ConfigError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidHeader(raw.to_string()))?;
    header_pair(name.trim(), value.trim())
        .ok_or_else(|| ConfigError::InvalidHeader(raw.to_string()))
}

/// Build a header map from configured name/value pairs.
pub fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let (name, value) = header_pair(name, value)
            .ok_or_else(|| ConfigError::InvalidHeader(format!("{name}: {value}")))?;
        map.append(name, value);
    }
    Ok(map)
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}

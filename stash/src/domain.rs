use bytes::Bytes;
use serde::{Deserialize, Serialize};
use shared::TtlMs;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::{Url, form_urlencoded};

/// Opaque transport-level request handle attached to a live response.
/// Never serialized; it is the part of a response that may point back at it.
pub type RequestHandle = Arc<dyn Any + Send + Sync>;

/// Header map with case-insensitive name lookup.
/// Names keep the case they were inserted with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing header with the same name in any case
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.0.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Overlay `other` on top of self; headers in `other` win
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Per-request cache directive: a flag or an explicit TTL in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheDirective {
    Enabled(bool),
    Ttl(u64),
}

impl From<bool> for CacheDirective {
    fn from(enabled: bool) -> Self {
        CacheDirective::Enabled(enabled)
    }
}

impl From<u64> for CacheDirective {
    fn from(ms: u64) -> Self {
        CacheDirective::Ttl(ms)
    }
}

impl From<TtlMs> for CacheDirective {
    fn from(ttl: TtlMs) -> Self {
        CacheDirective::Ttl(ttl.0)
    }
}

impl From<Duration> for CacheDirective {
    fn from(d: Duration) -> Self {
        CacheDirective::Ttl(TtlMs::from(d).0)
    }
}

/// Configuration of one outbound request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestConfig {
    pub method: String,
    pub url: String,
    pub base_url: Option<String>,
    pub params: Vec<(String, String)>,
    pub headers: Headers,
    pub data: Option<Bytes>,
    pub cache: Option<CacheDirective>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: "get".to_string(),
            url: String::new(),
            base_url: None,
            params: Vec::new(),
            headers: Headers::new(),
            data: None,
            cache: None,
        }
    }
}

impl RequestConfig {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("get", url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_cache(mut self, directive: impl Into<CacheDirective>) -> Self {
        self.cache = Some(directive.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("get")
    }

    /// Full request URL: base URL joined with a relative `url`, then query params
    pub fn uri(&self) -> String {
        let mut uri = match &self.base_url {
            Some(base) if !is_absolute_url(&self.url) => join_base(base, &self.url),
            _ => self.url.clone(),
        };

        if !self.params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter())
                .finish();
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&query);
        }

        uri
    }
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("//") || Url::parse(url).is_ok_and(|parsed| parsed.has_host())
}

// The base is treated as a directory, so `https://host/api` + `users` is
// `https://host/api/users`. Bases that are not absolute URLs are joined as text.
fn join_base(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return base.to_string();
    }
    let relative = relative.trim_start_matches('/');
    let directory = format!("{}/", base.trim_end_matches('/'));

    match Url::parse(&directory).and_then(|base| base.join(relative)) {
        Ok(joined) => joined.into(),
        Err(_) => format!("{}{}", directory, relative),
    }
}

/// A live response as produced by a transport or rebuilt from the cache
#[derive(Clone)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub data: Bytes,
    pub config: RequestConfig,
    pub request: Option<RequestHandle>,
}

impl Response {
    pub fn new(status: u16, data: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Headers::new(),
            data: data.into(),
            config: RequestConfig::default(),
            request: None,
        }
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_request(mut self, request: RequestHandle) -> Self {
        self.request = Some(request);
        self
    }

    /// Decode the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> shared::Result<T> {
        Ok(serde_json::from_slice(&self.data)?)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .field("data_len", &self.data.len())
            .field("config", &self.config)
            .field("request", &self.request.as_ref().map(|_| "<request>"))
            .finish()
    }
}

/// The part of the request config kept alongside a cached response
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default)]
    pub headers: Headers,
}

/// Serializable, acyclic snapshot of a response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default, with = "base64_body")]
    pub data: Bytes,
    #[serde(default)]
    pub config: StoredConfig,
}

impl From<&Response> for StoredResponse {
    // Drops the request handle and every config field but headers
    fn from(response: &Response) -> Self {
        Self {
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            data: response.data.clone(),
            config: StoredConfig {
                headers: response.config.headers.clone(),
            },
        }
    }
}

impl StoredResponse {
    /// Rebuild a live response, overlaying the incoming request config on the
    /// stored one. Incoming values win.
    pub fn into_response(self, incoming: RequestConfig) -> Response {
        let mut headers = self.config.headers;
        headers.merge(&incoming.headers);

        Response {
            status: self.status,
            status_text: self.status_text,
            headers: self.headers,
            data: self.data,
            config: RequestConfig {
                headers,
                ..incoming
            },
            request: None,
        }
    }
}

/// The unit of persistence: a stored response with its absolute expiry
///
/// `expiration` is kept as raw JSON so entries written by other producers
/// still decode. Only a numeric expiration can expire an entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<serde_json::Value>, // ms since epoch
    pub value: StoredResponse,
}

impl CacheEntry {
    pub fn new(value: StoredResponse, now_ms: u64, ttl: TtlMs) -> Self {
        Self {
            expiration: Some(now_ms.saturating_add(ttl.0).into()),
            value,
        }
    }

    /// Expiry in ms since epoch, when it is a number
    pub fn expires_at(&self) -> Option<f64> {
        self.expiration.as_ref().and_then(serde_json::Value::as_f64)
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expiration.as_ref() {
            Some(serde_json::Value::Number(n)) => match n.as_u64() {
                Some(expiration) => now_ms >= expiration,
                None => n.as_f64().is_some_and(|expiration| now_ms as f64 >= expiration),
            },
            _ => false,
        }
    }
}

mod base64_body {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

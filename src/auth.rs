use axum::http::{header, HeaderMap};

/// Allow/deny decision taken once per connection, before upgrade.
pub trait AccessGate: Send + Sync {
    fn allows(&self, token: Option<&str>) -> bool;
}

/// Admits requests carrying one shared token. With no token configured,
/// everything is admitted.
#[derive(Debug, Clone, Default)]
pub struct SharedTokenGate {
    token: Option<String>,
}

impl SharedTokenGate {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    pub fn open() -> Self {
        Self::default()
    }
}

impl AccessGate for SharedTokenGate {
    fn allows(&self, token: Option<&str>) -> bool {
        match &self.token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }
}

/// Token from the `token` query parameter, falling back to a bearer header.
pub fn request_token<'a>(query_token: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    query_token.filter(|t| !t.is_empty()).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

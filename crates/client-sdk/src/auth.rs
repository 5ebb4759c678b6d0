use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Credentials;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Query flag telling the backend not to answer with a `WWW-Authenticate`
/// challenge, so interactive clients never see a basic auth prompt.
pub const DISABLE_AUTH_WINDOW: (&str, &str) = ("disableBasicAuthWindow", "y");

pub fn basic_token(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.name, credentials.password);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Headers for a call made with `credentials`.
///
/// Missing credentials, or credentials without a name, produce an empty
/// header set rather than an error.
pub fn headers_for(credentials: Option<&Credentials>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(credentials) = credentials
        && !credentials.name.is_empty()
        && let Ok(value) = HeaderValue::from_str(&basic_token(credentials))
    {
        headers.insert(AUTHORIZATION, value);
    }

    headers
}

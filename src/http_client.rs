use crate::config::Credentials;
use anyhow::{Context, Result, ensure};
use base64::{Engine, prelude::BASE64_STANDARD};
use reqwest::{
    Client, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};

/// Create the HTTP client used for all device communication
///
/// When `credentials` are given, every request carries the same
/// `Authorization: Basic ...` header.
///
/// # Examples
/// ```no_run
/// use stairs_panel::{config::Credentials, http_client::device_http_client};
///
/// let client = device_http_client(Some(&Credentials {
///     user: "admin".to_string(),
///     password: "admin".to_string(),
/// }))
/// .expect("failed to create client");
/// ```
pub fn device_http_client(credentials: Option<&Credentials>) -> Result<Client> {
    let mut headers = HeaderMap::new();

    if let Some(credentials) = credentials {
        headers.insert(AUTHORIZATION, basic_auth_header(credentials)?);
    }

    Client::builder()
        .default_headers(headers)
        .build()
        .context("failed to create device HTTP client")
}

/// `Basic base64(user:password)` header value
pub fn basic_auth_header(credentials: &Credentials) -> Result<HeaderValue> {
    let encoded = BASE64_STANDARD.encode(format!("{}:{}", credentials.user, credentials.password));

    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .context("failed to build authorization header")?;
    value.set_sensitive(true);

    Ok(value)
}

/// Handle HTTP response by checking status and extracting body
///
/// The device signals success with exactly `200 OK`; every other status,
/// including other 2xx codes, is treated as a failure.
///
/// # Arguments
/// * `res` - The HTTP response to handle
/// * `context_msg` - Context message describing the request (e.g., "GET /get-settings")
///
/// # Returns
/// * `Ok(String)` - The response body if the status is 200
/// * `Err` - If the status is not 200 or reading the body fails
pub async fn handle_http_response(res: Response, context_msg: &str) -> Result<String> {
    let status = res.status();
    let body = res.text().await.context("failed to read response body")?;

    ensure!(
        status == StatusCode::OK,
        "{context_msg} failed with status {status} and body: {body}"
    );

    Ok(body)
}

use base64::{Engine as _, engine::general_purpose::STANDARD};

const BEARER_PREFIX: &str = "Bearer ";

/// Builds the `Authorization` header value from the raw credential.
///
/// Bearer tokens are passed through verbatim. Anything else is treated as
/// `user:password` and sent with the basic scheme.
pub fn authorization_header(credential: &str) -> String {
    if credential.starts_with(BEARER_PREFIX) {
        credential.to_string()
    } else {
        format!("Basic {}", STANDARD.encode(credential.as_bytes()))
    }
}

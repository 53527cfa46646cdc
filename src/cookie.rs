//! Cookie carrier helpers
//!
//! Minimal get/delete primitives over HTTP headers for the session
//! credential carrier. The engine only ever reads a named cookie from an
//! inbound request and clears it on an outbound response; setting the cookie
//! at login time belongs to the application.

use axum::http::{header, HeaderMap, HeaderValue};

/// Read a named cookie value from request headers.
///
/// Handles multiple `Cookie` headers and the usual `; `-separated pair list.
/// Returns the first match.
pub fn get<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k.trim() == name).then(|| v.trim())
        })
        .next()
}

/// Append a `Set-Cookie` header clearing the named cookie on the client.
///
/// Uses `Max-Age=0` with an empty value, scoped to the root path, so every
/// copy of the cookie the client holds is dropped.
pub fn delete(response: &mut HeaderMap, name: &str) {
    let value = format!("{name}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax");
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.append(header::SET_COOKIE, value);
    }
}

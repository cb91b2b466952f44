//! URL joining for API paths

/// Join an API base URL and a request path.
///
/// Trailing slashes on the base and leading slashes on the path collapse to a
/// single separator. Paths that are already absolute `http(s)://` URLs are
/// returned unchanged.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    if path.is_empty() {
        return base_url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

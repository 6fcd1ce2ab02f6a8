/// Default base URL for research service requests.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Normalize a base URL to the API root.
///
/// Normalization rules:
/// 1) empty input falls back to [`DEFAULT_API_BASE_URL`]
/// 2) trailing slashes are removed
/// 3) `/api` is appended when the path does not already end in it
pub fn normalize_api_base(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_API_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with("/api") {
        return trimmed.to_string();
    }
    format!("{trimmed}/api")
}

/// Join a normalized base with an endpoint path such as `conversations/4`.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_api_base(base),
        path.trim_start_matches('/')
    )
}

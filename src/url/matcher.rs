/// Checks if a host matches a scope pattern
///
/// - `"docs.example.com"` matches only that host
/// - `"*.example.com"` matches `example.com` and any subdomain of it
///
/// # Examples
///
/// ```
/// use site_sentinel::url::matches_wildcard;
///
/// assert!(matches_wildcard("docs.example.com", "docs.example.com"));
/// assert!(!matches_wildcard("docs.example.com", "platform.example.com"));
/// assert!(matches_wildcard("*.example.com", "platform.example.com"));
/// assert!(!matches_wildcard("*.example.com", "badexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

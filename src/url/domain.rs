use url::Url;

/// Extracts the lowercase host from a URL
///
/// Ports are not part of the result, so `localhost:8080` and `localhost:9090`
/// share a host for scope and per-host concurrency purposes.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_sentinel::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.com:8443/guide").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

use crate::UrlError;
use url::Url;

/// Query parameters that only carry campaign tracking
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Canonicalizes a URL so that equivalent references deduplicate
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https (the scheme is kept as-is)
/// 3. Require a host; the `url` crate lowercases it and drops default ports
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters (`utm_*`, `fbclid`, `gclid`, `mc_eid`)
/// 7. Sort remaining query parameters by key and drop an empty query
///
/// # Examples
///
/// ```
/// use site_sentinel::url::normalize_url;
///
/// let url = normalize_url("http://Docs.Example.COM/guide/./intro/#setup").unwrap();
/// assert_eq!(url.as_str(), "http://docs.example.com/guide/intro");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if let Some(query) = url.query().map(str::to_string) {
        let pairs = filter_and_sort_query(&query);
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&pairs.join("&")));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Drops tracking parameters and sorts the rest by key
///
/// The sort is stable so repeated keys keep their relative order.
/// Drops tracking pairs and sorts the rest by decoded key. Each kept pair
/// keeps its original text, so `?print` and `%20` survive unchanged.
fn filter_and_sort_query(query: &str) -> Vec<&str> {
    let mut pairs: Vec<(String, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let key = decode_key(pair.split_once('=').map_or(pair, |(key, _)| key));
            (!is_tracking_param(&key)).then_some((key, pair))
        })
        .collect();

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs.into_iter().map(|(_, pair)| pair).collect()
}

fn decode_key(raw: &str) -> String {
    url::form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

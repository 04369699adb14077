use url::Url;

/// Returns the politeness key for a URL: the lowercase host, plus the port when it is not
/// the scheme default
///
/// Two URLs share per-host limits and a robots.txt exactly when their host keys are equal.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::host_key;
///
/// let url = Url::parse("https://EX.com/path").unwrap();
/// assert_eq!(host_key(&url), Some("ex.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns `scheme://host[:port]` for a URL, the base used for robots.txt and sitemap.xml
pub fn origin_of(url: &Url) -> Option<String> {
    host_key(url).map(|key| format!("{}://{}", url.scheme(), key))
}

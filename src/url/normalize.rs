use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a directory base URL so page numbers can be appended positionally
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and parse; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host
/// 4. Drop the fragment
/// 5. Ensure the path ends with `/`
///
/// The query string is kept as-is and carried onto every page URL.
///
/// # Examples
///
/// ```
/// use biz_harvest::url::normalize_base_url;
///
/// let url = normalize_base_url("https://directory.example/en/search/cafes").unwrap();
/// assert_eq!(url.as_str(), "https://directory.example/en/search/cafes/");
/// ```
pub fn normalize_base_url(raw: &str) -> UrlResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Builds the URL of page `page` from a base normalized by [`normalize_base_url`]
pub fn page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    let path = format!("{}{}", base.path(), page);
    url.set_path(&path);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_trailing_slash() {
        let url = normalize_base_url("https://directory.example/en/search/cafes").unwrap();
        assert_eq!(url.path(), "/en/search/cafes/");
    }

    #[test]
    fn test_keeps_existing_trailing_slash() {
        let url = normalize_base_url("https://directory.example/en/search/cafes/").unwrap();
        assert_eq!(url.path(), "/en/search/cafes/");
    }

    #[test]
    fn test_trims_whitespace_and_fragment() {
        let url = normalize_base_url("  https://directory.example/list#top ").unwrap();
        assert_eq!(url.as_str(), "https://directory.example/list/");
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            normalize_base_url("ftp://directory.example/list"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            normalize_base_url("not a url"),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_page_url_appends_number() {
        let base = normalize_base_url("https://directory.example/en/search/cafes").unwrap();
        assert_eq!(
            page_url(&base, 7).as_str(),
            "https://directory.example/en/search/cafes/7"
        );
    }

    #[test]
    fn test_page_url_keeps_query() {
        let base = normalize_base_url("https://directory.example/search?q=bakery").unwrap();
        assert_eq!(
            page_url(&base, 2).as_str(),
            "https://directory.example/search/2?q=bakery"
        );
    }
}

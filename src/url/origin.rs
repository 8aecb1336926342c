use url::Url;

/// Returns the origin of a URL (`scheme://host[:port]/`) as a URL
///
/// Relative asset references on listing pages are resolved against this.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use biz_harvest::url::site_origin;
///
/// let url = Url::parse("https://directory.example:8443/en/category/cafes/2?x=1").unwrap();
/// assert_eq!(site_origin(&url).as_str(), "https://directory.example:8443/");
/// ```
pub fn site_origin(url: &Url) -> Url {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    let _ = origin.set_username("");
    let _ = origin.set_password(None);
    origin
}

/// Resolves an image reference found in markup to an absolute URL
///
/// # Returns
///
/// * `Ok(Some(Url))` - The reference resolved to an HTTP(S) URL
/// * `Ok(None)` - The reference is empty, inline (`data:`), or not HTTP(S)
/// * `Err(String)` - The reference could not be resolved at all
pub fn resolve_image_url(origin: &Url, raw: &str) -> Result<Option<Url>, String> {
    let raw = raw.trim();

    if raw.is_empty() || raw.starts_with("data:") {
        return Ok(None);
    }

    let resolved = origin
        .join(raw)
        .map_err(|e| format!("cannot resolve image URL '{}': {}", raw, e))?;

    if resolved.scheme() == "http" || resolved.scheme() == "https" {
        Ok(Some(resolved))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://directory.example/").unwrap()
    }

    #[test]
    fn test_origin_strips_path_and_query() {
        let url = Url::parse("https://user:pw@directory.example/a/b?c=d#e").unwrap();
        assert_eq!(site_origin(&url).as_str(), "https://directory.example/");
    }

    #[test]
    fn test_resolve_relative_path() {
        let resolved = resolve_image_url(&origin(), "/logos/42.png").unwrap();
        assert_eq!(
            resolved.unwrap().as_str(),
            "https://directory.example/logos/42.png"
        );
    }

    #[test]
    fn test_resolve_protocol_relative() {
        let resolved = resolve_image_url(&origin(), "//cdn.example/logo.jpg").unwrap();
        assert_eq!(resolved.unwrap().as_str(), "https://cdn.example/logo.jpg");
    }

    #[test]
    fn test_absolute_url_is_kept() {
        let resolved = resolve_image_url(&origin(), "http://img.example/a.png").unwrap();
        assert_eq!(resolved.unwrap().as_str(), "http://img.example/a.png");
    }

    #[test]
    fn test_empty_and_inline_are_absent() {
        assert_eq!(resolve_image_url(&origin(), "  ").unwrap(), None);
        assert_eq!(
            resolve_image_url(&origin(), "data:image/gif;base64,R0lGOD").unwrap(),
            None
        );
    }

    #[test]
    fn test_non_http_scheme_is_absent() {
        assert_eq!(
            resolve_image_url(&origin(), "javascript:void(0)").unwrap(),
            None
        );
    }

    #[test]
    fn test_unresolvable_reference_is_error() {
        assert!(resolve_image_url(&origin(), "http://[::1").is_err());
    }
}

//! Category-scoped directory URLs
//!
//! Category listings look like `.../category/<name>[/<page>][/<qualifier>...]`,
//! where qualifiers narrow the listing (for example a city). The page number
//! sits between the category name and the qualifiers, so it cannot simply be
//! appended to the end of the URL.

use crate::{UrlError, UrlResult};
use url::Url;

use super::normalize_base_url;

/// Path segments that introduce a category name
const CATEGORY_MARKERS: &[&str] = &["category", "categories"];

/// A parsed category listing URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUrl {
    /// URL whose path ends with `/<marker>/<name>/`
    prefix: Url,

    /// The category name as it appears in the URL
    name: String,

    /// Segments after the category name (and after any existing page number)
    qualifiers: Vec<String>,
}

impl CategoryUrl {
    /// Parses a category listing URL
    ///
    /// A numeric segment directly after the category name is taken to be the
    /// page the caller copied the URL from, and is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use biz_harvest::url::CategoryUrl;
    ///
    /// let url = CategoryUrl::parse("https://directory.example/en/category/pharmacies/3/cairo").unwrap();
    /// assert_eq!(url.name(), "pharmacies");
    /// assert_eq!(
    ///     url.page_url(5).as_str(),
    ///     "https://directory.example/en/category/pharmacies/5/cairo"
    /// );
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let base = normalize_base_url(raw)?;

        let segments: Vec<&str> = base.path().split('/').filter(|s| !s.is_empty()).collect();

        let marker_index = segments
            .iter()
            .position(|s| CATEGORY_MARKERS.contains(&s.to_ascii_lowercase().as_str()))
            .ok_or_else(|| UrlError::MissingCategory(base.to_string()))?;

        let name = segments
            .get(marker_index + 1)
            .ok_or_else(|| UrlError::MissingCategory(base.to_string()))?
            .to_string();

        let mut rest = &segments[marker_index + 2..];
        if rest.first().map_or(false, |s| is_page_number(s)) {
            rest = &rest[1..];
        }

        let mut prefix = base.clone();
        prefix.set_path(&format!("/{}/", segments[..marker_index + 2].join("/")));

        Ok(Self {
            prefix,
            name,
            qualifiers: rest.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// The category name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualifier segments kept after the page number
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// Builds the URL of page `page` of this category
    pub fn page_url(&self, page: u32) -> Url {
        let mut path = format!("{}{}", self.prefix.path(), page);
        for qualifier in &self.qualifiers {
            path.push('/');
            path.push_str(qualifier);
        }

        let mut url = self.prefix.clone();
        url.set_path(&path);
        url
    }
}

fn is_page_number(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_category() {
        let url = CategoryUrl::parse("https://directory.example/en/category/bakeries").unwrap();
        assert_eq!(url.name(), "bakeries");
        assert!(url.qualifiers().is_empty());
        assert_eq!(
            url.page_url(1).as_str(),
            "https://directory.example/en/category/bakeries/1"
        );
    }

    #[test]
    fn test_existing_page_number_is_replaced() {
        let url = CategoryUrl::parse("https://directory.example/category/bakeries/4/").unwrap();
        assert_eq!(
            url.page_url(9).as_str(),
            "https://directory.example/category/bakeries/9"
        );
    }

    #[test]
    fn test_location_qualifier_is_kept_after_page() {
        let url = CategoryUrl::parse("https://directory.example/category/bakeries/giza").unwrap();
        assert_eq!(url.qualifiers(), ["giza".to_string()]);
        assert_eq!(
            url.page_url(2).as_str(),
            "https://directory.example/category/bakeries/2/giza"
        );
    }

    #[test]
    fn test_multiple_qualifiers() {
        let url =
            CategoryUrl::parse("https://directory.example/category/bakeries/1/giza/dokki").unwrap();
        assert_eq!(
            url.page_url(3).as_str(),
            "https://directory.example/category/bakeries/3/giza/dokki"
        );
    }

    #[test]
    fn test_query_is_preserved() {
        let url = CategoryUrl::parse("https://directory.example/category/bakeries?sort=az").unwrap();
        assert_eq!(
            url.page_url(2).as_str(),
            "https://directory.example/category/bakeries/2?sort=az"
        );
    }

    #[test]
    fn test_missing_category_segment() {
        assert!(matches!(
            CategoryUrl::parse("https://directory.example/en/search/bakeries"),
            Err(UrlError::MissingCategory(_))
        ));
    }

    #[test]
    fn test_category_marker_without_name() {
        assert!(matches!(
            CategoryUrl::parse("https://directory.example/category/"),
            Err(UrlError::MissingCategory(_))
        ));
    }
}

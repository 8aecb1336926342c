//! URL handling module for Biz-Harvest
//!
//! This module turns the base URL a caller supplies into the sequence of page
//! URLs to visit, and resolves asset references found on those pages.

mod category;
mod normalize;
mod origin;

use crate::UrlResult;
use url::Url;

// Re-export main functions
pub use category::CategoryUrl;
pub use normalize::{normalize_base_url, page_url};
pub use origin::{resolve_image_url, site_origin};

/// How page numbers are placed into a directory URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLayout {
    /// Page number appended to the end of the base path
    Standard(Url),
    /// Page number placed after the category name, before any qualifiers
    Category(CategoryUrl),
}

impl PageLayout {
    /// Builds a standard layout from a raw base URL
    pub fn standard(raw: &str) -> UrlResult<Self> {
        normalize_base_url(raw).map(Self::Standard)
    }

    /// Builds a category layout from a raw category URL
    pub fn category(raw: &str) -> UrlResult<Self> {
        CategoryUrl::parse(raw).map(Self::Category)
    }

    /// Returns the URL of page `page`
    pub fn page_url(&self, page: u32) -> Url {
        match self {
            Self::Standard(base) => page_url(base, page),
            Self::Category(category) => category.page_url(page),
        }
    }

    /// Returns the category name for category layouts
    pub fn category_name(&self) -> Option<&str> {
        match self {
            Self::Standard(_) => None,
            Self::Category(category) => Some(category.name()),
        }
    }

    /// Returns the site origin used to resolve relative references
    pub fn origin(&self) -> Url {
        site_origin(&self.page_url(1))
    }
}

//! Listing extraction
//!
//! Turns the markup of one directory page into business records. Live markup
//! is not a trusted schema, so every listing is handled on its own: a listing
//! that cannot be read is reported as an item failure and the rest of the page
//! is still extracted.
//!
//! Each field is read by its own rule, which reports `FieldOutcome::Found`,
//! `Absent` or `Error`. Absent fields simply stay empty; an error in any rule
//! turns the whole listing into an item failure.

use crate::config::SelectorConfig;
use crate::output::ItemFailure;
use crate::storage::{BusinessRecord, DedupKey};
use crate::url::resolve_image_url;
use crate::{ConfigError, ConfigResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Result of one field rule on one listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome<T> {
    Found(T),
    Absent,
    Error(String),
}

impl<T> FieldOutcome<T> {
    /// Converts the outcome, tagging errors with the field name
    fn into_field(self, field: &str) -> Result<Option<T>, String> {
        match self {
            Self::Found(value) => Ok(Some(value)),
            Self::Absent => Ok(None),
            Self::Error(message) => Err(format!("{}: {}", field, message)),
        }
    }
}

/// Where the page being extracted came from
#[derive(Debug, Clone)]
pub struct ExtractionContext<'a> {
    pub page: u32,
    /// Site origin that relative image references resolve against
    pub origin: &'a Url,
    /// Stamped on every record of a category scrape
    pub category: Option<&'a str>,
    pub scraped_at: DateTime<Utc>,
}

/// Everything extracted from one page
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// Accepted records whose key was not known yet, in document order
    pub records: Vec<BusinessRecord>,
    pub item_errors: Vec<ItemFailure>,
    /// Acceptable listings whose key was already known
    pub duplicates: usize,
    /// Listings dropped by the minimum-field rule
    pub invalid: usize,
    pub advertisements: usize,
}

impl PageExtraction {
    /// Acceptable listings seen on the page, new or not
    pub fn candidates(&self) -> usize {
        self.records.len() + self.duplicates
    }
}

#[derive(Debug)]
struct ListingFields {
    name: String,
    address: String,
    phone: String,
    image_url: Option<String>,
    verified: bool,
}

/// Extracts listings using the configured selectors
#[derive(Debug)]
pub struct Extractor {
    listing: Selector,
    advertisement: Selector,
    name: Selector,
    address: Selector,
    phone_icon: Selector,
    image: Selector,
    background_image: Selector,
    verified: Selector,
    background_url: Regex,
}

impl Extractor {
    /// Compiles the selectors
    ///
    /// # Returns
    ///
    /// * `Ok(Extractor)` - Every selector parsed
    /// * `Err(ConfigError::InvalidSelector)` - The first selector that did not
    pub fn new(config: &SelectorConfig) -> ConfigResult<Self> {
        let background_url = Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(Self {
            listing: compile(&config.listing)?,
            advertisement: compile(&config.advertisement)?,
            name: compile(&config.name)?,
            address: compile(&config.address)?,
            phone_icon: compile(&config.phone_icon)?,
            image: compile(&config.image)?,
            background_image: compile(&config.background_image)?,
            verified: compile(&config.verified)?,
            background_url,
        })
    }

    /// Extracts the new records of one page
    ///
    /// Listings whose key is in `known`, or that repeat a key seen earlier on
    /// the same page, are counted as duplicates and never built into records.
    ///
    /// # Arguments
    ///
    /// * `markup` - Raw page markup
    /// * `context` - Page number, origin and category
    /// * `known` - Keys already in the dataset or accepted earlier in the run
    pub fn extract(
        &self,
        markup: &str,
        context: &ExtractionContext<'_>,
        known: &HashSet<DedupKey>,
    ) -> PageExtraction {
        let document = Html::parse_document(markup);
        let mut extraction = PageExtraction::default();
        let mut seen_on_page = HashSet::new();

        for (index, node) in document.select(&self.listing).enumerate() {
            if self.is_advertisement(node) {
                extraction.advertisements += 1;
                continue;
            }

            let fields = match self.read_listing(node, context.origin) {
                Ok(fields) => fields,
                Err(message) => {
                    extraction.item_errors.push(ItemFailure {
                        page: context.page,
                        message: format!("Listing {}: {}", index + 1, message),
                    });
                    continue;
                }
            };

            if fields.name.is_empty() || (fields.address.is_empty() && fields.phone.is_empty()) {
                extraction.invalid += 1;
                continue;
            }

            let key = DedupKey::new(&fields.name, &fields.address);
            if known.contains(&key) || !seen_on_page.insert(key) {
                extraction.duplicates += 1;
                continue;
            }

            extraction.records.push(BusinessRecord {
                name: fields.name,
                address: fields.address,
                phone: fields.phone,
                image_url: fields.image_url,
                verified: fields.verified,
                category: context.category.map(str::to_string),
                source_page: context.page,
                date_scraped: context.scraped_at,
            });
        }

        extraction
    }

    fn is_advertisement(&self, node: ElementRef<'_>) -> bool {
        self.advertisement.matches(&node) || node.select(&self.advertisement).next().is_some()
    }

    /// Applies the field rules in order
    fn read_listing(&self, node: ElementRef<'_>, origin: &Url) -> Result<ListingFields, String> {
        let name = self.text_of(node, &self.name).into_field("name")?;
        let address = self.text_of(node, &self.address).into_field("address")?;
        let phone = self.phone(node).into_field("phone")?;
        let image_url = self.image(node, origin).into_field("image")?;
        let verified = self.verified(node).into_field("verified")?;

        Ok(ListingFields {
            name: name.unwrap_or_default(),
            address: address.unwrap_or_default(),
            phone: phone.unwrap_or_default(),
            image_url,
            verified: verified.unwrap_or(false),
        })
    }

    fn text_of(&self, node: ElementRef<'_>, selector: &Selector) -> FieldOutcome<String> {
        match node.select(selector).next() {
            Some(element) => non_empty(collapse_whitespace(element.text())),
            None => FieldOutcome::Absent,
        }
    }

    /// The number sits in the element wrapping the phone icon
    ///
    /// When the icon sits directly in the listing, only the text right after
    /// the icon is read.
    fn phone(&self, node: ElementRef<'_>) -> FieldOutcome<String> {
        let Some(icon) = node.select(&self.phone_icon).next() else {
            return FieldOutcome::Absent;
        };

        match icon.parent().and_then(ElementRef::wrap) {
            Some(holder) if holder.id() == node.id() => {
                let trailing = icon
                    .next_siblings()
                    .map_while(|sibling| sibling.value().as_text().map(|text| &**text));
                non_empty(collapse_whitespace(trailing))
            }
            Some(holder) => non_empty(collapse_whitespace(holder.text())),
            None => FieldOutcome::Error("phone icon has no enclosing element".to_string()),
        }
    }

    /// Image attribute first, then a CSS `background-image`
    fn image(&self, node: ElementRef<'_>, origin: &Url) -> FieldOutcome<String> {
        let mut references = Vec::new();

        if let Some(img) = node.select(&self.image).next() {
            references.extend(
                ["src", "data-src"]
                    .iter()
                    .filter_map(|attr| img.value().attr(attr)),
            );
        }

        let styled = std::iter::once(node).chain(node.select(&self.background_image));
        for element in styled {
            if let Some(style) = element.value().attr("style") {
                if let Some(captures) = self.background_url.captures(style) {
                    if let Some(m) = captures.get(1) {
                        references.push(m.as_str());
                    }
                }
            }
        }

        for reference in references {
            match resolve_image_url(origin, reference) {
                Ok(Some(url)) => return FieldOutcome::Found(url.to_string()),
                Ok(None) => continue,
                Err(message) => return FieldOutcome::Error(message),
            }
        }

        FieldOutcome::Absent
    }

    fn verified(&self, node: ElementRef<'_>) -> FieldOutcome<bool> {
        FieldOutcome::Found(node.select(&self.verified).next().is_some())
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Joins text nodes with a space, trimming and collapsing runs of whitespace
///
/// Text split by `<br>` or by sibling elements stays word-separated.
fn collapse_whitespace<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> FieldOutcome<String> {
    if text.is_empty() {
        FieldOutcome::Absent
    } else {
        FieldOutcome::Found(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> Extractor {
        Extractor::new(&SelectorConfig::default()).unwrap()
    }

    fn origin() -> Url {
        Url::parse("https://directory.example/").unwrap()
    }

    fn context(origin: &Url) -> ExtractionContext<'_> {
        ExtractionContext {
            page: 2,
            origin,
            category: None,
            scraped_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap(),
        }
    }

    fn listing(inner: &str) -> String {
        format!(r#"<div class="listing">{}</div>"#, inner)
    }

    fn page(listings: &[String]) -> String {
        format!("<html><body>{}</body></html>", listings.concat())
    }

    #[test]
    fn test_extracts_all_fields() {
        let markup = page(&[listing(
            r#"<h3 class="listing-name"><a href="/b/1">  Nile
                 Bakery </a></h3>
               <div class="listing-address">12 Tahrir St,   Cairo</div>
               <span><i class="fa-phone"></i> 0100 123 4567 </span>
               <img class="listing-logo" src="/logos/nile.png">
               <span class="verified-badge"></span>"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.records.len(), 1);
        let record = &result.records[0];
        assert_eq!(record.name, "Nile Bakery");
        assert_eq!(record.address, "12 Tahrir St, Cairo");
        assert_eq!(record.phone, "0100 123 4567");
        assert_eq!(
            record.image_url.as_deref(),
            Some("https://directory.example/logos/nile.png")
        );
        assert!(record.verified);
        assert_eq!(record.source_page, 2);
        assert_eq!(record.category, None);
    }

    #[test]
    fn test_phone_requires_icon() {
        let markup = page(&[listing(
            r#"<div class="listing-name">Corner Shop</div>
               <div class="listing-address">5 Nile St</div>
               <span>0100 000 0000</span>"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.records[0].phone, "");
        assert!(!result.records[0].verified);
    }

    #[test]
    fn test_background_image_fallback() {
        let markup = page(&[listing(
            r#"<div class="listing-name">Cafe Riche</div>
               <div class="listing-address">17 Talaat Harb</div>
               <div class="thumb" style="background-image: url('https://cdn.example/riche.jpg')"></div>"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(
            result.records[0].image_url.as_deref(),
            Some("https://cdn.example/riche.jpg")
        );
    }

    #[test]
    fn test_inline_placeholder_falls_back_to_data_src() {
        let markup = page(&[listing(
            r#"<div class="listing-name">Lazy Logo</div>
               <div class="listing-address">1 Lazy Rd</div>
               <img class="listing-logo" src="data:image/gif;base64,R0lGOD" data-src="img/lazy.png">"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(
            result.records[0].image_url.as_deref(),
            Some("https://directory.example/img/lazy.png")
        );
    }

    #[test]
    fn test_advertisements_are_skipped() {
        let markup = page(&[
            r#"<div class="listing sponsored"><div class="listing-name">Ad Co</div><div class="listing-address">X</div></div>"#.to_string(),
            listing(r#"<div class="listing-name">Real Co</div><div class="listing-address">Y</div>"#),
        ]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.advertisements, 1);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].name, "Real Co");
    }

    #[test]
    fn test_listing_without_contact_is_dropped_silently() {
        let markup = page(&[listing(r#"<div class="listing-name">Ghost LLC</div>"#)]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert!(result.records.is_empty());
        assert!(result.item_errors.is_empty());
        assert_eq!(result.invalid, 1);
        assert_eq!(result.candidates(), 0);
    }

    #[test]
    fn test_known_and_repeated_keys_are_duplicates() {
        let markup = page(&[
            listing(r#"<div class="listing-name">Known</div><div class="listing-address">1 A St</div>"#),
            listing(r#"<div class="listing-name">Fresh</div><div class="listing-address">2 B St</div>"#),
            listing(r#"<div class="listing-name">Fresh</div><div class="listing-address">2 B St</div>"#),
            listing(r#"<div class="listing-name">Fresh</div><div class="listing-address">3 C St</div>"#),
        ]);
        let known: HashSet<_> = [DedupKey::new("Known", "1 A St")].into_iter().collect();
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &known);

        let names: Vec<_> = result
            .records
            .iter()
            .map(|r| (r.name.as_str(), r.address.as_str()))
            .collect();
        assert_eq!(names, vec![("Fresh", "2 B St"), ("Fresh", "3 C St")]);
        assert_eq!(result.duplicates, 2);
        assert_eq!(result.candidates(), 4);
    }

    #[test]
    fn test_bad_image_reference_is_an_item_error() {
        let markup = page(&[
            listing(
                r#"<div class="listing-name">Broken</div>
                   <div class="listing-address">1 X St</div>
                   <img class="listing-logo" src="https://[::1">"#,
            ),
            listing(r#"<div class="listing-name">Fine</div><div class="listing-address">2 Y St</div>"#),
        ]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].name, "Fine");
        assert_eq!(result.item_errors.len(), 1);
        assert_eq!(result.item_errors[0].page, 2);
        assert!(result.item_errors[0].message.starts_with("Listing 1: image:"));
    }

    #[test]
    fn test_category_is_stamped() {
        let markup = page(&[listing(
            r#"<div class="listing-name">Gym One</div><div class="listing-address">9 Sporting</div>"#,
        )]);
        let origin = origin();
        let ctx = ExtractionContext {
            category: Some("gyms"),
            ..context(&origin)
        };

        let result = extractor().extract(&markup, &ctx, &HashSet::new());

        assert_eq!(result.records[0].category.as_deref(), Some("gyms"));
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let config = SelectorConfig {
            name: "div[[".to_string(),
            ..SelectorConfig::default()
        };
        assert!(matches!(
            Extractor::new(&config),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_line_breaks_and_child_elements_keep_words_apart() {
        let markup = page(&[listing(
            r#"<div class="listing-name"><span>Nile</span><span>Bakery</span></div>
               <div class="listing-address">12 Tahrir St<br>Cairo</div>"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].name, "Nile Bakery");
        assert_eq!(result.records[0].address, "12 Tahrir St Cairo");
    }

    #[test]
    fn test_phone_icon_directly_inside_listing() {
        let markup = page(&[listing(
            r#"<div class="listing-name">Nile Bakery</div>
               <div class="listing-address">12 Tahrir St</div>
               <i class="fa-phone"></i> 0100 123 4567
               <span class="verified-badge"></span>"#,
        )]);
        let origin = origin();

        let result = extractor().extract(&markup, &context(&origin), &HashSet::new());

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].phone, "0100 123 4567");
        assert!(result.records[0].verified);
    }

    #[test]
    fn test_field_outcome_tags_errors() {
        let outcome: FieldOutcome<String> = FieldOutcome::Error("boom".into());
        assert_eq!(outcome.into_field("phone"), Err("phone: boom".to_string()));
        assert_eq!(FieldOutcome::<String>::Absent.into_field("phone"), Ok(None));
    }
}

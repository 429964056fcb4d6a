//! DOM extraction driven by ordered selector strategies.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so callers
//! fetch page content first and parse it without holding it across an await.

use phonedb_core::SelectorStrategy;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;

/// Per-card field selectors used when a strategy leaves a field unset.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelectors<'a> {
    pub title: &'a str,
    pub price: &'a str,
    pub link: &'a str,
    pub image: &'a str,
    /// Attributes probed in order for the image URL.
    pub image_attrs: &'a [&'a str],
    pub location: Option<&'a str>,
}

/// Raw text pulled out of one listing card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub title: String,
    pub price_text: String,
    pub link: Option<String>,
    pub image: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default)]
pub struct Extraction {
    /// Container selector of the strategy that matched, if any did.
    pub strategy: Option<String>,
    /// Elements matched by that container selector.
    pub matched: usize,
    /// Cards with a non-empty title.
    pub cards: Vec<Card>,
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|_| ScraperError::Selector {
        selector: selector.to_string(),
    })
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve `href` against `base_url`; absolute URLs pass through.
#[must_use]
pub fn resolve_url(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("data:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(String::from)
}

fn first_text(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .map(|el| element_text(&el))
        .find(|t| !t.is_empty())
}

/// Apply `strategies` in order; the first container selector that matches at
/// least one element is used for the whole page.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if any selector fails to parse.
pub fn extract_cards(
    html: &str,
    strategies: &[SelectorStrategy],
    defaults: &FieldSelectors<'_>,
    base_url: &str,
) -> Result<Extraction, ScraperError> {
    let document = Html::parse_document(html);

    for strategy in strategies {
        let container = parse_selector(&strategy.container)?;
        let elements: Vec<ElementRef<'_>> = document.select(&container).collect();
        if elements.is_empty() {
            continue;
        }

        let title_sel = parse_selector(strategy.title.as_deref().unwrap_or(defaults.title))?;
        let price_sel = parse_selector(strategy.price.as_deref().unwrap_or(defaults.price))?;
        let link_sel = parse_selector(strategy.link.as_deref().unwrap_or(defaults.link))?;
        let image_sel = parse_selector(strategy.image.as_deref().unwrap_or(defaults.image))?;
        let location_sel = strategy
            .location
            .as_deref()
            .or(defaults.location)
            .map(parse_selector)
            .transpose()?;

        let matched = elements.len();
        let cards = elements
            .iter()
            .filter_map(|el| {
                let title = first_text(el, &title_sel)?;
                let price_text = first_text(el, &price_sel).unwrap_or_default();
                let link = el
                    .select(&link_sel)
                    .find_map(|a| a.value().attr("href"))
                    .or_else(|| el.value().attr("href"))
                    .and_then(|href| resolve_url(base_url, href));
                let image = el.select(&image_sel).next().and_then(|img| {
                    defaults
                        .image_attrs
                        .iter()
                        .filter_map(|attr| img.value().attr(attr))
                        .find(|v| !v.trim().is_empty())
                        .and_then(|src| resolve_url(base_url, src))
                });
                let location = location_sel
                    .as_ref()
                    .and_then(|sel| first_text(el, sel));
                Some(Card {
                    title,
                    price_text,
                    link,
                    image,
                    location,
                })
            })
            .collect();

        tracing::debug!(container = %strategy.container, matched, "selector strategy matched");
        return Ok(Extraction {
            strategy: Some(strategy.container.clone()),
            matched,
            cards,
        });
    }

    Ok(Extraction::default())
}

/// `true` when a "next page" control exists and is not disabled.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if `selector` fails to parse.
pub fn has_enabled_control(html: &str, selector: &str) -> Result<bool, ScraperError> {
    let document = Html::parse_document(html);
    let sel = parse_selector(selector)?;
    Ok(document.select(&sel).next().is_some_and(|el| {
        let value = el.value();
        value.attr("disabled").is_none()
            && value.attr("aria-disabled") != Some("true")
            && !value.classes().any(|c| c == "disabled")
    }))
}

/// Build strategies that only name a container.
pub(crate) fn containers(selectors: &[&str]) -> Vec<SelectorStrategy> {
    selectors
        .iter()
        .map(|container| SelectorStrategy {
            container: (*container).to_string(),
            title: None,
            price: None,
            link: None,
            image: None,
            location: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: FieldSelectors<'static> = FieldSelectors {
        title: ".title",
        price: ".price",
        link: "a",
        image: "img",
        image_attrs: &["src", "data-src"],
        location: Some(".loc"),
    };

    #[test]
    fn first_matching_strategy_wins() {
        let html = r#"
            <div class="b"><span class="title">B1</span></div>
            <div class="c"><span class="title">C1</span></div>
            <div class="c"><span class="title">C2</span></div>
        "#;
        let strategies = containers(&[".a", ".b", ".c"]);
        let out = extract_cards(html, &strategies, &FIELDS, "https://m.test").unwrap();
        assert_eq!(out.strategy.as_deref(), Some(".b"));
        assert_eq!(out.cards.len(), 1);
        assert_eq!(out.cards[0].title, "B1");
    }

    #[test]
    fn cards_without_title_are_dropped() {
        let html = r#"
            <article><span class="title">  Galaxy   S21 </span><span class="price">90 000 DA</span></article>
            <article><span class="price">12 000 DA</span></article>
        "#;
        let out = extract_cards(html, &containers(&["article"]), &FIELDS, "https://m.test").unwrap();
        assert_eq!(out.matched, 2);
        assert_eq!(out.cards.len(), 1);
        assert_eq!(out.cards[0].title, "Galaxy S21");
        assert_eq!(out.cards[0].price_text, "90 000 DA");
    }

    #[test]
    fn relative_urls_are_resolved() {
        let html = r#"
            <article>
              <a href="/annonce/123"><span class="title">iPhone 12</span></a>
              <img data-src="//cdn.m.test/p.jpg">
              <span class="loc">Alger</span>
            </article>
        "#;
        let out = extract_cards(html, &containers(&["article"]), &FIELDS, "https://m.test").unwrap();
        let card = &out.cards[0];
        assert_eq!(card.link.as_deref(), Some("https://m.test/annonce/123"));
        assert_eq!(card.image.as_deref(), Some("https://cdn.m.test/p.jpg"));
        assert_eq!(card.location.as_deref(), Some("Alger"));
    }

    #[test]
    fn container_href_is_used_when_no_inner_link() {
        let html = r#"<a class="card" href="https://m.test/annonce/9"><span class="title">Redmi</span></a>"#;
        let out = extract_cards(html, &containers(&["a.card"]), &FIELDS, "https://m.test").unwrap();
        assert_eq!(out.cards[0].link.as_deref(), Some("https://m.test/annonce/9"));
    }

    #[test]
    fn strategy_field_overrides_defaults() {
        let html = r#"<li class="x"><h3>Nokia 105</h3><b>4500</b></li>"#;
        let strategies = vec![SelectorStrategy {
            container: "li.x".to_string(),
            title: Some("h3".to_string()),
            price: Some("b".to_string()),
            link: None,
            image: None,
            location: None,
        }];
        let out = extract_cards(html, &strategies, &FIELDS, "https://m.test").unwrap();
        assert_eq!(out.cards[0].title, "Nokia 105");
        assert_eq!(out.cards[0].price_text, "4500");
    }

    #[test]
    fn no_match_yields_empty_extraction() {
        let out = extract_cards("<p>nothing</p>", &containers(&[".a"]), &FIELDS, "https://m.test").unwrap();
        assert!(out.strategy.is_none());
        assert!(out.cards.is_empty());
    }

    #[test]
    fn invalid_selector_is_an_error() {
        let result = extract_cards("<p></p>", &containers(&["[[["]), &FIELDS, "https://m.test");
        assert!(matches!(result, Err(ScraperError::Selector { .. })));
    }

    #[test]
    fn next_control_detection() {
        let enabled = r#"<a aria-label="Next Page" href="?page=2">›</a>"#;
        let disabled = r#"<a aria-label="Next Page" class="pg disabled">›</a>"#;
        let sel = r#"a[aria-label="Next Page"]"#;
        assert!(has_enabled_control(enabled, sel).unwrap());
        assert!(!has_enabled_control(disabled, sel).unwrap());
        assert!(!has_enabled_control("<div></div>", sel).unwrap());
    }

    #[test]
    fn resolve_url_rejects_script_links() {
        assert_eq!(resolve_url("https://m.test", "javascript:void(0)"), None);
        assert_eq!(resolve_url("https://m.test", "  "), None);
        assert_eq!(
            resolve_url("https://www.ouedkniss.com", "/annonce/1"),
            Some("https://www.ouedkniss.com/annonce/1".to_string())
        );
    }
}

//! Turns a fetched page into candidate listings
//!
//! Every `<a>` element becomes a candidate, in document order. The monitor's
//! one-notification-per-site cap relies on that order, so nothing here sorts or
//! de-duplicates.

use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use crate::error::ParseError;
use crate::models::Listing;
use crate::text::parse_price;

/// Elements whose text is never visible on the rendered page.
const INVISIBLE_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Extracts listings from `html`, resolving links against `base_url`.
///
/// Links without visible text, without an `href`, or resolving to anything
/// other than http/https are skipped one by one.
pub fn extract(html: &str, base_url: &str) -> Result<Vec<Listing>, ParseError> {
    let base = Url::parse(base_url).map_err(|source| ParseError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;

    let link_selector = Selector::parse("a").map_err(|e| ParseError::Selector {
        selector: "a".to_string(),
        message: format!("{e:?}"),
    })?;

    let document = Html::parse_document(html);
    let mut listings = Vec::new();

    for link in document.select(&link_selector) {
        let title = visible_text(link);
        if title.is_empty() {
            continue;
        }

        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let url = match base.join(href.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                debug!("Skipping non-http link {} on {}", url, base_url);
                continue;
            }
            Err(e) => {
                debug!("Skipping unresolvable link {:?} on {}: {}", href, base_url, e);
                continue;
            }
        };

        let context = link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| surrounding_text(parent, link))
            .unwrap_or_default();
        let price = parse_price(&context);

        listings.push(Listing {
            site: base_url.to_string(),
            title,
            url: url.to_string(),
            context,
            price,
        });
    }

    debug!("Extracted {} candidate listings from {}", listings.len(), base_url);
    Ok(listings)
}

/// Visible text of an element: trimmed text nodes joined by single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, None, &mut parts);
    parts.join(" ")
}

/// Visible text of `parent` without the text of `link` itself, so digits in
/// the link text ("2 camere") never leak into the price.
fn surrounding_text(parent: ElementRef<'_>, link: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(parent, Some(link), &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(
    element: ElementRef<'a>,
    skip: Option<ElementRef<'a>>,
    parts: &mut Vec<&'a str>,
) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let skipped = skip.is_some_and(|s| s == child_element);
            if !skipped && !INVISIBLE_ELEMENTS.contains(&child_element.value().name()) {
                collect_text(child_element, skip, parts);
            }
        } else if let Node::Text(text) = child.value() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://anunturi.example.ro/imobiliare/";

    #[test]
    fn keeps_document_order_and_context() {
        let html = r#"
            <html><body>
              <div class="ad"><a href="/ad/1">Apartament 2 camere</a><span>Preț 90000 lei</span></div>
              <div class="ad"><a href="https://other.example.com/ad/2">Garsoniera</a> <b>Preț 50000</b></div>
            </body></html>
        "#;

        let listings = extract(html, BASE).unwrap();

        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, "Apartament 2 camere");
        assert_eq!(listings[0].url, "https://anunturi.example.ro/ad/1");
        assert_eq!(listings[0].context, "Preț 90000 lei");
        assert_eq!(listings[0].price, Some(90000));
        assert_eq!(listings[0].site, BASE);
        assert_eq!(listings[1].url, "https://other.example.com/ad/2");
        assert_eq!(listings[1].context, "Preț 50000");
        assert_eq!(listings[1].price, Some(50000));
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let html = r#"<p><a href="oferta?id=7">Oferta</a></p>"#;
        let listings = extract(html, BASE).unwrap();

        assert_eq!(
            listings[0].url,
            "https://anunturi.example.ro/imobiliare/oferta?id=7"
        );
    }

    #[test]
    fn skips_links_without_text_or_href() {
        let html = r#"
            <div><a href="/a"><img src="x.png"></a></div>
            <div><a name="anchor">Named</a></div>
            <div><a href="/b">  </a></div>
            <div><a href="/c">Real</a></div>
        "#;

        let listings = extract(html, BASE).unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Real");
    }

    #[test]
    fn skips_non_http_schemes() {
        let html = r#"
            <a href="mailto:sales@example.ro">Mail us</a>
            <a href="javascript:void(0)">Open</a>
            <a href="tel:0700000000">Call</a>
            <a href="http://plain.example.ro/x">Plain</a>
        "#;

        let listings = extract(html, BASE).unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].url, "http://plain.example.ro/x");
    }

    #[test]
    fn does_not_deduplicate() {
        let html = r#"<a href="/same">One</a><a href="/same">Two</a>"#;
        assert_eq!(extract(html, BASE).unwrap().len(), 2);
    }

    #[test]
    fn context_ignores_script_text() {
        let html = r#"<div><a href="/x">Casa</a><script>var p = 123;</script> 75000 EUR</div>"#;
        let listings = extract(html, BASE).unwrap();

        assert_eq!(listings[0].context, "75000 EUR");
        assert_eq!(listings[0].price, Some(75000));
    }

    #[test]
    fn invalid_base_url_is_a_parse_error() {
        assert!(matches!(
            extract("<a href='/x'>x</a>", "not a url"),
            Err(ParseError::InvalidBaseUrl { .. })
        ));
    }
}

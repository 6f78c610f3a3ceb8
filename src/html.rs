//! Small helpers shared by the page parsers.

use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a selector literal. Only ever called with constant CSS.
pub(crate) fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {}", css, e))
}

/// Element text with whitespace runs collapsed, roughly what a browser's
/// `innerText` reports for inline content.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match below `element`.
pub(crate) fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(text_of)
}

/// Texts of every match below `element`, in document order.
pub(crate) fn all_texts(element: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    element.select(selector).map(text_of).collect()
}

/// The next sibling that is an element.
pub(crate) fn next_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

pub(crate) fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Resolves `href` against `base`; unparsable input is returned as is.
pub(crate) fn resolve(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn text_is_collapsed() {
        let doc = Html::parse_fragment("<p>  Hello\n   <b>big</b>  world </p>");
        let p = doc.select(&sel("p")).next().unwrap();
        assert_eq!(text_of(p), "Hello big world");
    }

    #[test]
    fn relative_links_resolve() {
        assert_eq!(
            resolve("https://www.mobygames.com", "/game/1/pong/"),
            "https://www.mobygames.com/game/1/pong/"
        );
        assert_eq!(
            resolve("https://www.mobygames.com", "https://cdn.example/a.jpg"),
            "https://cdn.example/a.jpg"
        );
    }
}

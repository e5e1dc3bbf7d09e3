use crate::extract::normalize_ws;
use scraper::{ElementRef, Node};

/// Elements whose text never renders
const HIDDEN: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Whitespace-normalized text of `element`, excluding script and style content
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    normalize_ws(&parts.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => parts.push(text),
            Node::Element(el) if HIDDEN.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}

/// Number of element descendants of `element`
pub(crate) fn element_count(element: ElementRef<'_>) -> usize {
    element
        .descendants()
        .skip(1)
        .filter(|node| node.value().is_element())
        .count()
}

fn is_css_ident(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A CSS selector addressing exactly `element`
///
/// Walks up from the element until an ancestor with a usable `id` (or the
/// root) is reached, e.g. `#main > div:nth-child(2) > article:nth-child(1)`.
pub fn css_path(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        let name = el.value().name();
        if let Some(id) = el.value().id().filter(|id| is_css_ident(id)) {
            parts.push(format!("#{}", id));
            break;
        }
        if name == "html" {
            parts.push(name.to_string());
            break;
        }

        let position = el
            .prev_siblings()
            .filter(|sibling| sibling.value().is_element())
            .count()
            + 1;
        parts.push(format!("{}:nth-child({})", name, position));
        current = el.parent().and_then(ElementRef::wrap);
    }

    parts.reverse();
    parts.join(" > ")
}

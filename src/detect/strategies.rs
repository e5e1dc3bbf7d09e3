//! Strategies of the detection chain. Each one either locates a region or
//! declines; none of them fail.

use super::dom::{css_path, element_count, visible_text};
use super::{ContentDetector, ContentRegion, DetectionStrategy, RegionTarget};
use scraper::{ElementRef, Html, Selector};

fn text_length(element: ElementRef<'_>) -> usize {
    visible_text(element).chars().count()
}

/// Targets `element`, preferring the configured selector when the element
/// is its first match
fn target_for(element: ElementRef<'_>, css: &str, position: usize) -> RegionTarget {
    if position == 0 {
        RegionTarget::Selector(css.to_string())
    } else {
        RegionTarget::Selector(css_path(element))
    }
}

/// First element, across `selectors` in order, whose text is longer than
/// `min_text`; with no minimum any match is taken, text or not
fn first_match(
    document: &Html,
    selectors: &[(String, Selector)],
    min_text: Option<usize>,
    strategy: DetectionStrategy,
) -> Option<ContentRegion> {
    for (css, selector) in selectors {
        for (position, element) in document.select(selector).enumerate() {
            let length = text_length(element);
            if min_text.map_or(true, |min| length > min) {
                return Some(ContentRegion {
                    target: target_for(element, css, position),
                    strategy,
                    text_length: length,
                });
            }
        }
    }
    None
}

/// Selectors registered for the page's domain; any non-empty match wins
pub(super) fn domain_specific(
    detector: &ContentDetector,
    document: &Html,
    domain: &str,
) -> Option<ContentRegion> {
    let selectors = detector.domain_selectors(domain)?;
    first_match(document, selectors, None, DetectionStrategy::DomainSpecific)
}

/// Common article containers holding enough text
pub(super) fn generic_patterns(
    detector: &ContentDetector,
    document: &Html,
    _domain: &str,
) -> Option<ContentRegion> {
    first_match(
        document,
        &detector.generic,
        Some(detector.generic_min_text),
        DetectionStrategy::GenericPattern,
    )
}

/// Scores block-level candidates by text per element plus a paragraph bonus
pub(super) fn text_density(
    detector: &ContentDetector,
    document: &Html,
    _domain: &str,
) -> Option<ContentRegion> {
    let density = &detector.density;
    let candidates = detector.candidates.as_ref()?;
    let paragraph = detector.paragraph.as_ref()?;

    let mut best: Option<(f64, usize, ElementRef<'_>)> = None;
    for element in document.select(candidates) {
        let length = text_length(element);
        let paragraphs = element.select(paragraph).count();
        if length < density.min_text_length && paragraphs < density.min_paragraphs {
            continue;
        }

        let score = length as f64 / (element_count(element) + 1) as f64
            + density.paragraph_weight * paragraphs as f64;
        if best.as_ref().map_or(true, |(top, _, _)| score > *top) {
            best = Some((score, length, element));
        }
    }

    let (score, length, element) = best?;
    if score < density.score_floor {
        tracing::trace!("Densest block scored {:.1}, below the floor", score);
        return None;
    }

    Some(ContentRegion {
        target: RegionTarget::Selector(css_path(element)),
        strategy: DetectionStrategy::TextDensity,
        text_length: length,
    })
}

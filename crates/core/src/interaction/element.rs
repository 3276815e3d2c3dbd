//! Click targets and containment checks.
//!
//! A click target is described by its ancestor chain, target first. The
//! containment check walks that chain the same way `Element.closest` does, so
//! a click on a button nested inside a `[data-card-id]` card counts as a click
//! inside the card.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Element
// =============================================================================

/// A single node of a rendered view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Ancestor chain of a click target, ordered from the target up to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPath(Vec<Element>);

impl ElementPath {
    pub fn new(target: Element) -> Self {
        Self(vec![target])
    }

    /// Appends `parent` as the next ancestor of the current chain.
    pub fn within(mut self, parent: Element) -> Self {
        self.0.push(parent);
        self
    }

    /// The element that was actually clicked.
    pub fn target(&self) -> Option<&Element> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.0.iter()
    }

    /// First element in the chain, starting at the target, that matches `selector`.
    pub fn closest(&self, selector: &Selector) -> Option<&Element> {
        self.0.iter().find(|el| selector.matches(el))
    }
}

impl From<Vec<Element>> for ElementPath {
    fn from(elements: Vec<Element>) -> Self {
        Self(elements)
    }
}

// =============================================================================
// Selector
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Selector is empty")]
    Empty,
    #[error("Unsupported selector syntax: {0}")]
    Unsupported(String),
}

/// The subset of CSS simple selectors used to tag interactive regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Tag(String),
    Id(String),
    Class(String),
    Attribute { name: String, value: Option<String> },
}

impl Selector {
    pub fn attribute(name: impl Into<String>) -> Self {
        Selector::Attribute {
            name: name.into(),
            value: None,
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Selector::Tag(tag) => element.tag.eq_ignore_ascii_case(tag),
            Selector::Id(id) => element.id.as_deref() == Some(id.as_str()),
            Selector::Class(class) => element.classes.iter().any(|c| c == class),
            Selector::Attribute { name, value } => match (element.attr(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            },
        }
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(SelectorError::Empty);
        }
        let unsupported = || SelectorError::Unsupported(raw.to_string());

        if let Some(id) = s.strip_prefix('#') {
            return is_ident(id)
                .then(|| Selector::Id(id.to_string()))
                .ok_or_else(unsupported);
        }
        if let Some(class) = s.strip_prefix('.') {
            return is_ident(class)
                .then(|| Selector::Class(class.to_string()))
                .ok_or_else(unsupported);
        }
        if let Some(body) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (name, value) = match body.split_once('=') {
                Some((name, value)) => (name.trim(), Some(unquote(value).to_string())),
                None => (body.trim(), None),
            };
            if !is_ident(name) {
                return Err(unsupported());
            }
            return Ok(Selector::Attribute {
                name: name.to_string(),
                value,
            });
        }
        if is_ident(s) {
            return Ok(Selector::Tag(s.to_ascii_lowercase()));
        }
        Err(unsupported())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Tag(tag) => write!(f, "{tag}"),
            Selector::Id(id) => write!(f, "#{id}"),
            Selector::Class(class) => write!(f, ".{class}"),
            Selector::Attribute { name, value: None } => write!(f, "[{name}]"),
            Selector::Attribute {
                name,
                value: Some(value),
            } => write!(f, "[{name}=\"{value}\"]"),
        }
    }
}

// =============================================================================
// Containment
// =============================================================================

type ContainsFn = dyn Fn(&ElementPath) -> bool + Send + Sync;

/// Predicate deciding whether a click landed inside the watched region.
#[derive(Clone)]
pub struct Containment(Arc<ContainsFn>);

impl Containment {
    /// Region made of every element matching `selector` and its descendants.
    pub fn selector(selector: Selector) -> Self {
        Self(Arc::new(move |path: &ElementPath| {
            path.closest(&selector).is_some()
        }))
    }

    /// Parses `selector` and builds a selector-based containment.
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        selector.parse().map(Self::selector)
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ElementPath) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Treats every click as outside.
    pub fn nowhere() -> Self {
        Self(Arc::new(|_| false))
    }

    pub fn contains(&self, path: &ElementPath) -> bool {
        (self.0)(path)
    }
}

impl fmt::Debug for Containment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Containment").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_button() -> ElementPath {
        ElementPath::new(Element::new("button").with_class("btn-primary"))
            .within(Element::new("div").with_attr("data-card-id", "tender-42"))
            .within(Element::new("main").with_id("board"))
            .within(Element::new("body"))
    }

    #[test]
    fn test_parse_supported_forms() {
        assert_eq!("div".parse::<Selector>(), Ok(Selector::Tag("div".into())));
        assert_eq!("#board".parse::<Selector>(), Ok(Selector::Id("board".into())));
        assert_eq!(
            ".btn-primary".parse::<Selector>(),
            Ok(Selector::Class("btn-primary".into()))
        );
        assert_eq!(
            "[data-card-id]".parse::<Selector>(),
            Ok(Selector::attribute("data-card-id"))
        );
        assert_eq!(
            "[data-card-id=\"tender-42\"]".parse::<Selector>(),
            Ok(Selector::Attribute {
                name: "data-card-id".into(),
                value: Some("tender-42".into()),
            })
        );
    }

    #[test]
    fn test_parse_rejects_compound_selectors() {
        assert_eq!("".parse::<Selector>(), Err(SelectorError::Empty));
        assert!(matches!(
            "div > span".parse::<Selector>(),
            Err(SelectorError::Unsupported(_))
        ));
        assert!(matches!(
            "[=x]".parse::<Selector>(),
            Err(SelectorError::Unsupported(_))
        ));
    }

    #[test]
    fn test_closest_walks_ancestors() {
        let path = card_button();
        let card = path.closest(&Selector::attribute("data-card-id")).unwrap();
        assert_eq!(card.attr("data-card-id"), Some("tender-42"));
        assert!(path.closest(&Selector::Class("modal".into())).is_none());
    }

    #[test]
    fn test_containment_by_selector() {
        let inside = Containment::parse("[data-card-id]").unwrap();
        assert!(inside.contains(&card_button()));

        let outside = ElementPath::new(Element::new("header")).within(Element::new("body"));
        assert!(!inside.contains(&outside));
        assert!(!Containment::nowhere().contains(&card_button()));
    }

    #[test]
    fn test_selector_display_round_trips() {
        for raw in ["td", "#board", ".card", "[data-card-id]", "[data-state=\"open\"]"] {
            let selector: Selector = raw.parse().unwrap();
            assert_eq!(selector.to_string(), raw);
        }
    }
}

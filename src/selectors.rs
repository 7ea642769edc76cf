//! Ordered fallback selectors for the logical fields of a page.
//!
//! Blog templates drift across redesigns, so every field (title, content,
//! date, next page, article links) is located by a [`SelectorChain`]: a list
//! of CSS rules tried strictly in declaration order. The first rule that
//! yields a non-empty value wins. Chains are configuration data; supporting a
//! new template means appending a rule, not adding a code path.
//!
//! Resolution never fails. A rule whose selector does not parse is kept in
//! the chain as a permanent non-match and reported once, when the chain is
//! built.

use crate::config::ConfigError;
use crate::models::Field;
use crate::utils::{element_text, normalize_whitespace};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// One extraction rule: a CSS selector plus an optional attribute to read
/// instead of the element's visible text.
///
/// The attribute form is what lets a chain prefer `time[datetime]` (machine
/// readable) over the human-facing date text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SelectorRule {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl SelectorRule {
    /// Rule reading the matched element's visible text.
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: None,
        }
    }

    /// Rule reading the named attribute of the matched element.
    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: SelectorRule,
    /// `None` when the selector failed to parse.
    selector: Option<Selector>,
}

impl CompiledRule {
    fn value_of(&self, element: ElementRef<'_>) -> Option<String> {
        let value = match self.rule.attribute.as_deref() {
            Some(attr) => normalize_whitespace(element.value().attr(attr)?),
            None => element_text(element),
        };
        (!value.is_empty()).then_some(value)
    }
}

/// A compiled, non-empty, ordered list of [`SelectorRule`]s for one [`Field`].
#[derive(Debug, Clone)]
pub struct SelectorChain {
    field: Field,
    rules: Vec<CompiledRule>,
}

impl SelectorChain {
    /// Compile `rules` for `field`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptySelectorChain`] if `rules` is empty. Malformed
    /// selectors are not an error; they are logged and never match.
    pub fn new(field: Field, rules: Vec<SelectorRule>) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::EmptySelectorChain(field));
        }
        let rules = rules
            .into_iter()
            .map(|rule| {
                let selector = match Selector::parse(&rule.selector) {
                    Ok(sel) => Some(sel),
                    Err(e) => {
                        warn!(%field, selector = %rule.selector, error = %e, "Unparseable selector; rule will never match");
                        None
                    }
                };
                CompiledRule { rule, selector }
            })
            .collect();
        Ok(Self { field, rules })
    }

    /// Return the first non-empty value produced by the rules, in order.
    ///
    /// Within a rule, matched elements are tried in document order until one
    /// yields a non-empty value.
    pub fn resolve(&self, document: &Html) -> Option<String> {
        let value = self.rules.iter().find_map(|rule| {
            let selector = rule.selector.as_ref()?;
            document
                .select(selector)
                .find_map(|element| rule.value_of(element))
        });
        if value.is_none() {
            trace!(field = %self.field, rules = self.rules.len(), "No rule matched");
        }
        value
    }

    /// Return every non-empty value produced by the first rule that produces
    /// any at all.
    ///
    /// Used for fields with many matches per page, such as article links.
    pub fn resolve_all(&self, document: &Html) -> Vec<String> {
        for rule in &self.rules {
            let Some(selector) = rule.selector.as_ref() else {
                continue;
            };
            let values: Vec<String> = document
                .select(selector)
                .filter_map(|element| rule.value_of(element))
                .collect();
            if !values.is_empty() {
                return values;
            }
        }
        Vec::new()
    }

    /// Return the first element with non-empty visible text, trying rules in
    /// order. Attribute modifiers are ignored here.
    pub fn select_element<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.rules.iter().find_map(|rule| {
            let selector = rule.selector.as_ref()?;
            document
                .select(selector)
                .find(|element| !element_text(*element).is_empty())
        })
    }
}

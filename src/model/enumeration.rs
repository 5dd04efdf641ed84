//! Bidirectional label/code enumeration registry
//!
//! Records persist their `type` and `color` as compact numeric codes; the
//! registry translates both ways in O(1). Constructed once at process start
//! and immutable afterwards: the type exposes no mutating API.

use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while constructing a registry. Fatal at process start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    /// At least one label is required.
    #[error("an enumeration needs at least one label")]
    NoLabels,

    /// Two labels were assigned the same numeric code.
    #[error("the code {code} for label '{label}' is repeated")]
    DuplicateCode {
        /// The label whose code clashed with an earlier one.
        label: String,
        /// The clashing code.
        code: u32,
    },
}

/// An ordered, immutable set of (label, numeric code) pairs.
#[derive(Debug, Clone)]
pub struct Enumeration {
    /// Labels in insertion order.
    labels: Vec<String>,
    by_label: HashMap<String, u32>,
    by_code: HashMap<u32, String>,
}

impl Enumeration {
    /// Build a registry from labels and a value-assignment rule.
    ///
    /// The rule receives each label and its position; producing the same code
    /// for two labels fails the construction.
    pub fn new<I, S>(labels: I, assign: impl Fn(&str, usize) -> u32) -> Result<Self, EnumerationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut by_label = HashMap::new();
        let mut by_code = HashMap::new();

        for (position, label) in labels.into_iter().enumerate() {
            let label = label.into();
            let code = assign(&label, position);

            if by_code.contains_key(&code) {
                return Err(EnumerationError::DuplicateCode { label, code });
            }

            by_label.insert(label.clone(), code);
            by_code.insert(code, label.clone());
            ordered.push(label);
        }

        if ordered.is_empty() {
            return Err(EnumerationError::NoLabels);
        }

        Ok(Enumeration {
            labels: ordered,
            by_label,
            by_code,
        })
    }

    /// Build a registry whose codes are the label positions (0, 1, 2, ...).
    ///
    /// Positional codes cannot clash, so only an empty label set can fail.
    pub fn numeric<I, S>(labels: I) -> Result<Self, EnumerationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(labels, |_, position| position as u32)
    }

    /// Look up the numeric code for a label.
    pub fn code_for(&self, label: &str) -> Option<u32> {
        self.by_label.get(label).copied()
    }

    /// Look up the label for a numeric code.
    pub fn label_for(&self, code: u32) -> Option<&str> {
        self.by_code.get(&code).map(String::as_str)
    }

    /// All labels, in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Number of registered labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the registry holds no labels. Never true after construction.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

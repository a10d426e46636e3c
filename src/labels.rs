// Apache-2.0 License - https://www.apache.org/licenses/LICENSE-2.0

//! Ordered label registry: an explicit, validated bijection between class
//! indices and label strings.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Bijective array-index <-> label-string mapping, built once and passed
/// explicitly wherever label indices are needed.
#[derive(Debug, Clone)]
pub struct LabelRegistry {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Build a registry from an ordered label list.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ConfigError`] when the list contains a
    /// duplicate or an empty label.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "label at position {i} is empty"
                )));
            }
            if index.insert(label.clone(), i).is_some() {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate label: {label}"
                )));
            }
        }
        Ok(Self { labels, index })
    }

    /// Label string for a class index.
    #[must_use]
    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Class index for a label string.
    #[must_use]
    pub fn index(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the registry holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All labels in registry order.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// Sanitize a class label into a safe database file stem.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let registry = LabelRegistry::new(["idle", "hello", "thanks"]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.label(1), Some("hello"));
        assert_eq!(registry.index("thanks"), Some(2));
        assert_eq!(registry.index("unknown"), None);
        assert_eq!(registry.label(3), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        assert!(matches!(
            LabelRegistry::new(["a", "b", "a"]),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(LabelRegistry::new(["a", ""]).is_err());
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Hksl_milk_tea"), "Hksl_milk_tea");
        assert_eq!(sanitize_label("how are you?"), "how_are_you_");
        assert_eq!(sanitize_label("a/b\\c"), "a_b_c");
    }
}

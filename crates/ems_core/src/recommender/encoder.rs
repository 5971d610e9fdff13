use serde::{Deserialize, Serialize};

use super::RecommendError;

/// Maps category strings to dense integer codes.
///
/// Classes are kept sorted, so a value's code is its rank in the fitted vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    field: String,
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        Self {
            field: field.to_string(),
            classes,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, value: &str) -> Result<usize, RecommendError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| RecommendError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

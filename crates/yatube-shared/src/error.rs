use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Image is empty")]
    Empty,

    #[error("Image too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Corrupt image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Validation messages collected by a form, keyed by field name.
///
/// Field order is stable so re-rendered forms list errors deterministically.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{} invalid field(s)", .fields.len())]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Messages for one field; empty when the field is valid.
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        self.fields.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_per_field() {
        let mut errors = FormErrors::new();
        assert!(errors.is_empty());

        errors.add("text", "first");
        errors.add("text", "second");
        errors.add("group", "bad");

        assert_eq!(errors.get("text"), ["first", "second"]);
        assert!(errors.get("image").is_empty());
        assert!(errors.has("group"));
        assert_eq!(errors.to_string(), "2 invalid field(s)");
    }

    #[test]
    fn test_into_result() {
        assert_eq!(FormErrors::new().into_result(5).unwrap(), 5);

        let mut errors = FormErrors::new();
        errors.add("text", "required");
        assert!(errors.into_result(5).is_err());
    }
}

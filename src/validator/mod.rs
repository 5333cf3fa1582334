use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use regex::Regex;

/// Field name -> first message recorded for that field
pub type ValidationErrors = BTreeMap<String, String>;

/// Accumulates field-level validation failures.
///
/// Validation never short-circuits: every rule is checked and the first
/// failing message per field is kept. An empty error map is the only success
/// signal.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no errors have been recorded
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }

    /// Record `message` under `field` unless that field already has one
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Record `message` under `field` when `ok` is false
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }
}

/// True if `value` is one of `permitted`
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.iter().any(|p| p == value)
}

/// True if `value` matches the regular expression
pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

/// True if every element of `values` is distinct
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "title", "must not be more than 500 characters long");
        v.check(true, "year", "must be provided");

        assert!(!v.valid());
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors().get("title").map(String::as_str), Some("must be provided"));
    }

    #[test]
    fn empty_validator_is_valid() {
        let v = Validator::new();
        assert!(v.valid());
        assert!(v.into_errors().is_empty());
    }

    #[test]
    fn errors_iterate_in_field_order() {
        let mut v = Validator::new();
        v.add_error("year", "a");
        v.add_error("genres", "b");
        v.add_error("runtime", "c");
        let keys: Vec<&str> = v.errors().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["genres", "runtime", "year"]);
    }

    #[test]
    fn helpers() {
        assert!(unique(&["a", "b", "c"]));
        assert!(!unique(&["a", "b", "a"]));
        assert!(unique::<i32>(&[]));

        assert!(permitted_value(&"id", &["id", "title"]));
        assert!(!permitted_value(&"drop", &["id", "title"]));

        let rx = Regex::new(r"^\d+$").unwrap();
        assert!(matches("123", &rx));
        assert!(!matches("12a", &rx));
    }
}

//! Roll-number namespaces.
//!
//! A namespace is a named allocation sequence. The counter stored under
//! `name` holds the raw sequence value; the visible roll number is
//! `prefix` followed by `baseline + seq` zero-padded to `width` digits.

use serde::{Deserialize, Serialize};

/// A named roll-number allocation sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollNamespace {
    /// Counter name in the shared store.
    pub name: String,

    /// Literal prefix placed before the number.
    #[serde(default)]
    pub prefix: String,

    /// Offset added to the raw counter value.
    #[serde(default)]
    pub baseline: i64,

    /// Minimum number of digits (zero-padded).
    #[serde(default = "default_width")]
    pub width: usize,
}

const fn default_width() -> usize {
    4
}

impl RollNamespace {
    /// Create a namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, prefix: impl Into<String>, baseline: i64, width: usize) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            baseline,
            width,
        }
    }

    /// Namespace used for competition applications (`1001`, `1002`, ...).
    #[must_use]
    pub fn competition() -> Self {
        Self::new("competition_roll", "", 1000, 4)
    }

    /// Namespace used for admissions (`ADM00001`, ...).
    #[must_use]
    pub fn admission() -> Self {
        Self::new("admission_roll", "ADM", 0, 5)
    }

    /// Format a numeric roll value.
    #[must_use]
    pub fn format(&self, value: i64) -> String {
        format!("{}{:0width$}", self.prefix, value, width = self.width)
    }

    /// Parse a roll number of this namespace back to its numeric value.
    ///
    /// Returns `None` for strings that do not carry this namespace's prefix
    /// or whose remainder is not a plain decimal number.
    #[must_use]
    pub fn parse(&self, roll_number: &str) -> Option<i64> {
        let digits = roll_number.trim().strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// The counter value that makes the next allocation follow `max_issued`.
    #[must_use]
    pub fn seed_for(&self, max_issued: i64) -> i64 {
        (max_issued - self.baseline).max(0)
    }

    /// Validate the namespace definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the width is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("namespace name cannot be empty".to_string());
        }
        if self.width == 0 {
            return Err(format!("namespace '{}' width cannot be zero", self.name));
        }
        if self.baseline < 0 {
            return Err(format!("namespace '{}' baseline cannot be negative", self.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_competition() {
        let ns = RollNamespace::competition();
        assert_eq!(ns.format(1001), "1001");
        assert_eq!(ns.format(12345), "12345");
    }

    #[test]
    fn test_format_admission() {
        let ns = RollNamespace::admission();
        assert_eq!(ns.format(1), "ADM00001");
        assert_eq!(ns.format(420), "ADM00420");
    }

    #[test]
    fn test_parse() {
        let ns = RollNamespace::admission();
        assert_eq!(ns.parse("ADM00042"), Some(42));
        assert_eq!(ns.parse("SK00042"), None);
        assert_eq!(ns.parse("ADM"), None);
        assert_eq!(ns.parse("ADM-12"), None);

        let ns = RollNamespace::competition();
        assert_eq!(ns.parse("1057"), Some(1057));
        assert_eq!(ns.parse(" 1057 "), Some(1057));
        assert_eq!(ns.parse("GK1057"), None);
    }

    #[test]
    fn test_seed_for() {
        let ns = RollNamespace::competition();
        assert_eq!(ns.seed_for(1057), 57);
        assert_eq!(ns.seed_for(1000), 0);
        assert_eq!(ns.seed_for(12), 0);
    }

    #[test]
    fn test_validate() {
        assert!(RollNamespace::competition().validate().is_ok());
        assert!(RollNamespace::new("", "", 0, 4).validate().is_err());
        assert!(RollNamespace::new("x", "", 0, 0).validate().is_err());
        assert!(RollNamespace::new("x", "", -5, 3).validate().is_err());
    }
}

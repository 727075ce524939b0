//! Module name prefixes shared across domain boundaries

use kiln_core::{validate_module_name, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Set of module prefixes visible across an isolation boundary.
///
/// A prefix `logging` admits `logging` itself and anything below it such as
/// `logging.Logger`, but not a sibling like `loggingx.Logger`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedModules {
    prefixes: Vec<String>,
}

impl SharedModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, rejecting names that are not valid module names
    pub fn try_from_names<I, S>(names: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut shared = Self::new();
        for name in names {
            let name = name.into();
            validate_module_name(&name)?;
            shared.insert(name);
        }
        Ok(shared)
    }

    /// Add a prefix unless it is already present
    pub fn insert(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    /// Whether `module` falls under one of the shared prefixes
    pub fn contains(&self, module: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            module
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    pub fn names(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl fmt::Display for SharedModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.prefixes.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for SharedModules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut shared = Self::new();
        for name in iter {
            shared.insert(name);
        }
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matching() {
        let shared: SharedModules = ["logging", "kiln.api"].into_iter().collect();

        assert!(shared.contains("logging"));
        assert!(shared.contains("logging.Logger"));
        assert!(shared.contains("logging.impl.Appender"));
        assert!(shared.contains("kiln.api.Action"));

        assert!(!shared.contains("loggingx.Logger"));
        assert!(!shared.contains("kiln.apix"));
        assert!(!shared.contains("kiln.Worker"));
        assert!(!shared.contains("app.logging"));
    }

    #[test]
    fn test_empty_set_shares_nothing() {
        let shared = SharedModules::new();
        assert!(shared.is_empty());
        assert!(!shared.contains("logging"));
    }

    #[test]
    fn test_names_are_validated() {
        assert!(SharedModules::try_from_names(["logging", "a.b"]).is_ok());
        assert!(SharedModules::try_from_names(["logging", "a..b"]).is_err());
    }

    #[test]
    fn test_serializes_as_list() {
        let shared: SharedModules = ["logging", "logging"].into_iter().collect();
        assert_eq!(shared.names().len(), 1);
        assert_eq!(serde_json::to_string(&shared).unwrap(), r#"["logging"]"#);
    }
}

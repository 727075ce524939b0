//! Classpaths and module name resolution
//!
//! A classpath is an ordered list of directory entries. A module named
//! `tools.logging.Logger` resolves to the first entry containing
//! `tools/logging/Logger.module`. Entries that do not exist are skipped.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use crate::types::ParseError;

/// File extension of a module definition inside a classpath entry
pub const MODULE_FILE_EXTENSION: &str = "module";

/// Ordered, de-duplicated list of classpath entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    /// Create an empty classpath
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classpath from entries, dropping duplicates but keeping order
    pub fn from_entries<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut classpath = Self::new();
        classpath.extend(entries);
        classpath
    }

    /// Parse a classpath using the platform path separator (`:` or `;`)
    pub fn parse(joined: impl AsRef<std::ffi::OsStr>) -> Self {
        Self::from_entries(std::env::split_paths(joined.as_ref()).filter(|p| !p.as_os_str().is_empty()))
    }

    /// Join the classpath using the platform path separator
    pub fn join(&self) -> Result<OsString, std::env::JoinPathsError> {
        std::env::join_paths(self.entries.iter())
    }

    /// Append a single entry unless it is already present
    pub fn push(&mut self, entry: impl Into<PathBuf>) {
        let entry = entry.into();
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Append several entries
    pub fn extend<I, P>(&mut self, entries: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for entry in entries {
            self.push(entry);
        }
    }

    /// Concatenate two classpaths, this one first
    pub fn plus(&self, other: &Classpath) -> Classpath {
        let mut combined = self.clone();
        combined.extend(other.entries.iter().cloned());
        combined
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the definition file of a module in the first entry that has it
    pub fn find_module(&self, module: &str) -> Result<Option<PathBuf>, ParseError> {
        let relative = module_relative_path(module)?;
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.join(&relative))
            .find(|candidate| candidate.is_file()))
    }
}

impl fmt::Display for Classpath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<_> = self.entries.iter().map(|p| p.display().to_string()).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for Classpath {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

/// Check that a module name is a dot separated list of simple segments
pub fn validate_module_name(module: &str) -> Result<(), ParseError> {
    let valid = !module.is_empty()
        && module.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(ParseError::InvalidModuleName(module.to_string()))
    }
}

/// Path of a module definition relative to a classpath entry
pub fn module_relative_path(module: &str) -> Result<PathBuf, ParseError> {
    validate_module_name(module)?;
    let mut path: PathBuf = module.split('.').collect();
    path.set_extension(MODULE_FILE_EXTENSION);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_module(root: &Path, module: &str) {
        let path = root.join(module_relative_path(module).unwrap());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, module).unwrap();
    }

    #[test]
    fn test_module_names() {
        assert!(validate_module_name("logging").is_ok());
        assert!(validate_module_name("tools.logging.Logger").is_ok());
        assert!(validate_module_name("my-app.main_v2").is_ok());
        assert!(validate_module_name("").is_err());
        assert!(validate_module_name("a..b").is_err());
        assert!(validate_module_name("../etc/passwd").is_err());
        assert!(validate_module_name("a/b").is_err());
    }

    #[test]
    fn test_entries_are_deduplicated_in_order() {
        let classpath = Classpath::from_entries(["/b", "/a", "/b"]);
        assert_eq!(classpath.entries(), &[PathBuf::from("/b"), PathBuf::from("/a")]);

        let combined = classpath.plus(&Classpath::from_entries(["/a", "/c"]));
        assert_eq!(combined.len(), 3);
    }

    #[test]
    fn test_join_and_parse() {
        let classpath = Classpath::from_entries(["/opt/kiln/lib", "/home/user/app"]);
        let joined = classpath.join().unwrap();
        assert_eq!(Classpath::parse(&joined), classpath);
        assert!(Classpath::parse("").is_empty());
    }

    #[test]
    fn test_find_module_uses_first_matching_entry() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_module(second.path(), "logging.Logger");
        write_module(first.path(), "app.Main");
        write_module(second.path(), "app.Main");

        let classpath = Classpath::from_entries([
            first.path().to_path_buf(),
            PathBuf::from("/does/not/exist"),
            second.path().to_path_buf(),
        ]);

        let logger = classpath.find_module("logging.Logger").unwrap().unwrap();
        assert!(logger.starts_with(second.path()));

        let main = classpath.find_module("app.Main").unwrap().unwrap();
        assert!(main.starts_with(first.path()));

        assert_eq!(classpath.find_module("app.Missing").unwrap(), None);
        assert!(classpath.find_module("..").is_err());
    }
}

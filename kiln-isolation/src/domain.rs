//! Code domains and module resolution

use kiln_core::{validate_module_name, Classpath};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

use crate::error::IsolationError;
use crate::shared::SharedModules;

/// A module resolved by some domain
#[derive(Debug, PartialEq, Eq)]
pub struct LoadedModule {
    name: String,
    location: PathBuf,
    defined_by: String,
}

impl LoadedModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition file the module was loaded from
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Name of the domain that defined the module
    pub fn defined_by(&self) -> &str {
        &self.defined_by
    }
}

/// Which names a child domain may resolve through its parent
#[derive(Debug, Clone)]
pub enum Visibility {
    /// Everything the parent can resolve
    All,
    /// Only names under the shared prefixes
    Shared(SharedModules),
}

impl Visibility {
    pub fn admits(&self, module: &str) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Shared(shared) => shared.contains(module),
        }
    }
}

/// Link from a domain to the domain it delegates to
#[derive(Debug, Clone)]
pub struct ParentLookup {
    pub domain: Arc<CodeDomain>,
    pub visibility: Visibility,
}

/// A scope that resolves module names to definitions.
///
/// Resolution is parent first: names the parent link admits are looked up in
/// the parent, and only names the parent cannot find fall back to this
/// domain's own classpath. Every resolved module is cached, so loading the
/// same name twice from one domain yields the same [`Arc`].
pub struct CodeDomain {
    name: String,
    classpath: RwLock<Classpath>,
    parent: Option<ParentLookup>,
    loaded: RwLock<HashMap<String, Arc<LoadedModule>>>,
}

impl CodeDomain {
    /// Create a domain with no parent
    pub fn root(name: impl Into<String>, classpath: Classpath) -> Arc<Self> {
        Arc::new(Self::new(name.into(), classpath, None))
    }

    /// Create a domain nested inside `parent`
    pub fn nested(
        name: impl Into<String>,
        classpath: Classpath,
        parent: Arc<CodeDomain>,
        visibility: Visibility,
    ) -> Arc<Self> {
        let lookup = ParentLookup {
            domain: parent,
            visibility,
        };
        Arc::new(Self::new(name.into(), classpath, Some(lookup)))
    }

    fn new(name: String, classpath: Classpath, parent: Option<ParentLookup>) -> Self {
        Self {
            name,
            classpath: RwLock::new(classpath),
            parent,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<CodeDomain>> {
        self.parent.as_ref().map(|lookup| &lookup.domain)
    }

    pub fn visibility(&self) -> Option<&Visibility> {
        self.parent.as_ref().map(|lookup| &lookup.visibility)
    }

    /// Snapshot of this domain's own classpath
    pub fn classpath(&self) -> Classpath {
        self.classpath.read().clone()
    }

    /// Append entries to this domain's own classpath
    pub fn add_classpath(&self, classpath: &Classpath) {
        self.classpath.write().extend(classpath.entries().iter().cloned());
    }

    /// Resolve a module by name
    pub fn load(&self, module: &str) -> Result<Arc<LoadedModule>, IsolationError> {
        validate_module_name(module)?;

        if let Some(found) = self.find_loaded(module) {
            return Ok(found);
        }

        if let Some(lookup) = &self.parent {
            if lookup.visibility.admits(module) {
                match lookup.domain.load(module) {
                    Ok(found) => {
                        trace!(domain = %self.name, module, parent = %lookup.domain.name, "Delegated module to parent.");
                        return Ok(self.record(module, found));
                    }
                    Err(err) if err.is_not_found() => {}
                    Err(err) => return Err(err),
                }
            }
        }

        let location = self.classpath.read().find_module(module)?;
        match location {
            Some(location) => {
                trace!(domain = %self.name, module, location = %location.display(), "Defined module.");
                let defined = Arc::new(LoadedModule {
                    name: module.to_string(),
                    location,
                    defined_by: self.name.clone(),
                });
                Ok(self.record(module, defined))
            }
            None => Err(IsolationError::ModuleNotFound {
                module: module.to_string(),
                domain: self.name.clone(),
            }),
        }
    }

    /// Whether `module` resolves from this domain
    pub fn resolves(&self, module: &str) -> bool {
        self.load(module).is_ok()
    }

    /// The cached module for `module`, if it was loaded before
    pub fn find_loaded(&self, module: &str) -> Option<Arc<LoadedModule>> {
        self.loaded.read().get(module).cloned()
    }

    /// Names of every module this domain has resolved so far, sorted
    pub fn loaded_modules(&self) -> Vec<String> {
        let mut names: Vec<_> = self.loaded.read().keys().cloned().collect();
        names.sort();
        names
    }

    // The first insert wins, so racing loads agree on one instance.
    fn record(&self, module: &str, found: Arc<LoadedModule>) -> Arc<LoadedModule> {
        self.loaded
            .write()
            .entry(module.to_string())
            .or_insert(found)
            .clone()
    }
}

impl fmt::Debug for CodeDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeDomain")
            .field("name", &self.name)
            .field("classpath", &*self.classpath.read())
            .field("parent", &self.parent().map(|p| p.name()))
            .finish()
    }
}

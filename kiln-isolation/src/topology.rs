//! Domain layouts for the two isolation modes

use kiln_core::{Classpath, IsolationMode};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{CodeDomain, Visibility};
use crate::shared::SharedModules;

pub const IMPLEMENTATION_DOMAIN: &str = "implementation";
pub const APPLICATION_DOMAIN: &str = "application";

/// The domains a worker resolves code through
#[derive(Debug, Clone)]
pub struct Topology {
    mode: IsolationMode,
    system: Arc<CodeDomain>,
    implementation: Arc<CodeDomain>,
    application: Arc<CodeDomain>,
}

impl Topology {
    /// Build the layout for `mode` on top of the process's system domain.
    ///
    /// In shared mode the system domain takes on the application classpath
    /// and serves every role. In isolated mode an implementation domain nests
    /// in the system domain and an application domain nests in that, each
    /// seeing through to its parent only for the shared modules.
    pub fn build(
        mode: IsolationMode,
        system: Arc<CodeDomain>,
        implementation_classpath: &Classpath,
        application_classpath: &Classpath,
        shared: &SharedModules,
    ) -> Self {
        match mode {
            IsolationMode::Shared => Self::shared(system, application_classpath),
            IsolationMode::Isolated => {
                Self::isolated(system, implementation_classpath, application_classpath, shared)
            }
        }
    }

    pub fn shared(system: Arc<CodeDomain>, application_classpath: &Classpath) -> Self {
        system.add_classpath(application_classpath);
        debug!(domain = %system.name(), classpath = %system.classpath(), "Using shared code domain.");
        Self {
            mode: IsolationMode::Shared,
            implementation: system.clone(),
            application: system.clone(),
            system,
        }
    }

    pub fn isolated(
        system: Arc<CodeDomain>,
        implementation_classpath: &Classpath,
        application_classpath: &Classpath,
        shared: &SharedModules,
    ) -> Self {
        let implementation = CodeDomain::nested(
            IMPLEMENTATION_DOMAIN,
            implementation_classpath.clone(),
            system.clone(),
            Visibility::Shared(shared.clone()),
        );
        let application = CodeDomain::nested(
            APPLICATION_DOMAIN,
            application_classpath.clone(),
            implementation.clone(),
            Visibility::Shared(shared.clone()),
        );
        debug!(shared = %shared, "Using isolated code domains.");
        Self {
            mode: IsolationMode::Isolated,
            system,
            implementation,
            application,
        }
    }

    pub fn mode(&self) -> IsolationMode {
        self.mode
    }

    pub fn system(&self) -> &Arc<CodeDomain> {
        &self.system
    }

    pub fn implementation(&self) -> &Arc<CodeDomain> {
        &self.implementation
    }

    /// The domain worker actions run in
    pub fn application(&self) -> &Arc<CodeDomain> {
        &self.application
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::module_relative_path;
    use std::fs;
    use tempfile::TempDir;

    fn module_dir(modules: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for module in modules {
            let path = dir.path().join(module_relative_path(module).unwrap());
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, module).unwrap();
        }
        dir
    }

    fn classpath(dir: &TempDir) -> Classpath {
        Classpath::from_entries([dir.path().to_path_buf()])
    }

    #[test]
    fn test_isolated_shares_only_listed_modules() {
        let implementation = module_dir(&["logging.Logger", "kiln.Worker"]);
        let application = module_dir(&["app.Main", "logging.Logger"]);
        let shared: SharedModules = ["logging"].into_iter().collect();
        let system = CodeDomain::root("system", Classpath::new());

        let topology = Topology::build(
            IsolationMode::Isolated,
            system,
            &classpath(&implementation),
            &classpath(&application),
            &shared,
        );
        assert_eq!(topology.mode(), IsolationMode::Isolated);

        let app_logger = topology.application().load("logging.Logger").unwrap();
        let impl_logger = topology.implementation().load("logging.Logger").unwrap();
        assert!(Arc::ptr_eq(&app_logger, &impl_logger));
        assert_eq!(app_logger.defined_by(), IMPLEMENTATION_DOMAIN);

        assert!(topology.application().resolves("app.Main"));
        assert!(!topology.implementation().resolves("app.Main"));
        assert!(!topology.application().resolves("kiln.Worker"));
    }

    #[test]
    fn test_shared_mode_uses_one_domain() {
        let implementation = module_dir(&["logging.Logger"]);
        let application = module_dir(&["app.Main", "logging.Logger"]);
        let system = CodeDomain::root("system", classpath(&implementation));

        let topology = Topology::build(
            IsolationMode::Shared,
            system.clone(),
            &classpath(&implementation),
            &classpath(&application),
            &SharedModules::new(),
        );

        assert!(Arc::ptr_eq(topology.application(), &system));
        assert!(Arc::ptr_eq(topology.implementation(), &system));
        assert!(topology.implementation().resolves("app.Main"));

        // Earlier entries shadow later ones in a single domain.
        let logger = topology.application().load("logging.Logger").unwrap();
        assert!(logger.location().starts_with(implementation.path()));
    }

    #[test]
    fn test_isolated_nesting() {
        let system = CodeDomain::root("system", Classpath::new());
        let topology = Topology::isolated(
            system.clone(),
            &Classpath::new(),
            &Classpath::new(),
            &SharedModules::new(),
        );

        let implementation_parent = topology.implementation().parent().unwrap();
        assert!(Arc::ptr_eq(implementation_parent, &system));
        let application_parent = topology.application().parent().unwrap();
        assert!(Arc::ptr_eq(application_parent, topology.implementation()));
    }
}

//! In-process script importer
//!
//! Resolves module identifiers against factories registered up front. A host
//! embedding a scripting runtime implements [`ScriptImporter`] itself; this
//! one serves natively compiled mods and tests.

use std::collections::HashMap;
use tracing::debug;

use crate::mods::descriptor::ModDescriptor;
use crate::mods::traits::{ModError, ScriptImporter, ScriptModule};

/// Builds one module instance for the given mod
pub type ModuleFactory =
    Box<dyn Fn(&ModDescriptor) -> Result<Box<dyn ScriptModule>, ModError> + Send>;

/// Importer backed by a `(namespace, module)` factory table
#[derive(Default)]
pub struct StaticImporter {
    factories: HashMap<(String, String), ModuleFactory>,
}

impl StaticImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for `module` of mod `namespace`, replacing any
    /// previous one
    pub fn register<F>(&mut self, namespace: &str, module: &str, factory: F)
    where
        F: Fn(&ModDescriptor) -> Result<Box<dyn ScriptModule>, ModError> + Send + 'static,
    {
        self.factories
            .insert((namespace.to_string(), module.to_string()), Box::new(factory));
    }

    /// Whether a factory exists for this module
    pub fn contains(&self, namespace: &str, module: &str) -> bool {
        self.factories
            .contains_key(&(namespace.to_string(), module.to_string()))
    }
}

impl ScriptImporter for StaticImporter {
    fn import_module(
        &mut self,
        descriptor: &ModDescriptor,
        module: &str,
    ) -> Result<Box<dyn ScriptModule>, ModError> {
        let key = (descriptor.namespace().to_string(), module.to_string());
        let factory = self.factories.get(&key).ok_or_else(|| {
            ModError::ImportFailed(format!(
                "no module named {}.{}",
                descriptor.namespace(),
                module
            ))
        })?;
        debug!("Importing module {}.{}", descriptor.namespace(), module);
        factory(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty(String);

    impl ScriptModule for Empty {
        fn name(&self) -> &str {
            &self.0
        }
    }

    #[test]
    fn test_import_registered_and_missing() {
        let mut importer = StaticImporter::new();
        importer.register("Alpha", "main", |_| Ok(Box::new(Empty("main".into()))));
        assert!(importer.contains("Alpha", "main"));

        let descriptor = ModDescriptor::new("Alpha", "Alpha", "Main", "/mods/alpha");
        let module = importer.import_module(&descriptor, "main").unwrap();
        assert_eq!(module.name(), "main");

        assert!(matches!(
            importer.import_module(&descriptor, "other"),
            Err(ModError::ImportFailed(_))
        ));
    }
}

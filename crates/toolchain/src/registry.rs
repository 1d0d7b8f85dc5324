//! Registry of the standalone packager.
//!
//! A configuration may declare one packager besides the runtime's bundled
//! npm. Registering a second one is a configuration error.

use crate::identity::{PackagerKind, ToolchainIdentity};
use crate::packager::PackagerResolver;
use crate::resolver::Resolver;
use noderig_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Holds the standalone packager of a configuration, if any.
pub struct PackagerRegistry {
    /// Directory each kind gets a subdirectory of.
    base_dir: PathBuf,
    packager: Option<PackagerResolver>,
}

impl PackagerRegistry {
    /// Create an empty registry rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            packager: None,
        }
    }

    /// Base directory of standalone installs.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Register a packager of `kind` under `<base_dir>/<kind>` and apply `configure`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a packager is already registered.
    pub fn register(
        &mut self,
        kind: PackagerKind,
        configure: impl FnOnce(&mut ToolchainIdentity),
    ) -> Result<&PackagerResolver> {
        if let Some(existing) = &self.packager {
            return Err(Error::configuration(format!(
                "Multiple packagers defined ('{}' and '{kind}'). Please configure a single packager",
                existing.name()
            )));
        }

        let packager = PackagerResolver::standalone(kind, self.base_dir.join(kind.name()));
        packager.configure(configure);
        tracing::debug!(packager = %kind, "Registered standalone packager");
        Ok(self.packager.insert(packager))
    }

    /// The registered packager.
    #[must_use]
    pub fn packager(&self) -> Option<&PackagerResolver> {
        self.packager.as_ref()
    }

    /// Check if no packager is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packager.is_none()
    }
}

impl std::fmt::Debug for PackagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagerRegistry")
            .field("base_dir", &self.base_dir)
            .field("packager", &self.packager.as_ref().map(|p| p.kind()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_places_kind_under_base_dir() {
        let mut registry = PackagerRegistry::new("/p/.noderig");
        assert!(registry.is_empty());

        let yarn = registry
            .register(PackagerKind::Yarn, |id| id.version = Some("1.22.4".into()))
            .unwrap();
        assert_eq!(yarn.kind(), PackagerKind::Yarn);
        assert_eq!(
            yarn.working_directory().unwrap(),
            Path::new("/p/.noderig/yarn/yarn-v1.22.4")
        );
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_second_registration_fails() {
        let mut registry = PackagerRegistry::new("/p/.noderig");
        registry.register(PackagerKind::Pnpm, |_| {}).unwrap();

        let err = registry.register(PackagerKind::Yarn, |_| {}).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("Multiple packagers defined"));
        assert_eq!(registry.packager().unwrap().kind(), PackagerKind::Pnpm);
    }

    #[test]
    fn test_same_kind_twice_also_fails() {
        let mut registry = PackagerRegistry::new("/p");
        registry.register(PackagerKind::Npm, |_| {}).unwrap();
        assert!(registry.register(PackagerKind::Npm, |_| {}).is_err());
    }

    #[test]
    fn test_debug_lists_kind() {
        let mut registry = PackagerRegistry::new("/p");
        registry.register(PackagerKind::Cnpm, |_| {}).unwrap();
        assert!(format!("{registry:?}").contains("Cnpm"));
    }
}

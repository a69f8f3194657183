use std::fmt;
use std::sync::{Arc, RwLock};

use vmstate_types::{MemPackage, Value};

/// A natively implemented function.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Vec<Value> + Send + Sync>;

/// Produces a package for a path the store does not hold.
pub type PackageGetter = Arc<dyn Fn(&str) -> Option<MemPackage> + Send + Sync>;

/// Maps `(package path, function name)` to a native implementation.
pub type NativeResolver = Arc<dyn Fn(&str, &str) -> Option<NativeFn> + Send + Sync>;

/// Resolver hooks owned by a root store.
///
/// The root holds the only writable handle; transactions receive the same
/// `Arc` and only read through it.
#[derive(Default)]
pub struct ResolverHooks {
    package_getter: RwLock<Option<PackageGetter>>,
    native_resolver: RwLock<Option<NativeResolver>>,
}

impl ResolverHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_package_getter(&self, getter: PackageGetter) {
        *self.package_getter.write().expect("lock poisoned") = Some(getter);
    }

    pub(crate) fn set_native_resolver(&self, resolver: NativeResolver) {
        *self.native_resolver.write().expect("lock poisoned") = Some(resolver);
    }

    /// Ask the package getter for `path`.
    pub fn fetch_package(&self, path: &str) -> Option<MemPackage> {
        let getter = self.package_getter.read().expect("lock poisoned").clone()?;
        getter(path)
    }

    /// Resolve a native function.
    pub fn resolve_native(&self, pkg_path: &str, name: &str) -> Option<NativeFn> {
        let resolver = self.native_resolver.read().expect("lock poisoned").clone()?;
        resolver(pkg_path, name)
    }

    pub fn has_package_getter(&self) -> bool {
        self.package_getter.read().expect("lock poisoned").is_some()
    }

    pub fn has_native_resolver(&self) -> bool {
        self.native_resolver.read().expect("lock poisoned").is_some()
    }
}

impl fmt::Debug for ResolverHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverHooks")
            .field("package_getter", &self.has_package_getter())
            .field("native_resolver", &self.has_native_resolver())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmstate_types::{MemFile, MemPackageType};

    #[test]
    fn unset_hooks_resolve_nothing() {
        let hooks = ResolverHooks::new();
        assert!(hooks.fetch_package("math").is_none());
        assert!(hooks.resolve_native("math", "Abs").is_none());
        assert!(format!("{hooks:?}").contains("package_getter: false"));
    }

    #[test]
    fn installed_hooks_are_called() {
        let hooks = ResolverHooks::new();
        hooks.set_package_getter(Arc::new(|path: &str| {
            (path == "math").then(|| {
                MemPackage::new(
                    MemPackageType::StdlibAll,
                    "math",
                    "math",
                    vec![MemFile::new("math.gno", "package math")],
                )
            })
        }));
        hooks.set_native_resolver(Arc::new(|pkg: &str, name: &str| {
            if pkg == "math" && name == "Neg" {
                let f: NativeFn = Arc::new(|args: &[Value]| {
                    args.iter()
                        .map(|v| Value::Int(-v.get_int().unwrap_or(0)))
                        .collect()
                });
                Some(f)
            } else {
                None
            }
        }));

        assert_eq!(hooks.fetch_package("math").unwrap().name, "math");
        assert!(hooks.fetch_package("other").is_none());

        let neg = hooks.resolve_native("math", "Neg").unwrap();
        assert_eq!(neg(&[Value::Int(3)]), vec![Value::Int(-3)]);
        assert!(hooks.resolve_native("math", "Abs").is_none());
    }
}

//! External-package introspection.
//!
//! The analyzer never talks to the host toolchain directly; it issues four
//! query shapes against a [`PackageIntrospector`]: exported functions,
//! interface method sets, struct/interface identities, and constants.
//! Results are cached per import path in an [`ExternalRegistry`], keyed by
//! the package alias (`pkg.Name`).

use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

use crate::error::{BreezeError, BreezeResult};
use crate::types::{FunctionSig, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub name: String,
    pub sig: FunctionSig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeIdentity {
    Struct,
    Interface,
}

/// Everything introspection reports about one host package.
#[derive(Debug, Clone, Default)]
pub struct PackageInfo {
    /// Exported functions and methods. Methods key as `Type.Method`.
    pub functions: IndexMap<String, FunctionSig>,
    pub interfaces: IndexMap<String, Vec<MethodSig>>,
    pub types: IndexMap<String, TypeIdentity>,
    pub constants: IndexMap<String, Type>,
}

pub trait PackageIntrospector {
    fn load(&self, path: &str) -> BreezeResult<PackageInfo>;
}

/// In-memory introspector, used by tests and by callers that pre-register
/// package shapes.
#[derive(Debug, Default)]
pub struct StaticIntrospector {
    packages: HashMap<String, PackageInfo>,
}

impl StaticIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, path: impl Into<String>, info: PackageInfo) {
        self.packages.insert(path.into(), info);
    }
}

impl PackageIntrospector for StaticIntrospector {
    fn load(&self, path: &str) -> BreezeResult<PackageInfo> {
        self.packages
            .get(path)
            .cloned()
            .ok_or_else(|| BreezeError::Introspection {
                path: path.to_string(),
                reason: "package not registered".to_string(),
            })
    }
}

/// The last segment of an import path is the package alias used in code.
pub fn package_alias(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Descriptor maps accumulated across all imports of a compilation unit,
/// keyed by alias-qualified names.
#[derive(Debug, Clone, Default)]
pub struct ExternalRegistry {
    pub functions: IndexMap<String, FunctionSig>,
    pub interfaces: IndexMap<String, Vec<MethodSig>>,
    pub types: IndexMap<String, TypeIdentity>,
    pub constants: IndexMap<String, Type>,
    loaded: HashSet<String>,
}

impl ExternalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.loaded.contains(path)
    }

    /// Fold one package's info into the alias-qualified maps.
    pub fn seed(&mut self, path: &str, info: PackageInfo) {
        let alias = package_alias(path);
        for (name, sig) in info.functions {
            self.functions.insert(format!("{alias}.{name}"), sig);
        }
        for (name, methods) in info.interfaces {
            self.interfaces.insert(format!("{alias}.{name}"), methods);
        }
        for (name, identity) in info.types {
            self.types.insert(format!("{alias}.{name}"), identity);
        }
        for (name, ty) in info.constants {
            self.constants.insert(format!("{alias}.{name}"), ty);
        }
        self.loaded.insert(path.to_string());
    }

    pub fn function(&self, qualified: &str) -> Option<&FunctionSig> {
        self.functions.get(qualified)
    }

    /// Type of a field or method selected off `object`, when the object's
    /// type traces back to an introspected package.
    pub fn member_type(&self, object: &Type, field: &str) -> Option<Type> {
        let (package, name) = match object {
            Type::Named { package, name } => (package, name),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Named { package, name } => (package, name),
                _ => return None,
            },
            _ => return None,
        };
        if let Some(sig) = self.functions.get(&format!("{package}.{name}.{field}")) {
            return Some(Type::Function(sig.clone()));
        }
        if let Some(methods) = self.interfaces.get(&format!("{package}.{name}")) {
            if let Some(method) = methods.iter().find(|m| m.name == field) {
                return Some(Type::Function(method.sig.clone()));
            }
        }
        None
    }

    /// When a function value satisfies a single-method interface, the host
    /// convention names the adapter `pkg.IfaceFunc`.
    pub fn adapter_for(&self, value_sig: &FunctionSig, iface: &Type) -> Option<String> {
        let key = match iface {
            Type::Named { package, name } => format!("{package}.{name}"),
            Type::Interface(name) => name.clone(),
            _ => return None,
        };
        let methods = self.interfaces.get(&key)?;
        let [method] = methods.as_slice() else {
            return None;
        };
        if method.sig.params.len() == value_sig.params.len() {
            Some(format!("{key}Func"))
        } else {
            None
        }
    }
}

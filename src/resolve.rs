use serde::Serialize;
use std::collections::HashMap;

use crate::error::ScanError;

/// A class the loading context can hand out. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TypeHandle {
    /// Dotted binary name, e.g. `org.example.Outer$Inner`.
    pub name: String,
    pub binary_name: String,
    pub origin: Option<String>,
}

/// Maps a dotted binary name to a type handle.
pub trait LoadingContext: Send + Sync {
    fn load(&self, name: &str) -> Option<TypeHandle>;
}

impl<F> LoadingContext for F
where
    F: Fn(&str) -> Option<TypeHandle> + Send + Sync,
{
    fn load(&self, name: &str) -> Option<TypeHandle> {
        self(name)
    }
}

/// Loading context backed by the class names cataloged from classpath
/// entries. The first entry that provides a name wins, as on a JVM classpath.
#[derive(Debug, Clone, Default)]
pub struct ClasspathIndex {
    origins: HashMap<String, String>,
}

impl ClasspathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the name was already provided by an earlier entry.
    pub fn insert(&mut self, binary_name: &str, origin: &str) -> bool {
        let name = binary_to_name(binary_name);
        if self.origins.contains_key(&name) {
            return false;
        }
        self.origins.insert(name, origin.to_string());
        true
    }

    pub fn extend<'a>(&mut self, binary_names: impl IntoIterator<Item = &'a str>, origin: &str) {
        for name in binary_names {
            self.insert(name, origin);
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

impl LoadingContext for ClasspathIndex {
    fn load(&self, name: &str) -> Option<TypeHandle> {
        let origin = self.origins.get(name)?;
        Some(TypeHandle {
            name: name.to_string(),
            binary_name: name.replace('.', "/"),
            origin: Some(origin.clone()),
        })
    }
}

pub fn binary_to_name(binary_name: &str) -> String {
    binary_name.replace('/', ".")
}

/// Resolve a slash-separated binary name through `context`.
pub fn resolve(
    candidate: &str,
    binary_name: &str,
    context: &dyn LoadingContext,
) -> Result<TypeHandle, ScanError> {
    let name = binary_to_name(binary_name);
    context
        .load(&name)
        .ok_or_else(|| ScanError::NameResolution {
            candidate: candidate.to_string(),
            class_name: name,
        })
}

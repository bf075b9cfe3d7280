use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;

/// Annotation type in descriptor form, e.g. `Ljavax/ws/rs/Path;`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationKey(String);

impl AnnotationKey {
    /// Accepts either a dotted type name (`javax.ws.rs.Path`) or a name that
    /// is already in descriptor form.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with('L') && name.ends_with(';') {
            return Self(name.to_string());
        }
        Self(format!("L{};", name.replace('.', "/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AnnotationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationMatcher {
    keys: HashSet<AnnotationKey>,
}

impl AnnotationMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = names
            .into_iter()
            .map(|n| AnnotationKey::from_name(n.as_ref()))
            .collect();
        Self { keys }
    }

    /// JAX-RS resources and providers: `@Path` and `@Provider`.
    pub fn jaxrs() -> Self {
        Self::new(["javax.ws.rs.Path", "javax.ws.rs.ext.Provider"])
    }

    pub fn matches(&self, descriptor: &str) -> bool {
        self.keys.contains(descriptor)
    }

    pub fn keys(&self) -> Vec<&AnnotationKey> {
        let mut keys: Vec<&AnnotationKey> = self.keys.iter().collect();
        keys.sort();
        keys
    }

    /// Stable digest of the configured keys, independent of input order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in self.keys() {
            hasher.update(key.as_str().as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

//! Per-class verdicts and the match set they feed.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::{ClassEvent, ClassReader};
use crate::error::{ReadError, ScanError};
use crate::matcher::AnnotationMatcher;
use crate::resolve::{LoadingContext, TypeHandle, resolve};
use crate::scope::Scope;

const CLASS_SUFFIX: &str = ".class";

/// Outcome of reading one class record, before name resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub class_name: String,
    pub annotated: bool,
    pub scope_eligible: bool,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        self.annotated && self.scope_eligible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum RecordState {
    #[default]
    Start,
    HeaderSeen,
    End,
}

/// Parse state for a single class record. A fresh record is used per input.
#[derive(Debug, Default)]
pub struct ClassRecord {
    state: RecordState,
    class_name: String,
    scope: Scope,
    annotated: bool,
}

impl ClassRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one event. Returns the verdict once `End` is seen; nothing is
    /// decided earlier because an `InnerClasses` entry for this class may
    /// still follow the annotations.
    pub fn observe(&mut self, event: &ClassEvent, matcher: &AnnotationMatcher) -> Option<Verdict> {
        match (self.state, event) {
            (RecordState::Start, ClassEvent::Header { access, name, .. }) => {
                self.class_name = name.clone();
                self.scope = Scope::from_header(*access);
                self.annotated = false;
                self.state = RecordState::HeaderSeen;
                None
            }
            (RecordState::HeaderSeen, ClassEvent::Annotation { descriptor, .. }) => {
                self.annotated |= matcher.matches(descriptor);
                None
            }
            (RecordState::HeaderSeen, ClassEvent::InnerClass { name, access, .. }) => {
                if *name == self.class_name {
                    self.scope.apply_inner_fact(*access);
                }
                None
            }
            (RecordState::HeaderSeen, ClassEvent::End) => {
                self.state = RecordState::End;
                Some(self.verdict())
            }
            _ => None,
        }
    }

    fn verdict(&self) -> Verdict {
        Verdict {
            class_name: self.class_name.clone(),
            annotated: self.annotated,
            scope_eligible: self.scope.is_eligible(),
        }
    }
}

/// Insertion-ordered set of resolved types, unique by name. Entries are
/// never removed.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    handles: Vec<TypeHandle>,
    names: HashSet<String>,
}

impl MatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: TypeHandle) -> bool {
        if !self.names.insert(handle.name.clone()) {
            return false;
        }
        self.handles.push(handle);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeHandle> {
        self.handles.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn into_vec(self) -> Vec<TypeHandle> {
        self.handles
    }
}

pub struct ClassFilter {
    matcher: AnnotationMatcher,
    context: Arc<dyn LoadingContext>,
    matches: MatchSet,
}

impl ClassFilter {
    pub fn new(matcher: AnnotationMatcher, context: Arc<dyn LoadingContext>) -> Self {
        Self {
            matcher,
            context,
            matches: MatchSet::new(),
        }
    }

    pub fn matcher(&self) -> &AnnotationMatcher {
        &self.matcher
    }

    /// Whether a candidate is worth reading at all. Never fails.
    pub fn accept(&self, name: &str) -> bool {
        !name.is_empty() && name.ends_with(CLASS_SUFFIX)
    }

    /// Read one record and compute its verdict. Touches no shared state, so
    /// it can run on many inputs at once.
    pub fn evaluate(&self, bytes: &[u8]) -> Result<Verdict, ReadError> {
        let events = ClassReader::new(bytes).read_events()?;
        let mut record = ClassRecord::new();
        for event in &events {
            if let Some(verdict) = record.observe(event, &self.matcher) {
                return Ok(verdict);
            }
        }
        Ok(record.verdict())
    }

    /// Full read, filter and resolve cycle for one input.
    pub fn process(&mut self, name: &str, bytes: &[u8]) -> Result<Option<TypeHandle>, ScanError> {
        let verdict = self
            .evaluate(bytes)
            .map_err(|source| ScanError::MalformedRecord {
                candidate: name.to_string(),
                source,
            })?;
        self.insert_verdict(name, &verdict)
    }

    /// Resolve and record a verdict computed by [`ClassFilter::evaluate`]
    /// or taken from the verdict cache.
    pub fn insert_verdict(
        &mut self,
        name: &str,
        verdict: &Verdict,
    ) -> Result<Option<TypeHandle>, ScanError> {
        if !verdict.is_match() {
            return Ok(None);
        }
        let handle = resolve(name, &verdict.class_name, self.context.as_ref())?;
        debug!("matched {} from {name}", handle.name);
        self.matches.insert(handle.clone());
        Ok(Some(handle))
    }

    pub fn matches(&self) -> &MatchSet {
        &self.matches
    }

    pub fn into_matches(self) -> MatchSet {
        self.matches
    }
}

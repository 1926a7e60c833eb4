//! Secondary indices kept in step with an [`AnnotationRepository`](crate::AnnotationRepository).
//!
//! An index is primed once through [`AnnotationIndex::initialize`] and from then
//! on is maintained only from the add/modify/delete notifications the
//! repository sends after each mutation. Indices never rescan the repository
//! on a notification.
//!
//! At most one index of each concrete type can be registered on a repository.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{NotesError, Result};
use crate::progress::Progress;
use crate::types::Annotation;

/// Lazily evaluated accessor for every annotation currently in the repository.
///
/// Calling it is cheap; walking the returned iterator is where the cost is,
/// so an index that does not need the initial set can skip both.
pub type AllAnnotations<'a> = dyn Fn() -> std::slice::Iter<'a, Annotation> + 'a;

/// A derived view that follows repository mutations.
///
/// Every notification arrives after the repository has already applied the
/// mutation. Notifications are delivered on the mutating caller's stack;
/// implementations must not call back into the repository.
pub trait AnnotationIndex: Any {
    /// Called exactly once, at registration, before any other notification.
    fn initialize(&mut self, all: &AllAnnotations<'_>, progress: &mut dyn Progress);

    fn on_add(&mut self, annotation: &Annotation);

    /// The annotation's thread (and therefore possibly its current status) changed.
    fn on_modify(&mut self, annotation: &Annotation);

    fn on_delete(&mut self, annotation: &Annotation);

    fn as_any(&self) -> &dyn Any;
}

/// Registered indices in registration order, at most one per concrete type.
#[derive(Default)]
pub(crate) struct IndexRegistry {
    entries: Vec<Box<dyn AnnotationIndex>>,
    kinds: HashSet<TypeId>,
}

impl IndexRegistry {
    /// Registers `index` and primes it through `all`.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::AlreadyRegistered` if an index of type `I` is
    /// already present. In that case `index` is dropped without being initialized.
    pub fn register<I: AnnotationIndex>(
        &mut self,
        mut index: I,
        all: &AllAnnotations<'_>,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        if !self.kinds.insert(TypeId::of::<I>()) {
            return Err(NotesError::AlreadyRegistered {
                kind: type_name::<I>(),
            });
        }
        index.initialize(all, progress);
        log::debug!("registered index {}", type_name::<I>());
        self.entries.push(Box::new(index));
        Ok(())
    }

    pub fn get<I: AnnotationIndex>(&self) -> Option<&I> {
        self.entries
            .iter()
            .find_map(|entry| entry.as_any().downcast_ref::<I>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn added(&mut self, annotation: &Annotation) {
        for entry in self.entries.iter_mut() {
            entry.on_add(annotation);
        }
    }

    pub fn modified(&mut self, annotation: &Annotation) {
        for entry in self.entries.iter_mut() {
            entry.on_modify(annotation);
        }
    }

    pub fn deleted(&mut self, annotation: &Annotation) {
        for entry in self.entries.iter_mut() {
            entry.on_delete(annotation);
        }
    }
}

/// Guids of merge-conflict annotations whose current status is `open`.
#[derive(Debug, Default)]
pub struct IndexOfAllOpenConflicts {
    open: BTreeSet<String>,
}

impl IndexOfAllOpenConflicts {
    pub const OPEN_STATUS: &'static str = "open";

    pub fn new() -> Self {
        Self::default()
    }

    fn qualifies(annotation: &Annotation) -> bool {
        annotation.is_merge_conflict() && annotation.has_status(Self::OPEN_STATUS)
    }

    pub fn guids(&self) -> impl Iterator<Item = &str> {
        self.open.iter().map(String::as_str)
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.open.contains(guid)
    }

    pub fn count(&self) -> usize {
        self.open.len()
    }
}

impl AnnotationIndex for IndexOfAllOpenConflicts {
    fn initialize(&mut self, all: &AllAnnotations<'_>, _progress: &mut dyn Progress) {
        self.open = all()
            .filter(|a| Self::qualifies(a))
            .map(|a| a.guid.clone())
            .collect();
    }

    fn on_add(&mut self, annotation: &Annotation) {
        if Self::qualifies(annotation) {
            self.open.insert(annotation.guid.clone());
        }
    }

    fn on_modify(&mut self, annotation: &Annotation) {
        if Self::qualifies(annotation) {
            self.open.insert(annotation.guid.clone());
        } else {
            self.open.remove(&annotation.guid);
        }
    }

    fn on_delete(&mut self, annotation: &Annotation) {
        self.open.remove(&annotation.guid);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Current-status label to the guids currently carrying it.
///
/// Annotations with an empty thread have no current status and are not indexed.
#[derive(Debug, Default)]
pub struct IndexByCurrentStatus {
    by_status: HashMap<String, BTreeSet<String>>,
    status_of: HashMap<String, String>,
}

impl IndexByCurrentStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guids_with_status(&self, status: &str) -> Vec<&str> {
        self.by_status
            .get(status)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, status: &str) -> usize {
        self.by_status.get(status).map_or(0, BTreeSet::len)
    }

    /// Distinct statuses currently in use, sorted.
    pub fn statuses(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.by_status.keys().map(String::as_str).collect();
        out.sort_unstable();
        out
    }

    fn insert(&mut self, annotation: &Annotation) {
        if let Some(status) = annotation.current_status() {
            self.by_status
                .entry(status.to_owned())
                .or_default()
                .insert(annotation.guid.clone());
            self.status_of
                .insert(annotation.guid.clone(), status.to_owned());
        }
    }

    fn forget(&mut self, guid: &str) {
        let Some(old) = self.status_of.remove(guid) else {
            return;
        };
        if let Some(set) = self.by_status.get_mut(&old) {
            set.remove(guid);
            if set.is_empty() {
                self.by_status.remove(&old);
            }
        }
    }
}

impl AnnotationIndex for IndexByCurrentStatus {
    fn initialize(&mut self, all: &AllAnnotations<'_>, _progress: &mut dyn Progress) {
        self.by_status.clear();
        self.status_of.clear();
        for annotation in all() {
            self.insert(annotation);
        }
    }

    fn on_add(&mut self, annotation: &Annotation) {
        self.insert(annotation);
    }

    fn on_modify(&mut self, annotation: &Annotation) {
        self.forget(&annotation.guid);
        self.insert(annotation);
    }

    fn on_delete(&mut self, annotation: &Annotation) {
        self.forget(&annotation.guid);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reference (the record being commented on) to the guids of its annotations.
#[derive(Debug, Default)]
pub struct IndexByRef {
    by_ref: HashMap<String, BTreeSet<String>>,
}

impl IndexByRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guids_for(&self, reference: &str) -> Vec<&str> {
        self.by_ref
            .get(reference)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

impl AnnotationIndex for IndexByRef {
    fn initialize(&mut self, all: &AllAnnotations<'_>, progress: &mut dyn Progress) {
        self.by_ref.clear();
        let mut unreferenced = 0usize;
        for annotation in all() {
            if annotation.reference.is_empty() {
                unreferenced += 1;
            }
            self.on_add(annotation);
        }
        if unreferenced > 0 {
            progress.message(&format!("{unreferenced} annotation(s) have no ref"));
        }
    }

    fn on_add(&mut self, annotation: &Annotation) {
        self.by_ref
            .entry(annotation.reference.clone())
            .or_default()
            .insert(annotation.guid.clone());
    }

    // Reference is fixed for an annotation's lifetime.
    fn on_modify(&mut self, _annotation: &Annotation) {}

    fn on_delete(&mut self, annotation: &Annotation) {
        if let Some(set) = self.by_ref.get_mut(&annotation.reference) {
            set.remove(&annotation.guid);
            if set.is_empty() {
                self.by_ref.remove(&annotation.reference);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

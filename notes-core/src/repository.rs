use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{NotesError, Result};
use crate::format;
use crate::index::{AnnotationIndex, IndexRegistry};
use crate::progress::Progress;
use crate::types::{Annotation, Message};

/// Where a repository's content came from, and whether it can be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    File(PathBuf),
    Text,
}

/// The annotation store for one notes file.
///
/// Owns its annotations in load/insertion order and is the only place they
/// are mutated. Every mutation is applied first, then fanned out to the
/// registered indices in registration order before the call returns.
///
/// Single-threaded: indices must not call back into the repository while
/// handling a notification.
pub struct AnnotationRepository {
    origin: Origin,
    version: u32,
    annotations: Vec<Annotation>,
    // guid -> position in `annotations`; last one wins for duplicate guids
    positions: HashMap<String, usize>,
    indices: IndexRegistry,
}

impl AnnotationRepository {
    /// Opens the notes file at `path`.
    ///
    /// A missing (or empty) file gives an empty version-0 repository that is
    /// still file-backed, so a later [`save`](Self::save) creates the file.
    ///
    /// # Errors
    ///
    /// - `NotesError::InvalidLocation` if the parent directory does not exist.
    /// - `NotesError::Io` if the file exists but cannot be read.
    /// - `NotesError::Format` / `NotesError::UnsupportedVersion` if its content
    ///   is not a readable notes document.
    pub fn from_file(path: impl AsRef<Path>, progress: &mut dyn Progress) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(NotesError::InvalidLocation { path });
            }
        }

        let text = if path.exists() {
            std::fs::read_to_string(&path).map_err(|source| NotesError::Io {
                path: path.clone(),
                source,
            })?
        } else {
            progress.message(&format!(
                "{} does not exist yet; starting an empty notes file",
                path.display()
            ));
            String::new()
        };

        let source_name = path.display().to_string();
        let document = format::parse(&text, &source_name, &source_name, progress)?;
        log::debug!(
            "loaded {} annotation(s) from {}",
            document.annotations.len(),
            source_name
        );
        Ok(Self::new(Origin::File(path), document))
    }

    /// Builds a repository from in-memory text. The result cannot be saved.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::Format` or `NotesError::UnsupportedVersion` for
    /// content that is not a readable notes document.
    pub fn from_text(text: &str, progress: &mut dyn Progress) -> Result<Self> {
        let document = format::parse(text, "<text>", "", progress)?;
        Ok(Self::new(Origin::Text, document))
    }

    fn new(origin: Origin, document: format::Document) -> Self {
        let mut repo = Self {
            origin,
            version: document.version,
            annotations: document.annotations,
            positions: HashMap::new(),
            indices: IndexRegistry::default(),
        };
        repo.reindex_positions();
        repo
    }

    fn reindex_positions(&mut self) {
        self.positions = self
            .annotations
            .iter()
            .enumerate()
            .map(|(i, a)| (a.guid.clone(), i))
            .collect();
    }

    fn position(&self, guid: &str) -> Result<usize> {
        self.positions
            .get(guid)
            .copied()
            .ok_or_else(|| NotesError::UnknownAnnotation {
                guid: guid.to_owned(),
            })
    }

    /// Format version declared by the loaded content.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Backing file, if this repository was opened from one.
    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::File(p) => Some(p),
            Origin::Text => None,
        }
    }

    pub fn is_file_backed(&self) -> bool {
        matches!(self.origin, Origin::File(_))
    }

    /// All annotations in load/insertion order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn get(&self, guid: &str) -> Option<&Annotation> {
        self.positions.get(guid).map(|&i| &self.annotations[i])
    }

    /// Annotations whose last message has exactly `status` (case-sensitive).
    ///
    /// Annotations with no messages never match, not even for `""`.
    pub fn by_current_status(&self, status: &str) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|a| a.has_status(status))
            .collect()
    }

    /// Appends `annotation` and notifies every index of the addition.
    ///
    /// The guid is not checked against existing annotations; keeping guids
    /// unique is the caller's job.
    pub fn add_annotation(&mut self, annotation: Annotation) -> &Annotation {
        let at = self.annotations.len();
        self.positions.insert(annotation.guid.clone(), at);
        self.annotations.push(annotation);
        let added = &self.annotations[at];
        self.indices.added(added);
        added
    }

    /// Removes the annotation with `guid` and notifies every index of the deletion.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::UnknownAnnotation` if no such annotation is owned here.
    pub fn remove(&mut self, guid: &str) -> Result<Annotation> {
        let at = self.position(guid)?;
        let removed = self.annotations.remove(at);
        self.reindex_positions();
        self.indices.deleted(&removed);
        Ok(removed)
    }

    /// Appends `message` to the thread of `guid` and notifies every index of
    /// the modification.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::UnknownAnnotation` if no such annotation is owned here.
    pub fn add_message(&mut self, guid: &str, message: Message) -> Result<&Annotation> {
        let at = self.position(guid)?;
        self.annotations[at].push_message(message);
        let changed = &self.annotations[at];
        self.indices.modified(changed);
        Ok(changed)
    }

    /// Changes the current status of `guid` by appending a message from `author`.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::UnknownAnnotation` if no such annotation is owned here.
    pub fn set_status(
        &mut self,
        guid: &str,
        author: &str,
        status: &str,
        body: &str,
    ) -> Result<&Annotation> {
        self.add_message(guid, Message::new(author, status, body))
    }

    /// Registers `index` and initializes it with the current annotation set.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::AlreadyRegistered` if an index of the same type is
    /// already attached; the repository is left unchanged.
    pub fn add_observer<I: AnnotationIndex>(
        &mut self,
        index: I,
        progress: &mut dyn Progress,
    ) -> Result<()> {
        let annotations = &self.annotations;
        self.indices
            .register(index, &|| annotations.iter(), progress)
    }

    /// The registered index of type `I`, if any.
    pub fn index<I: AnnotationIndex>(&self) -> Option<&I> {
        self.indices.get::<I>()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Writes the whole collection back to the backing file, overwriting it.
    ///
    /// # Errors
    ///
    /// - `NotesError::Unsupported` if the repository was built from text.
    /// - `NotesError::Io` if the write fails. The file is written in place,
    ///   so a failed write may leave it partially written.
    pub fn save(&self, progress: &mut dyn Progress) -> Result<()> {
        let Origin::File(path) = &self.origin else {
            return Err(NotesError::Unsupported(
                "cannot save a notes repository that was created from text",
            ));
        };
        let text = format::serialize(&self.annotations);
        std::fs::write(path, text).map_err(|source| NotesError::Io {
            path: path.clone(),
            source,
        })?;
        progress.message(&format!(
            "saved {} annotation(s) to {}",
            self.annotations.len(),
            path.display()
        ));
        log::debug!("saved {}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for AnnotationRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationRepository")
            .field("origin", &self.origin)
            .field("version", &self.version)
            .field("annotations", &self.annotations.len())
            .field("indices", &self.indices.len())
            .finish()
    }
}

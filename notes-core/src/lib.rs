//! Threaded annotations stored alongside versioned data files.
//!
//! Each user keeps their own copy of a notes file, appends messages and
//! status changes offline, and the copies are reconciled later by the merge
//! workflow. This crate provides:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | `Annotation` and `Message` values |
//! | [`repository`] | The file- or text-backed annotation store |
//! | [`index`] | Secondary indices kept in step with repository mutations |
//! | [`differ`] | Guid-matched comparison of two serialized snapshots |
//! | [`progress`] | Diagnostics sink accepted by loading, saving, and registration |
//! | [`format`] | Persisted document constants and version gate |
//!
//! # Quick start
//!
//! ```
//! use notes_core::{AnnotationRepository, IndexByCurrentStatus, NullProgress};
//!
//! let mut repo = AnnotationRepository::from_text(
//!     "<notes version='0'><annotation guid='a1'><message status='open'/></annotation></notes>",
//!     &mut NullProgress,
//! )?;
//! repo.add_observer(IndexByCurrentStatus::new(), &mut NullProgress)?;
//! repo.set_status("a1", "joe", "closed", "fixed in r42")?;
//!
//! let index = repo.index::<IndexByCurrentStatus>().unwrap();
//! assert_eq!(index.guids_with_status("closed"), vec!["a1"]);
//! # Ok::<(), notes_core::NotesError>(())
//! ```

pub mod differ;
pub mod error;
pub mod format;
pub mod index;
pub mod progress;
pub mod repository;
pub mod types;
mod xml;

pub use differ::{diff_snapshots, ChangeListener, ChangeReport, LoggingListener, SnapshotDiffer};
pub use error::{NotesError, Result};
pub use format::FORMAT_VERSION;
pub use index::{
    AllAnnotations, AnnotationIndex, IndexByCurrentStatus, IndexByRef, IndexOfAllOpenConflicts,
};
pub use progress::{LogProgress, NullProgress, Progress, StringProgress};
pub use repository::AnnotationRepository;
pub use types::{Annotation, Message, MERGE_CONFLICT_CLASS};

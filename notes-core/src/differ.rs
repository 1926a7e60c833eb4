//! Identity-based comparison of two serialized note collections.
//!
//! Used by the merge workflow on point-in-time text (ancestor revision vs.
//! current working copy). It never touches a live repository or its indices.
//!
//! Annotations are matched by `guid`, not by position, and compared by XML
//! equivalence, so reordering, attribute order, and layout whitespace never
//! produce a report.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{NotesError, Result};
use crate::format::{annotation_elements, check_version};
use crate::xml::{parse_document, Element};

/// One difference between the ancestor and current snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReport {
    /// The annotation exists only in the current snapshot.
    Addition {
        path: String,
        guid: String,
        current: String,
    },
    /// The annotation exists on both sides with non-equivalent content.
    Changed {
        path: String,
        guid: String,
        ancestor: String,
        current: String,
    },
    /// The annotation exists only in the ancestor. Emitted only when the
    /// differ was built with [`SnapshotDiffer::report_deletions`].
    Deletion {
        path: String,
        guid: String,
        ancestor: String,
    },
}

impl ChangeReport {
    pub fn guid(&self) -> &str {
        match self {
            ChangeReport::Addition { guid, .. }
            | ChangeReport::Changed { guid, .. }
            | ChangeReport::Deletion { guid, .. } => guid,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ChangeReport::Addition { path, .. }
            | ChangeReport::Changed { path, .. }
            | ChangeReport::Deletion { path, .. } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChangeReport::Addition { .. } => "addition",
            ChangeReport::Changed { .. } => "changed",
            ChangeReport::Deletion { .. } => "deletion",
        }
    }

    /// Ancestor-side fragment, absent for additions.
    pub fn ancestor_xml(&self) -> Option<&str> {
        match self {
            ChangeReport::Changed { ancestor, .. } | ChangeReport::Deletion { ancestor, .. } => {
                Some(ancestor)
            }
            ChangeReport::Addition { .. } => None,
        }
    }

    /// Current-side fragment, absent for deletions.
    pub fn current_xml(&self) -> Option<&str> {
        match self {
            ChangeReport::Addition { current, .. } | ChangeReport::Changed { current, .. } => {
                Some(current)
            }
            ChangeReport::Deletion { .. } => None,
        }
    }
}

impl fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: annotation {} ({})", self.path(), self.guid(), self.kind())
    }
}

/// Receives change reports one at a time, in current-snapshot document order.
pub trait ChangeListener {
    fn change_occurred(&mut self, report: ChangeReport);
}

impl ChangeListener for Vec<ChangeReport> {
    fn change_occurred(&mut self, report: ChangeReport) {
        self.push(report);
    }
}

/// Writes every report to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ChangeListener for LoggingListener {
    fn change_occurred(&mut self, report: ChangeReport) {
        log::info!("{report}");
    }
}

/// Stateless snapshot comparison.
///
/// By default only additions and changes are reported; annotations removed
/// outright from the current snapshot go unnoticed unless
/// [`report_deletions`](Self::report_deletions) is switched on.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotDiffer {
    report_deletions: bool,
}

impl SnapshotDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report ancestor annotations missing from the current snapshot.
    /// These reports follow all others, in ancestor document order.
    pub fn report_deletions(mut self, enabled: bool) -> Self {
        self.report_deletions = enabled;
        self
    }

    /// Compares `ancestor` with `current`, labelling reports with `path`.
    ///
    /// Returns the number of reports delivered to `listener`. Blank text on
    /// either side is an empty collection.
    ///
    /// # Errors
    ///
    /// Returns `NotesError::Format` / `NotesError::UnsupportedVersion` if either
    /// side is not a readable notes document or has an annotation without a
    /// guid. Nothing is reported in that case.
    pub fn diff(
        &self,
        path: &str,
        ancestor: &str,
        current: &str,
        listener: &mut dyn ChangeListener,
    ) -> Result<usize> {
        let ancestor_root = parse_snapshot(ancestor, &format!("{path} (ancestor)"))?;
        let current_root = parse_snapshot(current, path)?;

        let ancestor_entries = match &ancestor_root {
            Some(root) => annotation_elements(root, &format!("{path} (ancestor)"))?,
            None => Vec::new(),
        };
        let current_entries = match &current_root {
            Some(root) => annotation_elements(root, path)?,
            None => Vec::new(),
        };

        let mut by_guid: HashMap<&str, &Element> =
            HashMap::with_capacity(ancestor_entries.len());
        for &(guid, element) in &ancestor_entries {
            // First occurrence of a duplicated guid wins.
            by_guid.entry(guid).or_insert(element);
        }
        let mut reports = 0usize;

        for &(guid, child) in &current_entries {
            match by_guid.get(guid) {
                None => {
                    listener.change_occurred(ChangeReport::Addition {
                        path: path.to_owned(),
                        guid: guid.to_owned(),
                        current: child.to_pretty_xml(),
                    });
                    reports += 1;
                }
                Some(parent) if parent.equivalent(child) => {}
                Some(parent) => {
                    listener.change_occurred(ChangeReport::Changed {
                        path: path.to_owned(),
                        guid: guid.to_owned(),
                        ancestor: parent.to_pretty_xml(),
                        current: child.to_pretty_xml(),
                    });
                    reports += 1;
                }
            }
        }

        if self.report_deletions {
            let seen: HashSet<&str> = current_entries.iter().map(|&(guid, _)| guid).collect();
            for &(guid, parent) in &ancestor_entries {
                if !seen.contains(guid) {
                    listener.change_occurred(ChangeReport::Deletion {
                        path: path.to_owned(),
                        guid: guid.to_owned(),
                        ancestor: parent.to_pretty_xml(),
                    });
                    reports += 1;
                }
            }
        }

        log::debug!("{path}: {reports} change report(s)");
        Ok(reports)
    }

    /// Reads both files and compares them, labelling reports with `current_path`.
    ///
    /// # Errors
    ///
    /// `NotesError::Io` if either file cannot be read, otherwise as [`diff`](Self::diff).
    pub fn diff_files(
        &self,
        ancestor_path: impl AsRef<Path>,
        current_path: impl AsRef<Path>,
        listener: &mut dyn ChangeListener,
    ) -> Result<usize> {
        let ancestor = read(ancestor_path.as_ref())?;
        let current = read(current_path.as_ref())?;
        let label = current_path.as_ref().display().to_string();
        self.diff(&label, &ancestor, &current, listener)
    }
}

/// Compares two snapshots with the default differ (no deletion reports).
///
/// # Errors
///
/// See [`SnapshotDiffer::diff`].
pub fn diff_snapshots(
    path: &str,
    ancestor: &str,
    current: &str,
    listener: &mut dyn ChangeListener,
) -> Result<usize> {
    SnapshotDiffer::new().diff(path, ancestor, current, listener)
}

fn parse_snapshot(text: &str, source_name: &str) -> Result<Option<Element>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let root = parse_document(text, source_name)?;
    check_version(&root, source_name)?;
    Ok(Some(root))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| NotesError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ancestor: &str, current: &str) -> Vec<ChangeReport> {
        let mut reports = Vec::new();
        diff_snapshots("notes.xml", ancestor, current, &mut reports).unwrap();
        reports
    }

    #[test]
    fn new_annotation_is_an_addition() {
        let reports = run(
            "<notes version='0'><annotation guid='A'/></notes>",
            "<notes version='0'><annotation guid='A'/><annotation guid='B'/></notes>",
        );
        assert_eq!(reports.len(), 1);
        assert!(matches!(&reports[0], ChangeReport::Addition { guid, .. } if guid == "B"));
        assert_eq!(reports[0].path(), "notes.xml");
    }

    #[test]
    fn changed_message_is_reported_with_both_fragments() {
        let reports = run(
            "<notes version='0'><annotation guid='A'><message guid='m1'>one</message></annotation></notes>",
            "<notes version='0'><annotation guid='A'><message guid='m1'>two</message></annotation></notes>",
        );
        assert_eq!(reports.len(), 1);
        let ChangeReport::Changed { ancestor, current, guid, .. } = &reports[0] else {
            panic!("expected a Changed report, got {:?}", reports[0]);
        };
        assert_eq!(guid, "A");
        assert!(ancestor.contains("one"));
        assert!(current.contains("two"));
    }

    #[test]
    fn reordering_and_layout_are_not_changes() {
        let reports = run(
            "<notes version='0'><annotation guid='A' class='q'/><annotation guid='B'><message status='open'>x</message></annotation></notes>",
            "<notes version='0'>
  <annotation guid='B'>
    <message status='open'>x</message>
  </annotation>
  <annotation class='q' guid='A' />
</notes>",
        );
        assert!(reports.is_empty());
    }

    #[test]
    fn reports_follow_current_document_order() {
        let reports = run(
            "<notes version='0'><annotation guid='B'><message>1</message></annotation></notes>",
            "<notes version='0'><annotation guid='C'/><annotation guid='B'><message>2</message></annotation><annotation guid='A'/></notes>",
        );
        let order: Vec<(&str, &str)> = reports.iter().map(|r| (r.guid(), r.kind())).collect();
        assert_eq!(order, vec![("C", "addition"), ("B", "changed"), ("A", "addition")]);
    }

    #[test]
    fn duplicated_ancestor_guid_matches_first_occurrence() {
        let reports = run(
            "<notes version='0'><annotation guid='A' class='x'/><annotation guid='A' class='y'/></notes>",
            "<notes version='0'><annotation guid='A' class='x'/></notes>",
        );
        assert!(reports.is_empty(), "{reports:?}");
    }

    #[test]
    fn expanded_empty_annotation_is_not_a_change() {
        let reports = run(
            "<notes version='0'><annotation guid='A'>\n  </annotation></notes>",
            "<notes version='0'><annotation guid='A'/></notes>",
        );
        assert!(reports.is_empty(), "{reports:?}");
    }

    #[test]
    fn removed_annotations_are_not_reported_by_default() {
        let reports = run(
            "<notes version='0'><annotation guid='A'/><annotation guid='B'/></notes>",
            "<notes version='0'><annotation guid='A'/></notes>",
        );
        assert!(reports.is_empty());
    }

    #[test]
    fn deletion_reports_are_opt_in() {
        let mut reports = Vec::new();
        SnapshotDiffer::new()
            .report_deletions(true)
            .diff(
                "notes.xml",
                "<notes version='0'><annotation guid='A'/><annotation guid='B'/></notes>",
                "<notes version='0'><annotation guid='A'/><annotation guid='C'/></notes>",
                &mut reports,
            )
            .unwrap();
        let order: Vec<(&str, &str)> = reports.iter().map(|r| (r.guid(), r.kind())).collect();
        assert_eq!(order, vec![("C", "addition"), ("B", "deletion")]);
        assert!(reports[1].ancestor_xml().is_some());
        assert!(reports[1].current_xml().is_none());
    }

    #[test]
    fn logging_listener_counts_like_any_other() {
        let count = diff_snapshots(
            "notes.xml",
            "<notes version='0'/>",
            "<notes version='0'><annotation guid='A'/></notes>",
            &mut LoggingListener,
        )
        .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn blank_ancestor_makes_everything_an_addition() {
        let reports = run("", "<notes version='0'><annotation guid='A'/></notes>");
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind(), "addition");
    }

    #[test]
    fn malformed_side_is_a_format_error() {
        let mut reports = Vec::new();
        let err = diff_snapshots("n", "<notes version='0'>", "<notes version='0'/>", &mut reports)
            .unwrap_err();
        assert!(err.is_format());
        assert!(reports.is_empty());
    }

    #[test]
    fn annotation_without_guid_is_a_format_error() {
        let mut reports = Vec::new();
        let err = diff_snapshots(
            "n",
            "<notes version='0'/>",
            "<notes version='0'><annotation/></notes>",
            &mut reports,
        )
        .unwrap_err();
        assert!(matches!(err, NotesError::Format { .. }));
    }
}

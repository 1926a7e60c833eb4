//! Plain-text rendering of annotations and change reports for the terminal.

use notes_core::{Annotation, ChangeListener, ChangeReport};
use similar::{ChangeTag, TextDiff};

/// One summary line per annotation: guid, class, current status, message count, ref.
pub fn annotation_line(annotation: &Annotation) -> String {
    let status = match annotation.current_status() {
        Some("") => "(none)",
        Some(s) => s,
        None => "(no messages)",
    };
    format!(
        "{}  {:<14} {:<12} {:>3} msg  {}",
        annotation.guid,
        annotation.class_name,
        status,
        annotation.messages().len(),
        annotation.reference
    )
}

/// Renders the thread below an annotation's summary line.
pub fn thread(annotation: &Annotation) -> String {
    let mut out = String::new();
    for message in annotation.messages() {
        let author = if message.author.is_empty() { "?" } else { message.author.as_str() };
        out.push_str(&format!("    [{}] {}: {}\n", message.status, author, message.body()));
    }
    out
}

/// Renders a report as a header line followed by a line diff of its fragments.
///
/// Additions show every current line as `+`, deletions every ancestor line as `-`.
pub fn change_report(report: &ChangeReport) -> String {
    let ancestor = report.ancestor_xml().unwrap_or("");
    let current = report.current_xml().unwrap_or("");
    let mut out = format!("{report}\n");
    let diff = TextDiff::from_lines(ancestor, current);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value().trim_end_matches('\n'));
        out.push('\n');
    }
    out
}

/// Listener that prints each report to stdout as it arrives.
#[derive(Debug, Default)]
pub struct PrintingListener {
    pub printed: usize,
}

impl ChangeListener for PrintingListener {
    fn change_occurred(&mut self, report: ChangeReport) {
        print!("{}", change_report(&report));
        self.printed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notes_core::{diff_snapshots, Message};

    #[test]
    fn changed_report_marks_new_message_lines() {
        let mut reports = Vec::new();
        diff_snapshots(
            "n.notes",
            "<notes version='0'><annotation guid='A'><message guid='1'>hi</message></annotation></notes>",
            "<notes version='0'><annotation guid='A'><message guid='1'>hi</message><message guid='2'>bye</message></annotation></notes>",
            &mut reports,
        )
        .unwrap();
        let text = change_report(&reports[0]);
        assert!(text.starts_with("n.notes: annotation A (changed)"));
        assert!(text.lines().any(|l| l.starts_with('+') && l.contains("bye")));
        assert!(text.lines().any(|l| l.starts_with(' ') && l.contains(">hi<")));
    }

    #[test]
    fn addition_is_all_plus_lines() {
        let report = ChangeReport::Addition {
            path: "n".into(),
            guid: "B".into(),
            current: "<annotation guid=\"B\" />".into(),
        };
        let text = change_report(&report);
        assert_eq!(text.lines().nth(1), Some("+<annotation guid=\"B\" />"));
    }

    #[test]
    fn summary_line_shows_current_status() {
        let a = Annotation::new("question", "lift://x?id=1", "")
            .with_message(Message::new("bob", "open", "why?"));
        let line = annotation_line(&a);
        assert!(line.contains("open"));
        assert!(line.contains("lift://x?id=1"));
        assert!(thread(&a).contains("bob: why?"));
    }
}

use crate::error::{NotesError, Result};
use crate::progress::Progress;
use crate::types::{Annotation, Message};
use crate::xml::{parse_document, Element};

/// Newest notes format version this build reads and the version it writes.
pub const FORMAT_VERSION: u32 = 0;

pub const ROOT_ELEMENT: &str = "notes";
pub const ANNOTATION_ELEMENT: &str = "annotation";
pub const MESSAGE_ELEMENT: &str = "message";

/// A parsed notes document: its declared version plus its annotations in document order.
#[derive(Debug)]
pub(crate) struct Document {
    pub version: u32,
    pub annotations: Vec<Annotation>,
}

/// Reads the root's `version` attribute and gates it against [`FORMAT_VERSION`].
///
/// Older or equal versions are accepted as-is (there is no migration step);
/// anything newer is refused. A missing attribute reads as version 0.
///
/// # Errors
///
/// - `NotesError::Format` if the root is not `<notes>` or the version is not an integer.
/// - `NotesError::UnsupportedVersion` if the version is newer than this build.
pub(crate) fn check_version(root: &Element, source_name: &str) -> Result<u32> {
    if root.name != ROOT_ELEMENT {
        return Err(NotesError::format(
            source_name,
            format!("root element is <{}>, expected <{ROOT_ELEMENT}>", root.name),
        ));
    }
    let version = match root.attr("version") {
        None => 0,
        Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
            NotesError::format(source_name, format!("invalid format version {raw:?}"))
        })?,
    };
    if version > FORMAT_VERSION {
        return Err(NotesError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(version)
}

/// Returns the `<annotation>` children of a version-checked root, keyed by guid.
///
/// # Errors
///
/// Returns `NotesError::Format` if an annotation has no `guid` attribute.
pub(crate) fn annotation_elements<'a>(
    root: &'a Element,
    source_name: &str,
) -> Result<Vec<(&'a str, &'a Element)>> {
    root.elements()
        .filter(|e| e.name == ANNOTATION_ELEMENT)
        .enumerate()
        .map(|(i, e)| match e.attr("guid") {
            Some(guid) => Ok((guid, e)),
            None => Err(NotesError::format(
                source_name,
                format!("annotation #{} has no guid attribute", i + 1),
            )),
        })
        .collect()
}

/// Parses a whole notes document.
///
/// Empty or whitespace-only text is an empty version-0 document. Each loaded
/// annotation gets `file_path` as its file context. Unknown elements and
/// unreadable `date` attributes are reported to `progress` and skipped.
///
/// # Errors
///
/// Returns `NotesError::Format` or `NotesError::UnsupportedVersion`; see
/// [`check_version`] and [`annotation_elements`].
pub(crate) fn parse(
    text: &str,
    source_name: &str,
    file_path: &str,
    progress: &mut dyn Progress,
) -> Result<Document> {
    if text.trim().is_empty() {
        return Ok(Document {
            version: FORMAT_VERSION,
            annotations: Vec::new(),
        });
    }

    let root = parse_document(text, source_name)?;
    let version = check_version(&root, source_name)?;

    for other in root.elements().filter(|e| e.name != ANNOTATION_ELEMENT) {
        progress.warning(&format!(
            "{source_name}: ignoring unexpected <{}> element",
            other.name
        ));
    }

    let annotations = annotation_elements(&root, source_name)?
        .into_iter()
        .map(|(guid, e)| read_annotation(guid, e, source_name, file_path, &mut *progress))
        .collect();

    Ok(Document { version, annotations })
}

fn read_annotation(
    guid: &str,
    element: &Element,
    source_name: &str,
    file_path: &str,
    progress: &mut dyn Progress,
) -> Annotation {
    let mut messages = Vec::new();
    for child in element.elements() {
        if child.name != MESSAGE_ELEMENT {
            progress.warning(&format!(
                "{source_name}: annotation {guid} has unexpected <{}> element",
                child.name
            ));
            continue;
        }
        messages.push(read_message(child, guid, source_name, progress));
    }
    Annotation::from_parts(
        guid.to_owned(),
        element.attr("class").unwrap_or_default().to_owned(),
        element.attr("ref").unwrap_or_default().to_owned(),
        file_path.to_owned(),
        messages,
    )
}

fn read_message(
    element: &Element,
    annotation_guid: &str,
    source_name: &str,
    progress: &mut dyn Progress,
) -> Message {
    let created_at = match element.attr("date") {
        None => 0,
        Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
            progress.warning(&format!(
                "{source_name}: message in annotation {annotation_guid} has unreadable date {raw:?}"
            ));
            0
        }),
    };
    Message::from_parts(
        element.attr("guid").unwrap_or_default().to_owned(),
        element.attr("author").unwrap_or_default().to_owned(),
        element.attr("status").unwrap_or_default().to_owned(),
        created_at,
        element.text(),
    )
}

/// Serializes annotations into a complete version-[`FORMAT_VERSION`] document.
///
/// Empty optional attributes are omitted, so a document that was loaded and
/// saved again keeps the same shape. Message bodies are escaped.
pub(crate) fn serialize<'a>(annotations: impl IntoIterator<Item = &'a Annotation>) -> String {
    let mut root = Element::new(ROOT_ELEMENT);
    root.set_attr("version", &FORMAT_VERSION.to_string());
    for annotation in annotations {
        root.push_element(annotation_element(annotation));
    }
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&root.to_pretty_xml());
    out.push('\n');
    out
}

fn annotation_element(annotation: &Annotation) -> Element {
    let mut e = Element::new(ANNOTATION_ELEMENT);
    e.set_attr("guid", &annotation.guid);
    set_if_present(&mut e, "class", &annotation.class_name);
    set_if_present(&mut e, "ref", &annotation.reference);
    for message in annotation.messages() {
        let mut m = Element::new(MESSAGE_ELEMENT);
        set_if_present(&mut m, "guid", &message.guid);
        set_if_present(&mut m, "author", &message.author);
        set_if_present(&mut m, "status", &message.status);
        if message.created_at != 0 {
            m.set_attr("date", &message.created_at.to_string());
        }
        m.push_text(message.body());
        e.push_element(m);
    }
    e
}

fn set_if_present(e: &mut Element, key: &str, value: &str) {
    if !value.is_empty() {
        e.set_attr(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NullProgress, StringProgress};

    fn load(text: &str) -> Result<Document> {
        parse(text, "test", "", &mut NullProgress)
    }

    #[test]
    fn too_new_version_is_refused() {
        let err = load("<notes version='99'/>").unwrap_err();
        assert!(matches!(
            err,
            NotesError::UnsupportedVersion { found: 99, supported: 0 }
        ));
    }

    #[test]
    fn non_numeric_version_is_a_format_error() {
        let err = load("<notes version='x'/>").unwrap_err();
        assert!(matches!(err, NotesError::Format { .. }));
    }

    #[test]
    fn wrong_root_is_a_format_error() {
        assert!(load("<lift version='0'/>").unwrap_err().is_format());
    }

    #[test]
    fn missing_version_reads_as_zero() {
        assert_eq!(load("<notes/>").unwrap().version, 0);
    }

    #[test]
    fn blank_text_is_empty_document() {
        let doc = load("  \n").unwrap();
        assert_eq!(doc.version, FORMAT_VERSION);
        assert!(doc.annotations.is_empty());
    }

    #[test]
    fn annotation_without_guid_is_a_format_error() {
        let err = load("<notes version='0'><annotation class='q'/></notes>").unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn reads_messages_and_decodes_bodies() {
        let doc = load(
            "<notes version='0'><annotation guid='123' class='question' ref='lift://x?id=1'>
<message guid='234' author='joe' status='open' date='1700000000'>&lt;p&gt;hello</message>
<message guid='235'/></annotation></notes>",
        )
        .unwrap();
        let a = &doc.annotations[0];
        assert_eq!(a.guid, "123");
        assert_eq!(a.class_name, "question");
        assert_eq!(a.reference, "lift://x?id=1");
        assert_eq!(a.messages().len(), 2);
        assert_eq!(a.messages()[0].body(), "<p>hello");
        assert_eq!(a.messages()[0].created_at, 1_700_000_000);
        assert_eq!(a.messages()[1].status, "");
        assert_eq!(a.current_status(), Some(""));
    }

    #[test]
    fn unknown_elements_and_bad_dates_warn() {
        let mut progress = StringProgress::new();
        let doc = parse(
            "<notes version='0'><junk/><annotation guid='1'><message date='yesterday'/><other/></annotation></notes>",
            "test",
            "",
            &mut progress,
        )
        .unwrap();
        assert_eq!(doc.annotations.len(), 1);
        assert_eq!(doc.annotations[0].messages()[0].created_at, 0);
        assert_eq!(progress.warning_count(), 3);
    }

    #[test]
    fn serialized_document_escapes_bodies_and_reloads() {
        let a = Annotation::new("question", "lift://x?id=1", "")
            .with_message(Message::new("joe", "open", "<b>bold</b> & more"));
        let text = serialize([&a]);
        assert!(text.contains("&lt;b&gt;bold&lt;/b&gt; &amp; more"));
        assert!(text.contains("version=\"0\""));

        let doc = load(&text).unwrap();
        assert_eq!(doc.annotations, vec![a]);
    }
}

use std::time::{SystemTime, UNIX_EPOCH};

/// Class label of annotations raised by the merge workflow for conflicting edits.
pub const MERGE_CONFLICT_CLASS: &str = "mergeConflict";

/// Returns the current Unix timestamp in seconds.
pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Generates a fresh identifier in the same shape as the persisted `guid` attributes.
pub(crate) fn new_guid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One entry in an annotation's discussion thread.
///
/// `status` is free-form (`"open"`, `"processing"`, `"closed"`, ...). A message
/// persisted without a `status` attribute carries the empty string.
/// `body` is held decoded; escaping happens only when the document is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub guid: String,
    pub author: String,
    pub status: String,
    pub created_at: i64, // Unix timestamp seconds, persisted as `date`
    body: String,
}

impl Message {
    /// Creates a new message stamped with a fresh guid and the current time.
    pub fn new(author: &str, status: &str, body: &str) -> Self {
        Self {
            guid: new_guid(),
            author: author.to_owned(),
            status: status.to_owned(),
            created_at: now_secs(),
            body: body.to_owned(),
        }
    }

    /// Rebuilds a message from persisted fields.
    pub(crate) fn from_parts(
        guid: String,
        author: String,
        status: String,
        created_at: i64,
        body: String,
    ) -> Self {
        Self { guid, author, status, created_at, body }
    }

    /// The message body as plain text, with markup entities decoded.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// A threaded comment attached to a record in a versioned data file.
///
/// The guid is assigned at construction and never changes. Messages are kept
/// in append order; the last one decides the annotation's current status.
///
/// Once an annotation is handed to an [`AnnotationRepository`](crate::AnnotationRepository)
/// it can only be changed through the repository, which is what keeps the
/// registered indices in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub guid: String,
    pub class_name: String,
    /// URI-like locator of the record or field being commented on.
    pub reference: String,
    /// Path of the notes file the annotation belongs to. Not persisted.
    pub file_path: String,
    messages: Vec<Message>,
}

impl Annotation {
    /// Creates an annotation with a fresh guid and an empty thread.
    pub fn new(class_name: &str, reference: &str, file_path: &str) -> Self {
        Self {
            guid: new_guid(),
            class_name: class_name.to_owned(),
            reference: reference.to_owned(),
            file_path: file_path.to_owned(),
            messages: Vec::new(),
        }
    }

    /// Builder-style helper that seeds the thread with a first message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub(crate) fn from_parts(
        guid: String,
        class_name: String,
        reference: String,
        file_path: String,
        messages: Vec<Message>,
    ) -> Self {
        Self { guid, class_name, reference, file_path, messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Status of the most recently appended message; `None` when the thread is empty.
    pub fn current_status(&self) -> Option<&str> {
        self.messages.last().map(|m| m.status.as_str())
    }

    /// True when the thread is non-empty and its last message has exactly `status`.
    pub fn has_status(&self, status: &str) -> bool {
        self.current_status() == Some(status)
    }

    pub fn is_merge_conflict(&self) -> bool {
        self.class_name == MERGE_CONFLICT_CLASS
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_status_is_last_message() {
        let a = Annotation::new("question", "lift://a.lift?id=1", "")
            .with_message(Message::new("bob", "open", ""))
            .with_message(Message::new("sue", "processing", ""))
            .with_message(Message::new("bob", "closed", "done"));
        assert_eq!(a.current_status(), Some("closed"));
        assert!(a.has_status("closed"));
        assert!(!a.has_status("open"));
    }

    #[test]
    fn empty_thread_matches_no_status() {
        let a = Annotation::new("question", "", "");
        assert_eq!(a.current_status(), None);
        assert!(!a.has_status(""));
        assert!(!a.has_status("open"));
    }

    #[test]
    fn new_annotations_get_distinct_guids() {
        let a = Annotation::new("question", "", "");
        let b = Annotation::new("question", "", "");
        assert!(!a.guid.is_empty());
        assert_ne!(a.guid, b.guid);
    }
}

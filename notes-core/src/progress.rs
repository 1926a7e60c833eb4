//! Diagnostics sink passed into loading, saving, and index registration.
//!
//! A `Progress` has no influence on control flow: operations behave the same
//! whether messages are printed, logged, collected, or dropped.

/// Receives human-readable progress messages and non-fatal warnings.
pub trait Progress {
    fn message(&mut self, text: &str);
    fn warning(&mut self, text: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl Progress for NullProgress {
    fn message(&mut self, _text: &str) {}
    fn warning(&mut self, _text: &str) {}
}

/// Forwards messages to the `log` facade (`info` and `warn`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn message(&mut self, text: &str) {
        log::info!("{text}");
    }

    fn warning(&mut self, text: &str) {
        log::warn!("{text}");
    }
}

/// Collects every line in memory, warnings prefixed with `warning: `.
#[derive(Debug, Default, Clone)]
pub struct StringProgress {
    lines: Vec<String>,
    warnings: usize,
}

impl StringProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of warnings received so far.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// All collected lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl Progress for StringProgress {
    fn message(&mut self, text: &str) {
        self.lines.push(text.to_owned());
    }

    fn warning(&mut self, text: &str) {
        self.warnings += 1;
        self.lines.push(format!("warning: {text}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_progress_counts_warnings_only() {
        let mut p = StringProgress::new();
        p.message("loading");
        p.warning("odd date");
        p.warning("unknown element");
        assert_eq!(p.warning_count(), 2);
        assert_eq!(p.lines().len(), 3);
        assert_eq!(p.lines()[1], "warning: odd date");
    }
}

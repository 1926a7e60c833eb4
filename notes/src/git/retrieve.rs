//! Historical file retrieval backed by git2.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use git2::{ErrorCode, Repository};

/// Supplies the text of a file as it was at some revision.
pub trait RetrieveFile {
    /// Returns `Ok(None)` when `relative_path` did not exist at `revision`.
    fn retrieve_historical_version(
        &self,
        relative_path: &Path,
        revision: &str,
    ) -> anyhow::Result<Option<String>>;
}

/// Reads blobs straight out of a git repository's object database.
pub struct GitFileRetriever {
    repo: Repository,
}

impl GitFileRetriever {
    /// Opens the repository containing `path` (searching parent directories).
    pub fn discover(path: &Path) -> anyhow::Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("no git repository at or above {}", path.display()))?;
        Ok(Self { repo })
    }

    /// Working-tree root of the repository; `None` for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Converts `path` into a path relative to the working-tree root.
    pub fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let workdir = self
            .workdir()
            .ok_or_else(|| anyhow!("repository has no working tree"))?;
        let workdir = workdir
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", workdir.display()))?;
        let absolute = path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        let relative = absolute.strip_prefix(&workdir).with_context(|| {
            format!(
                "{} is outside the repository at {}",
                absolute.display(),
                workdir.display()
            )
        })?;
        Ok(relative.to_path_buf())
    }
}

impl RetrieveFile for GitFileRetriever {
    fn retrieve_historical_version(
        &self,
        relative_path: &Path,
        revision: &str,
    ) -> anyhow::Result<Option<String>> {
        let commit = self
            .repo
            .revparse_single(revision)
            .and_then(|obj| obj.peel_to_commit())
            .with_context(|| format!("cannot resolve revision {revision:?}"))?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(relative_path) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        let text = String::from_utf8(blob.content().to_vec()).with_context(|| {
            format!("{} at {revision} is not UTF-8", relative_path.display())
        })?;
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = "<notes version='0'><annotation guid='A'/></notes>";

    fn commit_file(repo: &Repository, name: &str, text: &str, message: &str) {
        let workdir = repo.workdir().unwrap();
        std::fs::write(workdir.join(name), text).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    #[test]
    fn reads_file_as_of_revision() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.notes", V1, "first");
        commit_file(&repo, "a.notes", "<notes version='0'/>", "second");

        let retriever = GitFileRetriever::discover(dir.path()).unwrap();
        let old = retriever
            .retrieve_historical_version(Path::new("a.notes"), "HEAD~1")
            .unwrap();
        assert_eq!(old.as_deref(), Some(V1));
    }

    #[test]
    fn missing_path_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.notes", V1, "first");

        let retriever = GitFileRetriever::discover(dir.path()).unwrap();
        let missing = retriever
            .retrieve_historical_version(Path::new("b.notes"), "HEAD")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn unknown_revision_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.notes", V1, "first");

        let retriever = GitFileRetriever::discover(dir.path()).unwrap();
        assert!(retriever
            .retrieve_historical_version(Path::new("a.notes"), "no-such-rev")
            .is_err());
    }

    #[test]
    fn relative_path_strips_workdir() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_file(&repo, "a.notes", V1, "first");

        let retriever = GitFileRetriever::discover(dir.path()).unwrap();
        let rel = retriever
            .relative_path(&dir.path().join("a.notes"))
            .unwrap();
        assert_eq!(rel, PathBuf::from("a.notes"));
    }
}

//! Writing converted notes into the output vault.

pub mod frontmatter;
pub mod sanitize;

pub use frontmatter::{FrontMatter, serialize_frontmatter, split_frontmatter};
pub use sanitize::{sanitize_file_name, split_extension, unique_name};

use crate::config::{Config, Layout};
use crate::error::{Error, Result, VaultWriteError};
use crate::types::Note;
use chrono::Datelike;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Directory used by the daily layout for notes without a creation date.
pub const UNDATED_DIR: &str = "undated";

const FALLBACK_NOTEBOOK: &str = "Unfiled";

/// Where a note lands, relative to the vault root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    pub dir: PathBuf,
    /// Collision-free file stem.
    pub stem: String,
}

impl OutputPath {
    pub fn note_file(&self) -> PathBuf {
        self.dir.join(format!("{}.md", self.stem))
    }

    pub fn resource_dir(&self) -> PathBuf {
        self.dir.join(self.resource_dir_name())
    }

    /// Link to a resource file, relative to the note file.
    pub fn resource_link(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            urlencoding::encode(&self.resource_dir_name()),
            urlencoding::encode(file_name)
        )
    }

    fn resource_dir_name(&self) -> String {
        format!("{}.resources", self.stem)
    }
}

/// Result of writing one note file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenNote {
    /// Absolute path of the Markdown file.
    pub path: PathBuf,
    /// A file was already there and has been replaced.
    pub replaced: bool,
}

/// Allocates output paths and writes note files under a vault root.
pub struct VaultWriter {
    root: PathBuf,
    layout: Layout,
    include_location: bool,
    fallback_dir: String,
    /// Per lowercased directory: its first-seen spelling and the stems
    /// claimed in it this run (lowercased).
    taken: HashMap<String, (PathBuf, HashSet<String>)>,
}

impl VaultWriter {
    /// Create a writer, creating the vault root if needed.
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::other(format!(
                "vault root is not a directory: {}",
                root.display()
            ))));
        }

        let fallback_dir = match sanitize_file_name(&config.default_notebook) {
            name if name.is_empty() => FALLBACK_NOTEBOOK.to_string(),
            name => name,
        };

        Ok(Self {
            root,
            layout: config.layout,
            include_location: config.include_location,
            fallback_dir,
            taken: HashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pick the directory and a stem that no other note of this run uses.
    pub fn allocate(&mut self, note: &Note) -> OutputPath {
        let dir = self.directory_for(note);

        let stem = match sanitize_file_name(&note.title) {
            stem if stem.is_empty() => format!("note-{}", note.index + 1),
            stem => stem,
        };

        let key = dir.to_string_lossy().to_lowercase();
        let (dir, taken) = self
            .taken
            .entry(key)
            .or_insert_with(|| (dir, HashSet::new()));
        let dir = dir.clone();
        let stem = unique_name(&stem, None, taken);
        log::debug!("{} -> {}", note.title, dir.join(&stem).display());

        OutputPath { dir, stem }
    }

    fn directory_for(&self, note: &Note) -> PathBuf {
        match self.layout {
            Layout::Notebook => match sanitize_file_name(&note.notebook) {
                name if name.is_empty() => PathBuf::from(&self.fallback_dir),
                name => PathBuf::from(name),
            },
            Layout::Daily => match note.created {
                Some(created) => PathBuf::from(format!("{:04}", created.year()))
                    .join(format!("{:02}", created.month()))
                    .join(format!("{:02}", created.day())),
                None => PathBuf::from(UNDATED_DIR),
            },
        }
    }

    /// Write front matter and body to the note's file.
    pub fn write(
        &self,
        output: &OutputPath,
        note: &Note,
        body: &str,
    ) -> std::result::Result<WrittenNote, VaultWriteError> {
        let path = self.root.join(output.note_file());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VaultWriteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut content = serialize_frontmatter(&FrontMatter::from_note(note, self.include_location))?;
        if !body.is_empty() {
            content.push('\n');
            content.push_str(body);
            content.push('\n');
        }

        let replaced = path.exists();
        if replaced {
            log::warn!("overwriting existing file {}", path.display());
        }

        std::fs::write(&path, content).map_err(|source| VaultWriteError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(WrittenNote { path, replaced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, NoteAttributes};
    use chrono::{FixedOffset, TimeZone};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn note(index: usize, title: &str, notebook: &str) -> Note {
        Note {
            index,
            title: title.to_string(),
            created: None,
            updated: None,
            tags: BTreeSet::new(),
            notebook: notebook.to_string(),
            body: Document::default(),
            resources: Vec::new(),
            attributes: NoteAttributes::default(),
        }
    }

    #[test]
    fn test_collisions_get_suffixes_in_order() {
        let dir = TempDir::new().unwrap();
        let mut writer = VaultWriter::new(dir.path(), &Config::default()).unwrap();

        let a = writer.allocate(&note(0, "Ideas", "Work"));
        let b = writer.allocate(&note(1, "ideas", "Work"));
        let c = writer.allocate(&note(2, "Ideas", "Home"));

        assert_eq!(a.note_file(), PathBuf::from("Work/Ideas.md"));
        assert_eq!(b.note_file(), PathBuf::from("Work/ideas-1.md"));
        assert_eq!(c.note_file(), PathBuf::from("Home/Ideas.md"));
    }

    #[test]
    fn test_directories_differing_in_case_share_claims() {
        let dir = TempDir::new().unwrap();
        let mut writer = VaultWriter::new(dir.path(), &Config::default()).unwrap();

        let a = writer.allocate(&note(0, "Ideas", "Work"));
        let b = writer.allocate(&note(1, "Ideas", "work"));

        assert_eq!(a.note_file(), PathBuf::from("Work/Ideas.md"));
        assert_eq!(b.note_file(), PathBuf::from("Work/Ideas-1.md"));
    }

    #[test]
    fn test_unsafe_title_and_fallback_stem() {
        let dir = TempDir::new().unwrap();
        let mut writer = VaultWriter::new(dir.path(), &Config::default()).unwrap();

        let unsafe_title = writer.allocate(&note(0, "a/b: c?", "Unfiled"));
        assert_eq!(unsafe_title.stem, "a_b_ c_");

        let dots = writer.allocate(&note(6, "...", "Unfiled"));
        assert_eq!(dots.stem, "note-7");
    }

    #[test]
    fn test_daily_layout() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            layout: Layout::Daily,
            ..Config::default()
        };
        let mut writer = VaultWriter::new(dir.path(), &config).unwrap();

        let mut dated = note(0, "Journal", "Home");
        dated.created = Some(
            FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 7, 8, 0, 0)
                .unwrap(),
        );
        assert_eq!(
            writer.allocate(&dated).note_file(),
            PathBuf::from("2024/03/07/Journal.md")
        );
        assert_eq!(
            writer.allocate(&note(1, "Journal", "Home")).note_file(),
            PathBuf::from("undated/Journal.md")
        );
    }

    #[test]
    fn test_resource_link_is_percent_encoded() {
        let output = OutputPath {
            dir: PathBuf::from("Travel"),
            stem: "Trip notes".to_string(),
        };
        assert_eq!(output.resource_dir(), PathBuf::from("Travel/Trip notes.resources"));
        assert_eq!(
            output.resource_link("beach photo.png"),
            "Trip%20notes.resources/beach%20photo.png"
        );
    }

    #[test]
    fn test_write_and_replace() {
        let dir = TempDir::new().unwrap();
        let mut writer = VaultWriter::new(dir.path().join("vault"), &Config::default()).unwrap();
        let n = note(0, "Hello", "Inbox");
        let output = writer.allocate(&n);

        let first = writer.write(&output, &n, "Hello **world**").unwrap();
        assert!(!first.replaced);
        let content = std::fs::read_to_string(&first.path).unwrap();
        assert!(content.starts_with("---\ntitle: Hello\n"));
        assert!(content.ends_with("---\n\nHello **world**\n"));

        let second = writer.write(&output, &n, "Hello **world**").unwrap();
        assert!(second.replaced);
        assert_eq!(std::fs::read_to_string(&second.path).unwrap(), content);
    }

    #[test]
    fn test_root_that_is_a_file_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, "").unwrap();
        assert!(VaultWriter::new(&file, &Config::default()).is_err());
    }
}

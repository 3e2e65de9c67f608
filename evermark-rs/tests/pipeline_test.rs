//! End-to-end conversion tests through the library API.

use evermark::vault::{FrontMatter, split_frontmatter};
use evermark::{Config, Layout, convert};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .unwrap()
        .join("fixtures")
        .join(name)
}

/// Every file under `root`, relative and sorted.
fn files(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, root, out);
            } else {
                let rel = path.strip_prefix(root).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

fn read_note(root: &Path, rel: &str) -> (FrontMatter, String) {
    let content = std::fs::read_to_string(root.join(rel)).unwrap();
    let (yaml, body) = split_frontmatter(&content);
    let front: FrontMatter = serde_yaml::from_str(yaml.unwrap()).unwrap();
    (front, body.to_string())
}

#[test]
fn converts_basic_export() {
    let vault = TempDir::new().unwrap();
    let summary = convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    assert_eq!(summary.notes_seen, 8);
    assert_eq!(summary.notes_converted, 7);
    assert_eq!(summary.resources_written, 1);
    assert_eq!(
        files(vault.path()),
        vec![
            "Unfiled/Hello.md",
            "Unfiled/Ideas-1.md",
            "Unfiled/Ideas.md",
            "Unfiled/Odd.md",
            "Unfiled/Trip.md",
            "Unfiled/Trip.resources/beach.png",
            "Unfiled/Untitled.md",
            "Unfiled/a_b_ c_.md",
        ]
    );
}

#[test]
fn paragraph_with_bold() {
    let vault = TempDir::new().unwrap();
    convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    let (front, body) = read_note(vault.path(), "Unfiled/Hello.md");
    assert_eq!(front.title, "Hello");
    assert_eq!(front.created, "2023-12-31T23:59:59+00:00");
    assert_eq!(front.updated, "2024-01-01T12:00:00+00:00");
    assert_eq!(front.tags, vec!["greeting"]);
    assert_eq!(front.notebook, "Unfiled");
    assert_eq!(body, "\nHello **world**\n");
}

#[test]
fn collisions_follow_encounter_order() {
    let vault = TempDir::new().unwrap();
    convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    let (_, first) = read_note(vault.path(), "Unfiled/Ideas.md");
    let (_, second) = read_note(vault.path(), "Unfiled/Ideas-1.md");
    assert_eq!(first.trim(), "first");
    assert_eq!(second.trim(), "second");
}

#[test]
fn unsafe_title_kept_in_front_matter() {
    let vault = TempDir::new().unwrap();
    convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    let (front, _) = read_note(vault.path(), "Unfiled/a_b_ c_.md");
    assert_eq!(front.title, "a/b: c?");
    assert_eq!(front.created, "unknown");
}

#[test]
fn image_resource_extracted_and_linked() {
    let vault = TempDir::new().unwrap();
    convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    let payload = std::fs::read(vault.path().join("Unfiled/Trip.resources/beach.png")).unwrap();
    assert_eq!(payload, b"fake png bytes");

    let (front, body) = read_note(vault.path(), "Unfiled/Trip.md");
    assert_eq!(front.tags, vec!["photos", "travel"]);
    assert_eq!(body.trim(), "Beach day\n\n![beach.png](Trip.resources/beach.png)");
}

#[test]
fn dangling_reference_fails_only_that_note() {
    let vault = TempDir::new().unwrap();
    let summary = convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    assert_eq!(summary.notes_failed.len(), 1);
    let failure = &summary.notes_failed[0];
    assert_eq!(failure.label, "Broken");
    assert_eq!(failure.index, 5);
    assert!(failure.reason.contains("deadbeef"));
    assert!(!vault.path().join("Unfiled/Broken.md").exists());
}

#[test]
fn unknown_tag_keeps_text() {
    let vault = TempDir::new().unwrap();
    convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    let (_, body) = read_note(vault.path(), "Unfiled/Odd.md");
    assert_eq!(body.trim(), "still here");
}

#[test]
fn second_run_is_identical() {
    let vault = TempDir::new().unwrap();
    let first = convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();
    let before: Vec<(String, Vec<u8>)> = files(vault.path())
        .into_iter()
        .map(|f| {
            let data = std::fs::read(vault.path().join(&f)).unwrap();
            (f, data)
        })
        .collect();

    let second = convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();
    let after: Vec<(String, Vec<u8>)> = files(vault.path())
        .into_iter()
        .map(|f| {
            let data = std::fs::read(vault.path().join(&f)).unwrap();
            (f, data)
        })
        .collect();

    assert_eq!(before, after);
    assert_eq!(first.written, second.written);
    assert!(first.warnings.is_empty());
    // Every note and the attachment were overwritten.
    assert_eq!(second.warnings.len(), 8);
}

#[test]
fn directory_of_notebooks() {
    let vault = TempDir::new().unwrap();
    let summary = convert(&fixture_path("notebooks"), vault.path(), &Config::default()).unwrap();

    assert_eq!(summary.notes_converted, 2);
    assert_eq!(files(vault.path()), vec!["Home/Plan.md", "Work/Plan.md"]);

    let (front, body) = read_note(vault.path(), "Work/Plan.md");
    assert_eq!(front.notebook, "Work");
    assert_eq!(body.trim(), "- Work item");
}

#[cfg(unix)]
#[test]
fn unsafe_notebook_name_sanitized_for_directory() {
    let input = TempDir::new().unwrap();
    let exports = input.path().join("exports [2024]");
    std::fs::create_dir(&exports).unwrap();
    std::fs::copy(
        fixture_path("notebooks/Work.enex"),
        exports.join("Q&A: 2024?.enex"),
    )
    .unwrap();

    let vault = TempDir::new().unwrap();
    let summary = convert(&exports, vault.path(), &Config::default()).unwrap();

    assert_eq!(summary.notes_converted, 1);
    assert_eq!(files(vault.path()), vec!["Q&A_ 2024_/Plan.md"]);
    let (front, _) = read_note(vault.path(), "Q&A_ 2024_/Plan.md");
    assert_eq!(front.notebook, "Q&A: 2024?");
}

#[test]
fn blocked_attachment_still_writes_note() {
    let vault = TempDir::new().unwrap();
    std::fs::create_dir_all(vault.path().join("Unfiled")).unwrap();
    // A file where the attachment directory should go.
    std::fs::write(vault.path().join("Unfiled/Trip.resources"), "").unwrap();

    let summary = convert(&fixture_path("basic.enex"), vault.path(), &Config::default()).unwrap();

    assert_eq!(summary.notes_converted, 7);
    assert_eq!(summary.resources_written, 0);
    assert_eq!(summary.resource_failures.len(), 1);
    let failure = &summary.resource_failures[0];
    assert_eq!(failure.note, "Trip");
    assert_eq!(failure.file_name, "beach.png");
    assert_eq!(failure.identity, "aa2da81e547273050e1c05e9eb522de1");

    let (_, body) = read_note(vault.path(), "Unfiled/Trip.md");
    assert_eq!(body.trim(), "Beach day\n\n[missing attachment: beach.png]");
}

#[test]
fn daily_layout_with_offset() {
    let vault = TempDir::new().unwrap();
    let config = Config {
        layout: Layout::Daily,
        utc_offset: "+01:00".to_string(),
        ..Config::default()
    };
    convert(&fixture_path("basic.enex"), vault.path(), &config).unwrap();

    // 23:59:59Z on Dec 31 is already New Year at +01:00.
    let (front, _) = read_note(vault.path(), "2024/01/01/Hello.md");
    assert_eq!(front.created, "2024-01-01T00:59:59+01:00");
    assert!(vault.path().join("undated/a_b_ c_.md").exists());
    assert!(vault.path().join("2024/01/05/Trip.resources/beach.png").exists());
}

#[test]
fn unreadable_archive_is_fatal() {
    let vault = TempDir::new().unwrap();
    let result = convert(&fixture_path("invalid.enex"), vault.path(), &Config::default());
    let err = result.unwrap_err();
    assert_eq!(err.exit_code(), evermark::error::exit_code::ARCHIVE_UNREADABLE);

    let missing = convert(&fixture_path("missing.enex"), vault.path(), &Config::default());
    assert!(matches!(missing, Err(evermark::Error::Archive(_))));
}

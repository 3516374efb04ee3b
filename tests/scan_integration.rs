use std::fs;
use std::path::{Path, PathBuf};

use rust_matrix_player::error::ScanError;
use rust_matrix_player::scan::{ScanOptions, enumerate};
use tempfile::tempdir;

fn opts() -> ScanOptions {
    ScanOptions {
        image_exts: vec!["png".into(), "jpg".into(), "gif".into()],
        video_exts: vec!["mp4".into()],
    }
}

fn names(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn lists_eligible_files_sorted_and_non_recursive() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("nested")).unwrap();
    for name in ["c.gif", "a.png", "B.JPG", "d.mp4", "notes.txt", "noext"] {
        fs::write(root.join(name), b"x").unwrap();
    }
    fs::write(root.join("nested").join("e.png"), b"x").unwrap();

    let found = enumerate(root, &opts()).unwrap();
    assert_eq!(names(root, found), vec!["B.JPG", "a.png", "c.gif", "d.mp4"]);
}

#[test]
fn hidden_files_and_directories_are_skipped() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join(".hidden.png"), b"x").unwrap();
    fs::create_dir(root.join("folder.png")).unwrap();
    fs::write(root.join("shown.png"), b"x").unwrap();

    let found = enumerate(root, &opts()).unwrap();
    assert_eq!(names(root, found), vec!["shown.png"]);
}

#[cfg(unix)]
#[test]
fn symlinked_files_are_followed() {
    let tmp = tempdir().unwrap();
    let outside = tempdir().unwrap();
    let target = outside.path().join("real.png");
    fs::write(&target, b"x").unwrap();
    std::os::unix::fs::symlink(&target, tmp.path().join("link.png")).unwrap();
    std::os::unix::fs::symlink(outside.path().join("gone.png"), tmp.path().join("dangling.png"))
        .unwrap();

    let found = enumerate(tmp.path(), &opts()).unwrap();
    assert_eq!(names(tmp.path(), found), vec!["link.png"]);
}

#[test]
fn empty_directory_yields_nothing() {
    let tmp = tempdir().unwrap();
    assert!(enumerate(tmp.path(), &opts()).unwrap().is_empty());
}

#[test]
fn missing_or_file_path_is_bad_dir() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("missing");
    assert!(matches!(
        enumerate(&missing, &opts()),
        Err(ScanError::BadDir(p)) if p == missing
    ));

    let file = tmp.path().join("file.png");
    fs::write(&file, b"x").unwrap();
    assert!(matches!(enumerate(&file, &opts()), Err(ScanError::BadDir(_))));
}

//! Input discovery: `<root>/<genre>/<novel>.txt`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreDir {
    pub genre: String,
    pub files: Vec<PathBuf>,
}

/// Every immediate subdirectory of `root` is a genre; its `.txt` files
/// (any case, not recursive) are the novels. Genres and files come back
/// sorted by name. Only an unreadable `root` is an error; unreadable genre
/// directories are logged and skipped.
pub fn discover(root: &Path) -> io::Result<Vec<GenreDir>> {
    let mut genres = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(genre) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!("Skipping genre directory with non UTF-8 name: {}", path.display());
            continue;
        };

        match text_files(&path) {
            Ok(files) => genres.push(GenreDir {
                genre: genre.to_string(),
                files,
            }),
            Err(e) => tracing::warn!("Skipping '{}': {}", path.display(), e),
        }
    }

    genres.sort_by(|a, b| a.genre.cmp(&b.genre));
    Ok(genres)
}

fn text_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_txt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"));
        if is_txt && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name without extension, used as the title fallback.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

//! Filesystem capability: copy trees, clear folders, count, write atomically.
//!
//! ## Copy contract
//!
//! [`copy_directory`] mirrors a source tree into a destination:
//!
//! - hidden entries (leading `.`) are skipped
//! - every file name passes through the `rename` hook, every relative
//!   directory path through the `dir_filter` hook
//! - an existing destination file is removed before the copy, so the copy
//!   always overwrites
//! - two sources landing on the same destination name within one directory
//!   are reported to the [`ErrorSink`] as a duplicate and the copy carries on
//!   (the later file wins)
//! - files with a registered [`FileFilter`] are read as text, filtered and
//!   written instead of copied byte-for-byte
//! - the [`CancelToken`] is polled after every file
//!
//! ## Inline stylesheets
//!
//! [`InlineStyleSheetFilter`] replaces stand-alone
//! `<link rel=stylesheet href="...">` lines with the stylesheet's content:
//!
//! ```text
//! <link rel=stylesheet href="css/site.css">
//!   ↓
//! <!-- <link rel=stylesheet href="css/site.css"> -->
//! <style>
//! ...contents of <static>/css/site.css...
//! </style>
//! ```

use crate::cancel::{CancelToken, Cancelled};
use crate::status::ErrorSink;
use regex::Regex;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

static STYLESHEET_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*<link\s*rel=stylesheet\s*href="(.+?)">\s*$"#)
        .expect("stylesheet link pattern is valid")
});

#[derive(Error, Debug)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Duplicate file name: {0}")]
    DuplicateName(String),
    #[error("Cannot inline stylesheet {path}: {source}")]
    Stylesheet { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Text transformation applied to a file while copying.
pub trait FileFilter: Sync {
    fn filter(&self, input: &str) -> Result<String, FsError>;
}

/// Inline `<link rel=stylesheet>` lines, resolving hrefs against `static_root`.
pub struct InlineStyleSheetFilter {
    pub static_root: PathBuf,
}

impl FileFilter for InlineStyleSheetFilter {
    fn filter(&self, input: &str) -> Result<String, FsError> {
        let mut out = Vec::new();
        for line in input.split('\n') {
            match STYLESHEET_LINK.captures(line) {
                Some(caps) => {
                    let path = self.static_root.join(&caps[1]);
                    let css = std::fs::read_to_string(&path)
                        .map_err(|source| FsError::Stylesheet { path, source })?;
                    out.push(format!("<!-- {line} -->"));
                    out.push("<style>".to_string());
                    out.push(css);
                    out.push("</style>".to_string());
                }
                None => out.push(line.to_string()),
            }
        }
        Ok(out.join("\n"))
    }
}

fn keep_name(name: &str) -> String {
    name.to_string()
}

fn keep_dir(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Per-file and per-directory hooks for [`copy_directory`].
#[derive(Clone, Copy)]
pub struct CopyHooks<'a> {
    pub rename: fn(&str) -> String,
    pub dir_filter: fn(&Path) -> PathBuf,
    /// `(file name, filter)` pairs, matched on the source file name.
    pub filters: &'a [(&'a str, &'a dyn FileFilter)],
}

impl Default for CopyHooks<'_> {
    fn default() -> Self {
        Self {
            rename: keep_name,
            dir_filter: keep_dir,
            filters: &[],
        }
    }
}

/// A top-level file copied by [`copy_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedFile {
    pub source: PathBuf,
    pub dest: PathBuf,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Recursively copy `source` into `dest`. See the [module docs](self).
///
/// Returns the files copied from the top level of `source`, in file name
/// order. Duplicate names are reported to `sink` with `context`.
pub fn copy_directory(
    source: &Path,
    dest: &Path,
    hooks: CopyHooks,
    sink: &dyn ErrorSink,
    context: &str,
    cancel: &CancelToken,
) -> Result<Vec<CopiedFile>, FsError> {
    std::fs::create_dir_all(dest)?;
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut top_level = Vec::new();

    let walker = WalkDir::new(source)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(dest.join((hooks.dir_filter)(relative)))?;
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        let target_dir = match relative.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => dest.join((hooks.dir_filter)(parent)),
            _ => dest.to_path_buf(),
        };
        let renamed = (hooks.rename)(&file_name);
        let target = target_dir.join(&renamed);

        if !seen.insert(target.clone()) {
            sink.handle_error(context, &FsError::DuplicateName(renamed.clone()));
        }

        remove_if_exists(&target)?;
        match hooks
            .filters
            .iter()
            .find(|(name, _)| *name == file_name)
        {
            Some((_, filter)) => {
                let text = std::fs::read_to_string(entry.path())?;
                write_atomic(&target, filter.filter(&text)?.as_bytes())?;
            }
            None => {
                std::fs::copy(entry.path(), &target)?;
            }
        }

        if entry.depth() == 1 {
            top_level.push(CopiedFile {
                source: entry.path().to_path_buf(),
                dest: target,
            });
        }
        cancel.check()?;
    }

    Ok(top_level)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove every non-hidden entry of `dir`. A missing `dir` is not an error.
///
/// Hidden files survive, so the photo cache outlives a clean build.
pub fn delete_contents(dir: &Path) -> io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Number of non-hidden files directly in `dir` accepted by `include`.
pub fn count_files(dir: &Path, include: impl Fn(&Path) -> bool) -> io::Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file()
            && !entry.file_name().to_string_lossy().starts_with('.')
            && include(&path)
        {
            count += 1;
        }
    }
    Ok(count)
}

/// Write through a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{name}.tmp"));
    std::fs::write(&temp, bytes)?;
    std::fs::rename(&temp, path)
}

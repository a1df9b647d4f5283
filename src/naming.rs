//! File and directory naming rules for generated output.
//!
//! ## Output file names
//!
//! Export tools decorate file names with dates and plugin markers. Only the
//! base name and short sequence numbers survive into the site:
//!
//! - `_MG_8665-20240103-2.jpg` → `_MG_8665-2.jpg`
//! - `IMG_0042-DxO-PureRAW.jpg` → `IMG_0042.jpg`
//! - `sunset-03.jpg` → `sunset-03.jpg`
//!
//! ## Width directories
//!
//! Reduced-size copies live in `W0512/`-style folders. Path components that
//! are exactly `W` followed by digits are lower-cased (`W0512` → `w0512`) so
//! URLs stay predictable.
//!
//! ## Gallery names
//!
//! A gallery's generation-safe name is a lower-case slug of its source
//! directory, used for its output folder, page and sprite names.

use std::path::{Component, Path, PathBuf};

/// Base name of `file_name` with decorations removed and no extension.
///
/// The stem is split on `-`. The first part is kept; later parts survive only
/// when they are all digits and at most two characters long.
pub fn filtered_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = stem.split('-');
    let first = parts.next().unwrap_or_default();
    let kept = parts.filter(|p| !p.is_empty() && p.len() < 3 && p.chars().all(|c| c.is_ascii_digit()));

    std::iter::once(first)
        .chain(kept)
        .collect::<Vec<_>>()
        .join("-")
}

/// [`filtered_stem`] with the original extension re-appended. Idempotent.
pub fn filtered_file_name(file_name: &str) -> String {
    let stem = filtered_stem(file_name);
    match Path::new(file_name).extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem,
    }
}

fn is_width_dir(component: &str) -> bool {
    component.len() > 1
        && component.starts_with('W')
        && component[1..].chars().all(|c| c.is_ascii_digit())
}

/// Lower-case every `W<digits>` component of a relative path.
pub fn lowercase_width_dirs(path: &Path) -> PathBuf {
    path.components()
        .map(|c| match c {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                if is_width_dir(&name) {
                    PathBuf::from(name.to_lowercase())
                } else {
                    PathBuf::from(name.as_ref())
                }
            }
            other => PathBuf::from(other.as_os_str()),
        })
        .collect()
}

/// Lower-case slug: ASCII alphanumerics kept, runs of anything else become a
/// single `-`, no leading or trailing dashes.
pub fn generation_name(directory: &str) -> String {
    let mut slug = String::with_capacity(directory.len());
    for c in directory.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Galleries are shown by display position and title, with the source folder
//! and output page as indented context lines. Errors are never mixed into the
//! per-gallery lines: they are listed once, grouped, at the end of a build.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Galleries
//! 001 Machu Picchu (42 photos)
//!     Source: galleries/2011MachuPicchu/
//!     Output: 2011machupicchu.html
//!     Categories: travel
//!     Title image: _MG_8665.jpg
//! 002 Rome (source missing)
//!     Source: galleries/Rome 2012/
//!     Output: rome-2012.html
//!
//! Sitemap: https://photos.example.com
//! ```
//!
//! ## Build (live)
//!
//! ```text
//! Website: Generating
//! 2011machupicchu: Generating
//! 2011machupicchu: 42 photos (40 cached, 2 extracted)
//! 2011machupicchu: Complete
//!     ! peru (reading bad.jpg): cannot decode bad.jpg
//! Website: Complete with errors
//! ```
//!
//! ## Build (summary)
//!
//! ```text
//! 001 Machu Picchu: Complete (126/126)
//! 002 Rome: Complete with errors (33/36)
//!
//! Website: Complete with errors (97%) in 4.2s
//!
//! Errors
//!     Gallery: Rome
//!     rome-2012 (reading bad.jpg): cannot decode bad.jpg
//! ```
//!
//! # Architecture
//!
//! Every display has a `format_*` function returning `Vec<String>` and, where
//! the binary prints it directly, a `print_*` wrapper. Format functions are
//! pure.

use crate::config::SiteConfig;
use crate::status::{StatusEvent, StatusSnapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional detail.
///
/// ```text
/// 001 Machu Picchu (42 photos)
/// 001 Machu Picchu
/// ```
fn entity_header(index: usize, title: &str, detail: Option<&str>) -> String {
    match detail {
        Some(d) => format!("{} {} ({})", format_index(index), title, d),
        None => format!("{} {}", format_index(index), title),
    }
}

fn format_seconds(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

// ============================================================================
// Check
// ============================================================================

/// Format the configured galleries with their source photo counts.
///
/// `source_counts[i]` is the photo count of gallery `i`, or `None` when its
/// source folder is missing.
pub fn format_check_output(config: &SiteConfig, source_counts: &[Option<usize>]) -> Vec<String> {
    let mut lines = vec!["Galleries".to_string()];
    if config.galleries.is_empty() {
        lines.push(format!("{}(none configured)", indent(1)));
    }

    for (i, gallery) in config.galleries.iter().enumerate() {
        let detail = match source_counts.get(i).copied().flatten() {
            Some(n) => format!("{n} photos"),
            None => "source missing".to_string(),
        };
        lines.push(entity_header(i + 1, &gallery.title, Some(&detail)));
        lines.push(format!(
            "{}Source: {}/{}/",
            indent(1),
            config.galleries_dir,
            gallery.directory
        ));
        lines.push(format!("{}Output: {}.html", indent(1), gallery.gen_name()));
        if !gallery.categories.is_empty() {
            lines.push(format!(
                "{}Categories: {}",
                indent(1),
                gallery.categories.join(", ")
            ));
        }
        if let Some(title_image) = &gallery.title_image {
            lines.push(format!("{}Title image: {}", indent(1), title_image));
        }
    }

    lines.push(String::new());
    lines.push(match &config.root_url {
        Some(url) => format!("Sitemap: {url}"),
        None => "Sitemap: disabled (no root_url)".to_string(),
    });
    lines
}

pub fn print_check_output(config: &SiteConfig, source_counts: &[Option<usize>]) {
    for line in format_check_output(config, source_counts) {
        println!("{}", line);
    }
}

// ============================================================================
// Build: live events
// ============================================================================

/// Format a single status event as display lines.
///
/// Progress ticks print nothing; the summary reports final counts.
pub fn format_status_event(event: &StatusEvent) -> Vec<String> {
    match event {
        StatusEvent::Site(status) => vec![format!("Website: {}", status.description())],
        StatusEvent::Gallery { name, status } => {
            vec![format!("{}: {}", name, status.description())]
        }
        StatusEvent::Progress { .. } => Vec::new(),
        StatusEvent::Error { message, .. } => vec![format!("{}! {}", indent(1), message)],
        StatusEvent::Message {
            gallery: Some(name),
            message,
        } => vec![format!("{}: {}", name, message)],
        StatusEvent::Message {
            gallery: None,
            message,
        } => vec![message.clone()],
    }
}

// ============================================================================
// Build: summary
// ============================================================================

/// Format the final state of a run: per-gallery status, overall status, and
/// the grouped error list.
pub fn format_build_summary(snapshot: &StatusSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, gallery) in snapshot.galleries.iter().enumerate() {
        lines.push(format!(
            "{} {}: {} ({}/{})",
            format_index(i + 1),
            gallery.title,
            gallery.description,
            gallery.progress,
            gallery.target
        ));
    }

    lines.push(String::new());
    let elapsed = snapshot
        .elapsed_ms
        .map(|ms| format!(" in {}", format_seconds(ms)))
        .unwrap_or_default();
    lines.push(format!(
        "Website: {} ({:.0}%){}",
        snapshot.description, snapshot.percent, elapsed
    ));

    if !snapshot.errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors".to_string());
        for error in &snapshot.errors {
            lines.push(format!("{}{}", indent(1), error));
        }
    }
    lines
}

pub fn print_build_summary(snapshot: &StatusSnapshot) {
    for line in format_build_summary(snapshot) {
        println!("{}", line);
    }
}

// ============================================================================
// Cameras
// ============================================================================

/// Format the camera inventory: each model with the first photo taken with it.
pub fn format_cameras(cameras: &BTreeMap<String, PathBuf>) -> Vec<String> {
    if cameras.is_empty() {
        return vec!["No cameras recorded (run a build first)".to_string()];
    }
    let mut lines = vec![format!("Cameras ({})", cameras.len())];
    for (model, path) in cameras {
        lines.push(model.clone());
        lines.push(format!("{}Source: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_cameras(cameras: &BTreeMap<String, PathBuf>) {
    for line in format_cameras(cameras) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GalleryConfig;
    use crate::status::{GenerationStatus, StatusTree};

    fn config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.galleries = vec![
            GalleryConfig {
                title: "Machu Picchu".into(),
                directory: "2011MachuPicchu".into(),
                title_image: Some("_MG_8665.jpg".into()),
                categories: vec!["travel".into()],
            },
            GalleryConfig {
                title: "Rome".into(),
                directory: "Rome 2012".into(),
                title_image: None,
                categories: Vec::new(),
            },
        ];
        config
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn entity_header_with_and_without_detail() {
        assert_eq!(entity_header(1, "Peru", Some("5 photos")), "001 Peru (5 photos)");
        assert_eq!(entity_header(2, "Rome", None), "002 Rome");
    }

    #[test]
    fn indent_levels() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn seconds_one_decimal() {
        assert_eq!(format_seconds(4249), "4.2s");
        assert_eq!(format_seconds(0), "0.0s");
    }

    // =========================================================================
    // Check
    // =========================================================================

    #[test]
    fn check_lists_galleries() {
        let lines = format_check_output(&config(), &[Some(42), None]);
        assert_eq!(
            lines,
            vec![
                "Galleries",
                "001 Machu Picchu (42 photos)",
                "    Source: galleries/2011MachuPicchu/",
                "    Output: 2011machupicchu.html",
                "    Categories: travel",
                "    Title image: _MG_8665.jpg",
                "002 Rome (source missing)",
                "    Source: galleries/Rome 2012/",
                "    Output: rome-2012.html",
                "",
                "Sitemap: disabled (no root_url)",
            ]
        );
    }

    #[test]
    fn check_shows_sitemap_url() {
        let mut config = SiteConfig::default();
        config.root_url = Some("https://photos.example.com".into());
        let lines = format_check_output(&config, &[]);
        assert_eq!(lines[1], "    (none configured)");
        assert_eq!(lines.last().unwrap(), "Sitemap: https://photos.example.com");
    }

    // =========================================================================
    // Status events
    // =========================================================================

    #[test]
    fn status_events() {
        assert_eq!(
            format_status_event(&StatusEvent::Site(GenerationStatus::Generating)),
            vec!["Website: Generating"]
        );
        assert_eq!(
            format_status_event(&StatusEvent::Gallery {
                name: "peru".into(),
                status: GenerationStatus::CompleteWithErrors,
            }),
            vec!["peru: Complete with errors"]
        );
        assert_eq!(
            format_status_event(&StatusEvent::Error {
                gallery: Some("peru".into()),
                message: "peru (generation): no photos".into(),
            }),
            vec!["    ! peru (generation): no photos"]
        );
        assert_eq!(
            format_status_event(&StatusEvent::Message {
                gallery: Some("peru".into()),
                message: "2 photos".into(),
            }),
            vec!["peru: 2 photos"]
        );
    }

    #[test]
    fn progress_events_are_silent() {
        let event = StatusEvent::Progress {
            name: "peru".into(),
            done: 1,
            target: 3,
        };
        assert!(format_status_event(&event).is_empty());
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn summary_lists_galleries_and_errors() {
        let tree = StatusTree::new([("peru", "Peru"), ("rome", "Rome")]);
        let site = tree.site();
        site.start();
        let peru = tree.gallery("peru").unwrap();
        peru.start(1);
        peru.complete();
        let rome = tree.gallery("rome").unwrap();
        rome.start(0);
        crate::status::ErrorSink::handle_error(&rome, "generation", &"no photos");
        rome.complete();
        site.complete();

        let lines = format_build_summary(&tree.snapshot());
        assert_eq!(lines[0], "001 Peru: Complete (0/3)");
        assert_eq!(lines[1], "002 Rome: Complete with errors (0/0)");
        assert!(lines[3].starts_with("Website: Complete with errors (0%) in "));
        assert_eq!(
            &lines[5..],
            &["Errors", "    Gallery: Rome", "    rome (generation): no photos"]
        );
    }

    // =========================================================================
    // Cameras
    // =========================================================================

    #[test]
    fn cameras_listed_with_source() {
        let mut cameras = BTreeMap::new();
        cameras.insert("Canon EOS 5D".to_string(), PathBuf::from("/p/a.jpg"));
        assert_eq!(
            format_cameras(&cameras),
            vec!["Cameras (1)", "Canon EOS 5D", "    Source: /p/a.jpg"]
        );
        assert_eq!(format_cameras(&BTreeMap::new()).len(), 1);
    }
}

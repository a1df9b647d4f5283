//! Hierarchical progress and error state for a generation run.
//!
//! ```text
//! StatusTree
//! ├── root (site)          status, site-level errors
//! ├── gallery "2011peru"   status, errors, progress/target ticks
//! ├── gallery "2012rome"   ...
//! └── ...
//! ```
//!
//! Each gallery task writes only its own node through a [`GalleryReporter`];
//! the site task writes the root through a [`SiteReporter`]. Every node sits
//! behind its own mutex, so concurrent galleries never contend on each other.
//! A gallery error flags the root as "with errors" without copying the message
//! up; [`StatusTree::error_lines`] flattens everything for display.
//!
//! Observers either poll [`StatusTree::snapshot`] or subscribe to
//! [`StatusEvent`]s on an mpsc channel.

use serde::Serialize;
use std::fmt::Display;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Progress ticks per photo: copy, extract, sprite row.
pub const TICKS_PER_PHOTO: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStatus {
    Pending,
    Generating,
    GeneratingWithErrors,
    Complete,
    CompleteWithErrors,
    Cancelled,
}

impl GenerationStatus {
    pub fn description(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Generating => "Generating",
            Self::GeneratingWithErrors => "Generating with errors",
            Self::Complete => "Complete",
            Self::CompleteWithErrors => "Complete with errors",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::CompleteWithErrors | Self::Cancelled
        )
    }
}

/// Recoverable-problem and progress channel handed to every task.
///
/// Recoverable conditions (duplicate file names, missing title image, empty
/// cleaned filename, undecodable photo) go here instead of aborting.
pub trait ErrorSink: Sync {
    fn log_error(&self, message: &str);

    /// Log `error` with the context it happened in.
    fn handle_error(&self, context: &str, error: &dyn Display);

    fn log_message(&self, message: &str);

    fn progress_tick(&self);
}

/// Change notifications for live observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Site(GenerationStatus),
    Gallery {
        name: String,
        status: GenerationStatus,
    },
    Progress {
        name: String,
        done: usize,
        target: usize,
    },
    Error {
        gallery: Option<String>,
        message: String,
    },
    Message {
        gallery: Option<String>,
        message: String,
    },
}

#[derive(Debug)]
struct NodeState {
    status: GenerationStatus,
    errors: Vec<String>,
    progress: usize,
    target: usize,
    started: Option<Instant>,
    finished: Option<Instant>,
}

impl NodeState {
    fn new() -> Self {
        Self {
            status: GenerationStatus::Pending,
            errors: Vec::new(),
            progress: 0,
            target: 0,
            started: None,
            finished: None,
        }
    }

    fn elapsed_ms(&self) -> Option<u64> {
        let start = self.started?;
        let end = self.finished.unwrap_or_else(Instant::now);
        Some(end.duration_since(start).as_millis() as u64)
    }

    /// Terminal state for a node that ran to the end.
    fn finish(&mut self, had_errors: bool) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = if had_errors {
            GenerationStatus::CompleteWithErrors
        } else {
            GenerationStatus::Complete
        };
        self.finished = Some(Instant::now());
        true
    }

    fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = GenerationStatus::Cancelled;
        self.finished = Some(Instant::now());
        true
    }

    fn flag_errors(&mut self) {
        if matches!(
            self.status,
            GenerationStatus::Pending | GenerationStatus::Generating
        ) {
            self.status = GenerationStatus::GeneratingWithErrors;
        }
    }
}

struct GalleryNode {
    name: String,
    title: String,
    state: Mutex<NodeState>,
}

pub struct StatusTree {
    root: Mutex<NodeState>,
    galleries: Vec<GalleryNode>,
    events: Option<Sender<StatusEvent>>,
}

fn lock(node: &Mutex<NodeState>) -> MutexGuard<'_, NodeState> {
    node.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StatusTree {
    /// One node per gallery, given as `(generation-safe name, title)` pairs.
    pub fn new<I, N, T>(galleries: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            root: Mutex::new(NodeState::new()),
            galleries: galleries
                .into_iter()
                .map(|(name, title)| GalleryNode {
                    name: name.into(),
                    title: title.into(),
                    state: Mutex::new(NodeState::new()),
                })
                .collect(),
            events: None,
        }
    }

    pub fn with_events(mut self, sender: Sender<StatusEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: StatusEvent) {
        if let Some(tx) = &self.events {
            // Observer gone is not our problem
            let _ = tx.send(event);
        }
    }

    fn node(&self, name: &str) -> Option<(usize, &GalleryNode)> {
        self.galleries.iter().enumerate().find(|(_, g)| g.name == name)
    }

    /// Reporter for one gallery node, if the tree knows the gallery.
    pub fn gallery(&self, name: &str) -> Option<GalleryReporter<'_>> {
        self.node(name)
            .map(|(index, _)| GalleryReporter { tree: self, index })
    }

    pub fn site(&self) -> SiteReporter<'_> {
        SiteReporter { tree: self }
    }

    pub fn status(&self) -> GenerationStatus {
        lock(&self.root).status
    }

    pub fn gallery_status(&self, name: &str) -> Option<GenerationStatus> {
        self.node(name).map(|(_, g)| lock(&g.state).status)
    }

    /// Site-level errors, or any gallery with errors.
    pub fn has_error(&self) -> bool {
        !lock(&self.root).errors.is_empty()
            || self
                .galleries
                .iter()
                .any(|g| !lock(&g.state).errors.is_empty())
    }

    /// Overall completion: summed gallery progress over summed targets.
    pub fn percent(&self) -> f64 {
        let (done, target) = self.galleries.iter().fold((0, 0), |(d, t), g| {
            let state = lock(&g.state);
            (d + state.progress, t + state.target)
        });
        if target == 0 {
            0.0
        } else {
            done as f64 * 100.0 / target as f64
        }
    }

    /// Root errors first, then each erroring gallery's errors under a header.
    pub fn error_lines(&self) -> Vec<String> {
        let mut lines = lock(&self.root).errors.clone();
        for gallery in &self.galleries {
            let state = lock(&gallery.state);
            if state.errors.is_empty() {
                continue;
            }
            lines.push(format!("Gallery: {}", gallery.title));
            lines.extend(state.errors.iter().cloned());
        }
        lines
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let (status, elapsed_ms) = {
            let root = lock(&self.root);
            (root.status, root.elapsed_ms())
        };
        StatusSnapshot {
            status,
            description: status.description(),
            percent: self.percent(),
            elapsed_ms,
            galleries: self
                .galleries
                .iter()
                .map(|g| {
                    let state = lock(&g.state);
                    GallerySnapshot {
                        name: g.name.clone(),
                        title: g.title.clone(),
                        status: state.status,
                        description: state.status.description(),
                        progress: state.progress,
                        target: state.target,
                        elapsed_ms: state.elapsed_ms(),
                        errors: state.errors.clone(),
                    }
                })
                .collect(),
            errors: self.error_lines(),
        }
    }
}

/// Point-in-time copy of the whole tree, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: GenerationStatus,
    pub description: &'static str,
    pub percent: f64,
    pub elapsed_ms: Option<u64>,
    pub galleries: Vec<GallerySnapshot>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GallerySnapshot {
    pub name: String,
    pub title: String,
    pub status: GenerationStatus,
    pub description: &'static str,
    pub progress: usize,
    pub target: usize,
    pub elapsed_ms: Option<u64>,
    pub errors: Vec<String>,
}

// ============================================================================
// Gallery node
// ============================================================================

#[derive(Clone, Copy)]
pub struct GalleryReporter<'a> {
    tree: &'a StatusTree,
    index: usize,
}

impl GalleryReporter<'_> {
    fn node(&self) -> &GalleryNode {
        &self.tree.galleries[self.index]
    }

    pub fn name(&self) -> &str {
        &self.node().name
    }

    fn emit_status(&self, status: GenerationStatus) {
        self.tree.emit(StatusEvent::Gallery {
            name: self.name().to_string(),
            status,
        });
    }

    /// Reset the node and size its progress target from the source count.
    pub fn start(&self, item_count: usize) {
        {
            let mut state = lock(&self.node().state);
            *state = NodeState::new();
            state.status = GenerationStatus::Generating;
            state.target = item_count * TICKS_PER_PHOTO;
            state.started = Some(Instant::now());
        }
        self.emit_status(GenerationStatus::Generating);
    }

    /// Terminal complete state; no-op when already terminal.
    pub fn complete(&self) {
        let status = {
            let mut state = lock(&self.node().state);
            let had_errors = !state.errors.is_empty();
            state.finish(had_errors).then_some(state.status)
        };
        if let Some(status) = status {
            self.emit_status(status);
        }
    }

    pub fn cancelled(&self) {
        let changed = lock(&self.node().state).cancel();
        if changed {
            self.emit_status(GenerationStatus::Cancelled);
        }
    }

    pub fn status(&self) -> GenerationStatus {
        lock(&self.node().state).status
    }
}

impl ErrorSink for GalleryReporter<'_> {
    fn log_error(&self, message: &str) {
        tracing::warn!(gallery = %self.name(), "{message}");
        {
            let mut state = lock(&self.node().state);
            state.errors.push(message.to_string());
            state.flag_errors();
        }
        lock(&self.tree.root).flag_errors();
        self.tree.emit(StatusEvent::Error {
            gallery: Some(self.name().to_string()),
            message: message.to_string(),
        });
    }

    fn handle_error(&self, context: &str, error: &dyn Display) {
        self.log_error(&format!("{} ({context}): {error}", self.name()));
    }

    fn log_message(&self, message: &str) {
        tracing::info!(gallery = %self.name(), "{message}");
        self.tree.emit(StatusEvent::Message {
            gallery: Some(self.name().to_string()),
            message: message.to_string(),
        });
    }

    fn progress_tick(&self) {
        let (done, target) = {
            let mut state = lock(&self.node().state);
            state.progress = (state.progress + 1).min(state.target);
            (state.progress, state.target)
        };
        self.tree.emit(StatusEvent::Progress {
            name: self.name().to_string(),
            done,
            target,
        });
    }
}

// ============================================================================
// Root node
// ============================================================================

#[derive(Clone, Copy)]
pub struct SiteReporter<'a> {
    tree: &'a StatusTree,
}

impl SiteReporter<'_> {
    /// Reset every node to pending and mark the root as generating.
    pub fn start(&self) {
        for gallery in &self.tree.galleries {
            *lock(&gallery.state) = NodeState::new();
        }
        {
            let mut root = lock(&self.tree.root);
            *root = NodeState::new();
            root.status = GenerationStatus::Generating;
            root.started = Some(Instant::now());
        }
        self.tree.emit(StatusEvent::Site(GenerationStatus::Generating));
    }

    pub fn complete(&self) {
        let had_errors = self.tree.has_error();
        let status = {
            let mut root = lock(&self.tree.root);
            root.finish(had_errors).then_some(root.status)
        };
        if let Some(status) = status {
            self.tree.emit(StatusEvent::Site(status));
        }
    }

    pub fn cancelled(&self) {
        let changed = lock(&self.tree.root).cancel();
        if changed {
            self.tree.emit(StatusEvent::Site(GenerationStatus::Cancelled));
        }
    }

    /// Record a run-level failure; the run still completes.
    pub fn run_failed(&self, error: &dyn Display) {
        self.log_error(&format!("Error generating Website: ({error})"));
    }
}

impl ErrorSink for SiteReporter<'_> {
    fn log_error(&self, message: &str) {
        tracing::warn!("{message}");
        {
            let mut root = lock(&self.tree.root);
            root.errors.push(message.to_string());
            root.flag_errors();
        }
        self.tree.emit(StatusEvent::Error {
            gallery: None,
            message: message.to_string(),
        });
    }

    fn handle_error(&self, context: &str, error: &dyn Display) {
        self.log_error(&format!("Website generation error ({context}): {error}"));
    }

    fn log_message(&self, message: &str) {
        tracing::info!("{message}");
        self.tree.emit(StatusEvent::Message {
            gallery: None,
            message: message.to_string(),
        });
    }

    /// Root progress is derived from the galleries.
    fn progress_tick(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn tree() -> StatusTree {
        StatusTree::new([("peru", "Peru"), ("rome", "Rome")])
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    #[test]
    fn descriptions() {
        assert_eq!(GenerationStatus::Pending.description(), "Pending");
        assert_eq!(
            GenerationStatus::GeneratingWithErrors.description(),
            "Generating with errors"
        );
        assert_eq!(
            GenerationStatus::CompleteWithErrors.description(),
            "Complete with errors"
        );
        assert_eq!(GenerationStatus::Cancelled.description(), "Cancelled");
    }

    #[test]
    fn clean_run_completes() {
        let tree = tree();
        tree.site().start();
        for name in ["peru", "rome"] {
            let g = tree.gallery(name).unwrap();
            g.start(1);
            g.complete();
        }
        tree.site().complete();
        assert_eq!(tree.status(), GenerationStatus::Complete);
        assert_eq!(tree.gallery_status("peru"), Some(GenerationStatus::Complete));
        assert!(!tree.has_error());
    }

    #[test]
    fn gallery_error_flags_root_without_message() {
        let tree = tree();
        tree.site().start();
        let g = tree.gallery("peru").unwrap();
        g.start(2);
        g.handle_error("copy", &"duplicate name");

        assert_eq!(g.status(), GenerationStatus::GeneratingWithErrors);
        assert_eq!(tree.status(), GenerationStatus::GeneratingWithErrors);
        assert_eq!(
            tree.snapshot().galleries[0].errors,
            vec!["peru (copy): duplicate name"]
        );

        g.complete();
        tree.site().complete();
        assert_eq!(g.status(), GenerationStatus::CompleteWithErrors);
        assert_eq!(tree.status(), GenerationStatus::CompleteWithErrors);
        assert_eq!(
            tree.error_lines(),
            vec!["Gallery: Peru", "peru (copy): duplicate name"]
        );
    }

    #[test]
    fn terminal_state_is_entered_once() {
        let tree = tree();
        let g = tree.gallery("rome").unwrap();
        g.start(1);
        g.cancelled();
        g.complete();
        assert_eq!(g.status(), GenerationStatus::Cancelled);

        let g = tree.gallery("peru").unwrap();
        g.start(1);
        g.complete();
        g.cancelled();
        assert_eq!(g.status(), GenerationStatus::Complete);
    }

    #[test]
    fn cancelled_root_is_not_an_error() {
        let tree = tree();
        tree.site().start();
        tree.site().cancelled();
        tree.site().complete();
        assert_eq!(tree.status(), GenerationStatus::Cancelled);
        assert!(!tree.has_error());
    }

    #[test]
    fn site_errors_come_first() {
        let tree = tree();
        tree.site().start();
        tree.gallery("rome").unwrap().start(1);
        tree.gallery("rome").unwrap().log_error("rome: boom");
        tree.site().handle_error("sitemap", &"disk full");
        tree.site().run_failed(&"index missing");

        assert_eq!(
            tree.error_lines(),
            vec![
                "Website generation error (sitemap): disk full",
                "Error generating Website: (index missing)",
                "Gallery: Rome",
                "rome: boom",
            ]
        );
    }

    #[test]
    fn start_resets_previous_run() {
        let tree = tree();
        tree.site().start();
        tree.site().log_error("old");
        tree.site().complete();
        tree.site().start();
        assert_eq!(tree.status(), GenerationStatus::Generating);
        assert!(tree.error_lines().is_empty());
    }

    // =========================================================================
    // Progress
    // =========================================================================

    #[test]
    fn percent_sums_over_galleries() {
        let tree = tree();
        tree.site().start();
        let peru = tree.gallery("peru").unwrap();
        let rome = tree.gallery("rome").unwrap();
        peru.start(1); // 3 ticks
        rome.start(1); // 3 ticks
        assert_eq!(tree.percent(), 0.0);
        for _ in 0..3 {
            peru.progress_tick();
        }
        assert!((tree.percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn percent_with_no_targets_is_zero() {
        assert_eq!(tree().percent(), 0.0);
    }

    #[test]
    fn unknown_gallery_has_no_reporter() {
        assert!(tree().gallery("nowhere").is_none());
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn events_are_emitted() {
        let (tx, rx) = mpsc::channel();
        let tree = tree().with_events(tx);
        tree.site().start();
        let g = tree.gallery("peru").unwrap();
        g.start(1);
        g.progress_tick();
        g.log_message("copied");
        g.complete();
        drop(tree);

        let events: Vec<StatusEvent> = rx.iter().collect();
        assert_eq!(events[0], StatusEvent::Site(GenerationStatus::Generating));
        assert!(events.contains(&StatusEvent::Progress {
            name: "peru".into(),
            done: 1,
            target: 3
        }));
        assert!(events.contains(&StatusEvent::Message {
            gallery: Some("peru".into()),
            message: "copied".into()
        }));
        assert_eq!(
            events.last(),
            Some(&StatusEvent::Gallery {
                name: "peru".into(),
                status: GenerationStatus::Complete
            })
        );
    }

    #[test]
    fn snapshot_serializes() {
        let tree = tree();
        tree.site().start();
        let json = serde_json::to_value(tree.snapshot()).unwrap();
        assert_eq!(json["status"], "generating");
        assert_eq!(json["description"], "Generating");
        assert_eq!(json["galleries"][1]["name"], "rome");
    }
}

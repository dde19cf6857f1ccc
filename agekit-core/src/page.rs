//! The host surface the client renders into.
//!
//! The client never draws anything itself. It resolves selectors to [`RenderTarget`]s through the
//! host's [`Page`] once at configuration time and hands them finished [`View`]s and
//! [`LogEntry`]s.

use std::sync::Arc;

use crate::{log_entry::LogEntry, renderer::View};

/// An element of the host page the client can draw into.
///
/// # Examples
///
/// ```rust
/// use agekit_core::{LogEntry, RenderTarget, View};
///
/// struct Stdout;
///
/// impl RenderTarget for Stdout {
///     fn replace_content(&self, view: View) {
///         println!("{view}");
///     }
///
///     fn prepend_entry(&self, entry: LogEntry) {
///         println!("{entry}\n");
///     }
/// }
/// ```
pub trait RenderTarget: Send + Sync {
    /// Replaces whatever the element currently shows with `view`.
    fn replace_content(&self, view: View);

    /// Inserts `entry` above the existing content, so the most recent entry comes first.
    fn prepend_entry(&self, entry: LogEntry);
}

/// The page hosting the verification widget.
pub trait Page: Send + Sync {
    /// Resolves a selector to an element. Returns `None` when nothing matches.
    fn query_selector(&self, selector: &str) -> Option<Arc<dyn RenderTarget>>;

    /// Navigates the whole page to `url`.
    fn navigate(&self, url: &str);
}

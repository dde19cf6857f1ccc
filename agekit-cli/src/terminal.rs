//! A [`Page`] backed by the terminal: everything the widget draws becomes a [`PageEvent`].

use std::sync::Arc;

use agekit_core::{
    defaults::{EMBED_LOG_CONTAINER_SELECTOR, EMBED_QR_CONTAINER_SELECTOR},
    LogEntry, Page, RenderTarget, View,
};
use tokio::sync::mpsc;

/// Something the widget asked the page to show or do.
#[derive(Debug)]
pub enum PageEvent {
    /// The QR container now shows `View`.
    View(View),
    /// A service response was logged.
    Log(LogEntry),
    /// The widget redirected the page.
    Navigate(String),
}

/// The terminal page. Only the widget's QR container exists, plus its log container when logs
/// are shown.
pub struct TerminalPage {
    events: mpsc::UnboundedSender<PageEvent>,
    show_logs: bool,
}

impl TerminalPage {
    pub fn new(show_logs: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<PageEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { events, show_logs }), receiver)
    }

    fn emit(events: &mpsc::UnboundedSender<PageEvent>, event: PageEvent) {
        if events.send(event).is_err() {
            tracing::debug!("terminal closed, dropping page event");
        }
    }
}

impl Page for TerminalPage {
    fn query_selector(&self, selector: &str) -> Option<Arc<dyn RenderTarget>> {
        let exists = selector == EMBED_QR_CONTAINER_SELECTOR
            || (self.show_logs && selector == EMBED_LOG_CONTAINER_SELECTOR);
        exists.then(|| {
            Arc::new(Element {
                events: self.events.clone(),
            }) as Arc<dyn RenderTarget>
        })
    }

    fn navigate(&self, url: &str) {
        Self::emit(&self.events, PageEvent::Navigate(url.to_string()));
    }
}

struct Element {
    events: mpsc::UnboundedSender<PageEvent>,
}

impl RenderTarget for Element {
    fn replace_content(&self, view: View) {
        TerminalPage::emit(&self.events, PageEvent::View(view));
    }

    fn prepend_entry(&self, entry: LogEntry) {
        TerminalPage::emit(&self.events, PageEvent::Log(entry));
    }
}

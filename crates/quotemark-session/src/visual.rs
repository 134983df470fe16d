//! Visual layer implementations that do not render anything themselves.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};

use tracing::info;

use quotemark_core::logging::subsystem;
use quotemark_core::{PageNumber, VisualCommand, VisualHandle, VisualLayer};

/// Records every command it receives. Clones share the same log, so a test
/// can keep one clone while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingVisualLayer {
    log: Arc<Mutex<Vec<VisualCommand>>>,
}

impl RecordingVisualLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands issued so far, oldest first.
    pub fn commands(&self) -> Vec<VisualCommand> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<VisualCommand> {
        self.log
            .lock()
            .map(|mut log| std::mem::take(&mut *log))
            .unwrap_or_default()
    }

    /// Last highlight command, if the most recent highlight-affecting
    /// command was `ApplyHighlight`.
    pub fn active_highlight(&self) -> Option<VisualCommand> {
        self.commands()
            .into_iter()
            .rev()
            .find(|c| !matches!(c, VisualCommand::ScrollIntoView { .. }))
            .filter(|c| matches!(c, VisualCommand::ApplyHighlight { .. }))
    }

    fn record(&self, command: VisualCommand) {
        if let Ok(mut log) = self.log.lock() {
            log.push(command);
        }
    }
}

impl VisualLayer for RecordingVisualLayer {
    fn scroll_into_view(&mut self, page: PageNumber) {
        self.record(VisualCommand::ScrollIntoView { page });
    }

    fn apply_highlight(
        &mut self,
        page: PageNumber,
        fragments: RangeInclusive<usize>,
        handles: &[VisualHandle],
    ) {
        self.record(VisualCommand::ApplyHighlight {
            page,
            first_fragment: *fragments.start(),
            last_fragment: *fragments.end(),
            handles: handles.to_vec(),
        });
    }

    fn clear_highlight(&mut self) {
        self.record(VisualCommand::ClearHighlight);
    }
}

/// Logs commands through `tracing`. Used by the CLI, which has no viewer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingVisualLayer;

impl VisualLayer for TracingVisualLayer {
    fn scroll_into_view(&mut self, page: PageNumber) {
        info!(subsystem = subsystem::VISUAL, op = "scroll_into_view", page, "Scroll");
    }

    fn apply_highlight(
        &mut self,
        page: PageNumber,
        fragments: RangeInclusive<usize>,
        handles: &[VisualHandle],
    ) {
        let handles: Vec<&str> = handles.iter().map(VisualHandle::as_str).collect();
        info!(
            subsystem = subsystem::VISUAL,
            op = "apply_highlight",
            page,
            first_fragment = *fragments.start(),
            last_fragment = *fragments.end(),
            handles = ?handles,
            "Highlight"
        );
    }

    fn clear_highlight(&mut self) {
        info!(subsystem = subsystem::VISUAL, op = "clear_highlight", "Clear highlight");
    }
}

#![forbid(unsafe_code)]

//! Test harness for sheet sessions.
//!
//! - [`RecordingHost`] records every host call; clones share one transcript.
//! - [`EventRecorder`] subscribes to a session and keeps its events.
//! - [`LogCapture`] collects formatted `tracing` output for diagnostic asserts.
//! - [`strategies`] holds `proptest` strategies for random operation runs.
//!
//! Hosts in tests complete animations only when the test says so, through the
//! helpers [`finish_present`] and [`finish_dismiss`].

use std::cell::RefCell;
use std::rc::Rc;

use sheet_core::{ChangeReason, HostConfiguration, PlatformCapabilities};
use sheet_runtime::{ContainerKind, ContentId, Session, SheetEvent, SheetHost};
use web_time::Instant;

mod logs;
pub mod strategies;

pub use logs::LogCapture;

// ============================================================================
// Recording host
// ============================================================================

/// One call made by a session into its host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Present(HostConfiguration),
    Dismiss,
    Teardown,
    SelectDetent(usize),
    Configure(HostConfiguration),
    Mount {
        container: ContainerKind,
        child: ContentId,
        index: usize,
    },
    Unmount {
        container: ContainerKind,
        child: ContentId,
    },
}

impl HostCall {
    /// Short name used in transcripts.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Present(_) => "present",
            Self::Dismiss => "dismiss",
            Self::Teardown => "teardown",
            Self::SelectDetent(_) => "select_detent",
            Self::Configure(_) => "configure",
            Self::Mount { .. } => "mount",
            Self::Unmount { .. } => "unmount",
        }
    }
}

/// Host that records calls instead of drawing.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    calls: Rc<RefCell<Vec<HostCall>>>,
    capabilities: PlatformCapabilities,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::with_capabilities(PlatformCapabilities::all())
    }
}

impl RecordingHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host reporting only `capabilities`.
    #[must_use]
    pub fn with_capabilities(capabilities: PlatformCapabilities) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            capabilities,
        }
    }

    /// Snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    /// Call names in order.
    #[must_use]
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(HostCall::name).collect()
    }

    /// Number of calls named `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.name() == name)
            .count()
    }

    /// Configuration passed to the most recent `present`.
    #[must_use]
    pub fn last_presented(&self) -> Option<HostConfiguration> {
        self.calls.borrow().iter().rev().find_map(|c| match c {
            HostCall::Present(config) => Some(config.clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: HostCall) {
        self.calls.borrow_mut().push(call);
    }
}

impl SheetHost for RecordingHost {
    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    fn present(&mut self, config: &HostConfiguration) {
        self.record(HostCall::Present(config.clone()));
    }

    fn dismiss(&mut self) {
        self.record(HostCall::Dismiss);
    }

    fn teardown(&mut self) {
        self.record(HostCall::Teardown);
    }

    fn select_detent(&mut self, index: usize) {
        self.record(HostCall::SelectDetent(index));
    }

    fn apply_configuration(&mut self, config: &HostConfiguration) {
        self.record(HostCall::Configure(config.clone()));
    }

    fn mount_content(&mut self, container: ContainerKind, child: ContentId, index: usize) {
        self.record(HostCall::Mount {
            container,
            child,
            index,
        });
    }

    fn unmount_content(&mut self, container: ContainerKind, child: ContentId) {
        self.record(HostCall::Unmount { container, child });
    }
}

// ============================================================================
// Event recorder
// ============================================================================

/// Collects the events a session emits.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<SheetEvent>>>,
}

impl EventRecorder {
    /// Subscribe a new recorder to `session`.
    #[must_use]
    pub fn attach(session: &Session) -> Self {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.events);
        session.subscribe(move |event| sink.borrow_mut().push(*event));
        recorder
    }

    #[must_use]
    pub fn events(&self) -> Vec<SheetEvent> {
        self.events.borrow().clone()
    }

    /// `(is_open, reason)` of every open-state change.
    #[must_use]
    pub fn open_changes(&self) -> Vec<(bool, ChangeReason)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SheetEvent::OpenChanged { is_open, reason } => Some((*is_open, *reason)),
                _ => None,
            })
            .collect()
    }

    /// `(index, reason)` of every detent change.
    #[must_use]
    pub fn detent_changes(&self) -> Vec<(usize, ChangeReason)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SheetEvent::DetentChanged { index, reason } => Some((*index, *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// One JSON object per event, newline-separated.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        self.events
            .borrow()
            .iter()
            .map(|event| event_json(event).to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn event_json(event: &SheetEvent) -> serde_json::Value {
    match event {
        SheetEvent::WillPresent => serde_json::json!({ "event": "will_present" }),
        SheetEvent::DidPresent => serde_json::json!({ "event": "did_present" }),
        SheetEvent::WillDismiss => serde_json::json!({ "event": "will_dismiss" }),
        SheetEvent::DidDismiss => serde_json::json!({ "event": "did_dismiss" }),
        SheetEvent::OpenChanged { is_open, reason } => serde_json::json!({
            "event": "open_changed",
            "is_open": is_open,
            "reason": reason.as_str(),
        }),
        SheetEvent::DetentChanged { index, reason } => serde_json::json!({
            "event": "detent_changed",
            "index": index,
            "reason": reason.as_str(),
        }),
    }
}

// ============================================================================
// Scenario helpers
// ============================================================================

/// Attach, request open, and complete the presentation animation.
pub fn open_fully(session: &Session) {
    session.on_host_attach();
    session.present();
    finish_present(session);
}

/// Deliver the host's presentation completion.
pub fn finish_present(session: &Session) {
    session.host_did_present();
}

/// Deliver the host's dismissal completion, stamped now.
pub fn finish_dismiss(session: &Session) {
    session.host_did_dismiss(Instant::now());
}

#![forbid(unsafe_code)]

//! Presentation session: the lifecycle state machine of one sheet.
//!
//! | From | Signal | To |
//! |------|--------|----|
//! | Closed | open, host detached | AwaitingAttach |
//! | Closed / AwaitingAttach | open granted by the coordinator | Presenting |
//! | Presenting | `host_did_present` | Presented |
//! | Presenting / Presented | close, `host_will_dismiss` | Dismissing |
//! | any active state | `host_did_dismiss`, detach, reuse | Closed |
//!
//! A session owns its staged and applied [`SheetAttributes`], its
//! [`DetentCatalog`], the current detent, a content router, and the trace of
//! an in-progress dismissal. It talks to the outside world through a
//! [`SheetHost`] and a [`Coordinator`].
//!
//! # Invariants
//!
//! 1. Staged attribute writes take effect only on commit. A commit applies
//!    detents first, then styling (one host reconfiguration), then detent
//!    selection, then open state last.
//! 2. An open write acts only when it differs from the last applied open
//!    value, so identical writes within a batch collapse to one transition.
//! 3. A programmatic snap suppresses the host's echo of that same change.
//! 4. A `will-*` event is delivered before the host call that starts its
//!    transition; `did-*` and change events follow the host's completion.
//! 5. No internal borrow is held while calling the host, the coordinator, or
//!    a listener; all three may re-enter the session.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Snap out of range | Index ≥ catalog length | No-op, warn logged, no event |
//! | Snap while not presented | Lifecycle ≠ Presented | No-op, warn logged |
//! | Host detached mid-presentation | View removed | Teardown, reason `System` |
//! | No native sheet | Host lacks `PRESENTATION` | Requests ignored, warn once |
//! | Unbalanced `after_update` | Missing `before_update` | Ignored, warn logged |
//!
//! Sessions are `!Send`: they live on the control thread. Other threads reach
//! them through [`crate::control::ControlHandle`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use sheet_core::{
    AttributeCategory, AttributeUpdate, ChangeReason, DetentCatalog, DetentKind, DismissalTrace,
    HostConfiguration, PlatformCapabilities, ReasonResolver, SheetAttributes,
};
use tracing::{debug, debug_span, trace, warn};
use web_time::Instant;

use crate::config::SheetConfig;
use crate::coordinator::{CoordinatedSession, Coordinator};
use crate::events::{ListenerId, Listeners, SheetEvent};
use crate::host::{ContainerKind, ContentId, SheetHost};
use crate::router::{ContentOp, ContentRouter};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sheet#{}", self.0)
    }
}

/// Lifecycle of one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Closed,
    /// Open requested before the host was attached.
    AwaitingAttach,
    Presenting,
    Presented,
    Dismissing,
}

impl LifecycleState {
    /// Whether the sheet is on screen or animating.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Presenting | Self::Presented | Self::Dismissing)
    }

    /// Whether the sheet counts as open (presenting or presented).
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Presenting | Self::Presented)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::AwaitingAttach => "awaiting-attach",
            Self::Presenting => "presenting",
            Self::Presented => "presented",
            Self::Dismissing => "dismissing",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Internal state
// =============================================================================

/// Deferred side effect, run after the state borrow is released.
enum Effect {
    Emit(SheetEvent),
    Present(HostConfiguration),
    Dismiss,
    Teardown,
    SelectDetent(usize),
    Configure(HostConfiguration),
    Content(ContentOp<ContentId>),
}

fn content_effects(ops: Vec<ContentOp<ContentId>>) -> impl Iterator<Item = Effect> {
    ops.into_iter().map(Effect::Content)
}

struct SessionState {
    lifecycle: LifecycleState,
    staged: SheetAttributes,
    applied: SheetAttributes,
    pending_updates: AttributeCategory,
    batch_depth: u32,
    catalog: DetentCatalog,
    current_detent: usize,
    host_attached: bool,
    /// An open request not yet fulfilled.
    pending_request: bool,
    /// Open state last applied by the state machine.
    applied_open: bool,
    suppress_detent_echo: bool,
    trace: Option<DismissalTrace>,
    last_backdrop_tap: Option<Instant>,
    last_change_reason: ChangeReason,
    fallback_warned: bool,
    router: ContentRouter<ContentId>,
}

impl SessionState {
    fn new(config: &SheetConfig) -> Self {
        let attributes = config.default_attributes();
        let catalog = DetentCatalog::build(&attributes.detents).catalog;
        Self {
            lifecycle: LifecycleState::Closed,
            staged: attributes.clone(),
            applied: attributes,
            pending_updates: AttributeCategory::empty(),
            batch_depth: 0,
            catalog,
            current_detent: 0,
            host_attached: false,
            pending_request: false,
            applied_open: false,
            suppress_detent_echo: false,
            trace: None,
            last_backdrop_tap: None,
            last_change_reason: ChangeReason::Programmatic,
            fallback_warned: false,
            router: ContentRouter::new(),
        }
    }

    fn transition(&mut self, id: SessionId, to: LifecycleState) {
        if self.lifecycle != to {
            debug!(session = %id, from = %self.lifecycle, %to, "lifecycle transition");
            self.lifecycle = to;
        }
    }

    fn begin_trace(&self, explicit: Option<ChangeReason>) -> DismissalTrace {
        let mut trace = explicit.map_or_else(DismissalTrace::new, DismissalTrace::with_override);
        if let Some(at) = self.last_backdrop_tap {
            trace.record_backdrop_tap(at);
        }
        trace
    }

    fn requested_detent(&self) -> usize {
        self.applied
            .selected_detent
            .unwrap_or(self.applied.initial_detent)
    }

    fn host_configuration(&self, id: SessionId) -> HostConfiguration {
        let (config, diagnostic) = self
            .applied
            .host_configuration(&self.catalog, self.current_detent);
        if let Some(diagnostic) = diagnostic {
            warn!(session = %id, %diagnostic, "background interaction index ignored");
        }
        config
    }

    fn required_capabilities(&self) -> PlatformCapabilities {
        let mut required = PlatformCapabilities::required_by(&self.applied);
        let custom = self
            .catalog
            .iter()
            .any(|d| !matches!(d.kind(), DetentKind::Medium | DetentKind::Large));
        if custom {
            required |= PlatformCapabilities::DETENTS;
        }
        required
    }

    /// Effects that move the sheet to `Closed` and report `reason`.
    fn close_effects(&mut self, id: SessionId, reason: ChangeReason) -> Vec<Effect> {
        self.transition(id, LifecycleState::Closed);
        self.trace = None;
        self.applied_open = false;
        self.suppress_detent_echo = false;
        self.last_backdrop_tap = None;
        let mut effects: Vec<Effect> =
            content_effects(self.router.retarget(ContainerKind::Staging)).collect();
        effects.push(Effect::Emit(SheetEvent::DidDismiss));
        effects.push(Effect::Emit(SheetEvent::OpenChanged {
            is_open: false,
            reason,
        }));
        effects
    }
}

struct SessionCore {
    id: SessionId,
    weak_self: Weak<SessionCore>,
    coordinator: Coordinator,
    resolver: ReasonResolver,
    config: SheetConfig,
    state: RefCell<SessionState>,
    host: RefCell<Box<dyn SheetHost>>,
    listeners: RefCell<Listeners>,
}

impl SessionCore {
    // ---- effect plumbing ----------------------------------------------------

    fn run(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        let _span = debug_span!("sheet_session", session = %self.id).entered();
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.emit(event),
                Effect::Present(config) => self.host.borrow_mut().present(&config),
                Effect::Dismiss => self.host.borrow_mut().dismiss(),
                Effect::Teardown => self.host.borrow_mut().teardown(),
                Effect::SelectDetent(index) => self.host.borrow_mut().select_detent(index),
                Effect::Configure(config) => self.host.borrow_mut().apply_configuration(&config),
                Effect::Content(ContentOp::Insert {
                    container,
                    child,
                    index,
                }) => self
                    .host
                    .borrow_mut()
                    .mount_content(container, child, index),
                Effect::Content(ContentOp::Remove { container, child }) => {
                    self.host.borrow_mut().unmount_content(container, child);
                }
            }
        }
    }

    fn emit(&self, event: SheetEvent) {
        if let Some(reason) = event.reason() {
            self.state.borrow_mut().last_change_reason = reason;
        }
        trace!(session = %self.id, ?event, "sheet event");
        let listeners = self.listeners.borrow().snapshot();
        for listener in listeners {
            listener(&event);
        }
    }

    fn coordinated_handle(&self) -> Option<Rc<dyn CoordinatedSession>> {
        self.weak_self
            .upgrade()
            .map(|core| core as Rc<dyn CoordinatedSession>)
    }

    /// Returns `true` (and warns once) when the host cannot present at all.
    fn presentation_unsupported(&self, operation: &'static str) -> bool {
        if self.host.borrow().capabilities().supports_presentation() {
            return false;
        }
        let already_warned =
            std::mem::replace(&mut self.state.borrow_mut().fallback_warned, true);
        if already_warned {
            debug!(session = %self.id, operation, "native sheet unavailable; ignored");
        } else {
            warn!(session = %self.id, operation, "native sheet unavailable on this platform; ignoring sheet requests");
        }
        true
    }

    fn release_claim(&self) {
        if let Some(next) = self.coordinator.finish_session(self.id) {
            next.resume_presentation();
        }
    }

    // ---- open / close -------------------------------------------------------

    fn request_open(&self) {
        if self.presentation_unsupported("present") {
            return;
        }
        let acquire = {
            let mut st = self.state.borrow_mut();
            st.applied_open = true;
            match st.lifecycle {
                LifecycleState::Presenting | LifecycleState::Presented => {
                    debug!(session = %self.id, "open ignored: already open");
                    false
                }
                LifecycleState::Dismissing => {
                    debug!(session = %self.id, "open queued behind dismissal");
                    st.pending_request = true;
                    false
                }
                LifecycleState::AwaitingAttach => {
                    st.pending_request = true;
                    false
                }
                LifecycleState::Closed => {
                    st.pending_request = true;
                    if !st.host_attached {
                        st.transition(self.id, LifecycleState::AwaitingAttach);
                    }
                    st.host_attached
                }
            }
        };
        if acquire {
            self.acquire_and_present();
        }
    }

    fn acquire_and_present(&self) {
        let Some(handle) = self.coordinated_handle() else {
            return;
        };
        if self.coordinator.request_presentation(&handle) {
            self.begin_presentation();
        } else {
            debug!(session = %self.id, "waiting for the active sheet to dismiss");
        }
    }

    fn begin_presentation(&self) {
        let effects = {
            let mut st = self.state.borrow_mut();
            let ready = st.pending_request
                && st.host_attached
                && st.lifecycle == LifecycleState::Closed;
            if ready {
                st.pending_request = false;
                st.trace = None;
                st.last_backdrop_tap = None;
                st.suppress_detent_echo = false;
                let (index, diagnostic) = st.catalog.resolve_index(st.requested_detent());
                if let Some(diagnostic) = diagnostic {
                    warn!(session = %self.id, %diagnostic, "requested detent unavailable; opening at first stop");
                }
                st.current_detent = index;
                st.applied_open = true;
                st.transition(self.id, LifecycleState::Presenting);

                let missing = self
                    .host
                    .borrow()
                    .capabilities()
                    .missing(st.required_capabilities());
                if !missing.is_empty() {
                    warn!(session = %self.id, ?missing, "host ignores unsupported sheet features");
                }

                let config = st.host_configuration(self.id);
                let mut effects = vec![Effect::Emit(SheetEvent::WillPresent)];
                effects.extend(content_effects(
                    st.router.retarget(ContainerKind::Presentation),
                ));
                effects.push(Effect::Present(config));
                Some(effects)
            } else {
                None
            }
        };
        match effects {
            Some(effects) => self.run(effects),
            None => self.release_claim(),
        }
    }

    fn request_close(&self, reason: ChangeReason) {
        let effects = {
            let mut st = self.state.borrow_mut();
            st.applied_open = false;
            match st.lifecycle {
                LifecycleState::Closed | LifecycleState::AwaitingAttach => {
                    if !std::mem::take(&mut st.pending_request) {
                        debug!(session = %self.id, "close ignored: already closed");
                    }
                    st.transition(self.id, LifecycleState::Closed);
                    Vec::new()
                }
                LifecycleState::Dismissing => {
                    st.pending_request = false;
                    debug!(session = %self.id, "close ignored: already dismissing");
                    Vec::new()
                }
                LifecycleState::Presenting | LifecycleState::Presented => {
                    st.pending_request = false;
                    let trace = st.begin_trace(Some(reason));
                    st.trace = Some(trace);
                    st.transition(self.id, LifecycleState::Dismissing);
                    vec![Effect::Emit(SheetEvent::WillDismiss), Effect::Dismiss]
                }
            }
        };
        self.coordinator.cancel_pending_presentation(self.id);
        self.run(effects);
    }

    fn resume_pending_request(&self) {
        let reopen = {
            let st = self.state.borrow();
            st.pending_request && st.host_attached && st.lifecycle == LifecycleState::Closed
        };
        if reopen {
            debug!(session = %self.id, "reopening after dismissal");
            self.acquire_and_present();
        }
    }

    /// Remove the sheet immediately. Returns `false` if it was not active.
    fn force_teardown(&self, reason: ChangeReason) -> bool {
        let effects = {
            let mut st = self.state.borrow_mut();
            if !st.lifecycle.is_active() {
                return false;
            }
            let was_dismissing = st.lifecycle == LifecycleState::Dismissing;
            st.pending_request = false;
            let mut effects = Vec::new();
            if !was_dismissing {
                effects.push(Effect::Emit(SheetEvent::WillDismiss));
            }
            effects.push(Effect::Teardown);
            effects.extend(st.close_effects(self.id, reason));
            effects
        };
        debug!(session = %self.id, %reason, "sheet torn down");
        self.run(effects);
        self.release_claim();
        true
    }

    // ---- host signals -------------------------------------------------------

    fn host_did_present(&self) {
        let effects = {
            let mut st = self.state.borrow_mut();
            if st.lifecycle != LifecycleState::Presenting {
                warn!(session = %self.id, state = %st.lifecycle, "unexpected presentation completion");
                return;
            }
            st.transition(self.id, LifecycleState::Presented);
            let mut effects = Vec::with_capacity(3);
            let (index, _) = st.catalog.resolve_index(st.requested_detent());
            if index != st.current_detent {
                st.current_detent = index;
                effects.push(Effect::SelectDetent(index));
            }
            effects.push(Effect::Emit(SheetEvent::DidPresent));
            effects.push(Effect::Emit(SheetEvent::OpenChanged {
                is_open: true,
                reason: ChangeReason::Programmatic,
            }));
            effects
        };
        self.run(effects);
    }

    fn host_will_dismiss(&self, interactive: bool) {
        let effects = {
            let mut st = self.state.borrow_mut();
            match st.lifecycle {
                LifecycleState::Presenting | LifecycleState::Presented => {
                    let mut trace = st.begin_trace(None);
                    if interactive {
                        trace.mark_interactive();
                    }
                    st.trace = Some(trace);
                    st.applied_open = false;
                    st.pending_request = false;
                    st.transition(self.id, LifecycleState::Dismissing);
                    vec![Effect::Emit(SheetEvent::WillDismiss)]
                }
                LifecycleState::Dismissing => {
                    if interactive && let Some(trace) = st.trace.as_mut() {
                        trace.mark_interactive();
                    }
                    Vec::new()
                }
                LifecycleState::Closed | LifecycleState::AwaitingAttach => {
                    warn!(session = %self.id, "dismissal signal while closed");
                    Vec::new()
                }
            }
        };
        self.run(effects);
    }

    fn host_backdrop_tapped(&self, at: Instant) {
        let mut st = self.state.borrow_mut();
        st.last_backdrop_tap = Some(at);
        if let Some(trace) = st.trace.as_mut() {
            trace.record_backdrop_tap(at);
        }
    }

    fn host_did_dismiss(&self, at: Instant) {
        let effects = {
            let mut st = self.state.borrow_mut();
            if !st.lifecycle.is_active() {
                warn!(session = %self.id, state = %st.lifecycle, "unexpected dismissal completion");
                return;
            }
            let trace = match st.trace.take() {
                Some(trace) => trace,
                None => st.begin_trace(None),
            };
            let reason = self.resolver.resolve(&trace, at);
            debug!(session = %self.id, %reason, "dismissal completed");
            st.close_effects(self.id, reason)
        };
        self.run(effects);
        self.release_claim();
        self.resume_pending_request();
    }

    fn host_detent_changed(&self, index: usize) {
        let effects = {
            let mut st = self.state.borrow_mut();
            if st.lifecycle != LifecycleState::Presented {
                debug!(session = %self.id, index, state = %st.lifecycle, "detent change ignored: not presented");
                return;
            }
            if !st.catalog.contains_index(index) {
                warn!(session = %self.id, index, len = st.catalog.len(), "host reported unknown detent");
                return;
            }
            let echo = std::mem::take(&mut st.suppress_detent_echo);
            if index == st.current_detent {
                if echo {
                    trace!(session = %self.id, index, "programmatic snap echo suppressed");
                }
                return;
            }
            st.current_detent = index;
            vec![Effect::Emit(SheetEvent::DetentChanged {
                index,
                reason: ChangeReason::Swipe,
            })]
        };
        self.run(effects);
    }

    fn snap_to_detent(&self, index: usize) {
        if self.presentation_unsupported("snap_to_detent") {
            return;
        }
        let effects = {
            let mut st = self.state.borrow_mut();
            if st.lifecycle != LifecycleState::Presented {
                warn!(session = %self.id, index, state = %st.lifecycle, "snap ignored: sheet not presented");
                return;
            }
            if !st.catalog.contains_index(index) {
                warn!(session = %self.id, index, len = st.catalog.len(), "snap ignored: detent index out of range");
                return;
            }
            st.current_detent = index;
            st.suppress_detent_echo = true;
            vec![
                Effect::SelectDetent(index),
                Effect::Emit(SheetEvent::DetentChanged {
                    index,
                    reason: ChangeReason::Programmatic,
                }),
            ]
        };
        self.run(effects);
    }

    // ---- attributes ---------------------------------------------------------

    fn apply_attribute_update(&self, update: AttributeUpdate) {
        let commit_now = {
            let mut st = self.state.borrow_mut();
            let category = st.staged.apply(update);
            st.pending_updates |= category;
            st.batch_depth == 0
        };
        if commit_now {
            self.commit();
        }
    }

    fn before_update(&self) {
        self.state.borrow_mut().batch_depth += 1;
    }

    fn after_update(&self) {
        let commit_now = {
            let mut st = self.state.borrow_mut();
            if st.batch_depth == 0 {
                warn!(session = %self.id, "after_update without matching before_update");
                return;
            }
            st.batch_depth -= 1;
            st.batch_depth == 0
        };
        if commit_now {
            self.commit();
        }
    }

    fn commit(&self) {
        let (effects, open_delta) = {
            let mut guard = self.state.borrow_mut();
            let st = &mut *guard;
            let pending = std::mem::take(&mut st.pending_updates);
            if pending.is_empty() {
                return;
            }
            trace!(session = %self.id, ?pending, "committing staged attributes");
            st.applied.copy_from(&st.staged, pending);
            let presented = st.lifecycle == LifecycleState::Presented;
            let mut effects = Vec::new();

            let mut displaced = None;
            if pending.contains(AttributeCategory::DETENTS) {
                st.catalog = DetentCatalog::build(&st.applied.detents).catalog;
                let (index, _) = st.catalog.resolve_index(st.current_detent);
                if presented && index != st.current_detent {
                    debug!(session = %self.id, from = st.current_detent, to = index, "detent removed; sheet moved");
                    displaced = Some(index);
                }
                st.current_detent = index;
            }
            if st.lifecycle.is_active()
                && pending.intersects(AttributeCategory::DETENTS | AttributeCategory::STYLE)
            {
                effects.push(Effect::Configure(st.host_configuration(self.id)));
            }
            if let Some(index) = displaced {
                effects.push(Effect::Emit(SheetEvent::DetentChanged {
                    index,
                    reason: ChangeReason::Programmatic,
                }));
            }
            if pending.contains(AttributeCategory::SELECTED_DETENT)
                && presented
                && let Some(index) = st.applied.selected_detent
            {
                if !st.catalog.contains_index(index) {
                    warn!(session = %self.id, index, len = st.catalog.len(), "selected detent out of range");
                } else if index != st.current_detent {
                    st.current_detent = index;
                    st.suppress_detent_echo = true;
                    effects.push(Effect::SelectDetent(index));
                    effects.push(Effect::Emit(SheetEvent::DetentChanged {
                        index,
                        reason: ChangeReason::Programmatic,
                    }));
                }
            }
            let open_delta = if pending.contains(AttributeCategory::OPEN) {
                if st.applied.open == st.applied_open {
                    trace!(session = %self.id, open = st.applied.open, "open unchanged");
                    None
                } else {
                    Some(st.applied.open)
                }
            } else {
                None
            };
            (effects, open_delta)
        };
        self.run(effects);
        match open_delta {
            Some(true) => self.request_open(),
            Some(false) => self.request_close(ChangeReason::Programmatic),
            None => {}
        }
    }

    // ---- host attachment ----------------------------------------------------

    fn on_host_attach(&self) {
        let resume = {
            let mut st = self.state.borrow_mut();
            if st.host_attached {
                return;
            }
            st.host_attached = true;
            if st.lifecycle == LifecycleState::AwaitingAttach {
                st.transition(self.id, LifecycleState::Closed);
            }
            st.pending_request && st.lifecycle == LifecycleState::Closed
        };
        if resume {
            debug!(session = %self.id, "host attached; resuming open request");
            self.acquire_and_present();
        }
    }

    fn on_host_detach(&self) {
        let active = {
            let mut st = self.state.borrow_mut();
            st.host_attached = false;
            st.lifecycle.is_active()
        };
        if active {
            self.force_teardown(ChangeReason::System);
            return;
        }
        let cancelled = {
            let mut st = self.state.borrow_mut();
            st.transition(self.id, LifecycleState::Closed);
            std::mem::take(&mut st.pending_request)
        };
        if cancelled {
            debug!(session = %self.id, "host detached; open request cancelled");
            self.coordinator.cancel_pending_presentation(self.id);
        }
    }

    fn prepare_for_reuse(&self) {
        self.coordinator.cancel_pending_presentation(self.id);
        self.force_teardown(ChangeReason::System);
        self.listeners.borrow_mut().clear();
        let mut st = self.state.borrow_mut();
        let router = std::mem::take(&mut st.router);
        let host_attached = st.host_attached;
        *st = SessionState::new(&self.config);
        st.router = router;
        st.host_attached = host_attached;
        debug!(session = %self.id, "session reset for reuse");
    }

    fn content(&self, ops: Vec<ContentOp<ContentId>>) {
        self.run(content_effects(ops).collect());
    }
}

impl CoordinatedSession for SessionCore {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn is_presentation_active(&self) -> bool {
        self.state
            .try_borrow()
            .map_or(true, |st| st.lifecycle.is_active())
    }

    fn dismiss_for_handoff(&self) {
        debug!(session = %self.id, "dismissing for handoff");
        self.request_close(ChangeReason::Programmatic);
    }

    fn resume_presentation(&self) {
        self.begin_presentation();
    }

    fn pending_replaced(&self) {
        let mut st = self.state.borrow_mut();
        if st.lifecycle == LifecycleState::Closed && std::mem::take(&mut st.pending_request) {
            st.applied_open = false;
            debug!(session = %self.id, "open request superseded by a later sheet");
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if self.state.get_mut().lifecycle.is_active() {
            debug!(session = %self.id, "session dropped while on screen; tearing down");
            self.host.get_mut().teardown();
        }
        self.coordinator.cancel_pending_presentation(self.id);
        if let Some(next) = self.coordinator.finish_session(self.id) {
            next.resume_presentation();
        }
    }
}

// =============================================================================
// Public handle
// =============================================================================

/// Handle to one sheet's presentation session.
///
/// Cloning yields another handle to the same session. The session lives until
/// the last handle is dropped; dropping it while on screen tears the sheet
/// down and releases its coordinator claim.
#[derive(Clone)]
pub struct Session {
    core: Rc<SessionCore>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.core.id)
            .field("lifecycle", &self.lifecycle())
            .field("current_detent", &self.current_detent_index())
            .finish()
    }
}

impl Session {
    /// Session bound to `host`, registered with `coordinator`.
    #[must_use]
    pub fn new(
        host: impl SheetHost + 'static,
        coordinator: &Coordinator,
        config: &SheetConfig,
    ) -> Self {
        let host: Box<dyn SheetHost> = Box::new(host);
        let core = Rc::new_cyclic(|weak_self| SessionCore {
            id: SessionId::next(),
            weak_self: weak_self.clone(),
            coordinator: coordinator.clone(),
            resolver: config.resolver(),
            config: config.clone(),
            state: RefCell::new(SessionState::new(config)),
            host: RefCell::new(host),
            listeners: RefCell::new(Listeners::default()),
        });
        debug!(session = %core.id, "session created");
        Self { core }
    }

    /// Session using the thread's global coordinator and default config.
    #[must_use]
    pub fn with_host(host: impl SheetHost + 'static) -> Self {
        Self::new(host, &Coordinator::global(), &SheetConfig::default())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.core.id
    }

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.core.state.borrow().lifecycle
    }

    /// Whether the sheet is presenting or presented.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lifecycle().is_open()
    }

    /// Index of the selected stop in the current catalog.
    #[must_use]
    pub fn current_detent_index(&self) -> usize {
        self.core.state.borrow().current_detent
    }

    /// The detent catalog built from the applied detents.
    #[must_use]
    pub fn catalog(&self) -> DetentCatalog {
        self.core.state.borrow().catalog.clone()
    }

    /// Committed attributes.
    #[must_use]
    pub fn attributes(&self) -> SheetAttributes {
        self.core.state.borrow().applied.clone()
    }

    /// Categories written but not yet committed.
    #[must_use]
    pub fn pending_updates(&self) -> AttributeCategory {
        self.core.state.borrow().pending_updates
    }

    #[must_use]
    pub fn is_host_attached(&self) -> bool {
        self.core.state.borrow().host_attached
    }

    /// Whether an open request is waiting (for attach, a handoff, or a
    /// dismissal to finish).
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.core.state.borrow().pending_request
    }

    /// Reason carried by the most recent open or detent event.
    #[must_use]
    pub fn last_change_reason(&self) -> ChangeReason {
        self.core.state.borrow().last_change_reason
    }

    /// Content children in logical order and the container holding them.
    #[must_use]
    pub fn content(&self) -> (ContainerKind, Vec<ContentId>) {
        let st = self.core.state.borrow();
        (st.router.target(), st.router.children().to_vec())
    }

    /// Register an event listener.
    pub fn subscribe(&self, listener: impl Fn(&SheetEvent) + 'static) -> ListenerId {
        self.core.listeners.borrow_mut().add(listener)
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.core.listeners.borrow_mut().remove(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.core.listeners.borrow().len()
    }

    // ---- imperative API -----------------------------------------------------

    /// Request the sheet open.
    ///
    /// Deferred until the host attaches, until a handoff from another active
    /// sheet completes, or until an in-progress dismissal finishes.
    pub fn request_open(&self) {
        self.core.request_open();
    }

    /// Request the sheet close, reporting `reason` when it completes.
    pub fn request_close(&self, reason: ChangeReason) {
        self.core.request_close(reason);
    }

    /// Imperative open.
    pub fn present(&self) {
        self.request_open();
    }

    /// Imperative close (reason `Programmatic`).
    pub fn dismiss(&self) {
        self.request_close(ChangeReason::Programmatic);
    }

    /// Move the presented sheet to stop `index`.
    pub fn snap_to_detent(&self, index: usize) {
        self.core.snap_to_detent(index);
    }

    // ---- declarative API ----------------------------------------------------

    /// Stage one attribute write; commits at once outside a batch.
    pub fn apply_attribute_update(&self, update: AttributeUpdate) {
        self.core.apply_attribute_update(update);
    }

    /// Open an update batch. Batches nest; the outermost close commits.
    pub fn before_update(&self) {
        self.core.before_update();
    }

    /// Close an update batch.
    pub fn after_update(&self) {
        self.core.after_update();
    }

    /// Scoped batch; committed when the guard drops.
    #[must_use = "dropping the batch commits staged writes"]
    pub fn batch(&self) -> UpdateBatch<'_> {
        self.before_update();
        UpdateBatch { session: self }
    }

    // ---- host lifecycle -----------------------------------------------------

    /// The host view gained a presentation anchor.
    pub fn on_host_attach(&self) {
        self.core.on_host_attach();
    }

    /// The host view lost its presentation anchor.
    pub fn on_host_detach(&self) {
        self.core.on_host_detach();
    }

    /// Reset for a recycled host view: tear down, drop claims and listeners,
    /// restore default attributes.
    pub fn prepare_for_reuse(&self) {
        self.core.prepare_for_reuse();
    }

    // ---- host completions ---------------------------------------------------

    /// Presentation animation finished.
    pub fn host_did_present(&self) {
        self.core.host_did_present();
    }

    /// The host began dismissing; `interactive` when drag-driven.
    pub fn host_will_dismiss(&self, interactive: bool) {
        self.core.host_will_dismiss(interactive);
    }

    /// The dimmed backdrop was tapped at `at`.
    pub fn host_backdrop_tapped(&self, at: Instant) {
        self.core.host_backdrop_tapped(at);
    }

    /// Dismissal animation finished at `at`.
    pub fn host_did_dismiss(&self, at: Instant) {
        self.core.host_did_dismiss(at);
    }

    /// The user dragged the sheet to stop `index`.
    pub fn host_detent_changed(&self, index: usize) {
        self.core.host_detent_changed(index);
    }

    // ---- content ------------------------------------------------------------

    /// Attach embedded content at `index` in logical order.
    pub fn attach_content(&self, child: ContentId, index: usize) {
        let ops = self.core.state.borrow_mut().router.attach(child, index);
        self.core.content(ops);
    }

    /// Detach embedded content.
    pub fn detach_content(&self, child: ContentId) {
        let ops = self.core.state.borrow_mut().router.detach(child);
        self.core.content(ops);
    }
}

/// Guard returned by [`Session::batch`].
pub struct UpdateBatch<'a> {
    session: &'a Session,
}

impl UpdateBatch<'_> {
    /// Stage a write inside this batch.
    pub fn apply(&self, update: AttributeUpdate) -> &Self {
        self.session.apply_attribute_update(update);
        self
    }
}

impl Drop for UpdateBatch<'_> {
    fn drop(&mut self) {
        self.session.after_update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counts {
        present: Cell<u32>,
        dismiss: Cell<u32>,
        teardown: Cell<u32>,
        select: Cell<u32>,
        configure: Cell<u32>,
    }

    struct CountingHost(Rc<Counts>);

    impl SheetHost for CountingHost {
        fn present(&mut self, _config: &HostConfiguration) {
            self.0.present.set(self.0.present.get() + 1);
        }
        fn dismiss(&mut self) {
            self.0.dismiss.set(self.0.dismiss.get() + 1);
        }
        fn teardown(&mut self) {
            self.0.teardown.set(self.0.teardown.get() + 1);
        }
        fn select_detent(&mut self, _index: usize) {
            self.0.select.set(self.0.select.get() + 1);
        }
        fn apply_configuration(&mut self, _config: &HostConfiguration) {
            self.0.configure.set(self.0.configure.get() + 1);
        }
    }

    fn session() -> (Session, Rc<Counts>) {
        let counts = Rc::new(Counts::default());
        let session = Session::new(
            CountingHost(Rc::clone(&counts)),
            &Coordinator::new(),
            &SheetConfig::default(),
        );
        (session, counts)
    }

    fn events(session: &Session) -> Rc<RefCell<Vec<SheetEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        session.subscribe(move |e| sink.borrow_mut().push(*e));
        log
    }

    fn presented() -> (Session, Rc<Counts>) {
        let (session, counts) = session();
        session.on_host_attach();
        session.present();
        session.host_did_present();
        (session, counts)
    }

    #[test]
    fn present_before_attach_waits() {
        let (session, counts) = session();
        session.present();
        assert_eq!(session.lifecycle(), LifecycleState::AwaitingAttach);
        assert_eq!(counts.present.get(), 0);
        session.on_host_attach();
        assert_eq!(session.lifecycle(), LifecycleState::Presenting);
        assert_eq!(counts.present.get(), 1);
    }

    #[test]
    fn present_then_did_present_reports_open() {
        let (session, _) = session();
        let log = events(&session);
        session.on_host_attach();
        session.present();
        session.present();
        session.host_did_present();
        assert_eq!(
            *log.borrow(),
            vec![
                SheetEvent::WillPresent,
                SheetEvent::DidPresent,
                SheetEvent::OpenChanged {
                    is_open: true,
                    reason: ChangeReason::Programmatic
                },
            ]
        );
    }

    #[test]
    fn dismiss_reports_programmatic() {
        let (session, counts) = presented();
        let log = events(&session);
        session.dismiss();
        session.dismiss();
        assert_eq!(counts.dismiss.get(), 1);
        session.host_did_dismiss(Instant::now());
        assert_eq!(session.lifecycle(), LifecycleState::Closed);
        assert_eq!(
            log.borrow().last(),
            Some(&SheetEvent::OpenChanged {
                is_open: false,
                reason: ChangeReason::Programmatic
            })
        );
    }

    #[test]
    fn interactive_dismissal_is_swipe() {
        let (session, _) = presented();
        session.host_will_dismiss(true);
        session.host_did_dismiss(Instant::now());
        assert_eq!(session.last_change_reason(), ChangeReason::Swipe);
    }

    #[test]
    fn open_while_dismissing_reopens_after() {
        let (session, counts) = presented();
        session.dismiss();
        session.present();
        assert!(session.has_pending_request());
        session.host_did_dismiss(Instant::now());
        assert_eq!(session.lifecycle(), LifecycleState::Presenting);
        assert_eq!(counts.present.get(), 2);
    }

    #[test]
    fn snap_suppresses_host_echo() {
        let (session, counts) = presented();
        let log = events(&session);
        session.snap_to_detent(1);
        session.host_detent_changed(1);
        assert_eq!(counts.select.get(), 1);
        assert_eq!(
            *log.borrow(),
            vec![SheetEvent::DetentChanged {
                index: 1,
                reason: ChangeReason::Programmatic
            }]
        );
        session.host_detent_changed(0);
        assert_eq!(
            log.borrow().last(),
            Some(&SheetEvent::DetentChanged {
                index: 0,
                reason: ChangeReason::Swipe
            })
        );
    }

    #[test]
    fn snap_rejected_when_closed_or_out_of_range() {
        let (session, counts) = session();
        session.snap_to_detent(0);
        assert_eq!(counts.select.get(), 0);

        let (session, counts) = presented();
        let log = events(&session);
        session.snap_to_detent(7);
        assert_eq!(counts.select.get(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(session.current_detent_index(), 0);
    }

    #[test]
    fn batched_writes_commit_once() {
        let (session, counts) = presented();
        session.before_update();
        session.apply_attribute_update(AttributeUpdate::GrabberVisible(false));
        session.apply_attribute_update(AttributeUpdate::CornerRadius(Some(8.0)));
        session.before_update();
        session.apply_attribute_update(AttributeUpdate::ColorScheme(sheet_core::ColorScheme::Dark));
        session.after_update();
        assert_eq!(counts.configure.get(), 0);
        assert!(!session.pending_updates().is_empty());
        session.after_update();
        assert_eq!(counts.configure.get(), 1);
        assert!(session.pending_updates().is_empty());
        assert!(!session.attributes().grabber_visible);
    }

    #[test]
    fn unbalanced_after_update_is_ignored() {
        let (session, counts) = presented();
        session.after_update();
        assert_eq!(counts.configure.get(), 0);
    }

    #[test]
    fn open_attribute_drives_lifecycle() {
        let (session, counts) = session();
        session.on_host_attach();
        {
            let batch = session.batch();
            batch
                .apply(AttributeUpdate::Open(true))
                .apply(AttributeUpdate::Open(true));
        }
        assert_eq!(counts.present.get(), 1);
        session.host_did_present();
        session.apply_attribute_update(AttributeUpdate::Open(true));
        assert_eq!(counts.present.get(), 1);
        session.apply_attribute_update(AttributeUpdate::Open(false));
        assert_eq!(counts.dismiss.get(), 1);
    }

    #[test]
    fn initial_detent_applies_on_open() {
        let (session, _) = session();
        session.apply_attribute_update(AttributeUpdate::InitialDetent(1));
        session.on_host_attach();
        session.present();
        session.host_did_present();
        assert_eq!(session.current_detent_index(), 1);
    }

    #[test]
    fn controlled_selection_snaps_when_presented() {
        let (session, counts) = presented();
        session.apply_attribute_update(AttributeUpdate::SelectedDetent(Some(1)));
        assert_eq!(counts.select.get(), 1);
        assert_eq!(session.current_detent_index(), 1);
        session.apply_attribute_update(AttributeUpdate::SelectedDetent(Some(1)));
        assert_eq!(counts.select.get(), 1);
    }

    #[test]
    fn detach_tears_down_with_system_reason() {
        let (session, counts) = presented();
        session.on_host_detach();
        assert_eq!(counts.teardown.get(), 1);
        assert_eq!(session.lifecycle(), LifecycleState::Closed);
        assert_eq!(session.last_change_reason(), ChangeReason::System);
    }

    #[test]
    fn detach_cancels_awaiting_request() {
        let (session, _) = session();
        session.present();
        session.on_host_detach();
        assert_eq!(session.lifecycle(), LifecycleState::Closed);
        assert!(!session.has_pending_request());
    }

    #[test]
    fn reuse_resets_everything() {
        let (session, counts) = presented();
        let log = events(&session);
        session.apply_attribute_update(AttributeUpdate::GrabberVisible(false));
        session.prepare_for_reuse();
        assert_eq!(counts.teardown.get(), 1);
        assert_eq!(session.listener_count(), 0);
        assert!(session.attributes().grabber_visible);
        assert!(session.is_host_attached());
        assert_eq!(
            *log.borrow(),
            vec![
                SheetEvent::WillDismiss,
                SheetEvent::DidDismiss,
                SheetEvent::OpenChanged {
                    is_open: false,
                    reason: ChangeReason::System
                },
            ]
        );
    }

    #[test]
    fn content_follows_presentation() {
        let (session, _) = session();
        session.attach_content(ContentId::new(1), 0);
        assert_eq!(session.content().0, ContainerKind::Staging);
        session.on_host_attach();
        session.present();
        assert_eq!(
            session.content(),
            (ContainerKind::Presentation, vec![ContentId::new(1)])
        );
        session.host_did_present();
        session.dismiss();
        session.host_did_dismiss(Instant::now());
        assert_eq!(session.content().0, ContainerKind::Staging);
    }

    #[test]
    fn dropping_presented_session_tears_down() {
        let (session, counts) = presented();
        drop(session);
        assert_eq!(counts.teardown.get(), 1);
    }

    #[test]
    fn listeners_may_reenter() {
        let (session, counts) = session();
        let handle = session.clone();
        session.subscribe(move |e| {
            if matches!(e, SheetEvent::DidPresent) {
                handle.snap_to_detent(1);
            }
        });
        session.on_host_attach();
        session.present();
        session.host_did_present();
        assert_eq!(counts.select.get(), 1);
        assert_eq!(session.current_detent_index(), 1);
    }
}

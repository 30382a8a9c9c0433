#![forbid(unsafe_code)]

//! Single-active-sheet coordinator.
//!
//! At most one session may be presenting or presented at a time. A session
//! that wants to present while another is active becomes the *pending*
//! waiter; the active session is asked to dismiss, and when it finishes the
//! waiter is promoted and resumed.
//!
//! # Invariants
//!
//! 1. At most one active slot and at most one pending slot.
//! 2. The last requester wins the pending slot; an earlier waiter is dropped
//!    and told so through [`CoordinatedSession::pending_replaced`].
//! 3. Only one handoff dismissal is requested per active session
//!    (`handoff_in_flight`).
//! 4. Slots hold weak references: a session dropped while registered is
//!    treated as finished the next time the registry looks at it.
//! 5. An active slot whose session is no longer presenting is stale and is
//!    replaced by the next requester.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Stale active slot | Session closed without `finish_session` | Replaced, warn logged |
//! | Dead weak handle | Session dropped while registered | Slot cleared |
//! | Waiter replaced | Third requester during a handoff | Earlier waiter notified and dropped, debug logged |
//!
//! The registry borrow is always released before calling back into a
//! session, so sessions may re-enter the coordinator from those callbacks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::session::SessionId;

thread_local! {
    static GLOBAL_COORDINATOR: Coordinator = Coordinator::new();
}

/// The coordinator's view of a session.
pub trait CoordinatedSession {
    /// Stable identity.
    fn session_id(&self) -> SessionId;

    /// Whether the session is presenting, presented, or dismissing.
    fn is_presentation_active(&self) -> bool;

    /// Dismiss so a waiting session can present.
    fn dismiss_for_handoff(&self);

    /// The session was promoted from the pending slot; present now.
    fn resume_presentation(&self);

    /// A later requester took the pending slot; the request is void.
    fn pending_replaced(&self);
}

struct Slot {
    id: SessionId,
    handle: Weak<dyn CoordinatedSession>,
}

impl Slot {
    fn new(session: &Rc<dyn CoordinatedSession>) -> Self {
        Self {
            id: session.session_id(),
            handle: Rc::downgrade(session),
        }
    }
}

#[derive(Default)]
struct Registry {
    active: Option<Slot>,
    pending: Option<Slot>,
    handoff_in_flight: bool,
}

impl Registry {
    fn grant(&mut self, session: &Rc<dyn CoordinatedSession>) {
        let slot = Slot::new(session);
        if self.pending.as_ref().is_some_and(|p| p.id == slot.id) {
            self.pending = None;
        }
        self.active = Some(slot);
        self.handoff_in_flight = false;
    }
}

/// Point-in-time view of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorSnapshot {
    pub active: Option<SessionId>,
    pub pending: Option<SessionId>,
    pub handoff_in_flight: bool,
}

/// Shared handle to a coordinator registry.
///
/// Cloning yields another handle to the same registry. Sessions normally use
/// [`Coordinator::global`]; tests create private instances.
#[derive(Clone, Default)]
pub struct Coordinator {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.snapshot())
            .finish()
    }
}

impl Coordinator {
    /// Fresh, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-thread shared coordinator.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_COORDINATOR.with(Clone::clone)
    }

    /// Ask to present. Returns `true` when the caller may present now.
    ///
    /// On `false` the caller is recorded as the pending waiter and will be
    /// resumed through [`CoordinatedSession::resume_presentation`].
    pub fn request_presentation(&self, session: &Rc<dyn CoordinatedSession>) -> bool {
        let id = session.session_id();
        let (replaced, to_dismiss) = {
            let mut registry = self.registry.borrow_mut();
            let active = registry
                .active
                .as_ref()
                .map(|slot| (slot.id, slot.handle.upgrade()));
            match active {
                None => {
                    registry.grant(session);
                    debug!(session = %id, "presentation granted");
                    return true;
                }
                Some((active_id, None)) => {
                    debug!(session = %id, dropped = %active_id, "active session was dropped; granting");
                    registry.grant(session);
                    return true;
                }
                Some((active_id, Some(_))) if active_id == id => return true,
                Some((active_id, Some(active))) => {
                    if !active.is_presentation_active() {
                        warn!(session = %id, stale = %active_id, "replacing stale active session");
                        registry.grant(session);
                        return true;
                    }
                    let replaced = registry
                        .pending
                        .replace(Slot::new(session))
                        .filter(|previous| previous.id != id)
                        .and_then(|previous| {
                            debug!(session = %id, replaced = %previous.id, "pending waiter replaced");
                            previous.handle.upgrade()
                        });
                    if registry.handoff_in_flight {
                        debug!(session = %id, active = %active_id, "handoff already in flight");
                        (replaced, None)
                    } else {
                        registry.handoff_in_flight = true;
                        debug!(session = %id, active = %active_id, "requesting handoff dismissal");
                        (replaced, Some(active))
                    }
                }
            }
        };
        if let Some(replaced) = replaced {
            replaced.pending_replaced();
        }
        if let Some(active) = to_dismiss {
            active.dismiss_for_handoff();
        }
        false
    }

    /// Release `id`'s claim after its dismissal finished.
    ///
    /// If nothing remains active, the pending waiter is promoted and returned;
    /// the caller resumes it once its own bookkeeping is done.
    #[must_use = "a promoted session must be resumed"]
    pub fn finish_session(&self, id: SessionId) -> Option<Rc<dyn CoordinatedSession>> {
        let mut registry = self.registry.borrow_mut();
        let releases_active = registry
            .active
            .as_ref()
            .is_some_and(|slot| slot.id == id || slot.handle.strong_count() == 0);
        if releases_active {
            registry.active = None;
        }
        if registry.pending.as_ref().is_some_and(|p| p.id == id) {
            registry.pending = None;
        }
        if registry.active.is_some() {
            return None;
        }
        registry.handoff_in_flight = false;
        while let Some(slot) = registry.pending.take() {
            if let Some(next) = slot.handle.upgrade() {
                debug!(finished = %id, promoted = %slot.id, "promoting pending session");
                registry.active = Some(slot);
                return Some(next);
            }
        }
        None
    }

    /// Withdraw `id` from the pending slot.
    pub fn cancel_pending_presentation(&self, id: SessionId) {
        let mut registry = self.registry.borrow_mut();
        if registry.pending.as_ref().is_some_and(|p| p.id == id) {
            registry.pending = None;
            debug!(session = %id, "pending presentation cancelled");
        }
        if registry.pending.is_none() {
            registry.handoff_in_flight = false;
        }
    }

    /// Whether `id` holds the active slot.
    #[must_use]
    pub fn is_active(&self, id: SessionId) -> bool {
        self.registry
            .borrow()
            .active
            .as_ref()
            .is_some_and(|slot| slot.id == id)
    }

    /// Current registry state.
    #[must_use]
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let registry = self.registry.borrow();
        CoordinatorSnapshot {
            active: registry.active.as_ref().map(|s| s.id),
            pending: registry.pending.as_ref().map(|s| s.id),
            handoff_in_flight: registry.handoff_in_flight,
        }
    }

    /// Forget every claim without notifying sessions.
    pub fn reset(&self) {
        *self.registry.borrow_mut() = Registry::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Probe {
        id: SessionId,
        active: Cell<bool>,
        handoff_requests: Cell<u32>,
        resumed: Cell<u32>,
        replaced: Cell<u32>,
    }

    impl Probe {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SessionId::next(),
                active: Cell::new(false),
                handoff_requests: Cell::new(0),
                resumed: Cell::new(0),
                replaced: Cell::new(0),
            })
        }
    }

    impl CoordinatedSession for Probe {
        fn session_id(&self) -> SessionId {
            self.id
        }
        fn is_presentation_active(&self) -> bool {
            self.active.get()
        }
        fn dismiss_for_handoff(&self) {
            self.handoff_requests.set(self.handoff_requests.get() + 1);
        }
        fn resume_presentation(&self) {
            self.resumed.set(self.resumed.get() + 1);
            self.active.set(true);
        }
        fn pending_replaced(&self) {
            self.replaced.set(self.replaced.get() + 1);
        }
    }

    fn dyn_rc(probe: &Rc<Probe>) -> Rc<dyn CoordinatedSession> {
        probe.clone()
    }

    #[test]
    fn empty_registry_grants() {
        let coordinator = Coordinator::new();
        let a = Probe::new();
        assert!(coordinator.request_presentation(&dyn_rc(&a)));
        assert!(coordinator.is_active(a.id));
        assert!(coordinator.request_presentation(&dyn_rc(&a)), "re-request by active");
    }

    #[test]
    fn handoff_requests_dismissal_once_and_promotes() {
        let coordinator = Coordinator::new();
        let a = Probe::new();
        let b = Probe::new();
        assert!(coordinator.request_presentation(&dyn_rc(&a)));
        a.active.set(true);

        assert!(!coordinator.request_presentation(&dyn_rc(&b)));
        assert!(!coordinator.request_presentation(&dyn_rc(&b)));
        assert_eq!(a.handoff_requests.get(), 1);
        assert_eq!(
            coordinator.snapshot(),
            CoordinatorSnapshot {
                active: Some(a.id),
                pending: Some(b.id),
                handoff_in_flight: true,
            }
        );

        a.active.set(false);
        let promoted = coordinator.finish_session(a.id).expect("waiter promoted");
        assert_eq!(promoted.session_id(), b.id);
        assert_eq!(
            coordinator.snapshot(),
            CoordinatorSnapshot {
                active: Some(b.id),
                pending: None,
                handoff_in_flight: false,
            }
        );
    }

    #[test]
    fn last_requester_wins_pending_slot() {
        let coordinator = Coordinator::new();
        let (a, b, c) = (Probe::new(), Probe::new(), Probe::new());
        coordinator.request_presentation(&dyn_rc(&a));
        a.active.set(true);
        coordinator.request_presentation(&dyn_rc(&b));
        coordinator.request_presentation(&dyn_rc(&c));
        assert_eq!(coordinator.snapshot().pending, Some(c.id));
        assert_eq!(a.handoff_requests.get(), 1);
        assert_eq!(b.replaced.get(), 1);
        assert_eq!(c.replaced.get(), 0);
    }

    #[test]
    fn repeated_request_from_waiter_is_not_a_replacement() {
        let coordinator = Coordinator::new();
        let (a, b) = (Probe::new(), Probe::new());
        coordinator.request_presentation(&dyn_rc(&a));
        a.active.set(true);
        coordinator.request_presentation(&dyn_rc(&b));
        coordinator.request_presentation(&dyn_rc(&b));
        assert_eq!(b.replaced.get(), 0);
        assert_eq!(coordinator.snapshot().pending, Some(b.id));
    }

    #[test]
    fn stale_active_is_replaced() {
        let coordinator = Coordinator::new();
        let (a, b) = (Probe::new(), Probe::new());
        coordinator.request_presentation(&dyn_rc(&a));
        // `a` never reports itself active, so it is stale.
        assert!(coordinator.request_presentation(&dyn_rc(&b)));
        assert!(coordinator.is_active(b.id));
        assert_eq!(a.handoff_requests.get(), 0);
    }

    #[test]
    fn dropped_active_is_replaced() {
        let coordinator = Coordinator::new();
        let b = Probe::new();
        {
            let a = Probe::new();
            coordinator.request_presentation(&dyn_rc(&a));
            a.active.set(true);
        }
        assert!(coordinator.request_presentation(&dyn_rc(&b)));
    }

    #[test]
    fn cancel_clears_waiter_and_flag() {
        let coordinator = Coordinator::new();
        let (a, b) = (Probe::new(), Probe::new());
        coordinator.request_presentation(&dyn_rc(&a));
        a.active.set(true);
        coordinator.request_presentation(&dyn_rc(&b));
        coordinator.cancel_pending_presentation(b.id);
        let snap = coordinator.snapshot();
        assert_eq!(snap.pending, None);
        assert!(!snap.handoff_in_flight);
        assert!(coordinator.finish_session(a.id).is_none());
    }

    #[test]
    fn finish_by_non_active_keeps_active() {
        let coordinator = Coordinator::new();
        let (a, b) = (Probe::new(), Probe::new());
        coordinator.request_presentation(&dyn_rc(&a));
        a.active.set(true);
        assert!(coordinator.finish_session(b.id).is_none());
        assert!(coordinator.is_active(a.id));
    }

    #[test]
    fn dropped_waiter_is_skipped_on_promotion() {
        let coordinator = Coordinator::new();
        let a = Probe::new();
        coordinator.request_presentation(&dyn_rc(&a));
        a.active.set(true);
        {
            let b = Probe::new();
            coordinator.request_presentation(&dyn_rc(&b));
        }
        assert!(coordinator.finish_session(a.id).is_none());
        assert_eq!(coordinator.snapshot(), CoordinatorSnapshot::default());
    }

    #[test]
    fn reset_forgets_everything() {
        let coordinator = Coordinator::new();
        let a = Probe::new();
        coordinator.request_presentation(&dyn_rc(&a));
        coordinator.reset();
        assert_eq!(coordinator.snapshot(), CoordinatorSnapshot::default());
    }

    #[test]
    fn global_is_shared_per_thread() {
        let first = Coordinator::global();
        let second = Coordinator::global();
        assert!(Rc::ptr_eq(&first.registry, &second.registry));
    }
}

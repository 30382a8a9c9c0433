#![forbid(unsafe_code)]

//! Change reasons and dismissal reason inference.
//!
//! The host's dismissal callback says only that a sheet is going away. The
//! [`ReasonResolver`] reconstructs *why* from side signals collected in a
//! [`DismissalTrace`] while the dismissal is in progress.
//!
//! # Priority
//!
//! 1. An explicit override set by the initiator is returned verbatim.
//! 2. An interactive (drag-driven) dismissal is a [`ChangeReason::Swipe`].
//! 3. A backdrop tap within the inference window before completion is a
//!    [`ChangeReason::Backdrop`].
//! 4. Anything else is [`ChangeReason::System`].
//!
//! The inference window only classifies; it never times anything out.

use std::fmt;
use std::time::Duration;

use web_time::Instant;

/// Default backdrop-tap inference window.
pub const DEFAULT_INFERENCE_WINDOW: Duration = Duration::from_millis(500);

/// What caused an open-state or detent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ChangeReason {
    /// API call (present, dismiss, snap, attribute write, handoff).
    #[default]
    Programmatic,
    /// User drag gesture.
    Swipe,
    /// User tapped the dimmed backdrop.
    Backdrop,
    /// Host-initiated (detach, reuse, resource reclamation).
    System,
}

impl ChangeReason {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Programmatic => "programmatic",
            Self::Swipe => "swipe",
            Self::Backdrop => "backdrop",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side signals gathered during one dismissal.
///
/// Created when a dismissal begins and discarded once its reason is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DismissalTrace {
    explicit_override: Option<ChangeReason>,
    was_interactive_drag: bool,
    last_backdrop_tap: Option<Instant>,
}

impl DismissalTrace {
    /// Empty trace (host-initiated dismissal).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trace for a dismissal requested with a known reason.
    #[must_use]
    pub fn with_override(reason: ChangeReason) -> Self {
        Self {
            explicit_override: Some(reason),
            ..Self::default()
        }
    }

    /// Replace the override reason.
    pub fn set_override(&mut self, reason: ChangeReason) {
        self.explicit_override = Some(reason);
    }

    /// Record that the host reported the dismissal as drag-driven.
    pub fn mark_interactive(&mut self) {
        self.was_interactive_drag = true;
    }

    /// Record a backdrop tap. Later taps replace earlier ones.
    pub fn record_backdrop_tap(&mut self, at: Instant) {
        self.last_backdrop_tap = Some(at);
    }

    /// Override reason, if any.
    #[inline]
    #[must_use]
    pub fn explicit_override(&self) -> Option<ChangeReason> {
        self.explicit_override
    }

    /// Whether the dismissal was drag-driven.
    #[inline]
    #[must_use]
    pub fn was_interactive_drag(&self) -> bool {
        self.was_interactive_drag
    }

    /// Timestamp of the most recent backdrop tap.
    #[inline]
    #[must_use]
    pub fn last_backdrop_tap(&self) -> Option<Instant> {
        self.last_backdrop_tap
    }
}

/// Classifies completed dismissals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasonResolver {
    window: Duration,
}

impl Default for ReasonResolver {
    fn default() -> Self {
        Self::new(DEFAULT_INFERENCE_WINDOW)
    }
}

impl ReasonResolver {
    /// Resolver with a custom backdrop inference window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// The backdrop inference window.
    #[inline]
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Whether a tap at `tap` precedes `completed_at` by at most the window.
    ///
    /// A tap stamped after completion does not count.
    #[must_use]
    pub fn tap_is_recent(&self, tap: Instant, completed_at: Instant) -> bool {
        completed_at
            .checked_duration_since(tap)
            .is_some_and(|elapsed| elapsed <= self.window)
    }

    /// Classify a dismissal that visually completed at `completed_at`.
    #[must_use]
    pub fn resolve(&self, trace: &DismissalTrace, completed_at: Instant) -> ChangeReason {
        if let Some(reason) = trace.explicit_override {
            return reason;
        }
        if trace.was_interactive_drag {
            return ChangeReason::Swipe;
        }
        let recent_tap = trace
            .last_backdrop_tap
            .is_some_and(|tap| self.tap_is_recent(tap, completed_at));
        if recent_tap {
            return ChangeReason::Backdrop;
        }
        ChangeReason::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ReasonResolver {
        ReasonResolver::default()
    }

    #[test]
    fn override_wins_over_every_signal() {
        let now = Instant::now();
        let mut trace = DismissalTrace::with_override(ChangeReason::Programmatic);
        trace.mark_interactive();
        trace.record_backdrop_tap(now);
        assert_eq!(
            resolver().resolve(&trace, now + Duration::from_millis(10)),
            ChangeReason::Programmatic
        );
    }

    #[test]
    fn interactive_drag_is_swipe() {
        let now = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.mark_interactive();
        trace.record_backdrop_tap(now);
        assert_eq!(resolver().resolve(&trace, now), ChangeReason::Swipe);
    }

    #[test]
    fn recent_backdrop_tap_is_backdrop() {
        let tap = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.record_backdrop_tap(tap);
        assert_eq!(
            resolver().resolve(&trace, tap + Duration::from_millis(200)),
            ChangeReason::Backdrop
        );
    }

    #[test]
    fn stale_backdrop_tap_is_system() {
        let tap = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.record_backdrop_tap(tap);
        assert_eq!(
            resolver().resolve(&trace, tap + Duration::from_secs(2)),
            ChangeReason::System
        );
    }

    #[test]
    fn window_edge_is_inclusive() {
        let tap = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.record_backdrop_tap(tap);
        assert_eq!(
            resolver().resolve(&trace, tap + DEFAULT_INFERENCE_WINDOW),
            ChangeReason::Backdrop
        );
        assert_eq!(
            resolver().resolve(
                &trace,
                tap + DEFAULT_INFERENCE_WINDOW + Duration::from_millis(1)
            ),
            ChangeReason::System
        );
    }

    #[test]
    fn tap_after_completion_does_not_count() {
        let done = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.record_backdrop_tap(done + Duration::from_millis(50));
        assert_eq!(resolver().resolve(&trace, done), ChangeReason::System);
    }

    #[test]
    fn no_signals_is_system() {
        assert_eq!(
            resolver().resolve(&DismissalTrace::new(), Instant::now()),
            ChangeReason::System
        );
    }

    #[test]
    fn custom_window() {
        let tap = Instant::now();
        let mut trace = DismissalTrace::new();
        trace.record_backdrop_tap(tap);
        let wide = ReasonResolver::new(Duration::from_secs(3));
        assert_eq!(
            wide.resolve(&trace, tap + Duration::from_secs(2)),
            ChangeReason::Backdrop
        );
    }

    #[test]
    fn reason_names() {
        assert_eq!(ChangeReason::Programmatic.to_string(), "programmatic");
        assert_eq!(ChangeReason::Backdrop.as_str(), "backdrop");
    }
}

#![forbid(unsafe_code)]

//! `proptest` strategies for random session operation runs.

use proptest::prelude::*;
use sheet_core::{AttributeUpdate, RawDetent};
use sheet_runtime::Session;
use web_time::Instant;

/// One operation against one of several sessions.
#[derive(Debug, Clone)]
pub enum SessionOp {
    Attach(usize),
    Detach(usize),
    Present(usize),
    Dismiss(usize),
    SetOpen(usize, bool),
    Snap(usize, usize),
    HostDidPresent(usize),
    HostWillDismiss(usize, bool),
    HostDidDismiss(usize),
    HostDetentChanged(usize, usize),
    Reuse(usize),
}

impl SessionOp {
    /// Apply to `sessions`; the target index wraps around.
    pub fn apply(&self, sessions: &[Session]) {
        let pick = |i: usize| &sessions[i % sessions.len()];
        match *self {
            Self::Attach(i) => pick(i).on_host_attach(),
            Self::Detach(i) => pick(i).on_host_detach(),
            Self::Present(i) => pick(i).present(),
            Self::Dismiss(i) => pick(i).dismiss(),
            Self::SetOpen(i, open) => pick(i).apply_attribute_update(AttributeUpdate::Open(open)),
            Self::Snap(i, index) => pick(i).snap_to_detent(index),
            Self::HostDidPresent(i) => pick(i).host_did_present(),
            Self::HostWillDismiss(i, interactive) => pick(i).host_will_dismiss(interactive),
            Self::HostDidDismiss(i) => pick(i).host_did_dismiss(Instant::now()),
            Self::HostDetentChanged(i, index) => pick(i).host_detent_changed(index),
            Self::Reuse(i) => pick(i).prepare_for_reuse(),
        }
    }
}

/// Operations targeting up to `sessions` sessions.
pub fn session_op(sessions: usize) -> impl Strategy<Value = SessionOp> {
    let s = 0..sessions;
    prop_oneof![
        3 => s.clone().prop_map(SessionOp::Attach),
        1 => s.clone().prop_map(SessionOp::Detach),
        4 => s.clone().prop_map(SessionOp::Present),
        2 => s.clone().prop_map(SessionOp::Dismiss),
        2 => (s.clone(), any::<bool>()).prop_map(|(i, o)| SessionOp::SetOpen(i, o)),
        1 => (s.clone(), 0usize..4).prop_map(|(i, d)| SessionOp::Snap(i, d)),
        4 => s.clone().prop_map(SessionOp::HostDidPresent),
        1 => (s.clone(), any::<bool>()).prop_map(|(i, b)| SessionOp::HostWillDismiss(i, b)),
        4 => s.clone().prop_map(SessionOp::HostDidDismiss),
        1 => (s.clone(), 0usize..4).prop_map(|(i, d)| SessionOp::HostDetentChanged(i, d)),
        1 => s.prop_map(SessionOp::Reuse),
    ]
}

/// Raw detent entries, valid and malformed.
pub fn raw_detent() -> impl Strategy<Value = RawDetent> {
    prop_oneof![
        prop::sample::select(vec!["fit", "medium", "large", "huge", ""]).prop_map(RawDetent::semantic),
        (-0.5f64..1.5).prop_map(RawDetent::fraction),
        (-100.0f64..900.0).prop_map(RawDetent::points),
        Just(RawDetent::default()),
    ]
    .prop_flat_map(|raw| {
        prop::option::of(prop::sample::select(vec!["a", "b", " ", "content"])).prop_map(
            move |id| match id {
                Some(id) => raw.clone().with_identifier(id),
                None => raw.clone(),
            },
        )
    })
}

#![forbid(unsafe_code)]

//! Lifecycle notifications emitted by a session.

use std::rc::Rc;

use sheet_core::ChangeReason;

/// Notification delivered to session listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetEvent {
    WillPresent,
    DidPresent,
    WillDismiss,
    DidDismiss,
    /// Open state changed.
    OpenChanged { is_open: bool, reason: ChangeReason },
    /// Selected stop changed.
    DetentChanged { index: usize, reason: ChangeReason },
}

impl SheetEvent {
    /// Reason carried by the event, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<ChangeReason> {
        match self {
            Self::OpenChanged { reason, .. } | Self::DetentChanged { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Handle returned by `Session::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Rc<dyn Fn(&SheetEvent)>;

/// Registered listeners in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Callback)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, callback: impl Fn(&SheetEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Rc::new(callback)));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Clone the callbacks so they can run without holding a borrow.
    pub(crate) fn snapshot(&self) -> Vec<Callback> {
        self.entries.iter().map(|(_, cb)| Rc::clone(cb)).collect()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("next_id", &self.next_id)
            .field("count", &self.entries.len())
            .finish()
    }
}

#![forbid(unsafe_code)]

//! Runtime for native sheet presentation.
//!
//! A [`Session`] tracks one sheet through its lifecycle and talks to the host
//! presentation primitive through a [`SheetHost`]. The [`Coordinator`]
//! guarantees at most one session is presenting at a time, handing off
//! between sessions by dismissing the active one first.
//!
//! All session state lives on a single control thread. Other threads reach it
//! with [`ControlHandle::run_sync`].
//!
//! # Example
//!
//! ```
//! use sheet_runtime::{Coordinator, FallbackHost, LifecycleState, Session, SheetConfig};
//!
//! let session = Session::new(FallbackHost::default(), &Coordinator::new(), &SheetConfig::default());
//! session.on_host_attach();
//! session.present();
//! // Without a native sheet primitive the request is a no-op.
//! assert_eq!(session.lifecycle(), LifecycleState::Closed);
//! ```

pub mod config;
pub mod control;
pub mod coordinator;
pub mod events;
pub mod host;
pub mod router;
pub mod runtime;
pub mod session;

pub use config::{ConfigError, SheetConfig};
pub use control::{ControlError, ControlHandle, ControlLoop};
pub use coordinator::{CoordinatedSession, Coordinator, CoordinatorSnapshot};
pub use events::{ListenerId, SheetEvent};
pub use host::{ContainerKind, ContentId, FallbackHost, SheetHost};
pub use router::{ContentOp, ContentRouter};
pub use runtime::SheetRuntime;
pub use session::{LifecycleState, Session, SessionId, UpdateBatch};

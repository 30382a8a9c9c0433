#![forbid(unsafe_code)]

//! Native modal sheets.
//!
//! `sheetkit` re-exports the pure model from `sheet-core` and, with the
//! default `runtime` feature, the session runtime from `sheet-runtime`.
//!
//! | Feature         | Enables                                         |
//! |-----------------|-------------------------------------------------|
//! | `runtime`       | Sessions, coordinator, control loop (default)   |
//! | `serde`         | Serde derives on model types                    |
//! | `policy-config` | Loading [`SheetConfig`] from TOML or JSON       |
//!
//! Most applications only need the [`prelude`].

pub use sheet_core as core;
#[cfg(feature = "runtime")]
pub use sheet_runtime as runtime;

pub use sheet_core::{
    AttributeUpdate, BackgroundInteraction, ChangeReason, ColorScheme, DetentCatalog, RawDetent,
    SheetAttributes,
};
#[cfg(feature = "runtime")]
pub use sheet_runtime::{
    Coordinator, FallbackHost, LifecycleState, Session, SheetConfig, SheetEvent, SheetHost,
    SheetRuntime,
};

/// Common imports for sheet hosts and callers.
pub mod prelude {
    pub use sheet_core::{AttributeUpdate, ChangeReason, HostConfiguration, RawDetent};
    #[cfg(feature = "runtime")]
    pub use sheet_runtime::{
        ControlHandle, ControlLoop, Coordinator, LifecycleState, Session, SheetConfig,
        SheetEvent, SheetHost, SheetRuntime,
    };
}

#![forbid(unsafe_code)]

//! Leaf types for native sheet presentation.
//!
//! This crate provides:
//! - [`DetentCatalog`] for validating and ordering sheet stop positions
//! - [`ReasonResolver`] for classifying why a dismissal happened
//! - [`SheetAttributes`] and [`HostConfiguration`] for declarative styling
//! - [`PlatformCapabilities`] for hosts with partial or no sheet support
//!
//! Nothing here holds runtime state; see `sheet-runtime` for sessions and
//! the single-active-session coordinator.

pub mod attributes;
pub mod detent;
pub mod platform;
pub mod reason;

pub use attributes::{
    AttributeCategory, AttributeUpdate, BackgroundInteraction, BlurStyle, ColorScheme,
    ContentBackgroundStyle, DimmingBoundary, HostConfiguration, ResolvedStop, SheetAttributes,
};
pub use detent::{
    CatalogBuild, DetentCatalog, DetentDefinition, DetentDiagnostic, DetentKind, RawDetent,
    RawValue,
};
pub use platform::PlatformCapabilities;
pub use reason::{ChangeReason, DEFAULT_INFERENCE_WINDOW, DismissalTrace, ReasonResolver};

/// Re-exported so callers stamp signals with the same clock type.
pub use web_time::Instant;

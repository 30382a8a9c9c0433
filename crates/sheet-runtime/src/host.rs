#![forbid(unsafe_code)]

//! Seam between a session and the host's sheet presentation primitive.
//!
//! A [`SheetHost`] performs the visual work; it never decides anything. All
//! completions travel back through the session's `host_*` entry points and
//! must be delivered after the triggering call has returned (the host's run
//! loop delivers them on a later turn).

use sheet_core::{HostConfiguration, PlatformCapabilities};

/// Where embedded content currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContainerKind {
    /// Detached holding area used while the sheet is not shown.
    #[default]
    Staging,
    /// Container inside the presented sheet.
    Presentation,
}

/// Identity of one embedded content subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(u64);

impl ContentId {
    /// Wrap a host-side tag.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw tag value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// The host's presentation primitive for one sheet.
pub trait SheetHost {
    /// What this host can do.
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::all()
    }

    /// Begin an animated presentation. Completion arrives via
    /// `Session::host_did_present`.
    fn present(&mut self, config: &HostConfiguration);

    /// Begin an animated dismissal. Completion arrives via
    /// `Session::host_did_dismiss`.
    fn dismiss(&mut self);

    /// Remove the sheet immediately, without animation or completion callback.
    fn teardown(&mut self);

    /// Move the presented sheet to the stop at `index`.
    fn select_detent(&mut self, index: usize);

    /// Push updated declarative attributes to a presented sheet.
    fn apply_configuration(&mut self, config: &HostConfiguration);

    /// Physically insert `child` into `container` at `index`.
    fn mount_content(&mut self, container: ContainerKind, child: ContentId, index: usize) {
        let _ = (container, child, index);
    }

    /// Physically remove `child` from `container` without destroying it.
    fn unmount_content(&mut self, container: ContainerKind, child: ContentId) {
        let _ = (container, child);
    }
}

/// Host for platforms without a native modal sheet.
///
/// Reports no capabilities; sessions bound to it never leave `Closed`, and
/// content stays in the staging container where it renders inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackHost {
    platform: &'static str,
}

impl FallbackHost {
    /// Fallback host for the named platform (used in diagnostics).
    #[must_use]
    pub const fn new(platform: &'static str) -> Self {
        Self { platform }
    }

    /// Platform name.
    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &'static str {
        self.platform
    }
}

impl Default for FallbackHost {
    fn default() -> Self {
        Self::new(std::env::consts::OS)
    }
}

impl SheetHost for FallbackHost {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::empty()
    }

    fn present(&mut self, _config: &HostConfiguration) {}

    fn dismiss(&mut self) {}

    fn teardown(&mut self) {}

    fn select_detent(&mut self, _index: usize) {}

    fn apply_configuration(&mut self, _config: &HostConfiguration) {}
}

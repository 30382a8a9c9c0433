#![forbid(unsafe_code)]

//! Platform capability flags.
//!
//! Hosts without a native modal-sheet primitive report
//! [`PlatformCapabilities::empty()`]; sessions bound to such a host degrade
//! every presentation request to a deterministic no-op.

use bitflags::bitflags;

use crate::attributes::{
    BackgroundInteraction, ColorScheme, ContentBackgroundStyle, SheetAttributes,
};

bitflags! {
    /// Features a host presentation primitive supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlatformCapabilities: u8 {
        /// The host can present a modal sheet at all.
        const PRESENTATION = 1 << 0;
        /// Custom (fraction/points/fit) detents.
        const DETENTS = 1 << 1;
        const GRABBER = 1 << 2;
        const BACKGROUND_INTERACTION = 1 << 3;
        const CORNER_RADIUS = 1 << 4;
        const COLOR_SCHEME = 1 << 5;
        const CONTENT_BACKGROUND_STYLE = 1 << 6;
    }
}

impl PlatformCapabilities {
    /// Whether sheets can be shown at all.
    #[inline]
    #[must_use]
    pub const fn supports_presentation(self) -> bool {
        self.contains(Self::PRESENTATION)
    }

    /// Capabilities `attributes` would use beyond plain presentation.
    #[must_use]
    pub fn required_by(attributes: &SheetAttributes) -> Self {
        let mut required = Self::PRESENTATION;
        if !attributes.grabber_visible {
            required |= Self::GRABBER;
        }
        if attributes.background_interaction != BackgroundInteraction::Modal {
            required |= Self::BACKGROUND_INTERACTION;
        }
        if attributes.effective_corner_radius().is_some() {
            required |= Self::CORNER_RADIUS;
        }
        if attributes.color_scheme != ColorScheme::System {
            required |= Self::COLOR_SCHEME;
        }
        if attributes.content_background_style != ContentBackgroundStyle::System {
            required |= Self::CONTENT_BACKGROUND_STYLE;
        }
        required
    }

    /// Features in `required` this platform lacks.
    #[inline]
    #[must_use]
    pub fn missing(self, required: Self) -> Self {
        required.difference(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attributes_need_only_presentation() {
        let required = PlatformCapabilities::required_by(&SheetAttributes::default());
        assert_eq!(required, PlatformCapabilities::PRESENTATION);
    }

    #[test]
    fn missing_reports_unsupported_features() {
        let attrs = SheetAttributes {
            color_scheme: ColorScheme::Dark,
            corner_radius: Some(20.0),
            ..SheetAttributes::default()
        };
        let platform = PlatformCapabilities::PRESENTATION | PlatformCapabilities::CORNER_RADIUS;
        assert_eq!(
            platform.missing(PlatformCapabilities::required_by(&attrs)),
            PlatformCapabilities::COLOR_SCHEME
        );
    }

    #[test]
    fn empty_platform_cannot_present() {
        assert!(!PlatformCapabilities::empty().supports_presentation());
        assert!(PlatformCapabilities::all().supports_presentation());
    }
}

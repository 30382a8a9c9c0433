#![forbid(unsafe_code)]

//! Declarative sheet attributes and the configuration handed to the host.
//!
//! Attribute writes arrive one at a time as [`AttributeUpdate`] values. Each
//! update belongs to exactly one [`AttributeCategory`]; the session stages
//! writes and commits whole categories at once.
//!
//! [`SheetAttributes::host_configuration`] turns the committed attributes plus
//! a [`DetentCatalog`] into a [`HostConfiguration`], the declarative output the
//! host presentation primitive consumes.

use bitflags::bitflags;

use crate::detent::{DetentCatalog, DetentDiagnostic, DetentKind, RawDetent};

bitflags! {
    /// Attribute categories that can be staged during an update batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeCategory: u16 {
        const DETENTS = 1 << 0;
        const SELECTED_DETENT = 1 << 1;
        const INITIAL_DETENT = 1 << 2;
        const OPEN = 1 << 3;
        const GRABBER = 1 << 4;
        const SWIPE_DISMISS = 1 << 5;
        const BACKGROUND_INTERACTION = 1 << 6;
        const CORNER_RADIUS = 1 << 7;
        const EDGE_EXPAND = 1 << 8;
        const COLOR_SCHEME = 1 << 9;
        const CONTENT_BACKGROUND_STYLE = 1 << 10;

        /// Categories that only change how the host draws the sheet.
        const STYLE = Self::GRABBER.bits()
            | Self::SWIPE_DISMISS.bits()
            | Self::BACKGROUND_INTERACTION.bits()
            | Self::CORNER_RADIUS.bits()
            | Self::EDGE_EXPAND.bits()
            | Self::COLOR_SCHEME.bits()
            | Self::CONTENT_BACKGROUND_STYLE.bits();
    }
}

/// How the content behind the sheet behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum BackgroundInteraction {
    /// Background dimmed and blocked at every detent.
    #[default]
    Modal,
    /// Background never dimmed and always interactive.
    NonModal,
    /// Background interactive while the sheet rests at or below this index.
    UpThrough(usize),
}

/// Preferred color scheme of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ColorScheme {
    /// Follow the system appearance.
    #[default]
    System,
    Light,
    Dark,
}

/// Blur material for a blurred content background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum BlurStyle {
    #[default]
    Regular,
    Prominent,
    Light,
    Dark,
    SystemMaterial,
}

/// Background of the sheet's content area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ContentBackgroundStyle {
    /// Host default background.
    #[default]
    System,
    Opaque,
    Transparent,
    Blur(BlurStyle),
}

/// A single declarative attribute write.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeUpdate {
    /// Replace the raw detent source.
    Detents(Vec<RawDetent>),
    /// Controlled detent selection; `None` means uncontrolled.
    SelectedDetent(Option<usize>),
    /// Index used when the sheet opens without a controlled selection.
    InitialDetent(usize),
    /// Desired open state.
    Open(bool),
    GrabberVisible(bool),
    AllowSwipeToDismiss(bool),
    BackgroundInteraction(BackgroundInteraction),
    /// Corner radius in points; `None` uses the system default.
    CornerRadius(Option<f64>),
    ExpandsWhenScrolledToEdge(bool),
    ColorScheme(ColorScheme),
    ContentBackgroundStyle(ContentBackgroundStyle),
}

impl AttributeUpdate {
    /// Category this write belongs to.
    #[must_use]
    pub fn category(&self) -> AttributeCategory {
        match self {
            Self::Detents(_) => AttributeCategory::DETENTS,
            Self::SelectedDetent(_) => AttributeCategory::SELECTED_DETENT,
            Self::InitialDetent(_) => AttributeCategory::INITIAL_DETENT,
            Self::Open(_) => AttributeCategory::OPEN,
            Self::GrabberVisible(_) => AttributeCategory::GRABBER,
            Self::AllowSwipeToDismiss(_) => AttributeCategory::SWIPE_DISMISS,
            Self::BackgroundInteraction(_) => AttributeCategory::BACKGROUND_INTERACTION,
            Self::CornerRadius(_) => AttributeCategory::CORNER_RADIUS,
            Self::ExpandsWhenScrolledToEdge(_) => AttributeCategory::EDGE_EXPAND,
            Self::ColorScheme(_) => AttributeCategory::COLOR_SCHEME,
            Self::ContentBackgroundStyle(_) => AttributeCategory::CONTENT_BACKGROUND_STYLE,
        }
    }
}

/// Full set of declarative attributes of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetAttributes {
    pub detents: Vec<RawDetent>,
    pub selected_detent: Option<usize>,
    pub initial_detent: usize,
    pub open: bool,
    pub grabber_visible: bool,
    pub allow_swipe_to_dismiss: bool,
    pub background_interaction: BackgroundInteraction,
    pub corner_radius: Option<f64>,
    pub expands_when_scrolled_to_edge: bool,
    pub color_scheme: ColorScheme,
    pub content_background_style: ContentBackgroundStyle,
}

impl Default for SheetAttributes {
    fn default() -> Self {
        Self {
            detents: vec![
                RawDetent::from(DetentKind::Medium),
                RawDetent::from(DetentKind::Large),
            ],
            selected_detent: None,
            initial_detent: 0,
            open: false,
            grabber_visible: true,
            allow_swipe_to_dismiss: true,
            background_interaction: BackgroundInteraction::Modal,
            corner_radius: None,
            expands_when_scrolled_to_edge: true,
            color_scheme: ColorScheme::System,
            content_background_style: ContentBackgroundStyle::System,
        }
    }
}

impl SheetAttributes {
    /// Store a write and return its category.
    pub fn apply(&mut self, update: AttributeUpdate) -> AttributeCategory {
        let category = update.category();
        match update {
            AttributeUpdate::Detents(detents) => self.detents = detents,
            AttributeUpdate::SelectedDetent(index) => self.selected_detent = index,
            AttributeUpdate::InitialDetent(index) => self.initial_detent = index,
            AttributeUpdate::Open(open) => self.open = open,
            AttributeUpdate::GrabberVisible(v) => self.grabber_visible = v,
            AttributeUpdate::AllowSwipeToDismiss(v) => self.allow_swipe_to_dismiss = v,
            AttributeUpdate::BackgroundInteraction(v) => self.background_interaction = v,
            AttributeUpdate::CornerRadius(v) => self.corner_radius = v,
            AttributeUpdate::ExpandsWhenScrolledToEdge(v) => {
                self.expands_when_scrolled_to_edge = v;
            }
            AttributeUpdate::ColorScheme(v) => self.color_scheme = v,
            AttributeUpdate::ContentBackgroundStyle(v) => self.content_background_style = v,
        }
        category
    }

    /// Copy the categories in `categories` from `other`.
    pub fn copy_from(&mut self, other: &Self, categories: AttributeCategory) {
        for category in categories.iter() {
            match category {
                AttributeCategory::DETENTS => self.detents.clone_from(&other.detents),
                AttributeCategory::SELECTED_DETENT => self.selected_detent = other.selected_detent,
                AttributeCategory::INITIAL_DETENT => self.initial_detent = other.initial_detent,
                AttributeCategory::OPEN => self.open = other.open,
                AttributeCategory::GRABBER => self.grabber_visible = other.grabber_visible,
                AttributeCategory::SWIPE_DISMISS => {
                    self.allow_swipe_to_dismiss = other.allow_swipe_to_dismiss;
                }
                AttributeCategory::BACKGROUND_INTERACTION => {
                    self.background_interaction = other.background_interaction;
                }
                AttributeCategory::CORNER_RADIUS => self.corner_radius = other.corner_radius,
                AttributeCategory::EDGE_EXPAND => {
                    self.expands_when_scrolled_to_edge = other.expands_when_scrolled_to_edge;
                }
                AttributeCategory::COLOR_SCHEME => self.color_scheme = other.color_scheme,
                AttributeCategory::CONTENT_BACKGROUND_STYLE => {
                    self.content_background_style = other.content_background_style;
                }
                _ => {}
            }
        }
    }

    /// Resolve the dimming boundary against `catalog`.
    ///
    /// An `UpThrough` index outside the catalog dims everything.
    pub fn dimming_boundary(
        &self,
        catalog: &DetentCatalog,
    ) -> (DimmingBoundary, Option<DetentDiagnostic>) {
        match self.background_interaction {
            BackgroundInteraction::Modal => (DimmingBoundary::DimAll, None),
            BackgroundInteraction::NonModal => (
                DimmingBoundary::UndimmedThrough(catalog.last_index()),
                None,
            ),
            BackgroundInteraction::UpThrough(index) if catalog.contains_index(index) => {
                (DimmingBoundary::UndimmedThrough(index), None)
            }
            BackgroundInteraction::UpThrough(index) => (
                DimmingBoundary::DimAll,
                Some(DetentDiagnostic::IndexOutOfRange {
                    index,
                    len: catalog.len(),
                }),
            ),
        }
    }

    /// Corner radius, ignoring negative or non-finite values.
    #[must_use]
    pub fn effective_corner_radius(&self) -> Option<f64> {
        self.corner_radius.filter(|r| r.is_finite() && *r >= 0.0)
    }

    /// Build the host-facing configuration.
    ///
    /// `selected` is the stop the host should show; callers pass an index
    /// already resolved against `catalog`.
    pub fn host_configuration(
        &self,
        catalog: &DetentCatalog,
        selected: usize,
    ) -> (HostConfiguration, Option<DetentDiagnostic>) {
        let (dimming, diagnostic) = self.dimming_boundary(catalog);
        let stops = catalog
            .iter()
            .map(|d| ResolvedStop {
                identifier: d.identifier().to_owned(),
                kind: d.kind(),
            })
            .collect();
        let config = HostConfiguration {
            stops,
            selected_index: selected.min(catalog.last_index()),
            dimming,
            corner_radius: self.effective_corner_radius(),
            grabber_visible: self.grabber_visible,
            interactive_dismiss: self.allow_swipe_to_dismiss,
            expands_when_scrolled_to_edge: self.expands_when_scrolled_to_edge,
            color_scheme: self.color_scheme,
            content_background_style: self.content_background_style,
        };
        (config, diagnostic)
    }
}

/// Which stops leave the background undimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DimmingBoundary {
    /// Dim at every stop.
    #[default]
    DimAll,
    /// Stops up to and including this index are undimmed.
    UndimmedThrough(usize),
}

/// One stop as handed to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStop {
    pub identifier: String,
    pub kind: DetentKind,
}

/// Declarative output for the host presentation primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfiguration {
    /// Ordered stops, index space shared with detent events.
    pub stops: Vec<ResolvedStop>,
    pub selected_index: usize,
    pub dimming: DimmingBoundary,
    pub corner_radius: Option<f64>,
    pub grabber_visible: bool,
    /// Whether the user may drag the sheet away.
    pub interactive_dismiss: bool,
    pub expands_when_scrolled_to_edge: bool,
    pub color_scheme: ColorScheme,
    pub content_background_style: ContentBackgroundStyle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_update_maps_to_one_category() {
        let updates = [
            AttributeUpdate::Detents(Vec::new()),
            AttributeUpdate::SelectedDetent(Some(1)),
            AttributeUpdate::InitialDetent(0),
            AttributeUpdate::Open(true),
            AttributeUpdate::GrabberVisible(false),
            AttributeUpdate::AllowSwipeToDismiss(false),
            AttributeUpdate::BackgroundInteraction(BackgroundInteraction::NonModal),
            AttributeUpdate::CornerRadius(Some(12.0)),
            AttributeUpdate::ExpandsWhenScrolledToEdge(false),
            AttributeUpdate::ColorScheme(ColorScheme::Dark),
            AttributeUpdate::ContentBackgroundStyle(ContentBackgroundStyle::Opaque),
        ];
        let mut all = AttributeCategory::empty();
        for update in &updates {
            let category = update.category();
            assert_eq!(category.bits().count_ones(), 1, "{update:?}");
            assert!(!all.intersects(category), "duplicate category for {update:?}");
            all |= category;
        }
        assert_eq!(all, AttributeCategory::all());
    }

    #[test]
    fn apply_then_copy_moves_only_requested_categories() {
        let mut staged = SheetAttributes::default();
        staged.apply(AttributeUpdate::GrabberVisible(false));
        staged.apply(AttributeUpdate::Open(true));

        let mut applied = SheetAttributes::default();
        applied.copy_from(&staged, AttributeCategory::GRABBER);
        assert!(!applied.grabber_visible);
        assert!(!applied.open);
    }

    #[test]
    fn dimming_boundary_variants() {
        let catalog = DetentCatalog::fallback();
        let mut attrs = SheetAttributes::default();
        assert_eq!(attrs.dimming_boundary(&catalog).0, DimmingBoundary::DimAll);

        attrs.background_interaction = BackgroundInteraction::NonModal;
        assert_eq!(
            attrs.dimming_boundary(&catalog).0,
            DimmingBoundary::UndimmedThrough(1)
        );

        attrs.background_interaction = BackgroundInteraction::UpThrough(0);
        assert_eq!(
            attrs.dimming_boundary(&catalog).0,
            DimmingBoundary::UndimmedThrough(0)
        );

        attrs.background_interaction = BackgroundInteraction::UpThrough(5);
        let (boundary, diagnostic) = attrs.dimming_boundary(&catalog);
        assert_eq!(boundary, DimmingBoundary::DimAll);
        assert_eq!(
            diagnostic,
            Some(DetentDiagnostic::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn negative_corner_radius_means_system_default() {
        let mut attrs = SheetAttributes::default();
        attrs.corner_radius = Some(-1.0);
        assert_eq!(attrs.effective_corner_radius(), None);
        attrs.corner_radius = Some(16.0);
        assert_eq!(attrs.effective_corner_radius(), Some(16.0));
    }

    #[test]
    fn host_configuration_lists_stops_in_catalog_order() {
        let catalog = DetentCatalog::build(&[
            RawDetent::semantic("large"),
            RawDetent::fraction(0.3).with_identifier("peek"),
        ])
        .catalog;
        let attrs = SheetAttributes {
            allow_swipe_to_dismiss: false,
            ..SheetAttributes::default()
        };
        let (config, diagnostic) = attrs.host_configuration(&catalog, 1);
        assert!(diagnostic.is_none());
        let ids: Vec<&str> = config.stops.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, vec!["peek", "large"]);
        assert_eq!(config.selected_index, 1);
        assert!(!config.interactive_dismiss);
        assert!(config.grabber_visible);
    }
}

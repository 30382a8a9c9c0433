#![forbid(unsafe_code)]

//! Detent catalog: validated, deduplicated, ordered sheet stop positions.
//!
//! A [`DetentCatalog`] is built from loosely-typed [`RawDetent`] entries as
//! delivered by an embedding framework. Each entry is validated on its own;
//! bad entries are dropped and reported as [`DetentDiagnostic`] values rather
//! than failing the whole build.
//!
//! # Invariants
//!
//! 1. **Never empty**: if no entry survives validation the catalog falls back
//!    to `{Medium, Large}`.
//!
//! 2. **Unique values**: no two definitions share a `(kind, value)` pair. The
//!    first occurrence wins.
//!
//! 3. **Unique identifiers**: no two definitions share an identifier, checked
//!    independently of value dedup.
//!
//! 4. **Deterministic order**: definitions are sorted ascending by sort key,
//!    ties broken by identifier. This order is the index space used by every
//!    detent index and detent-change event.
//!
//! 5. **Idempotent**: `build(catalog.to_raw())` yields an equal catalog.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Missing kind | Entry has no `type` | Dropped, `MissingKind` |
//! | Unknown kind | `type` not semantic/fraction/points | Dropped, `UnsupportedKind` |
//! | Bad semantic value | Not `fit`/`medium`/`large` | Dropped, `InvalidSemantic` |
//! | Non-numeric value | Fraction/points without finite number | Dropped, `NonNumericValue` |
//! | Out of range | Fraction outside `[0, 1]`, points `<= 0` | Dropped |
//! | Duplicate value | Same `(kind, value)` seen earlier | Dropped, `DuplicateValue` |
//! | Duplicate identifier | Same identifier seen earlier | Dropped, `DuplicateIdentifier` |
//! | Nothing valid | All entries dropped or input empty | Fallback `{Medium, Large}` |

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Sort key of the fit-content semantic detent.
pub const FIT_SORT_KEY: f64 = 0.25;
/// Sort key of the medium semantic detent.
pub const MEDIUM_SORT_KEY: f64 = 0.5;
/// Sort key of the large semantic detent.
pub const LARGE_SORT_KEY: f64 = 1.0;

/// Reference height used to turn point detents into a sort key.
pub const POINTS_REFERENCE_HEIGHT: f64 = 1000.0;

const KIND_SEMANTIC: &str = "semantic";
const KIND_FRACTION: &str = "fraction";
const KIND_POINTS: &str = "points";

/// Resolved detent kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetentKind {
    /// Height fitted to the content (`fit`).
    FitContent,
    /// System medium detent (about half height).
    Medium,
    /// System large detent (full available height).
    Large,
    /// Fraction of the container height, `0 <= f <= 1`.
    Fraction(f64),
    /// Fixed height in points, `p > 0`.
    Points(f64),
}

impl DetentKind {
    /// Height proxy used for ordering.
    #[must_use]
    pub fn sort_key(self) -> f64 {
        match self {
            Self::FitContent => FIT_SORT_KEY,
            Self::Medium => MEDIUM_SORT_KEY,
            Self::Large => LARGE_SORT_KEY,
            Self::Fraction(value) => value,
            Self::Points(value) => value / POINTS_REFERENCE_HEIGHT,
        }
    }

    /// Bridge type name (`semantic`, `fraction`, or `points`).
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::FitContent | Self::Medium | Self::Large => KIND_SEMANTIC,
            Self::Fraction(_) => KIND_FRACTION,
            Self::Points(_) => KIND_POINTS,
        }
    }

    /// Identifier used when the caller does not supply one.
    #[must_use]
    pub fn default_identifier(self) -> String {
        match self {
            Self::FitContent => "fit".to_owned(),
            Self::Medium => "medium".to_owned(),
            Self::Large => "large".to_owned(),
            Self::Fraction(value) => format!("fraction_{value}"),
            Self::Points(value) => format!("points_{value}"),
        }
    }

    /// Key used for value deduplication.
    fn dedup_key(self) -> (u8, u64) {
        // -0.0 and 0.0 resolve to the same stop.
        let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        match self {
            Self::FitContent => (0, 0),
            Self::Medium => (1, 0),
            Self::Large => (2, 0),
            Self::Fraction(value) => (3, bits(value)),
            Self::Points(value) => (4, bits(value)),
        }
    }

    fn raw_value(self) -> RawValue {
        match self {
            Self::FitContent => RawValue::Text("fit".to_owned()),
            Self::Medium => RawValue::Text("medium".to_owned()),
            Self::Large => RawValue::Text("large".to_owned()),
            Self::Fraction(value) | Self::Points(value) => RawValue::Number(value),
        }
    }
}

impl fmt::Display for DetentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FitContent => write!(f, "semantic:fit"),
            Self::Medium => write!(f, "semantic:medium"),
            Self::Large => write!(f, "semantic:large"),
            Self::Fraction(value) => write!(f, "fraction:{value}"),
            Self::Points(value) => write!(f, "points:{value}"),
        }
    }
}

// =============================================================================
// Raw input
// =============================================================================

/// Loosely-typed value of a raw detent entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum RawValue {
    /// A string value (semantic detents).
    Text(String),
    /// A numeric value (fraction and points detents).
    Number(f64),
}

/// One detent entry as delivered by the embedding framework.
///
/// Every field is optional so that malformed input can be represented and
/// reported instead of rejected at the type level.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawDetent {
    /// `semantic`, `fraction`, or `points`.
    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub kind: Option<String>,
    /// Semantic name or numeric value.
    #[cfg_attr(feature = "serde", serde(default))]
    pub value: Option<RawValue>,
    /// Optional caller-chosen identifier.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub identifier: Option<String>,
}

impl RawDetent {
    /// Semantic entry (`fit`, `medium`, or `large`).
    #[must_use]
    pub fn semantic(name: impl Into<String>) -> Self {
        Self {
            kind: Some(KIND_SEMANTIC.to_owned()),
            value: Some(RawValue::Text(name.into())),
            identifier: None,
        }
    }

    /// Fraction entry.
    #[must_use]
    pub fn fraction(value: f64) -> Self {
        Self {
            kind: Some(KIND_FRACTION.to_owned()),
            value: Some(RawValue::Number(value)),
            identifier: None,
        }
    }

    /// Points entry.
    #[must_use]
    pub fn points(value: f64) -> Self {
        Self {
            kind: Some(KIND_POINTS.to_owned()),
            value: Some(RawValue::Number(value)),
            identifier: None,
        }
    }

    /// Set a caller-chosen identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Trimmed caller identifier; blank identifiers count as absent.
    fn provided_identifier(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Validate this entry in isolation.
    fn resolve_kind(&self, index: usize) -> Result<DetentKind, DetentDiagnostic> {
        let Some(kind) = self.kind.as_deref() else {
            return Err(DetentDiagnostic::MissingKind { index });
        };
        match kind {
            KIND_SEMANTIC => match &self.value {
                Some(RawValue::Text(name)) => match name.as_str() {
                    "fit" => Ok(DetentKind::FitContent),
                    "medium" => Ok(DetentKind::Medium),
                    "large" => Ok(DetentKind::Large),
                    other => Err(DetentDiagnostic::InvalidSemantic {
                        index,
                        value: other.to_owned(),
                    }),
                },
                _ => Err(DetentDiagnostic::MissingValue { index }),
            },
            KIND_FRACTION => {
                let value = self.finite_number(index)?;
                if (0.0..=1.0).contains(&value) {
                    Ok(DetentKind::Fraction(value))
                } else {
                    Err(DetentDiagnostic::FractionOutOfRange { index, value })
                }
            }
            KIND_POINTS => {
                let value = self.finite_number(index)?;
                if value > 0.0 {
                    Ok(DetentKind::Points(value))
                } else {
                    Err(DetentDiagnostic::PointsNotPositive { index, value })
                }
            }
            other => Err(DetentDiagnostic::UnsupportedKind {
                index,
                kind: other.to_owned(),
            }),
        }
    }

    fn finite_number(&self, index: usize) -> Result<f64, DetentDiagnostic> {
        match self.value {
            Some(RawValue::Number(value)) if value.is_finite() => Ok(value),
            _ => Err(DetentDiagnostic::NonNumericValue { index }),
        }
    }
}

impl From<DetentKind> for RawDetent {
    fn from(kind: DetentKind) -> Self {
        Self {
            kind: Some(kind.type_name().to_owned()),
            value: Some(kind.raw_value()),
            identifier: None,
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Why a raw entry was dropped (or why the catalog fell back).
///
/// Indices refer to positions in the raw input slice.
#[derive(Debug, Clone, PartialEq)]
pub enum DetentDiagnostic {
    /// Entry has no kind.
    MissingKind { index: usize },
    /// Entry kind is not recognized.
    UnsupportedKind { index: usize, kind: String },
    /// Semantic entry without a string value.
    MissingValue { index: usize },
    /// Semantic entry with an unknown name.
    InvalidSemantic { index: usize, value: String },
    /// Fraction/points entry without a finite number.
    NonNumericValue { index: usize },
    /// Fraction outside `[0, 1]`.
    FractionOutOfRange { index: usize, value: f64 },
    /// Points value `<= 0`.
    PointsNotPositive { index: usize, value: f64 },
    /// Same resolved `(kind, value)` as an earlier entry.
    DuplicateValue { index: usize, key: String },
    /// Same identifier as an earlier entry.
    DuplicateIdentifier { index: usize, identifier: String },
    /// No entry survived; the default `{Medium, Large}` is used.
    EmptyFallback,
    /// A requested detent index does not exist in the catalog.
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for DetentDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKind { index } => write!(f, "detent {index}: missing 'type'"),
            Self::UnsupportedKind { index, kind } => {
                write!(f, "detent {index}: unsupported type '{kind}'")
            }
            Self::MissingValue { index } => {
                write!(f, "detent {index}: semantic detent needs a string value")
            }
            Self::InvalidSemantic { index, value } => {
                write!(f, "detent {index}: unknown semantic detent '{value}'")
            }
            Self::NonNumericValue { index } => {
                write!(f, "detent {index}: value must be a finite number")
            }
            Self::FractionOutOfRange { index, value } => {
                write!(f, "detent {index}: fraction {value} must be between 0 and 1")
            }
            Self::PointsNotPositive { index, value } => {
                write!(f, "detent {index}: points {value} must be greater than 0")
            }
            Self::DuplicateValue { index, key } => {
                write!(f, "detent {index}: duplicate detent '{key}'")
            }
            Self::DuplicateIdentifier { index, identifier } => {
                write!(f, "detent {index}: duplicate identifier '{identifier}'")
            }
            Self::EmptyFallback => write!(f, "no valid detents, using [medium, large]"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "detent index {index} is out of bounds for {len} detent(s)")
            }
        }
    }
}

impl std::error::Error for DetentDiagnostic {}

// =============================================================================
// Catalog
// =============================================================================

/// One validated stop position.
#[derive(Debug, Clone, PartialEq)]
pub struct DetentDefinition {
    kind: DetentKind,
    identifier: String,
    sort_key: f64,
}

impl DetentDefinition {
    fn new(kind: DetentKind, identifier: String) -> Self {
        Self {
            kind,
            identifier,
            sort_key: kind.sort_key(),
        }
    }

    /// Resolved kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DetentKind {
        self.kind
    }

    /// Identifier, unique within the catalog.
    #[inline]
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Height proxy used for ordering.
    #[inline]
    #[must_use]
    pub fn sort_key(&self) -> f64 {
        self.sort_key
    }

    /// Raw form that rebuilds to this definition.
    #[must_use]
    pub fn to_raw(&self) -> RawDetent {
        RawDetent::from(self.kind).with_identifier(self.identifier.clone())
    }
}

/// Output of [`DetentCatalog::build`].
#[derive(Debug, Clone)]
pub struct CatalogBuild {
    /// The resulting catalog (never empty).
    pub catalog: DetentCatalog,
    /// Everything that was dropped, in input order.
    pub diagnostics: Vec<DetentDiagnostic>,
}

/// Immutable, ordered set of detent definitions.
///
/// Cloning is cheap (shared storage). A new configuration produces a new
/// catalog; catalogs are never edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct DetentCatalog {
    definitions: Arc<[DetentDefinition]>,
    fallback: bool,
}

impl Default for DetentCatalog {
    fn default() -> Self {
        Self::fallback()
    }
}

impl DetentCatalog {
    /// The canonical `{Medium, Large}` catalog.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            definitions: Arc::from(vec![
                DetentDefinition::new(DetentKind::Medium, DetentKind::Medium.default_identifier()),
                DetentDefinition::new(DetentKind::Large, DetentKind::Large.default_identifier()),
            ]),
            fallback: true,
        }
    }

    /// Validate, deduplicate, and order raw entries.
    #[must_use]
    pub fn build(raw: &[RawDetent]) -> CatalogBuild {
        let mut diagnostics = Vec::new();
        let mut definitions: Vec<DetentDefinition> = Vec::with_capacity(raw.len());
        let mut seen_values = HashSet::with_capacity(raw.len());
        let mut seen_identifiers: HashSet<String> = HashSet::with_capacity(raw.len());

        for (index, entry) in raw.iter().enumerate() {
            let kind = match entry.resolve_kind(index) {
                Ok(kind) => kind,
                Err(diagnostic) => {
                    diagnostics.push(diagnostic);
                    continue;
                }
            };

            if !seen_values.insert(kind.dedup_key()) {
                diagnostics.push(DetentDiagnostic::DuplicateValue {
                    index,
                    key: kind.to_string(),
                });
                continue;
            }

            let identifier = entry
                .provided_identifier()
                .map_or_else(|| kind.default_identifier(), str::to_owned);
            if seen_identifiers.contains(&identifier) {
                diagnostics.push(DetentDiagnostic::DuplicateIdentifier { index, identifier });
                continue;
            }
            seen_identifiers.insert(identifier.clone());

            definitions.push(DetentDefinition::new(kind, identifier));
        }

        let catalog = if definitions.is_empty() {
            diagnostics.push(DetentDiagnostic::EmptyFallback);
            Self::fallback()
        } else {
            definitions.sort_by(|a, b| {
                a.sort_key
                    .total_cmp(&b.sort_key)
                    .then_with(|| a.identifier.cmp(&b.identifier))
            });
            Self {
                definitions: Arc::from(definitions),
                fallback: false,
            }
        };

        #[cfg(feature = "tracing")]
        for diagnostic in &diagnostics {
            tracing::warn!(target: "sheet_core::detent", %diagnostic, "detent entry dropped");
        }

        CatalogBuild {
            catalog,
            diagnostics,
        }
    }

    /// Build from typed kinds, using default identifiers.
    #[must_use]
    pub fn from_kinds(kinds: impl IntoIterator<Item = DetentKind>) -> CatalogBuild {
        let raw: Vec<RawDetent> = kinds.into_iter().map(RawDetent::from).collect();
        Self::build(&raw)
    }

    /// Number of definitions (always at least one).
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Always `false`; present for API symmetry with collections.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Whether this is the `{Medium, Large}` fallback.
    #[inline]
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Definition at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DetentDefinition> {
        self.definitions.get(index)
    }

    /// Whether `index` addresses a definition.
    #[inline]
    #[must_use]
    pub fn contains_index(&self, index: usize) -> bool {
        index < self.definitions.len()
    }

    /// Index of the definition with `identifier`.
    #[must_use]
    pub fn index_of(&self, identifier: &str) -> Option<usize> {
        self.definitions
            .iter()
            .position(|d| d.identifier == identifier)
    }

    /// Iterate definitions in index order.
    pub fn iter(&self) -> impl Iterator<Item = &DetentDefinition> {
        self.definitions.iter()
    }

    /// Identifiers in index order.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.identifier()).collect()
    }

    /// Index of the last (tallest) definition.
    #[inline]
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.definitions.len().saturating_sub(1)
    }

    /// Resolve a requested index, falling back to 0 when out of range.
    pub fn resolve_index(&self, index: usize) -> (usize, Option<DetentDiagnostic>) {
        if self.contains_index(index) {
            (index, None)
        } else {
            (
                0,
                Some(DetentDiagnostic::IndexOutOfRange {
                    index,
                    len: self.len(),
                }),
            )
        }
    }

    /// Normalized raw form; rebuilding from it yields an equal catalog.
    #[must_use]
    pub fn to_raw(&self) -> Vec<RawDetent> {
        self.definitions.iter().map(DetentDefinition::to_raw).collect()
    }
}

impl<'a> IntoIterator for &'a DetentCatalog {
    type Item = &'a DetentDefinition;
    type IntoIter = std::slice::Iter<'a, DetentDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}

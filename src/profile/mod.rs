//! Simulated browser identities and member applicability.
//!
//! A [`CapabilityProfile`] names one simulated browser: a family, an ordered
//! version and a feature-flag set. Host-class descriptor tables declare, per
//! member, the profiles the member is visible to; [`Applicability`] holds
//! those declarations and answers the pure `is_applicable` question the
//! registry filters with.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// BrowserFamily
// ---------------------------------------------------------------------------

/// The browser families the runtime can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserFamily {
    Chrome,
    Edge,
    Firefox,
    InternetExplorer,
}

impl fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserFamily::Chrome => write!(f, "chrome"),
            BrowserFamily::Edge => write!(f, "edge"),
            BrowserFamily::Firefox => write!(f, "firefox"),
            BrowserFamily::InternetExplorer => write!(f, "ie"),
        }
    }
}

bitflags! {
    /// Feature switches that vary between simulated browsers.
    ///
    /// Features never participate in member applicability filtering (that is
    /// family + version only); they gate behavioral forks inside native host
    /// objects and are part of a profile's cache identity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BrowserFeatures: u32 {
        const CANVAS               = 1 << 0;
        const WEBSOCKET            = 1 << 1;
        const TOUCH_EVENTS         = 1 << 2;
        const MUTATION_OBSERVER    = 1 << 3;
        const SHADOW_DOM           = 1 << 4;
        const CONDITIONAL_COMMENTS = 1 << 5;
        const LEGACY_EVENT_MODEL   = 1 << 6;
    }
}

// ---------------------------------------------------------------------------
// CapabilityProfile
// ---------------------------------------------------------------------------

/// Identity of one simulated browser. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityProfile {
    family: BrowserFamily,
    version: u16,
    features: BrowserFeatures,
    label: String,
}

impl CapabilityProfile {
    /// Create a profile with a generated `family-version` label.
    pub fn new(family: BrowserFamily, version: u16, features: BrowserFeatures) -> Self {
        Self {
            label: format!("{}-{}", family, version),
            family,
            version,
            features,
        }
    }

    /// Replace the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Current Chrome identity.
    pub fn chrome() -> Self {
        Self::new(
            BrowserFamily::Chrome,
            120,
            BrowserFeatures::CANVAS
                | BrowserFeatures::WEBSOCKET
                | BrowserFeatures::MUTATION_OBSERVER
                | BrowserFeatures::SHADOW_DOM,
        )
    }

    /// Current Edge identity.
    pub fn edge() -> Self {
        Self::new(
            BrowserFamily::Edge,
            120,
            BrowserFeatures::CANVAS
                | BrowserFeatures::WEBSOCKET
                | BrowserFeatures::MUTATION_OBSERVER
                | BrowserFeatures::SHADOW_DOM,
        )
    }

    /// Current Firefox identity.
    pub fn firefox() -> Self {
        Self::new(
            BrowserFamily::Firefox,
            121,
            BrowserFeatures::CANVAS
                | BrowserFeatures::WEBSOCKET
                | BrowserFeatures::MUTATION_OBSERVER
                | BrowserFeatures::SHADOW_DOM
                | BrowserFeatures::TOUCH_EVENTS,
        )
    }

    /// Firefox ESR identity (trailing version line).
    pub fn firefox_esr() -> Self {
        Self::new(
            BrowserFamily::Firefox,
            115,
            BrowserFeatures::CANVAS
                | BrowserFeatures::WEBSOCKET
                | BrowserFeatures::MUTATION_OBSERVER,
        )
        .with_label("firefox-esr-115")
    }

    /// Internet Explorer 11 identity.
    pub fn internet_explorer() -> Self {
        Self::new(
            BrowserFamily::InternetExplorer,
            11,
            BrowserFeatures::CANVAS
                | BrowserFeatures::CONDITIONAL_COMMENTS
                | BrowserFeatures::LEGACY_EVENT_MODEL,
        )
    }

    /// The simulated browser family.
    pub fn family(&self) -> BrowserFamily {
        self.family
    }

    /// The simulated major version.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// The full feature-flag set.
    pub fn features(&self) -> BrowserFeatures {
        self.features
    }

    /// Check a single feature switch.
    pub fn has_feature(&self, feature: BrowserFeatures) -> bool {
        self.features.contains(feature)
    }

    /// Human-readable label (`chrome-120`, `firefox-esr-115`, ...).
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for CapabilityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

// ---------------------------------------------------------------------------
// Applicability – per-descriptor profile ranges
// ---------------------------------------------------------------------------

/// One declared `(family, min_version, max_version)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicableRange {
    pub family: BrowserFamily,
    pub min_version: u16,
    pub max_version: u16,
}

impl ApplicableRange {
    /// A range covering every version of `family` (the "generic family"
    /// entry).
    pub fn any_version(family: BrowserFamily) -> Self {
        Self {
            family,
            min_version: 0,
            max_version: u16::MAX,
        }
    }

    /// A bounded range, inclusive on both ends.
    pub fn between(family: BrowserFamily, min_version: u16, max_version: u16) -> Self {
        Self {
            family,
            min_version,
            max_version,
        }
    }
}

/// The ordered applicability declaration of one descriptor.
///
/// Resolution scans ranges in declaration order and the FIRST range whose
/// family matches the profile decides the outcome: the member is applicable
/// iff the profile's version falls inside that range. Later ranges for the
/// same family are never consulted, so a version-specific entry only narrows
/// a generic one when it is declared first. An empty list is never
/// applicable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Applicability {
    ranges: Vec<ApplicableRange>,
}

impl Applicability {
    /// Applicable to every profile of every family.
    pub fn all() -> Self {
        Self {
            ranges: vec![
                ApplicableRange::any_version(BrowserFamily::Chrome),
                ApplicableRange::any_version(BrowserFamily::Edge),
                ApplicableRange::any_version(BrowserFamily::Firefox),
                ApplicableRange::any_version(BrowserFamily::InternetExplorer),
            ],
        }
    }

    /// Applicable to every version of one family.
    pub fn family(family: BrowserFamily) -> Self {
        Self {
            ranges: vec![ApplicableRange::any_version(family)],
        }
    }

    /// Applicable to an inclusive version range of one family.
    pub fn range(family: BrowserFamily, min_version: u16, max_version: u16) -> Self {
        Self {
            ranges: vec![ApplicableRange::between(family, min_version, max_version)],
        }
    }

    /// Never applicable, for any profile.
    pub fn never() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Append a generic entry for another family.
    pub fn or_family(mut self, family: BrowserFamily) -> Self {
        self.ranges.push(ApplicableRange::any_version(family));
        self
    }

    /// Append a bounded entry for another family (or a later-declared range
    /// of the same family, which the first-match rule will shadow).
    pub fn or_range(mut self, family: BrowserFamily, min_version: u16, max_version: u16) -> Self {
        self.ranges
            .push(ApplicableRange::between(family, min_version, max_version));
        self
    }

    /// Whether a member carrying this declaration is visible to `profile`.
    /// Pure and total.
    pub fn is_applicable(&self, profile: &CapabilityProfile) -> bool {
        for range in &self.ranges {
            if range.family == profile.family() {
                let version = profile.version();
                return range.min_version <= version && version <= range.max_version;
            }
        }
        false
    }

    /// True when no range is declared.
    pub fn is_never(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The declared ranges, in declaration order.
    pub fn ranges(&self) -> &[ApplicableRange] {
        &self.ranges
    }
}

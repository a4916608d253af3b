//! Diagnostic report types
//!
//! Key design principles:
//! 1. Serialised shape is the wire contract (camelCase, `type` for the issue kind)
//! 2. Pixel values are whole numbers; the browser's sub-pixel noise is rounded away
//! 3. SmallVec for issues: a single element rarely has more than a handful

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Issues found on one element, most severe first
pub type IssueList = SmallVec<[LayoutIssue; 4]>;

/// Ordering is by urgency: `High < Medium < Low`, so an ascending sort
/// puts the worst problems first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    HiddenDisplay,
    HiddenVisibility,
    HiddenOpacity,
    LowOpacity,
    OffscreenRight,
    OffscreenBottom,
    OffscreenLeft,
    OffscreenTop,
    ModalNoZindex,
    OverflowHidden,
    /// Placeholder entry for a clean report
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
    /// How far the element overshoots, for offscreen issues
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixels: Option<i64>,
}

impl LayoutIssue {
    pub fn new(
        kind: IssueKind,
        severity: Severity,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            suggestion: suggestion.into(),
            pixels: None,
        }
    }

    pub fn with_pixels(mut self, pixels: i64) -> Self {
        self.pixels = Some(pixels);
        self
    }

    /// The entry reported when nothing is wrong
    pub fn no_issues() -> Self {
        Self::new(
            IssueKind::None,
            Severity::Low,
            "No layout issues detected",
            "Element appears to be positioned correctly",
        )
    }
}

/// Element content box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementPosition {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportInfo {
    pub width: i64,
    pub height: i64,
}

/// The handful of computed properties the checks look at.
/// Missing properties are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedStyles {
    pub display: String,
    pub position: String,
    pub width: String,
    pub height: String,
    pub overflow: String,
    pub z_index: String,
    pub visibility: String,
    pub opacity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub total_issues: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
}

impl IssueSummary {
    pub fn count<'a>(issues: impl IntoIterator<Item = &'a LayoutIssue>) -> Self {
        issues
            .into_iter()
            .fold(Self::default(), |mut summary, issue| {
                summary.total_issues += 1;
                match issue.severity {
                    Severity::High => summary.high_severity += 1,
                    Severity::Medium => summary.medium_severity += 1,
                    Severity::Low => summary.low_severity += 1,
                }
                summary
            })
    }
}

/// Full layout report for one selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticResult {
    pub element: String,
    pub timestamp: String,
    pub found: bool,
    pub position: ElementPosition,
    pub viewport: ViewportInfo,
    pub computed_styles: ComputedStyles,
    pub issues: IssueList,
    pub confidence: f64,
    pub summary: IssueSummary,
}

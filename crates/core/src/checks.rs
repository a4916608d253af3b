//! Layout heuristics
//!
//! Each check looks at one aspect of an element and appends what it finds.
//! Checks are independent; ordering by severity happens afterwards.

use crate::cdp::{BoxModel, LayoutViewport, StyleMap};
use crate::types::{ComputedStyles, ElementPosition, IssueKind, IssueList, LayoutIssue, Severity, ViewportInfo};

/// Slack before an edge overshoot counts, absorbs sub-pixel rounding
const OFFSCREEN_THRESHOLD: i64 = 2;

const FAINT_OPACITY: f64 = 0.1;

/// JavaScript-style rounding: halves go towards positive infinity
fn round_px(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn style<'a>(styles: &'a StyleMap, name: &str) -> Option<&'a str> {
    styles.get(name).map(String::as_str)
}

/// Bounding box of the content quad
pub fn extract_bounds(model: &BoxModel) -> ElementPosition {
    let q = &model.content;
    ElementPosition {
        left: round_px(q[0].min(q[6])),
        top: round_px(q[1].min(q[3])),
        right: round_px(q[2].max(q[4])),
        bottom: round_px(q[5].max(q[7])),
        width: round_px(model.width),
        height: round_px(model.height),
    }
}

pub fn viewport_info(viewport: &LayoutViewport) -> ViewportInfo {
    ViewportInfo {
        width: round_px(viewport.client_width),
        height: round_px(viewport.client_height),
    }
}

pub fn summarize_styles(styles: &StyleMap) -> ComputedStyles {
    let get = |name: &str| style(styles, name).unwrap_or_default().to_string();
    ComputedStyles {
        display: get("display"),
        position: get("position"),
        width: get("width"),
        height: get("height"),
        overflow: get("overflow"),
        z_index: get("z-index"),
        visibility: get("visibility"),
        opacity: get("opacity"),
    }
}

/// display / visibility / opacity
pub fn check_visibility(styles: &StyleMap, issues: &mut IssueList) {
    if style(styles, "display") == Some("none") {
        issues.push(LayoutIssue::new(
            IssueKind::HiddenDisplay,
            Severity::High,
            "Element has display: none",
            "Change to display: block/flex/grid to make visible",
        ));
    }

    if style(styles, "visibility") == Some("hidden") {
        issues.push(LayoutIssue::new(
            IssueKind::HiddenVisibility,
            Severity::High,
            "Element has visibility: hidden",
            "Change to visibility: visible",
        ));
    }

    let Some(opacity) = style(styles, "opacity") else {
        return;
    };
    // Unparseable opacity is not our problem to report
    let Ok(value) = opacity.trim().parse::<f64>() else {
        return;
    };
    if value == 0.0 {
        issues.push(LayoutIssue::new(
            IssueKind::HiddenOpacity,
            Severity::High,
            "Element has opacity: 0",
            "Change to opacity: 1",
        ));
    } else if value < FAINT_OPACITY {
        issues.push(LayoutIssue::new(
            IssueKind::LowOpacity,
            Severity::Medium,
            format!("Element has very low opacity: {}", opacity),
            "Increase opacity for better visibility",
        ));
    }
}

/// Edges past the viewport, by more than the threshold
pub fn check_offscreen(bounds: &ElementPosition, viewport: &ViewportInfo, issues: &mut IssueList) {
    if bounds.right > viewport.width + OFFSCREEN_THRESHOLD {
        let overflow = bounds.right - viewport.width;
        issues.push(
            LayoutIssue::new(
                IssueKind::OffscreenRight,
                Severity::High,
                format!("Element extends {}px beyond right edge", overflow),
                "Add max-width: 100% or use overflow: hidden on parent",
            )
            .with_pixels(overflow),
        );
    }

    if bounds.bottom > viewport.height + OFFSCREEN_THRESHOLD {
        let overflow = bounds.bottom - viewport.height;
        issues.push(
            LayoutIssue::new(
                IssueKind::OffscreenBottom,
                Severity::Medium,
                format!("Element extends {}px beyond bottom edge", overflow),
                "Add max-height: 100vh or enable scrolling",
            )
            .with_pixels(overflow),
        );
    }

    if bounds.left < -OFFSCREEN_THRESHOLD {
        let overflow = bounds.left.abs();
        issues.push(
            LayoutIssue::new(
                IssueKind::OffscreenLeft,
                Severity::High,
                format!("Element starts {}px to the left", overflow),
                "Check left/margin-left values",
            )
            .with_pixels(overflow),
        );
    }

    if bounds.top < -OFFSCREEN_THRESHOLD {
        let overflow = bounds.top.abs();
        issues.push(
            LayoutIssue::new(
                IssueKind::OffscreenTop,
                Severity::High,
                format!("Element starts {}px above viewport", overflow),
                "Check top/margin-top values",
            )
            .with_pixels(overflow),
        );
    }
}

/// Fixed/absolute elements (usually modals) without a stacking order
pub fn check_positioning(styles: &StyleMap, issues: &mut IssueList) {
    let Some(position @ ("fixed" | "absolute")) = style(styles, "position") else {
        return;
    };

    match style(styles, "z-index") {
        None | Some("") | Some("auto") => issues.push(LayoutIssue::new(
            IssueKind::ModalNoZindex,
            Severity::Medium,
            format!("Positioned element ({}) has no z-index", position),
            "Add z-index: 1000 or higher for modals",
        )),
        Some(_) => {}
    }
}

pub fn check_overflow(styles: &StyleMap, issues: &mut IssueList) {
    if style(styles, "overflow") == Some("hidden") {
        issues.push(LayoutIssue::new(
            IssueKind::OverflowHidden,
            Severity::Low,
            "Element has overflow: hidden",
            "Content may be clipped; change to overflow: auto if needed",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles(pairs: &[(&str, &str)]) -> StyleMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn kinds(issues: &IssueList) -> Vec<IssueKind> {
        issues.iter().map(|issue| issue.kind).collect()
    }

    #[test]
    fn test_bounds_from_content_quad() {
        let model = BoxModel {
            content: vec![10.4, 20.5, 110.4, 20.5, 110.4, 70.5, 10.4, 70.5],
            width: 100.0,
            height: 50.0,
        };
        let bounds = extract_bounds(&model);
        assert_eq!(bounds.left, 10);
        assert_eq!(bounds.top, 21);
        assert_eq!(bounds.right, 110);
        assert_eq!(bounds.bottom, 71);
        assert_eq!(bounds.width, 100);
    }

    #[test]
    fn test_rounding_matches_browser_scripts() {
        assert_eq!(round_px(2.5), 3);
        assert_eq!(round_px(-2.5), -2);
        assert_eq!(round_px(-2.6), -3);
    }

    #[test]
    fn test_visibility_checks() {
        let mut issues = IssueList::new();
        check_visibility(
            &styles(&[("display", "none"), ("visibility", "hidden"), ("opacity", "0")]),
            &mut issues,
        );
        assert_eq!(
            kinds(&issues),
            vec![IssueKind::HiddenDisplay, IssueKind::HiddenVisibility, IssueKind::HiddenOpacity]
        );

        let mut issues = IssueList::new();
        check_visibility(&styles(&[("opacity", "0.05")]), &mut issues);
        assert_eq!(kinds(&issues), vec![IssueKind::LowOpacity]);
        assert_eq!(issues[0].message, "Element has very low opacity: 0.05");

        let mut issues = IssueList::new();
        check_visibility(&styles(&[("display", "block"), ("opacity", "1")]), &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_offscreen_threshold() {
        let viewport = ViewportInfo { width: 1000, height: 800 };

        // Two pixels over is still on screen
        let mut issues = IssueList::new();
        let nearly = ElementPosition { left: -2, top: 0, right: 1002, bottom: 802, ..Default::default() };
        check_offscreen(&nearly, &viewport, &mut issues);
        assert!(issues.is_empty());

        let mut issues = IssueList::new();
        let over = ElementPosition { left: -30, top: -5, right: 1040, bottom: 900, ..Default::default() };
        check_offscreen(&over, &viewport, &mut issues);
        assert_eq!(
            kinds(&issues),
            vec![
                IssueKind::OffscreenRight,
                IssueKind::OffscreenBottom,
                IssueKind::OffscreenLeft,
                IssueKind::OffscreenTop
            ]
        );
        assert_eq!(issues[0].pixels, Some(40));
        assert_eq!(issues[0].message, "Element extends 40px beyond right edge");
        assert_eq!(issues[1].severity, Severity::Medium);
        assert_eq!(issues[2].pixels, Some(30));
        assert_eq!(issues[3].pixels, Some(5));
    }

    #[test]
    fn test_positioned_without_z_index() {
        for z_index in [None, Some("auto")] {
            let mut pairs = vec![("position", "fixed")];
            if let Some(z) = z_index {
                pairs.push(("z-index", z));
            }
            let mut issues = IssueList::new();
            check_positioning(&styles(&pairs), &mut issues);
            assert_eq!(kinds(&issues), vec![IssueKind::ModalNoZindex]);
            assert_eq!(issues[0].message, "Positioned element (fixed) has no z-index");
        }

        let mut issues = IssueList::new();
        check_positioning(&styles(&[("position", "absolute"), ("z-index", "10")]), &mut issues);
        assert!(issues.is_empty());

        check_positioning(&styles(&[("position", "relative")]), &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_overflow_hidden() {
        let mut issues = IssueList::new();
        check_overflow(&styles(&[("overflow", "hidden")]), &mut issues);
        assert_eq!(kinds(&issues), vec![IssueKind::OverflowHidden]);
        assert_eq!(issues[0].severity, Severity::Low);
    }

    #[test]
    fn test_style_summary_fills_missing_with_empty() {
        let summary = summarize_styles(&styles(&[("display", "flex"), ("z-index", "5")]));
        assert_eq!(summary.display, "flex");
        assert_eq!(summary.z_index, "5");
        assert_eq!(summary.overflow, "");
    }
}

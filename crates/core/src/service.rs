//! Diagnostics Service - Main entry point for layout diagnosis
//!
//! This handles:
//! - Selector validation
//! - Resolving the element through CDP (document -> querySelector)
//! - Collecting box model, viewport and computed style
//! - Running the layout checks and assembling the report

use gravity_bridge::CommandSender;

use crate::cdp;
use crate::checks;
use crate::error::{DiagnosticsError, Result};
use crate::selector::validate_selector;
use crate::types::{DiagnosticResult, IssueList, IssueSummary, LayoutIssue};

const CONFIDENCE_WITH_ISSUES: f64 = 0.95;
const CONFIDENCE_CLEAN: f64 = 0.85;

/// Runs layout diagnosis over any [`CommandSender`]
pub struct DiagnosticsEngine<S> {
    sender: S,
}

impl<S: CommandSender> DiagnosticsEngine<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Diagnose the first element matching `selector`
    ///
    /// Issues a fixed sequence of CDP commands:
    /// ```text
    /// DOM.getDocument -> DOM.querySelector -> DOM.getBoxModel
    ///                 -> Page.getLayoutMetrics -> CSS.getComputedStyleForNode
    /// ```
    pub async fn diagnose(&self, selector: &str) -> Result<DiagnosticResult> {
        validate_selector(selector)?;

        let root = cdp::document_root(&self.sender).await?;
        let node = cdp::query_selector(&self.sender, root, selector)
            .await?
            .ok_or_else(|| DiagnosticsError::ElementNotFound(selector.to_string()))?;
        tracing::debug!(selector, node, "Element resolved");

        let model = cdp::box_model(&self.sender, node).await?;
        let viewport = checks::viewport_info(&cdp::layout_viewport(&self.sender).await?);
        let styles = cdp::computed_style(&self.sender, node).await?;

        let bounds = checks::extract_bounds(&model);

        let mut issues = IssueList::new();
        checks::check_visibility(&styles, &mut issues);
        checks::check_offscreen(&bounds, &viewport, &mut issues);
        checks::check_positioning(&styles, &mut issues);
        checks::check_overflow(&styles, &mut issues);

        // Stable: equal severities keep check order
        issues.sort_by_key(|issue| issue.severity);

        let summary = IssueSummary::count(&issues);
        let confidence = if issues.is_empty() {
            issues.push(LayoutIssue::no_issues());
            CONFIDENCE_CLEAN
        } else {
            CONFIDENCE_WITH_ISSUES
        };

        tracing::info!(
            selector,
            issues = summary.total_issues,
            high = summary.high_severity,
            "Layout diagnosed"
        );

        Ok(DiagnosticResult {
            element: selector.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            found: true,
            position: bounds,
            viewport,
            computed_styles: checks::summarize_styles(&styles),
            issues,
            confidence,
            summary,
        })
    }
}

//! Conversion report types for tracking lossiness and policy decisions.
//!
//! Both COCO directions return a [`ConversionReport`] next to their result,
//! much like validation returns a `ValidationReport`.

use serde::Serialize;
use std::fmt;

/// A report generated while converting to or from COCO.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source representation name.
    pub from: String,
    /// Target representation name.
    pub to: String,
    /// Counts read from the source.
    pub input: ConversionCounts,
    /// Counts in the output (may differ if annotations are skipped).
    pub output: ConversionCounts,
    /// Issues discovered during conversion.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    /// Create a new empty report for a conversion.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (true lossiness).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// Returns true if this conversion lost information.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    /// Returns true if any issue carries the given code.
    pub fn has(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} images, {} categories, {} annotations",
            self.input.images, self.input.categories, self.input.annotations
        )?;

        if self.output != self.input {
            writeln!(
                f,
                "  output: {} images, {} categories, {} annotations",
                self.output.images, self.output.categories, self.output.annotations
            )?;
        }

        for (title, severity) in [
            ("Warnings", ConversionSeverity::Warning),
            ("Notes", ConversionSeverity::Info),
        ] {
            let matching: Vec<_> = self
                .issues
                .iter()
                .filter(|i| i.severity == severity)
                .collect();
            if matching.is_empty() {
                continue;
            }
            writeln!(f)?;
            writeln!(f, "{} ({}):", title, matching.len())?;
            for issue in matching {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// Counts of converted elements.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    pub images: usize,
    pub categories: usize,
    pub annotations: usize,
}

/// A single issue discovered during conversion.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    /// Create a warning-level issue (indicates lossiness).
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Create an info-level issue (policy note).
    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

/// Severity level for conversion issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Information from the source is not represented in the output.
    Warning,
    /// A policy decision that keeps all information.
    Info,
}

/// Stable issue codes for programmatic consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    // Internal -> COCO
    /// Text annotations have no COCO geometry and are left out.
    SkipTextAnnotation,
    /// Non-text annotations with neither points nor a bbox are left out.
    SkipAnnotationWithoutGeometry,
    /// Mask annotations are written as polygons or boxes.
    MaskExportedAsGeometry,
    /// Image dimensions could not be read from the asset; written as 0.
    UnknownImageDimensions,
    /// Annotation ids are renumbered from 1 in enumeration order.
    SequentialAnnotationIds,

    // COCO -> internal
    /// RLE segmentation cannot be expressed as points; kept as a bbox.
    RleSegmentationAsBBox,
    /// Only the first polygon ring of a multi-ring segmentation is kept.
    DropExtraSegmentationRings,
    /// No category with that id exists; the id itself becomes the label.
    CategoryIdAsLabel,
    /// Images not yet in the store were registered without an asset.
    RegisterImagesWithoutAsset,
    /// Document-level info and licenses are not stored.
    DropDocumentMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_not_lossy() {
        let report = ConversionReport::new("coco", "store");
        assert!(!report.is_lossy());
        assert_eq!(report.warning_count(), 0);
        assert_eq!(report.info_count(), 0);
    }

    #[test]
    fn warning_makes_report_lossy() {
        let mut report = ConversionReport::new("store", "coco");
        report.add(ConversionIssue::warning(
            ConversionIssueCode::SkipTextAnnotation,
            "1 text annotation(s) skipped",
        ));
        assert!(report.is_lossy());
        assert!(report.has(ConversionIssueCode::SkipTextAnnotation));
        assert!(report.to_string().contains("Warnings (1):"));
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = ConversionReport::new("coco", "store");
        report.input = ConversionCounts {
            images: 2,
            categories: 1,
            annotations: 5,
        };
        report.add(ConversionIssue::info(
            ConversionIssueCode::RegisterImagesWithoutAsset,
            "2 image(s) registered",
        ));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"from\":\"coco\""));
        assert!(json.contains("\"severity\":\"info\""));
        assert!(json.contains("\"code\":\"register_images_without_asset\""));
    }
}

//! Validation report types for structured error reporting.
//!
//! Every issue names the payload index, the annotation id when one was
//! supplied, and the offending field, so a caller can point the user at the
//! exact record that needs fixing.

use serde::Serialize;
use std::fmt;

/// All issues found while validating one annotation payload.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// The image the payload was submitted for.
    pub image_id: String,

    /// All issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Creates a new empty report.
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            issues: Vec::new(),
        }
    }

    /// Adds an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns the number of issues in the report.
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if any issue carries the given code.
    pub fn has(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Validation passed: no issues found");
        }

        writeln!(
            f,
            "Validation of image {} found {} issue(s):",
            self.image_id,
            self.issue_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single field-level validation issue.
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    /// A stable code for the issue type.
    pub code: IssueCode,

    /// The payload field at fault (`bbox`, `points`, `text`, ...).
    pub field: &'static str,

    /// A human-readable description of the issue.
    pub message: String,

    /// Where in the payload the issue occurred.
    pub context: IssueContext,
}

impl ValidationIssue {
    /// Creates a new validation issue.
    pub fn new(
        code: IssueCode,
        field: &'static str,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            code,
            field,
            message: message.into(),
            context,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} in {} (field '{}'): {}",
            self.code, self.context, self.field, self.message
        )
    }
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // Identity
    /// Two annotations in the payload share an id.
    DuplicateAnnotationId,
    /// The annotation names a different image than the one being written.
    ImageIdMismatch,
    /// The target image id cannot be used as a record file name.
    UnsafeImageId,

    // Geometry
    /// A `bbox` annotation has no bbox.
    MissingBBox,
    /// A bbox does not have exactly four values.
    MalformedBBox,
    /// A bbox has NaN or infinite values.
    BBoxNotFinite,
    /// A `polygon` annotation has fewer than three points.
    TooFewPoints,
    /// A point does not have exactly two coordinates.
    MalformedPoint,
    /// A point has NaN or infinite coordinates.
    PointNotFinite,

    // Text
    /// A `text` annotation has no text.
    MissingText,

    // Attributes
    /// An attribute value is a JSON object, which is not representable.
    UnsupportedAttrValue,
}

/// Location of an issue within the submitted payload.
#[derive(Clone, Debug, Serialize)]
pub struct IssueContext {
    /// Position of the annotation in the payload; `None` for issues that
    /// concern the payload as a whole.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// The annotation id, if the payload carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, &self.annotation_id) {
            (Some(index), Some(id)) => write!(f, "annotation #{} ({})", index, id),
            (Some(index), None) => write!(f, "annotation #{}", index),
            (None, _) => f.write_str("payload"),
        }
    }
}

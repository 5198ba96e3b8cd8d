//! Validation report types for structured error reporting.

use serde::Serialize;
use std::fmt;

/// The result of validating a transfer graph.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationReport {
    /// All issues found during validation.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns the number of errors in the report.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings in the report.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// True if any issue carries `code`.
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
            "Validation completed with {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        writeln!(f)?;

        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(
            f,
            "[{}] {:?} in {}: {}",
            severity, self.code, self.context, self.message
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Suspicious but transferable.
    Warning,
    /// The graph cannot be materialized as is.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum IssueCode {
    // Uniqueness
    DuplicateProjectId,
    DuplicateDatasetId,
    DuplicateImageId,
    DuplicateAnnotationId,
    DuplicateRoiId,

    // References
    MissingDatasetRef,
    MissingImageRef,
    MissingAnnotationRef,
    MissingRoiRef,
    /// An image has no destination id after reconciliation.
    UnmappedImage,

    // Content
    /// A sentinel entry or reference survived extraction.
    ResidualSentinel,
    /// An annotation is neither a map annotation nor a tag.
    UnsupportedAnnotationKind,
    EmptyName,
    EmptyRoi,
    UnreferencedAnnotation,
}

/// Where a validation issue occurred, by graph reference.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", content = "reference")]
pub enum IssueContext {
    Graph,
    Project(String),
    Dataset(String),
    Image(String),
    Annotation(String),
    Roi(String),
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Graph => write!(f, "graph"),
            IssueContext::Project(r)
            | IssueContext::Dataset(r)
            | IssueContext::Image(r)
            | IssueContext::Annotation(r)
            | IssueContext::Roi(r) => write!(f, "{}", r),
        }
    }
}

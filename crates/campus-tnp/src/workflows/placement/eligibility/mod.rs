mod rules;

pub use rules::average_marks;

use super::domain::{Drive, MarksRecord, Student};

/// Reasons a student may not apply to a drive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Ineligibility {
    #[error("Branch not eligible")]
    BranchNotEligible,
    #[error("No marks available")]
    NoMarksAvailable,
    #[error("Marks criteria not satisfied (required {required:.2}, average {average:.2})")]
    MarksCriteriaNotSatisfied { required: f64, average: f64 },
}

/// Stateless gate applying a drive's branch and marks criteria to a student.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEngine;

impl EligibilityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Returns the average marks to snapshot into the application.
    pub fn assess(
        &self,
        drive: &Drive,
        student: &Student,
        marks: &[MarksRecord],
    ) -> Result<f64, Ineligibility> {
        rules::check_branch(drive, student)?;
        let average = average_marks(marks).ok_or(Ineligibility::NoMarksAvailable)?;
        rules::check_threshold(drive.min_marks, average)?;
        Ok(average)
    }
}

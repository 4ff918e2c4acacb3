use super::super::domain::{Drive, MarksRecord, Student};
use super::Ineligibility;

pub(super) fn check_branch(drive: &Drive, student: &Student) -> Result<(), Ineligibility> {
    if drive.admits_branch(&student.branch_id) {
        Ok(())
    } else {
        Err(Ineligibility::BranchNotEligible)
    }
}

/// Unweighted mean across every marks record; `None` when there are none.
pub fn average_marks(marks: &[MarksRecord]) -> Option<f64> {
    if marks.is_empty() {
        return None;
    }

    let total: f64 = marks.iter().map(|record| record.marks_obtained).sum();
    Some(total / marks.len() as f64)
}

pub(super) fn check_threshold(min_marks: Option<f64>, average: f64) -> Result<(), Ineligibility> {
    match min_marks {
        Some(required) if average < required => {
            Err(Ineligibility::MarksCriteriaNotSatisfied { required, average })
        }
        _ => Ok(()),
    }
}

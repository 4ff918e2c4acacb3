use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::auth::TokenRegistry;
use super::domain::{Actor, MarksRecord, Role, Student};
use super::memory::{InMemoryMarksLedger, InMemoryStudentDirectory};
use super::repository::RepositoryError;

/// Bootstrap data for the in-memory adapters: students, their marks, and login tokens.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub marks: Vec<MarksRecord>,
    #[serde(default)]
    pub credentials: Vec<SeedCredential>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCredential {
    pub token: String,
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("credential for '{user_id}' has unknown role '{role}'")]
    UnknownRole { user_id: String, role: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SeedFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply(
        &self,
        students: &InMemoryStudentDirectory,
        marks: &InMemoryMarksLedger,
        tokens: &TokenRegistry,
    ) -> Result<(), SeedError> {
        for credential in &self.credentials {
            let role = Role::parse(&credential.role).ok_or_else(|| SeedError::UnknownRole {
                user_id: credential.user_id.clone(),
                role: credential.role.clone(),
            })?;
            tokens.register(credential.token.clone(), Actor::new(credential.user_id.clone(), role));
        }
        for student in &self.students {
            students.upsert(student.clone())?;
        }
        for record in &self.marks {
            marks.record(record.clone())?;
        }

        info!(
            students = self.students.len(),
            marks = self.marks.len(),
            credentials = self.credentials.len(),
            "seed data loaded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::auth::CredentialVerifier;
    use crate::workflows::placement::domain::{PlacementStatus, StudentId};
    use crate::workflows::placement::repository::{MarksLedger, StudentDirectory};

    const SEED: &str = r#"{
        "students": [
            {"id": "stu-1", "name": "Asha Verma", "enrollment_no": "0801CS211001",
             "email": "asha@college.edu", "branch_id": "cse"}
        ],
        "marks": [
            {"student_id": "stu-1", "subject_id": "dsa", "exam_id": "mid", "marks_obtained": 72.5}
        ],
        "credentials": [
            {"token": "tok-stu-1", "user_id": "stu-1", "role": "Student"}
        ]
    }"#;

    #[test]
    fn seed_populates_adapters() {
        let seed = SeedFile::from_json(SEED).expect("seed parses");
        let students = InMemoryStudentDirectory::default();
        let marks = InMemoryMarksLedger::default();
        let tokens = TokenRegistry::default();
        seed.apply(&students, &marks, &tokens).expect("seed applies");

        let id = StudentId("stu-1".to_string());
        let student = students.fetch(&id).expect("fetch").expect("student present");
        assert_eq!(student.placement_status, PlacementStatus::Unplaced);
        assert_eq!(marks.marks_for(&id).expect("marks").len(), 1);
        assert_eq!(tokens.verify("tok-stu-1").expect("token").role, Role::Student);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        let seed = SeedFile::from_json(
            r#"{"credentials": [{"token": "t", "user_id": "u", "role": "janitor"}]}"#,
        )
        .expect("seed parses");
        let result = seed.apply(
            &InMemoryStudentDirectory::default(),
            &InMemoryMarksLedger::default(),
            &TokenRegistry::default(),
        );
        assert!(matches!(result, Err(SeedError::UnknownRole { .. })));
    }
}

use super::domain::{
    Drive, DriveId, MarksRecord, Notice, NoticeId, PlacementStatus, Student, StudentId,
};

/// Drive storage. `replace` is a conditional write keyed on `Drive::revision`.
pub trait DriveRepository: Send + Sync {
    fn insert(&self, drive: Drive) -> Result<Drive, RepositoryError>;
    /// Stores `drive` only if the stored revision still matches, returning the bumped copy.
    fn replace(&self, drive: Drive) -> Result<Drive, RepositoryError>;
    fn fetch(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError>;
    /// Newest first.
    fn list(&self) -> Result<Vec<Drive>, RepositoryError>;
    fn remove(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError>;
}

pub trait NoticeRepository: Send + Sync {
    fn insert(&self, notice: Notice) -> Result<Notice, RepositoryError>;
    fn replace(&self, notice: Notice) -> Result<Notice, RepositoryError>;
    fn fetch(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError>;
    /// Newest first.
    fn list(&self) -> Result<Vec<Notice>, RepositoryError>;
    fn remove(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError>;
}

/// Read access to student records plus the single field the workflow writes.
pub trait StudentDirectory: Send + Sync {
    fn fetch(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn set_placement(&self, id: &StudentId, status: PlacementStatus)
        -> Result<(), RepositoryError>;
}

pub trait MarksLedger: Send + Sync {
    fn marks_for(&self, student_id: &StudentId) -> Result<Vec<MarksRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Uploaded file as received from a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// File storage for brochures and resumes. Returns the reference key the records keep.
pub trait AttachmentStore: Send + Sync {
    fn store(&self, upload: AttachmentUpload) -> Result<String, AttachmentError>;
    /// Discards a previously stored upload. Unknown keys are not an error.
    fn remove(&self, key: &str) -> Result<(), AttachmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment is empty")]
    Empty,
    #[error("attachment storage unavailable: {0}")]
    Storage(String),
}

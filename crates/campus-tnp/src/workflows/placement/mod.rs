//! Training-and-placement workflow: drives, applications, and the notice board.

pub mod auth;
pub mod domain;
pub mod eligibility;
pub mod export;
pub mod memory;
pub mod notices;
pub mod repository;
pub mod response;
pub mod router;
pub mod seed;
pub mod service;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use auth::{require_bearer, AuthError, CredentialVerifier, TokenRegistry};
pub use domain::{
    Actor, Application, ApplicationId, ApplicationStatus, Authorship, BranchId, Drive,
    DriveDraft, DriveId, DrivePatch, MarksRecord, Notice, NoticeDraft, NoticeId, NoticePatch,
    PlacementStatus, Posting, Role, SeenBy, Student, StudentId, UserId,
};
pub use eligibility::{average_marks, EligibilityEngine, Ineligibility};
pub use export::{CsvReportRenderer, ExportRow, RenderError, ReportRenderer};
pub use memory::{
    InMemoryAttachmentStore, InMemoryDriveRepository, InMemoryMarksLedger, InMemoryNoticeRepository,
    InMemoryStudentDirectory,
};
pub use notices::{NoticeBoard, NoticeView, SeenSummary};
pub use repository::{
    AttachmentError, AttachmentStore, AttachmentUpload, DriveRepository, MarksLedger,
    NoticeRepository, RepositoryError, StudentDirectory,
};
pub use response::ApiResponse;
pub use router::{tnp_router, TnpState};
pub use seed::{SeedCredential, SeedError, SeedFile};
pub use service::{Clock, PlacementError, PlacementService, SystemClock};
pub use transitions::TransitionMode;

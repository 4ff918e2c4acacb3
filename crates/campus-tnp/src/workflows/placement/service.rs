use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, Authorship, Drive, DriveDraft, DriveId,
    DrivePatch, PlacementStatus, Role, StudentId,
};
use super::eligibility::{EligibilityEngine, Ineligibility};
use super::export::{ExportRow, RenderError};
use super::repository::{
    AttachmentError, AttachmentStore, AttachmentUpload, DriveRepository, MarksLedger,
    RepositoryError, StudentDirectory,
};
use super::transitions::TransitionMode;

const MAX_WRITE_ATTEMPTS: usize = 3;

/// Time source so expiry can be evaluated deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

static DRIVE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_drive_id() -> DriveId {
    let id = DRIVE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DriveId(format!("drive-{id:06}"))
}

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("app-{id:06}"))
}

/// Error taxonomy for drive, application and notice operations.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("permission denied: {action} requires {required}")]
    PermissionDenied {
        action: &'static str,
        required: &'static str,
    },
    #[error("Drive not found")]
    DriveNotFound,
    #[error("Application not found")]
    ApplicationNotFound,
    #[error("Notice not found")]
    NoticeNotFound,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Drive expired")]
    DriveExpired,
    #[error("Already applied")]
    AlreadyApplied,
    #[error("You are already placed")]
    AlreadyPlaced,
    #[error(transparent)]
    Ineligible(#[from] Ineligibility),
    #[error("unknown application status '{0}'")]
    InvalidStatus(String),
    #[error("cannot move application from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("malformed upload: {0}")]
    MalformedUpload(String),
    #[error("too many concurrent updates to the same record")]
    WriteContention,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Runs `attempt` again when a conditional write lost a race.
pub(crate) fn retry_on_conflict<T>(
    mut attempt: impl FnMut() -> Result<T, PlacementError>,
) -> Result<T, PlacementError> {
    for _ in 0..MAX_WRITE_ATTEMPTS {
        match attempt() {
            Err(PlacementError::Repository(RepositoryError::Conflict)) => continue,
            other => return other,
        }
    }
    Err(PlacementError::WriteContention)
}

pub(crate) fn require_staff(actor: &Actor, action: &'static str) -> Result<(), PlacementError> {
    if actor.role.is_staff() {
        Ok(())
    } else {
        Err(PlacementError::PermissionDenied {
            action,
            required: "admin or faculty",
        })
    }
}

fn require_student(actor: &Actor, action: &'static str) -> Result<(), PlacementError> {
    if actor.role == Role::Student {
        Ok(())
    } else {
        Err(PlacementError::PermissionDenied {
            action,
            required: "student",
        })
    }
}

pub(crate) fn required_text(value: &str, field: &'static str) -> Result<String, PlacementError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PlacementError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn validate_min_marks(min_marks: Option<f64>) -> Result<Option<f64>, PlacementError> {
    match min_marks {
        Some(value) if !value.is_finite() || value < 0.0 => Err(PlacementError::InvalidField {
            field: "min_marks",
            reason: format!("expected a non-negative number, found {value}"),
        }),
        other => Ok(other),
    }
}

fn discard_upload(store: &dyn AttachmentStore, key: Option<&str>) {
    if let Some(key) = key {
        if let Err(err) = store.remove(key) {
            warn!(%key, error = %err, "could not discard upload after a failed write");
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Drive lifecycle: creation, maintenance, applications, status changes and export.
pub struct PlacementService {
    drives: Arc<dyn DriveRepository>,
    students: Arc<dyn StudentDirectory>,
    marks: Arc<dyn MarksLedger>,
    clock: Arc<dyn Clock>,
    engine: EligibilityEngine,
    transitions: TransitionMode,
}

impl PlacementService {
    pub fn new(
        drives: Arc<dyn DriveRepository>,
        students: Arc<dyn StudentDirectory>,
        marks: Arc<dyn MarksLedger>,
    ) -> Self {
        Self {
            drives,
            students,
            marks,
            clock: Arc::new(SystemClock),
            engine: EligibilityEngine::new(),
            transitions: TransitionMode::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_transitions(mut self, transitions: TransitionMode) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn transitions(&self) -> TransitionMode {
        self.transitions
    }

    /// Create a drive. Eligible branch ids are stored as given.
    pub fn create_drive(
        &self,
        actor: &Actor,
        draft: DriveDraft,
        attachment: Option<String>,
    ) -> Result<Drive, PlacementError> {
        let mut drive = self.draft_drive(actor, draft)?;
        drive.attachment = attachment;
        self.insert_drive(drive)
    }

    /// Like [`create_drive`](Self::create_drive), but the brochure is only written to
    /// `store` once the draft has been validated, and removed again if the insert fails.
    pub fn create_drive_with_upload(
        &self,
        actor: &Actor,
        draft: DriveDraft,
        upload: Option<AttachmentUpload>,
        store: &dyn AttachmentStore,
    ) -> Result<Drive, PlacementError> {
        let mut drive = self.draft_drive(actor, draft)?;
        drive.attachment = match upload {
            Some(upload) => Some(store.store(upload)?),
            None => None,
        };

        let stored = drive.attachment.clone();
        self.insert_drive(drive)
            .inspect_err(|_| discard_upload(store, stored.as_deref()))
    }

    fn draft_drive(&self, actor: &Actor, draft: DriveDraft) -> Result<Drive, PlacementError> {
        require_staff(actor, "creating a drive")?;

        let now = self.clock.now();
        let mut drive = Drive {
            id: next_drive_id(),
            title: required_text(&draft.title, "title")?,
            description: required_text(&draft.description, "description")?,
            deadline: draft.deadline,
            authorship: Authorship::of(actor, now),
            company_name: required_text(&draft.company_name, "company_name")?,
            job_role: required_text(&draft.job_role, "job_role")?,
            brochure: non_blank(draft.brochure),
            attachment: None,
            eligible_branches: draft.eligible_branches,
            min_marks: validate_min_marks(draft.min_marks)?,
            google_form_link: non_blank(draft.google_form_link),
            is_expired: false,
            applications: Vec::new(),
            revision: 0,
        };
        drive.refresh_expiry(now);
        Ok(drive)
    }

    fn insert_drive(&self, drive: Drive) -> Result<Drive, PlacementError> {
        let stored = self.drives.insert(drive)?;
        info!(drive = %stored.id.0, company = %stored.company_name, "placement drive created");
        Ok(stored)
    }

    pub fn list_drives(&self) -> Result<Vec<Drive>, PlacementError> {
        Ok(self.drives.list()?)
    }

    pub fn get_drive(&self, drive_id: &DriveId) -> Result<Drive, PlacementError> {
        self.drives
            .fetch(drive_id)?
            .ok_or(PlacementError::DriveNotFound)
    }

    pub fn update_drive(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        patch: DrivePatch,
    ) -> Result<Drive, PlacementError> {
        require_staff(actor, "updating a drive")?;
        let min_marks = patch.min_marks.map(validate_min_marks).transpose()?;

        retry_on_conflict(|| {
            let mut drive = self.get_drive(drive_id)?;
            let patch = patch.clone();

            if let Some(title) = patch.title {
                drive.title = required_text(&title, "title")?;
            }
            if let Some(description) = patch.description {
                drive.description = required_text(&description, "description")?;
            }
            if let Some(company_name) = patch.company_name {
                drive.company_name = required_text(&company_name, "company_name")?;
            }
            if let Some(job_role) = patch.job_role {
                drive.job_role = required_text(&job_role, "job_role")?;
            }
            if let Some(deadline) = patch.deadline {
                drive.deadline = deadline;
            }
            if let Some(brochure) = patch.brochure {
                drive.brochure = non_blank(brochure);
            }
            if let Some(branches) = patch.eligible_branches {
                drive.eligible_branches = branches;
            }
            if let Some(min_marks) = min_marks {
                drive.min_marks = min_marks;
            }
            if let Some(link) = patch.google_form_link {
                drive.google_form_link = non_blank(link);
            }
            drive.refresh_expiry(self.clock.now());

            Ok(self.drives.replace(drive)?)
        })
    }

    pub fn delete_drive(&self, actor: &Actor, drive_id: &DriveId) -> Result<Drive, PlacementError> {
        require_staff(actor, "deleting a drive")?;
        let removed = self
            .drives
            .remove(drive_id)?
            .ok_or(PlacementError::DriveNotFound)?;
        info!(drive = %removed.id.0, applications = removed.applications.len(), "placement drive deleted");
        Ok(removed)
    }

    /// Submit the calling student's application, snapshotting their average marks.
    pub fn apply(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        resume: Option<String>,
    ) -> Result<Application, PlacementError> {
        self.submit_application(actor, drive_id, || Ok(resume.clone()))
    }

    /// Apply with a resume upload that is only written to `store` after every
    /// eligibility check has passed. A failed final write removes it again.
    pub fn apply_with_upload(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        upload: Option<AttachmentUpload>,
        store: &dyn AttachmentStore,
    ) -> Result<Application, PlacementError> {
        let mut stored: Option<String> = None;
        let outcome = self.submit_application(actor, drive_id, || {
            if stored.is_none() {
                if let Some(upload) = &upload {
                    stored = Some(store.store(upload.clone())?);
                }
            }
            Ok(stored.clone())
        });

        if outcome.is_err() {
            discard_upload(store, stored.as_deref());
        }
        outcome
    }

    /// `resume` runs once the checks pass, on each write attempt.
    fn submit_application(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        mut resume: impl FnMut() -> Result<Option<String>, PlacementError>,
    ) -> Result<Application, PlacementError> {
        require_student(actor, "applying to a drive")?;
        let student_id = actor.student_id();

        retry_on_conflict(|| {
            let mut drive = self.get_drive(drive_id)?;

            let now = self.clock.now();
            if drive.deadline_passed(now) {
                drive.is_expired = true;
                self.drives.replace(drive)?;
                return Err(PlacementError::DriveExpired);
            }

            let student = self
                .students
                .fetch(&student_id)?
                .ok_or(PlacementError::StudentNotFound)?;

            if student.placement_status == PlacementStatus::Placed {
                return Err(PlacementError::AlreadyPlaced);
            }

            if drive.application_for(&student.id).is_some() {
                return Err(PlacementError::AlreadyApplied);
            }

            let marks = self.marks.marks_for(&student.id)?;
            let average = self.engine.assess(&drive, &student, &marks)?;

            let application = Application {
                id: next_application_id(),
                student_id: student.id.clone(),
                branch_id: student.branch_id.clone(),
                marks: average,
                resume: resume()?,
                status: ApplicationStatus::Applied,
                applied_at: now,
            };
            drive.applications.push(application.clone());
            drive.refresh_expiry(now);
            self.drives.replace(drive)?;

            info!(
                drive = %drive_id.0,
                student = %student.id.0,
                marks = average,
                "application recorded"
            );
            Ok(application)
        })
    }

    /// Bulk-shortlist a drive's applications. Returns how many were changed.
    pub fn shortlist(&self, actor: &Actor, drive_id: &DriveId) -> Result<usize, PlacementError> {
        require_staff(actor, "shortlisting applications")?;
        let mode = self.transitions;

        retry_on_conflict(|| {
            let mut drive = self.get_drive(drive_id)?;
            let mut changed = 0;
            for application in drive
                .applications
                .iter_mut()
                .filter(|application| mode.shortlists(application.status))
            {
                application.status = ApplicationStatus::Shortlisted;
                changed += 1;
            }
            self.drives.replace(drive)?;
            info!(drive = %drive_id.0, changed, ?mode, "applications shortlisted");
            Ok(changed)
        })
    }

    /// Set one application's status. Selecting marks the student placed.
    pub fn update_application_status(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, PlacementError> {
        require_staff(actor, "updating an application status")?;
        let mode = self.transitions;

        let updated = retry_on_conflict(|| {
            let mut drive = self.get_drive(drive_id)?;
            let application = drive
                .application_mut(application_id)
                .ok_or(PlacementError::ApplicationNotFound)?;

            if !mode.permits(application.status, status) {
                return Err(PlacementError::InvalidTransition {
                    from: application.status,
                    to: status,
                });
            }
            application.status = status;
            let updated = application.clone();

            self.drives.replace(drive)?;
            Ok(updated)
        })?;

        if status == ApplicationStatus::Selected {
            self.mark_placed(&updated.student_id);
        }

        info!(
            drive = %drive_id.0,
            application = %application_id.0,
            status = status.label(),
            "application status updated"
        );
        Ok(updated)
    }

    fn mark_placed(&self, student_id: &StudentId) {
        match self
            .students
            .set_placement(student_id, PlacementStatus::Placed)
        {
            Ok(()) => info!(student = %student_id.0, "student marked placed"),
            Err(err) => warn!(
                student = %student_id.0,
                error = %err,
                "selected application but could not update placement status"
            ),
        }
    }

    /// Rows for every application whose status label matches `status`, ignoring case.
    pub fn export_applications(
        &self,
        actor: &Actor,
        drive_id: &DriveId,
        status: &str,
    ) -> Result<Vec<ExportRow>, PlacementError> {
        require_staff(actor, "exporting applications")?;
        let drive = self.get_drive(drive_id)?;
        let wanted = status.trim();

        drive
            .applications
            .iter()
            .filter(|application| application.status.label().eq_ignore_ascii_case(wanted))
            .map(|application| -> Result<ExportRow, PlacementError> {
                let student = self.students.fetch(&application.student_id)?;
                Ok(ExportRow::from_application(application, student.as_ref()))
            })
            .collect()
    }
}

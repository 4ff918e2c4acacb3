use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::placement::auth::TokenRegistry;
use crate::workflows::placement::domain::{
    Actor, BranchId, Drive, DriveDraft, DriveId, MarksRecord, PlacementStatus, Role, Student,
    StudentId,
};
use crate::workflows::placement::export::CsvReportRenderer;
use crate::workflows::placement::memory::{
    InMemoryAttachmentStore, InMemoryDriveRepository, InMemoryMarksLedger,
    InMemoryNoticeRepository, InMemoryStudentDirectory,
};
use crate::workflows::placement::notices::NoticeBoard;
use crate::workflows::placement::repository::{DriveRepository, RepositoryError};
use crate::workflows::placement::router::{tnp_router, TnpState};
use crate::workflows::placement::service::{Clock, PlacementService};
use crate::workflows::placement::transitions::TransitionMode;

/// Clock pinned to a settable instant.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 10, 9, 30, 0).unwrap()
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(super) fn faculty() -> Actor {
    Actor::new("fac-7", Role::Faculty)
}

pub(super) fn student(id: &str) -> Actor {
    Actor::new(id, Role::Student)
}

pub(super) fn student_record(id: &str, branch: &str) -> Student {
    Student {
        id: StudentId(id.to_string()),
        name: format!("Student {id}"),
        enrollment_no: format!("0801{}", id.to_ascii_uppercase()),
        email: format!("{id}@college.edu"),
        branch_id: BranchId(branch.to_string()),
        placement_status: PlacementStatus::Unplaced,
    }
}

pub(super) fn marks(student: &str, scores: &[f64]) -> Vec<MarksRecord> {
    scores
        .iter()
        .enumerate()
        .map(|(index, score)| MarksRecord {
            student_id: StudentId(student.to_string()),
            subject_id: format!("sub-{index}"),
            exam_id: "end-sem".to_string(),
            marks_obtained: *score,
        })
        .collect()
}

pub(super) fn draft() -> DriveDraft {
    DriveDraft {
        title: "Acme campus drive".to_string(),
        description: "Aptitude, coding round and interview".to_string(),
        deadline: Some(start_time() + Duration::days(7)),
        company_name: "Acme Systems".to_string(),
        job_role: "Graduate Engineer".to_string(),
        brochure: None,
        eligible_branches: Vec::new(),
        min_marks: Some(60.0),
        google_form_link: None,
    }
}

pub(super) struct Harness {
    pub(super) service: PlacementService,
    pub(super) drives: Arc<InMemoryDriveRepository>,
    pub(super) students: Arc<InMemoryStudentDirectory>,
    pub(super) marks: Arc<InMemoryMarksLedger>,
    pub(super) clock: Arc<FixedClock>,
}

impl Harness {
    pub(super) fn with_mode(mode: TransitionMode) -> Self {
        let drives = Arc::new(InMemoryDriveRepository::default());
        let students = Arc::new(InMemoryStudentDirectory::default());
        let marks = Arc::new(InMemoryMarksLedger::default());
        let clock = Arc::new(FixedClock::at(start_time()));

        let service = PlacementService::new(drives.clone(), students.clone(), marks.clone())
            .with_clock(clock.clone())
            .with_transitions(mode);

        let harness = Self {
            service,
            drives,
            students,
            marks,
            clock,
        };
        harness.enrol("stu-asha", "cse", &[70.0, 80.0]);
        harness.enrol("stu-ravi", "me", &[50.0, 60.0]);
        harness
    }

    pub(super) fn new() -> Self {
        Self::with_mode(TransitionMode::Permissive)
    }

    pub(super) fn enrol(&self, id: &str, branch: &str, scores: &[f64]) {
        self.students
            .upsert(student_record(id, branch))
            .expect("student stored");
        for record in marks(id, scores) {
            self.marks.record(record).expect("marks stored");
        }
    }

    pub(super) fn drive(&self) -> Drive {
        self.service
            .create_drive(&admin(), draft(), None)
            .expect("drive created")
    }

    pub(super) fn stored(&self, id: &DriveId) -> Drive {
        self.drives
            .fetch(id)
            .expect("fetch succeeds")
            .expect("drive present")
    }
}

/// Loses the first `failures` conditional writes, as if another request got there first.
pub(super) struct ContendedDriveRepository {
    pub(super) inner: InMemoryDriveRepository,
    pub(super) failures: AtomicUsize,
}

impl ContendedDriveRepository {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            inner: InMemoryDriveRepository::default(),
            failures: AtomicUsize::new(failures),
        }
    }
}

impl DriveRepository for ContendedDriveRepository {
    fn insert(&self, drive: Drive) -> Result<Drive, RepositoryError> {
        self.inner.insert(drive)
    }

    fn replace(&self, drive: Drive) -> Result<Drive, RepositoryError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Conflict);
        }
        self.inner.replace(drive)
    }

    fn fetch(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn list(&self) -> Result<Vec<Drive>, RepositoryError> {
        self.inner.list()
    }

    fn remove(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        self.inner.remove(id)
    }
}

pub(super) struct UnavailableDriveRepository;

impl DriveRepository for UnavailableDriveRepository {
    fn insert(&self, _drive: Drive) -> Result<Drive, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn replace(&self, _drive: Drive) -> Result<Drive, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<Drive>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct RouterFixture {
    pub(super) router: axum::Router,
    pub(super) harness: Arc<Harness>,
    pub(super) attachments: Arc<InMemoryAttachmentStore>,
}

/// Tokens: `tok-admin`, `tok-faculty`, `tok-asha`, `tok-ravi`.
pub(super) fn router_fixture() -> RouterFixture {
    let harness = Harness::new();
    let attachments = Arc::new(InMemoryAttachmentStore::default());
    let notices = NoticeBoard::new(Arc::new(InMemoryNoticeRepository::default()))
        .with_clock(harness.clock.clone());

    let tokens = TokenRegistry::default();
    tokens.register("tok-admin", admin());
    tokens.register("tok-faculty", faculty());
    tokens.register("tok-asha", student("stu-asha"));
    tokens.register("tok-ravi", student("stu-ravi"));

    let service = PlacementService::new(
        harness.drives.clone(),
        harness.students.clone(),
        harness.marks.clone(),
    )
    .with_clock(harness.clock.clone());

    let state = TnpState {
        placement: Arc::new(service),
        notices: Arc::new(notices),
        attachments: attachments.clone(),
        csv: Arc::new(CsvReportRenderer),
        pdf: None,
    };

    RouterFixture {
        router: tnp_router(state, Arc::new(tokens)),
        harness: Arc::new(harness),
        attachments,
    }
}

pub(super) const BOUNDARY: &str = "tnp-test-boundary";

/// Builds a multipart body from text fields and optional `(field, file name, bytes)` files.
pub(super) fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf8 body")
}

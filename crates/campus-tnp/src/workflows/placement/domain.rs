use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier wrapper for placement drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriveId(pub String);

/// Identifier for an application, unique within its drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NoticeId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchId(pub String);

/// Subject of a verified credential (admin, faculty member or student).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    /// Case-insensitive parse; tokens in the wild carry `Admin` as well as `admin`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "faculty" => Some(Self::Faculty),
            "student" => Some(Self::Student),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Faculty)
    }
}

/// The authenticated caller of a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }

    /// Students authenticate with their student record id.
    pub fn student_id(&self) -> StudentId {
        StudentId(self.user_id.0.clone())
    }
}

/// Who posted a drive or notice, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorship {
    pub created_by: UserId,
    pub created_by_role: Role,
    pub created_at: DateTime<Utc>,
}

impl Authorship {
    pub fn of(actor: &Actor, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by: actor.user_id.clone(),
            created_by_role: actor.role,
            created_at,
        }
    }
}

/// Application lifecycle: APPLIED -> SHORTLISTED -> SELECTED | REJECTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Applied,
    Shortlisted,
    Selected,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Selected,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "APPLIED",
            ApplicationStatus::Shortlisted => "SHORTLISTED",
            ApplicationStatus::Selected => "SELECTED",
            ApplicationStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw))
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Selected | ApplicationStatus::Rejected)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlacementStatus {
    #[default]
    Unplaced,
    Placed,
}

/// A student's submission against one drive, with eligibility inputs snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub branch_id: BranchId,
    pub marks: f64,
    pub resume: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

/// Placement opportunity posted by staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub id: DriveId,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub authorship: Authorship,
    pub company_name: String,
    pub job_role: String,
    pub brochure: Option<String>,
    pub attachment: Option<String>,
    pub eligible_branches: Vec<BranchId>,
    pub min_marks: Option<f64>,
    pub google_form_link: Option<String>,
    pub is_expired: bool,
    pub applications: Vec<Application>,
    /// Storage revision used for conditional replacement.
    #[serde(skip)]
    pub revision: u64,
}

impl Drive {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline.map(|deadline| deadline < now).unwrap_or(false)
    }

    /// Re-derives `is_expired` from the deadline. Returns the new flag.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) -> bool {
        self.is_expired = self.deadline_passed(now);
        self.is_expired
    }

    pub fn application_for(&self, student_id: &StudentId) -> Option<&Application> {
        self.applications
            .iter()
            .find(|application| &application.student_id == student_id)
    }

    pub fn application_mut(&mut self, id: &ApplicationId) -> Option<&mut Application> {
        self.applications
            .iter_mut()
            .find(|application| &application.id == id)
    }

    /// An empty branch list admits every branch.
    pub fn admits_branch(&self, branch_id: &BranchId) -> bool {
        self.eligible_branches.is_empty() || self.eligible_branches.contains(branch_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenBy {
    pub user_id: UserId,
    pub role: Role,
    pub seen_at: DateTime<Utc>,
}

/// Training-and-placement announcement with acknowledgement tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: NoticeId,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub authorship: Authorship,
    pub seen_by: Vec<SeenBy>,
    #[serde(skip)]
    pub revision: u64,
}

impl Notice {
    pub fn seen_by_user(&self, user_id: &UserId) -> bool {
        self.seen_by.iter().any(|entry| &entry.user_id == user_id)
    }
}

/// Discriminates postings at the API boundary; storage keeps the two apart.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Posting {
    Notice(Notice),
    Drive(Drive),
}

/// Student record consumed (never owned) by the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub enrollment_no: String,
    pub email: String,
    pub branch_id: BranchId,
    #[serde(default)]
    pub placement_status: PlacementStatus,
}

/// One score for a (student, subject, exam) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarksRecord {
    pub student_id: StudentId,
    pub subject_id: String,
    pub exam_id: String,
    pub marks_obtained: f64,
}

/// Fields accepted when staff create a drive. Multi-word keys also accept camelCase.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DriveDraft {
    pub title: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(alias = "companyName")]
    pub company_name: String,
    #[serde(alias = "jobRole")]
    pub job_role: String,
    #[serde(default)]
    pub brochure: Option<String>,
    #[serde(default, alias = "eligibleBranches")]
    pub eligible_branches: Vec<BranchId>,
    #[serde(default, alias = "minMarks")]
    pub min_marks: Option<f64>,
    #[serde(default, alias = "googleFormLink")]
    pub google_form_link: Option<String>,
}

/// Partial drive update. An absent key leaves the field alone; an explicit `null`
/// clears the optional ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DrivePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp_change")]
    pub deadline: Option<Option<DateTime<Utc>>>,
    #[serde(default, alias = "companyName")]
    pub company_name: Option<String>,
    #[serde(default, alias = "jobRole")]
    pub job_role: Option<String>,
    #[serde(default, deserialize_with = "deserialize_change")]
    pub brochure: Option<Option<String>>,
    #[serde(default, alias = "eligibleBranches")]
    pub eligible_branches: Option<Vec<BranchId>>,
    #[serde(default, alias = "minMarks", deserialize_with = "deserialize_change")]
    pub min_marks: Option<Option<f64>>,
    #[serde(default, alias = "googleFormLink", deserialize_with = "deserialize_change")]
    pub google_form_link: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoticeDraft {
    pub title: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoticePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp_change")]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|err| format!("failed to parse '{raw}' as a date or RFC 3339 timestamp ({err})"))
}

pub(crate) fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.filter(|value| !value.trim().is_empty())
        .map(|value| parse_timestamp(&value).map_err(serde::de::Error::custom))
        .transpose()
}

/// Only runs when the key is present, so `null` becomes `Some(None)`.
fn deserialize_change<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn deserialize_timestamp_change<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional_timestamp(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_parse_ignores_case() {
        assert_eq!(
            ApplicationStatus::parse("selected"),
            Some(ApplicationStatus::Selected)
        );
        assert_eq!(
            ApplicationStatus::parse(" Shortlisted "),
            Some(ApplicationStatus::Shortlisted)
        );
        assert_eq!(ApplicationStatus::parse("WAITLISTED"), None);
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!(Role::parse("Faculty"), Some(Role::Faculty));
        assert!(Role::Admin.is_staff());
        assert!(!Role::Student.is_staff());
        assert_eq!(Role::parse("visitor"), None);
    }

    #[test]
    fn bare_dates_parse_as_midnight_utc() {
        let parsed = parse_timestamp("2025-03-01").expect("date parses");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
        assert!(parse_timestamp("next tuesday").is_err());
    }

    #[test]
    fn drive_patch_accepts_camel_case_and_explicit_nulls() {
        let patch: DrivePatch = serde_json::from_str(
            r#"{"companyName": "Globex", "minMarks": 80, "deadline": null, "googleFormLink": null}"#,
        )
        .expect("patch parses");

        assert_eq!(patch.company_name.as_deref(), Some("Globex"));
        assert_eq!(patch.min_marks, Some(Some(80.0)));
        assert_eq!(patch.deadline, Some(None));
        assert_eq!(patch.google_form_link, Some(None));
        assert_eq!(patch.brochure, None);
        assert_eq!(patch.title, None);
    }

    #[test]
    fn notice_patch_keeps_deadline_when_key_is_absent() {
        let untouched: NoticePatch =
            serde_json::from_str(r#"{"title": "Moved"}"#).expect("patch parses");
        assert_eq!(untouched.deadline, None);

        let cleared: NoticePatch =
            serde_json::from_str(r#"{"deadline": ""}"#).expect("patch parses");
        assert_eq!(cleared.deadline, Some(None));
    }

    #[test]
    fn postings_carry_type_discriminant() {
        let notice = Notice {
            id: NoticeId("notice-1".to_string()),
            title: "Aptitude prep".to_string(),
            description: "Room 204".to_string(),
            deadline: None,
            authorship: Authorship::of(
                &Actor::new("fac-1", Role::Faculty),
                Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap(),
            ),
            seen_by: Vec::new(),
            revision: 0,
        };

        let json = serde_json::to_value(Posting::Notice(notice)).expect("serializes");
        assert_eq!(json["type"], "NOTICE");
        assert_eq!(json["created_by_role"], "faculty");
    }
}

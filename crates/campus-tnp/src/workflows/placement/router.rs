use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use super::auth::{require_bearer, CredentialVerifier};
use super::domain::{
    parse_timestamp, Actor, Application, ApplicationId, ApplicationStatus, BranchId, DriveDraft,
    DriveId, DrivePatch, NoticeDraft, NoticeId, NoticePatch, Posting,
};
use super::export::{ExportRow, ReportRenderer};
use super::notices::{NoticeBoard, NoticeView, SeenSummary};
use super::repository::{AttachmentStore, AttachmentUpload};
use super::response::ApiResponse;
use super::service::{require_staff, PlacementError, PlacementService};

/// Shared handles for the training-and-placement endpoints.
#[derive(Clone)]
pub struct TnpState {
    pub placement: Arc<PlacementService>,
    pub notices: Arc<NoticeBoard>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub csv: Arc<dyn ReportRenderer>,
    /// PDF rendering is delegated; without a renderer the PDF export answers 501.
    pub pdf: Option<Arc<dyn ReportRenderer>>,
}

/// Router builder exposing the notice board and drive workflow behind bearer auth.
pub fn tnp_router(state: TnpState, verifier: Arc<dyn CredentialVerifier>) -> Router {
    Router::new()
        .route("/tnp", get(list_notices).post(create_notice))
        .route("/tnp/seen-summary", get(seen_summary))
        .route("/tnp/:id", put(update_notice).delete(delete_notice))
        .route("/tnp/:id/seen", patch(toggle_seen))
        .route("/tnp/drive", get(list_drives).post(create_drive))
        .route(
            "/tnp/drive/:id",
            get(get_drive).put(update_drive).delete(delete_drive),
        )
        .route("/tnp/drive/:id/apply", post(apply_to_drive))
        .route("/tnp/drive/:id/shortlist", put(shortlist_drive))
        .route(
            "/tnp/drive/:drive_id/application/:application_id",
            put(update_application_status),
        )
        .route(
            "/tnp/drive/:drive_id/application/:application_id/status",
            patch(update_application_status),
        )
        .route("/tnp/export/:drive_id/:status", get(export_pdf))
        .route("/tnp/export-csv/:drive_id/:status", get(export_csv))
        .with_state(state)
        .route_layer(middleware::from_fn_with_state(verifier, require_bearer))
}

type Reply<T> = Result<ApiResponse<T>, PlacementError>;

/* ---------- notices ---------- */

pub(crate) async fn list_notices(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
) -> Reply<Vec<NoticeView>> {
    Ok(ApiResponse::ok(state.notices.list(&actor)?))
}

pub(crate) async fn create_notice(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Json(draft): Json<NoticeDraft>,
) -> Reply<Posting> {
    let notice = state.notices.create(&actor, draft)?;
    Ok(ApiResponse::ok(Posting::Notice(notice)).with_status(StatusCode::CREATED))
}

pub(crate) async fn update_notice(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<NoticePatch>,
) -> Reply<Posting> {
    let notice = state.notices.update(&actor, &NoticeId(id), patch)?;
    Ok(ApiResponse::ok(Posting::Notice(notice)))
}

pub(crate) async fn delete_notice(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Reply<()> {
    state.notices.delete(&actor, &NoticeId(id))?;
    Ok(ApiResponse::done("Notice deleted"))
}

#[derive(Debug, Serialize)]
pub(crate) struct SeenState {
    seen: bool,
}

pub(crate) async fn toggle_seen(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Reply<SeenState> {
    let seen = state.notices.toggle_seen(&actor, &NoticeId(id))?;
    Ok(ApiResponse::ok(SeenState { seen }))
}

pub(crate) async fn seen_summary(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
) -> Reply<SeenSummary> {
    Ok(ApiResponse::ok(state.notices.seen_summary(&actor)?))
}

/* ---------- drives ---------- */

pub(crate) async fn list_drives(State(state): State<TnpState>) -> Reply<Vec<Posting>> {
    let drives = state.placement.list_drives()?;
    Ok(ApiResponse::ok(drives.into_iter().map(Posting::Drive).collect()))
}

pub(crate) async fn get_drive(
    State(state): State<TnpState>,
    Path(id): Path<String>,
) -> Reply<Posting> {
    let drive = state.placement.get_drive(&DriveId(id))?;
    Ok(ApiResponse::ok(Posting::Drive(drive)))
}

pub(crate) async fn create_drive(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> Reply<Posting> {
    require_staff(&actor, "creating a drive")?;

    let form = read_form(multipart).await?;
    let draft = form.drive_draft()?;
    let drive = state.placement.create_drive_with_upload(
        &actor,
        draft,
        form.file("brochure"),
        state.attachments.as_ref(),
    )?;
    Ok(ApiResponse::ok(Posting::Drive(drive)).with_status(StatusCode::CREATED))
}

pub(crate) async fn update_drive(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<DrivePatch>,
) -> Reply<Posting> {
    let drive = state.placement.update_drive(&actor, &DriveId(id), patch)?;
    Ok(ApiResponse::ok(Posting::Drive(drive)))
}

pub(crate) async fn delete_drive(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Reply<()> {
    state.placement.delete_drive(&actor, &DriveId(id))?;
    Ok(ApiResponse::done("Drive deleted"))
}

pub(crate) async fn apply_to_drive(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    multipart: Option<Multipart>,
) -> Reply<Application> {
    if actor.role.is_staff() {
        return Err(PlacementError::PermissionDenied {
            action: "applying to a drive",
            required: "student",
        });
    }

    let resume = match multipart {
        Some(multipart) => read_form(multipart).await?.file("resume"),
        None => None,
    };

    let application = state.placement.apply_with_upload(
        &actor,
        &DriveId(id),
        resume,
        state.attachments.as_ref(),
    )?;
    Ok(ApiResponse::ok(application).with_message("Applied successfully"))
}

#[derive(Debug, Serialize)]
pub(crate) struct ShortlistOutcome {
    shortlisted: usize,
}

pub(crate) async fn shortlist_drive(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Reply<ShortlistOutcome> {
    let shortlisted = state.placement.shortlist(&actor, &DriveId(id))?;
    Ok(ApiResponse::ok(ShortlistOutcome { shortlisted }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    status: String,
}

pub(crate) async fn update_application_status(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path((drive_id, application_id)): Path<(String, String)>,
    Json(update): Json<StatusUpdate>,
) -> Reply<Application> {
    require_staff(&actor, "updating an application status")?;
    let status = ApplicationStatus::parse(&update.status)
        .ok_or_else(|| PlacementError::InvalidStatus(update.status.clone()))?;

    let application = state.placement.update_application_status(
        &actor,
        &DriveId(drive_id),
        &ApplicationId(application_id),
        status,
    )?;
    Ok(ApiResponse::ok(application))
}

/* ---------- exports ---------- */

pub(crate) async fn export_csv(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path((drive_id, status)): Path<(String, String)>,
) -> Result<Response, PlacementError> {
    let rows = state
        .placement
        .export_applications(&actor, &DriveId(drive_id.clone()), &status)?;
    render_export(state.csv.as_ref(), &drive_id, &status, &rows)
}

pub(crate) async fn export_pdf(
    State(state): State<TnpState>,
    Extension(actor): Extension<Actor>,
    Path((drive_id, status)): Path<(String, String)>,
) -> Result<Response, PlacementError> {
    let rows = state
        .placement
        .export_applications(&actor, &DriveId(drive_id.clone()), &status)?;

    match &state.pdf {
        Some(renderer) => render_export(renderer.as_ref(), &drive_id, &status, &rows),
        None => Ok(ApiResponse::<()>::failure(
            StatusCode::NOT_IMPLEMENTED,
            "PDF rendering is not configured; use the CSV export",
        )
        .into_response()),
    }
}

fn render_export(
    renderer: &dyn ReportRenderer,
    drive_id: &str,
    status: &str,
    rows: &[ExportRow],
) -> Result<Response, PlacementError> {
    let body = renderer.render(rows)?;
    let file_name = format!(
        "applications-{}-{}.{}",
        drive_id,
        status.to_ascii_lowercase(),
        renderer.file_extension()
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(renderer.content_type().as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/* ---------- multipart ---------- */

#[derive(Debug, Default)]
pub(crate) struct FormPayload {
    fields: Vec<(String, String)>,
    files: Vec<AttachmentUpload>,
}

/// `companyName`, `company_name` and `eligibleBranches[]` all normalise to snake case.
fn canonical_field(name: &str) -> String {
    let name = name.trim().trim_end_matches("[]");
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub(crate) async fn read_form(mut multipart: Multipart) -> Result<FormPayload, PlacementError> {
    let mut form = FormPayload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PlacementError::MalformedUpload(err.to_string()))?
    {
        let name = canonical_field(field.name().unwrap_or_default());
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| PlacementError::MalformedUpload(err.to_string()))?;
                // Browsers submit an empty part when no file was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push(AttachmentUpload {
                    field: name,
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| PlacementError::MalformedUpload(err.to_string()))?;
                form.fields.push((name, text));
            }
        }
    }

    Ok(form)
}

impl FormPayload {
    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    fn file(&self, name: &str) -> Option<AttachmentUpload> {
        self.files.iter().find(|file| file.field == name).cloned()
    }

    pub(crate) fn drive_draft(&self) -> Result<DriveDraft, PlacementError> {
        let deadline = self
            .text("deadline")
            .map(|raw| {
                parse_timestamp(raw).map_err(|reason| PlacementError::InvalidField {
                    field: "deadline",
                    reason,
                })
            })
            .transpose()?;

        let min_marks = self
            .text("min_marks")
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|err| PlacementError::InvalidField {
                        field: "min_marks",
                        reason: err.to_string(),
                    })
            })
            .transpose()?;

        let eligible_branches = self
            .fields
            .iter()
            .filter(|(field, _)| field == "eligible_branches")
            .flat_map(|(_, value)| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| BranchId(value.to_string()))
            .collect();

        Ok(DriveDraft {
            title: self.text("title").unwrap_or_default().to_string(),
            description: self.text("description").unwrap_or_default().to_string(),
            deadline,
            company_name: self.text("company_name").unwrap_or_default().to_string(),
            job_role: self.text("job_role").unwrap_or_default().to_string(),
            brochure: self.text("brochure").map(str::to_string),
            eligible_branches,
            min_marks,
            google_form_link: self.text("google_form_link").map(str::to_string),
        })
    }
}

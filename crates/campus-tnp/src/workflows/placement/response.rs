use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use super::repository::{AttachmentError, RepositoryError};
use super::service::PlacementError;

/// Envelope shared by every placement endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status: StatusCode::OK,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            status,
        }
    }
}

impl ApiResponse<()> {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl PlacementError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlacementError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            PlacementError::DriveNotFound
            | PlacementError::ApplicationNotFound
            | PlacementError::NoticeNotFound
            | PlacementError::StudentNotFound
            | PlacementError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            PlacementError::DriveExpired
            | PlacementError::AlreadyApplied
            | PlacementError::AlreadyPlaced
            | PlacementError::Ineligible(_)
            | PlacementError::InvalidStatus(_)
            | PlacementError::InvalidTransition { .. }
            | PlacementError::MissingField(_)
            | PlacementError::InvalidField { .. }
            | PlacementError::MalformedUpload(_)
            | PlacementError::Attachment(AttachmentError::Empty) => StatusCode::BAD_REQUEST,
            PlacementError::WriteContention
            | PlacementError::Repository(_)
            | PlacementError::Attachment(_)
            | PlacementError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PlacementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "placement request failed");
        }
        ApiResponse::<()>::failure(status, self.to_string()).into_response()
    }
}

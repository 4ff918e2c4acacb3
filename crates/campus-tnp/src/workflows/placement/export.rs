use serde::Serialize;

use super::domain::{Application, Student};

/// One line of an applicant export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub name: String,
    pub enrollment_no: String,
    pub email: String,
    pub branch: String,
    pub marks: f64,
    pub status: &'static str,
}

impl ExportRow {
    /// Missing student records still export, with placeholder contact details.
    pub fn from_application(application: &Application, student: Option<&Student>) -> Self {
        let (name, enrollment_no, email) = match student {
            Some(student) => (
                student.name.clone(),
                student.enrollment_no.clone(),
                student.email.clone(),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };

        Self {
            name,
            enrollment_no,
            email,
            branch: application.branch_id.0.clone(),
            marks: application.marks,
            status: application.status.label(),
        }
    }
}

/// Renders export rows into a downloadable document.
pub trait ReportRenderer: Send + Sync {
    fn content_type(&self) -> mime::Mime;
    fn file_extension(&self) -> &'static str;
    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush report: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportRenderer;

const CSV_HEADERS: [&str; 6] = ["Name", "Enrollment No", "Email", "Branch", "Marks", "Status"];

impl ReportRenderer for CsvReportRenderer {
    fn content_type(&self) -> mime::Mime {
        mime::TEXT_CSV_UTF_8
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, RenderError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADERS)?;
        for row in rows {
            let marks = format!("{:.2}", row.marks);
            writer.write_record([
                row.name.as_str(),
                row.enrollment_no.as_str(),
                row.email.as_str(),
                row.branch.as_str(),
                marks.as_str(),
                row.status,
            ])?;
        }
        writer
            .into_inner()
            .map_err(|err| RenderError::Io(err.into_error()))
    }
}

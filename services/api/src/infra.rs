use campus_tnp::config::PlacementConfig;
use campus_tnp::error::AppError;
use campus_tnp::workflows::placement::{
    AttachmentError, AttachmentStore, AttachmentUpload, CsvReportRenderer,
    InMemoryAttachmentStore, InMemoryDriveRepository, InMemoryMarksLedger,
    InMemoryNoticeRepository, InMemoryStudentDirectory, NoticeBoard, PlacementService, SeedFile,
    TnpState, TokenRegistry,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the TnP router needs, backed by the in-memory adapters.
pub(crate) struct PlacementStack {
    pub(crate) state: TnpState,
    pub(crate) tokens: Arc<TokenRegistry>,
}

impl PlacementStack {
    pub(crate) fn in_memory(
        config: &PlacementConfig,
        seed: Option<&SeedFile>,
    ) -> Result<Self, AppError> {
        let students = Arc::new(InMemoryStudentDirectory::default());
        let marks = Arc::new(InMemoryMarksLedger::default());
        let tokens = Arc::new(TokenRegistry::default());

        if let Some(seed) = seed {
            seed.apply(&students, &marks, &tokens)?;
        }

        let attachments: Arc<dyn AttachmentStore> = match &config.media_dir {
            Some(root) => Arc::new(MediaDirectoryStore::open(root)?),
            None => Arc::new(InMemoryAttachmentStore::default()),
        };

        let placement = PlacementService::new(
            Arc::new(InMemoryDriveRepository::default()),
            students,
            marks,
        )
        .with_transitions(config.transitions);
        let notices = NoticeBoard::new(Arc::new(InMemoryNoticeRepository::default()));

        Ok(Self {
            state: TnpState {
                placement: Arc::new(placement),
                notices: Arc::new(notices),
                attachments,
                csv: Arc::new(CsvReportRenderer),
                pdf: None,
            },
            tokens,
        })
    }
}

/// Writes uploads under a media directory. Keys are `uploads/<file>` relative to it.
pub(crate) struct MediaDirectoryStore {
    root: PathBuf,
    sequence: AtomicU64,
}

impl MediaDirectoryStore {
    pub(crate) fn open(root: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(root.join("uploads"))?;
        info!(root = %root.display(), "media directory ready");
        Ok(Self {
            root: root.to_path_buf(),
            // Millisecond start keeps names unique across restarts.
            sequence: AtomicU64::new(Utc::now().timestamp_millis().max(0) as u64),
        })
    }
}

impl AttachmentStore for MediaDirectoryStore {
    fn store(&self, upload: AttachmentUpload) -> Result<String, AttachmentError> {
        if upload.bytes.is_empty() {
            return Err(AttachmentError::Empty);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let key = format!("uploads/{sequence}-{}", stored_file_name(&upload));
        fs::write(self.root.join(&key), &upload.bytes)
            .map_err(|err| AttachmentError::Storage(err.to_string()))?;

        debug!(field = %upload.field, %key, bytes = upload.bytes.len(), "attachment stored");
        Ok(key)
    }

    fn remove(&self, key: &str) -> Result<(), AttachmentError> {
        // Only keys this store handed out: one file directly under `uploads/`.
        let Some(name) = key.strip_prefix("uploads/") else {
            return Ok(());
        };
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Ok(());
        }

        match fs::remove_file(self.root.join("uploads").join(name)) {
            Ok(()) => {
                debug!(%key, "attachment removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AttachmentError::Storage(err.to_string())),
        }
    }
}

/// Last path segment of the client's file name, reduced to a safe charset. Adds an
/// extension from the declared content type when the name has none.
fn stored_file_name(upload: &AttachmentUpload) -> String {
    let raw = upload
        .file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = raw
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let mut name = match cleaned.trim_matches('.') {
        "" => "upload".to_string(),
        trimmed => trimmed.to_string(),
    };

    if !name.contains('.') {
        let extension = upload
            .content_type
            .as_deref()
            .and_then(mime_guess::get_mime_extensions_str)
            .and_then(|extensions| extensions.first());
        if let Some(extension) = extension {
            name.push('.');
            name.push_str(extension);
        }
    }
    name
}

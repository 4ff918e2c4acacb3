//! Process-local adapters backing the repository seams. Used by the service binary
//! and by tests; a database-backed deployment swaps these out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Drive, DriveId, MarksRecord, Notice, NoticeId, PlacementStatus, Student, StudentId,
};
use super::repository::{
    AttachmentError, AttachmentStore, AttachmentUpload, DriveRepository, MarksLedger,
    NoticeRepository, RepositoryError, StudentDirectory,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryDriveRepository {
    drives: Arc<Mutex<HashMap<DriveId, Drive>>>,
}

impl DriveRepository for InMemoryDriveRepository {
    fn insert(&self, drive: Drive) -> Result<Drive, RepositoryError> {
        let mut guard = lock(&self.drives)?;
        if guard.contains_key(&drive.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(drive.id.clone(), drive.clone());
        Ok(drive)
    }

    fn replace(&self, mut drive: Drive) -> Result<Drive, RepositoryError> {
        let mut guard = lock(&self.drives)?;
        let stored = guard.get(&drive.id).ok_or(RepositoryError::NotFound)?;
        if stored.revision != drive.revision {
            return Err(RepositoryError::Conflict);
        }
        drive.revision += 1;
        guard.insert(drive.id.clone(), drive.clone());
        Ok(drive)
    }

    fn fetch(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Ok(lock(&self.drives)?.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Drive>, RepositoryError> {
        let mut drives: Vec<Drive> = lock(&self.drives)?.values().cloned().collect();
        drives.sort_by(|a, b| {
            b.authorship
                .created_at
                .cmp(&a.authorship.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(drives)
    }

    fn remove(&self, id: &DriveId) -> Result<Option<Drive>, RepositoryError> {
        Ok(lock(&self.drives)?.remove(id))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryNoticeRepository {
    notices: Arc<Mutex<HashMap<NoticeId, Notice>>>,
}

impl NoticeRepository for InMemoryNoticeRepository {
    fn insert(&self, notice: Notice) -> Result<Notice, RepositoryError> {
        let mut guard = lock(&self.notices)?;
        if guard.contains_key(&notice.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(notice.id.clone(), notice.clone());
        Ok(notice)
    }

    fn replace(&self, mut notice: Notice) -> Result<Notice, RepositoryError> {
        let mut guard = lock(&self.notices)?;
        let stored = guard.get(&notice.id).ok_or(RepositoryError::NotFound)?;
        if stored.revision != notice.revision {
            return Err(RepositoryError::Conflict);
        }
        notice.revision += 1;
        guard.insert(notice.id.clone(), notice.clone());
        Ok(notice)
    }

    fn fetch(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        Ok(lock(&self.notices)?.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Notice>, RepositoryError> {
        let mut notices: Vec<Notice> = lock(&self.notices)?.values().cloned().collect();
        notices.sort_by(|a, b| {
            b.authorship
                .created_at
                .cmp(&a.authorship.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(notices)
    }

    fn remove(&self, id: &NoticeId) -> Result<Option<Notice>, RepositoryError> {
        Ok(lock(&self.notices)?.remove(id))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryStudentDirectory {
    students: Arc<Mutex<HashMap<StudentId, Student>>>,
}

impl InMemoryStudentDirectory {
    pub fn upsert(&self, student: Student) -> Result<(), RepositoryError> {
        lock(&self.students)?.insert(student.id.clone(), student);
        Ok(())
    }
}

impl StudentDirectory for InMemoryStudentDirectory {
    fn fetch(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(lock(&self.students)?.get(id).cloned())
    }

    fn set_placement(
        &self,
        id: &StudentId,
        status: PlacementStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.students)?;
        let student = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        student.placement_status = status;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryMarksLedger {
    records: Arc<Mutex<Vec<MarksRecord>>>,
}

impl InMemoryMarksLedger {
    pub fn record(&self, record: MarksRecord) -> Result<(), RepositoryError> {
        lock(&self.records)?.push(record);
        Ok(())
    }
}

impl MarksLedger for InMemoryMarksLedger {
    fn marks_for(&self, student_id: &StudentId) -> Result<Vec<MarksRecord>, RepositoryError> {
        Ok(lock(&self.records)?
            .iter()
            .filter(|record| &record.student_id == student_id)
            .cloned()
            .collect())
    }
}

/// Keeps uploads in memory under `uploads/<sequence>-<file name>` keys.
#[derive(Default, Clone)]
pub struct InMemoryAttachmentStore {
    files: Arc<Mutex<Vec<(String, AttachmentUpload)>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryAttachmentStore {
    pub fn stored(&self) -> Vec<(String, AttachmentUpload)> {
        self.files
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl AttachmentStore for InMemoryAttachmentStore {
    fn store(&self, upload: AttachmentUpload) -> Result<String, AttachmentError> {
        if upload.bytes.is_empty() {
            return Err(AttachmentError::Empty);
        }
        let mut guard = self
            .files
            .lock()
            .map_err(|_| AttachmentError::Storage("in-memory store poisoned".to_string()))?;
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = format!("uploads/{sequence}-{}", upload.file_name);
        guard.push((key.clone(), upload));
        Ok(key)
    }

    fn remove(&self, key: &str) -> Result<(), AttachmentError> {
        let mut guard = self
            .files
            .lock()
            .map_err(|_| AttachmentError::Storage("in-memory store poisoned".to_string()))?;
        guard.retain(|(stored, _)| stored != key);
        Ok(())
    }
}

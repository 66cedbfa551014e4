//! Shared test doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::Notify;

use crate::capture::{CapturePayload, CaptureSlot, CaptureStore};
use crate::catalog::PlanCatalog;
use crate::commit::EnrollmentSink;
use crate::draft::EnrollmentDraft;
use crate::error::{Error, Result};
use crate::notify::{NotificationKind, Notifier};
use crate::profile::{validate, ProfileFields, ValidationResult};
use crate::record::{NewEnrollment, StoredEnrollment};

pub(crate) fn noah_fields() -> ProfileFields {
    ProfileFields {
        name: "Noah Smith".to_string(),
        age: "4".to_string(),
        gender: "Boy".to_string(),
        guardian_name: "Ana Smith".to_string(),
        guardian_phone: "555-0000".to_string(),
        ..ProfileFields::default()
    }
}

pub(crate) fn payload(slot: CaptureSlot, bytes: &[u8]) -> CapturePayload {
    CapturePayload::new(slot, bytes.to_vec(), "image/jpeg").unwrap()
}

/// A draft ready to commit: Noah's profile and both captures.
pub(crate) fn complete_draft(plan_id: Option<&str>) -> EnrollmentDraft {
    let fields = noah_fields();
    let ValidationResult::Valid(profile) = validate(&fields) else {
        panic!("fixture profile must be valid");
    };
    let mut captures = CaptureStore::new();
    captures.commit_capture(CaptureSlot::Face, payload(CaptureSlot::Face, b"face"));
    captures.commit_capture(CaptureSlot::Body, payload(CaptureSlot::Body, b"body"));

    let draft = EnrollmentDraft::new()
        .with_profile(fields, profile)
        .with_captures(captures);
    match plan_id {
        Some(id) => draft.with_plan(PlanCatalog::builtin().get(id).unwrap().clone()),
        None => draft,
    }
}

fn receipt(record: &NewEnrollment, document_id: i64) -> StoredEnrollment {
    StoredEnrollment {
        document_id,
        student_id: record.student_id.clone(),
        created_at: Utc::now(),
        replayed: false,
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    records: Mutex<Vec<NewEnrollment>>,
}

impl MemorySink {
    pub(crate) fn records(&self) -> Vec<NewEnrollment> {
        self.records.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl EnrollmentSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_enrollment(&self, record: &NewEnrollment) -> Result<StoredEnrollment> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(receipt(record, i64::try_from(records.len()).unwrap()))
    }
}

/// Always fails like an unreachable backend.
#[derive(Debug, Default)]
pub(crate) struct FailingSink;

#[async_trait::async_trait]
impl EnrollmentSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn create_enrollment(&self, _record: &NewEnrollment) -> Result<StoredEnrollment> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "network unreachable",
        )))
    }
}

/// Never answers.
#[derive(Debug, Default)]
pub(crate) struct PendingSink;

#[async_trait::async_trait]
impl EnrollmentSink for PendingSink {
    fn name(&self) -> &'static str {
        "pending"
    }

    async fn create_enrollment(&self, _record: &NewEnrollment) -> Result<StoredEnrollment> {
        std::future::pending().await
    }
}

/// Holds every call until released, then succeeds or fails.
#[derive(Debug, Default)]
pub(crate) struct GatedSink {
    gate: Notify,
    calls: AtomicUsize,
    fail: std::sync::atomic::AtomicBool,
}

impl GatedSink {
    pub(crate) fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn succeed_from_now(&self) {
        self.fail.store(false, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EnrollmentSink for GatedSink {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn create_enrollment(&self, record: &NewEnrollment) -> Result<StoredEnrollment> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.gate.notified().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::internal("backend rejected the write"));
        }
        Ok(receipt(record, i64::try_from(call).unwrap()))
    }
}

/// Remembers every notification.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<(String, NotificationKind)>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<(String, NotificationKind)> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<NotificationKind> {
        self.messages().into_iter().map(|(_, kind)| kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        self.messages.lock().unwrap().push((message.to_string(), kind));
    }
}

//! Meeting-day flows across the lifecycle service and the session composer:
//! composition, progress saves, mid-meeting removal, finalization and the
//! immutability of a locked group.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use uuid::Uuid;

use quorum::adapters::{
    AgendaRepository, LocalBlobStore, MemoryStore, MinutesExporter,
};
use quorum::domain::{
    AgendaKind, AgendaStatus, AgendaSubmission, MeetingMethod, RemovalOutcome, Schedule,
    SessionKey,
};
use quorum::error::{QuorumError, Result};
use quorum::services::{AgendaLifecycle, SessionComposer};

#[derive(Default)]
struct ExportSpy {
    calls: AtomicUsize,
}

#[async_trait]
impl MinutesExporter for ExportSpy {
    async fn export_group(&self, _key: &SessionKey) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    repo: Arc<MemoryStore>,
    lifecycle: AgendaLifecycle,
    composer: SessionComposer,
    exporter: Arc<ExportSpy>,
    _blob_dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let blob_dir = TempDir::new().expect("blob dir");
        let repo = Arc::new(MemoryStore::new());
        let blobs = Arc::new(LocalBlobStore::new(
            blob_dir.path(),
            b"session-signing-key".to_vec(),
        ));
        let exporter = Arc::new(ExportSpy::default());
        Self {
            repo: repo.clone(),
            lifecycle: AgendaLifecycle::new(repo.clone(), blobs),
            composer: SessionComposer::new(repo, exporter.clone()),
            exporter,
            _blob_dir: blob_dir,
        }
    }

    async fn scheduled_agenda(&self, title: &str, directors: &[&str], date: &str) -> Uuid {
        let agenda = self
            .lifecycle
            .propose(AgendaSubmission {
                kind: AgendaKind::Directors,
                title: title.into(),
                director_codes: directors.iter().map(|s| s.to_string()).collect(),
                initiator_codes: vec!["CORP-SEC".into()],
                contact_name: "N. Wijaya".into(),
                contact_position: "Corporate Secretary".into(),
                contact_phone: "+62-21-5550104".into(),
                ..Default::default()
            })
            .await
            .expect("propose");
        self.lifecycle
            .upload_document(agenda.id, "proposal_note", "note.pdf", b"note")
            .await
            .expect("upload note");
        self.lifecycle
            .upload_document(agenda.id, "study_material", "study.pdf", b"study")
            .await
            .expect("upload study");
        self.lifecycle
            .schedule(agenda.id, schedule_on(date))
            .await
            .expect("schedule");
        agenda.id
    }
}

fn schedule_on(date: &str) -> Schedule {
    Schedule {
        execution_date: date.parse().unwrap(),
        start_time: "14:00:00".parse().unwrap(),
        end_time: Some("16:30:00".parse().unwrap()),
        method: MeetingMethod::Offline,
        location: Some("Boardroom".into()),
        link: None,
    }
}

#[tokio::test]
async fn full_meeting_day_composes_saves_and_locks() {
    let harness = Harness::new();
    let a = harness
        .scheduled_agenda("Budget revision", &["D-01", "D-02"], "2026-09-10")
        .await;
    let b = harness
        .scheduled_agenda("Subsidiary merger", &["D-02", "D-03"], "2026-09-10")
        .await;
    let c = harness
        .scheduled_agenda("Dividend proposal", &["D-01"], "2026-09-10")
        .await;

    let mut draft = harness.composer.compose(&[a, b, c]).await.unwrap();
    assert_eq!(draft.key.meeting_number, 1);
    assert_eq!(draft.key.meeting_year, 2026);
    assert_eq!(draft.members.len(), 3);

    draft.record.leadership.chair = "D-01".into();
    draft.record.leadership.secretary = "CS-01".into();
    draft.record.mark_absent("D-03").unwrap();
    for member in &mut draft.members {
        member.minutes.executive_summary = format!("Discussed {}", member.title);
        member.minutes.decisions.push("Approved".into());
        member.minutes.decisions.push("  ".into());
    }

    let report = harness.composer.save_progress(&draft).await.unwrap();
    assert!(report.all_saved());
    assert_eq!(report.saved.len(), 3);

    // progress is denormalized onto each member row
    let stored = harness.repo.fetch(b).await.unwrap();
    let conduct = stored.conduct.expect("conduct saved");
    assert_eq!(conduct.leadership.chair, "D-01");
    assert!(conduct
        .attendance
        .iter()
        .any(|e| e.code == "D-03" && !e.present));
    assert_eq!(stored.minutes.decisions, vec!["Approved"]);

    let members = harness.composer.finish(&draft).await.unwrap();
    assert_eq!(members.len(), 3);
    for member in &members {
        assert_eq!(member.status, AgendaStatus::Locked);
        assert_eq!(member.correlation.unwrap().group_id, draft.key.group_id);
    }

    // the audit trail ends at the lock
    let history = harness.lifecycle.history(a).await.unwrap();
    let last = history.last().unwrap();
    assert_eq!(last.to, AgendaStatus::Locked);
    assert_eq!(last.reason, "minutes finalized");

    // a locked agenda refuses every mutation path
    let err = harness
        .lifecycle
        .save(
            a,
            AgendaSubmission {
                kind: AgendaKind::Directors,
                title: "Renamed".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QuorumError::Locked(id) if id == a));
    assert!(harness
        .lifecycle
        .upload_document(a, "supporting_files", "late.pdf", b"late")
        .await
        .is_err());
    assert!(harness.lifecycle.delete(a).await.is_err());
    let extra = harness
        .scheduled_agenda("Unrelated", &["D-01"], "2026-10-01")
        .await;
    harness.lifecycle.rollback(extra).await.unwrap();
    match harness.lifecycle.delete_many(&[a, extra]).await.unwrap_err() {
        QuorumError::LockedBatch { ids } => assert_eq!(ids, vec![a]),
        other => panic!("unexpected error: {other}"),
    }

    // numbering advances for the next session of this kind
    assert_eq!(
        harness
            .repo
            .next_meeting_number(AgendaKind::Directors, 2026)
            .await
            .unwrap(),
        2
    );

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(harness.exporter.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn member_leaving_mid_session_is_surfaced_then_resolved() {
    let harness = Harness::new();
    let a = harness
        .scheduled_agenda("Stays", &["D-01"], "2026-09-10")
        .await;
    let b = harness
        .scheduled_agenda("Leaves", &["D-02"], "2026-09-10")
        .await;

    let mut draft = harness.composer.compose(&[a, b]).await.unwrap();
    for member in &mut draft.members {
        member.minutes.decisions.push("Approved".into());
    }

    // the agenda is pulled off the meeting outside the session
    harness.lifecycle.rollback(b).await.unwrap();

    let report = harness.composer.save_progress(&draft).await.unwrap();
    assert_eq!(report.saved, vec![a]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, b);
    assert!(report.failures[0].1.contains("left the session"));

    // finish refuses while the stale member is still in the draft
    let err = harness.composer.finish(&draft).await.unwrap_err();
    assert!(matches!(err, QuorumError::InvalidTransition { .. }));
    assert_eq!(
        harness.repo.fetch(a).await.unwrap().status,
        AgendaStatus::Scheduled
    );

    // dropping the departed member lets the session complete
    let outcome = harness.composer.remove_agenda(&mut draft, b).await.unwrap();
    assert_eq!(outcome, RemovalOutcome::Continued);
    let members = harness.composer.finish(&draft).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, a);
    assert_eq!(members[0].status, AgendaStatus::Locked);

    // the departed agenda is untouched by the finalization
    let departed = harness.repo.fetch(b).await.unwrap();
    assert_eq!(departed.status, AgendaStatus::Ready);
    assert!(departed.correlation.is_none());
}

#[tokio::test]
async fn dissolved_session_returns_agenda_to_the_pool() {
    let harness = Harness::new();
    let a = harness
        .scheduled_agenda("Sole item", &["D-01"], "2026-09-10")
        .await;

    let mut draft = harness.composer.compose(&[a]).await.unwrap();
    let outcome = harness.composer.remove_agenda(&mut draft, a).await.unwrap();
    assert_eq!(outcome, RemovalOutcome::Dissolved);

    let stored = harness.repo.fetch(a).await.unwrap();
    assert_eq!(stored.status, AgendaStatus::Ready);
    assert!(stored.schedule.is_none());
    assert!(stored.minutes.is_empty());

    // documents survived, so the agenda can be scheduled straight away
    harness
        .lifecycle
        .schedule(a, schedule_on("2026-09-24"))
        .await
        .unwrap();
    let draft = harness.composer.compose(&[a]).await.unwrap();
    // nothing was ever locked, the number is still the first
    assert_eq!(draft.key.meeting_number, 1);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(harness.exporter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn finalized_minutes_survive_the_round_trip() {
    let harness = Harness::new();
    let a = harness
        .scheduled_agenda("First", &["D-01"], "2026-09-10")
        .await;
    let b = harness
        .scheduled_agenda("Second", &["D-01", "D-02"], "2026-09-10")
        .await;

    let mut draft = harness.composer.compose(&[a, b]).await.unwrap();
    draft.record.guests.push("External auditor".into());
    {
        let first = draft.member_mut(a).unwrap();
        first.minutes.considerations.push("Cash position".into());
        first.minutes.considerations.push("".into());
        first.minutes.decisions.push("Approved with conditions".into());
        first.minutes.dissenting_opinion = Some("  ".into());
    }
    draft
        .member_mut(b)
        .unwrap()
        .minutes
        .decisions
        .push("Deferred to next meeting".into());

    harness.composer.finish(&draft).await.unwrap();

    let group = harness
        .repo
        .list_by_group(draft.key.group_id)
        .await
        .unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group[0].id, a);
    assert_eq!(group[1].id, b);

    // blank entries were pruned at finalization, the rest survived
    let first = &group[0];
    assert_eq!(first.minutes.considerations, vec!["Cash position"]);
    assert_eq!(first.minutes.decisions, vec!["Approved with conditions"]);
    assert_eq!(first.minutes.dissenting_opinion, None);
    let conduct = first.conduct.as_ref().expect("conduct snapshot");
    assert_eq!(conduct.guests, vec!["External auditor"]);
    assert_eq!(conduct.held_on.to_string(), "2026-09-10");

    // both members carry the same correlation key
    let key = first.correlation.unwrap();
    assert_eq!(group[1].correlation.unwrap(), key);
    assert_eq!(key.meeting_number, 1);
    assert_eq!(key.meeting_year, 2026);
}

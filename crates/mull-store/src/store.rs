//! The inquiry store: sole owner and mutator of one agent's collection.
//!
//! The whole collection loads once at construction and is rewritten in
//! full on every mutating operation. The write is a temp-file-then-rename
//! replace, so a crash between mutation and persist loses exactly that one
//! mutation and never leaves a half-written document.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mull_core::{Inquiry, InquiryStatus, ScheduleConfig, UnixMs};

use crate::agent::{agent_dir, sanitize_agent_id};
use crate::error::Result;

/// Persisted document shape: `{ "inquiries": [...] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AgentState {
    #[serde(default)]
    inquiries: Vec<Inquiry>,
}

pub struct InquiryStore {
    agent_id: String,
    agent_dir: PathBuf,
    file_path: PathBuf,
    schedule: ScheduleConfig,
    state: AgentState,
}

impl InquiryStore {
    /// Open the store for one agent, creating its directory on first use.
    ///
    /// A missing or unparseable document yields an empty collection; a
    /// corrupt load is logged and never escalated. Unreadable storage
    /// (anything other than not-found) is surfaced to the caller.
    pub fn open(base_dir: &Path, agent_id: &str, schedule: ScheduleConfig) -> Result<Self> {
        let agent_id = sanitize_agent_id(agent_id);
        let agent_dir = agent_dir(base_dir, &agent_id);
        fs::create_dir_all(&agent_dir)?;

        let file_path = agent_dir.join("inquiries.json");
        let state = Self::load(&file_path)?;

        Ok(Self {
            agent_id,
            agent_dir,
            file_path,
            schedule,
            state,
        })
    }

    fn load(path: &Path) -> Result<AgentState> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AgentState::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(
                    "corrupt inquiry document at {}, starting empty: {e}",
                    path.display()
                );
                Ok(AgentState::default())
            }
        }
    }

    /// Rewrite the full collection: serialize, write to a temp file in the
    /// same directory, rename over the document.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        fs::create_dir_all(&self.agent_dir)?;

        let tmp_path = self.agent_dir.join(".inquiries.json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.file_path)?;
        Ok(())
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn agent_dir(&self) -> &Path {
        &self.agent_dir
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// All inquiries in collection (creation) order.
    pub fn list(&self) -> &[Inquiry] {
        &self.state.inquiries
    }

    pub fn get(&self, id: Uuid) -> Option<&Inquiry> {
        self.state.inquiries.iter().find(|i| i.id == id)
    }

    /// Create a new inquiry with pass 1 scheduled at `now + delay(1)`,
    /// append it to the collection, and persist before returning.
    pub fn create(
        &mut self,
        question: &str,
        source: &str,
        entropy: f64,
        context: &str,
        now: UnixMs,
    ) -> Result<&Inquiry> {
        let inquiry = Inquiry::new(question, source, entropy, context, &self.schedule, now);
        let idx = self.state.inquiries.len();
        self.state.inquiries.push(inquiry);
        self.persist()?;
        Ok(&self.state.inquiries[idx])
    }

    /// First due pass in scan order: in_progress inquiries in collection
    /// order, passes in numeric order. Scan order — not timestamps — is
    /// the tie-break when several passes are simultaneously due.
    pub fn find_due_pass(&self, now: UnixMs) -> Option<(Uuid, u8)> {
        self.state
            .inquiries
            .iter()
            .find_map(|i| i.due_pass(now).map(|pass| (i.id, pass)))
    }

    /// Record a completed pass and advance the inquiry's state machine,
    /// persisting synchronously.
    ///
    /// Unknown id, unknown pass number, and an already-completed pass all
    /// return `Ok(None)` without mutating or persisting: callers must
    /// tolerate stale references between query and completion.
    pub fn complete_pass(
        &mut self,
        id: Uuid,
        pass_number: u8,
        output: &str,
        now: UnixMs,
    ) -> Result<Option<&Inquiry>> {
        let Some(idx) = self.state.inquiries.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        if !self.state.inquiries[idx].complete_pass(pass_number, output, &self.schedule, now) {
            return Ok(None);
        }
        self.persist()?;
        Ok(self.state.inquiries.get(idx))
    }

    /// Work queue for the export collaborator: completed and not yet
    /// externalized, in collection order.
    pub fn list_completed_unexported(&self) -> Vec<&Inquiry> {
        self.state
            .inquiries
            .iter()
            .filter(|i| i.status == InquiryStatus::Completed && !i.persisted)
            .collect()
    }

    /// Flag an inquiry as externalized. Idempotent; returns whether the
    /// inquiry was found.
    pub fn mark_exported(&mut self, id: Uuid) -> Result<bool> {
        let Some(inquiry) = self.state.inquiries.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        inquiry.persisted = true;
        self.persist()?;
        Ok(true)
    }

    /// Replace an inquiry's annotation tags. The only mutable field the
    /// core reserves for outside writers.
    pub fn tag(&mut self, id: Uuid, tags: Vec<String>) -> Result<bool> {
        let Some(inquiry) = self.state.inquiries.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        inquiry.tags = tags;
        self.persist()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn schedule() -> ScheduleConfig {
        ScheduleConfig::from_delays(&[(1, 0), (2, 1000), (3, 1000)])
    }

    fn open(base: &Path, agent: &str) -> InquiryStore {
        InquiryStore::open(base, agent, schedule()).unwrap()
    }

    #[test]
    fn test_create_persists_document() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");

        store.create("What is unknown?", "src", 0.8, "ctx", 0).unwrap();

        let doc = dir.path().join("agents/agentA/inquiries.json");
        assert!(doc.exists());
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&doc).unwrap()).unwrap();
        assert_eq!(json["inquiries"].as_array().unwrap().len(), 1);
        assert_eq!(json["inquiries"][0]["question"], "What is unknown?");
        // No temp file left behind.
        assert!(!dir.path().join("agents/agentA/.inquiries.json.tmp").exists());
    }

    #[test]
    fn test_reload_across_instances() {
        let dir = TempDir::new().unwrap();
        let id = {
            let mut store = open(dir.path(), "agentA");
            let inq = store.create("q", "s", 0.5, "", 100).unwrap();
            inq.id
        };

        let store = open(dir.path(), "agentA");
        assert_eq!(store.list().len(), 1);
        let inq = store.get(id).unwrap();
        assert_eq!(inq.created, 100);
        assert_eq!(inq.pass(1).unwrap().scheduled_at(), Some(100));
    }

    #[test]
    fn test_missing_document_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(dir.path(), "fresh");
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let dir = TempDir::new().unwrap();
        let agent_dir = dir.path().join("agents/agentA");
        fs::create_dir_all(&agent_dir).unwrap();
        fs::write(agent_dir.join("inquiries.json"), "{not json").unwrap();

        let store = open(dir.path(), "agentA");
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_absurd_timestamp_starts_empty_not_panic() {
        // Syntactically valid JSON whose timestamp year is out of range:
        // still a corrupt document, still downgraded to an empty collection.
        let dir = TempDir::new().unwrap();
        let agent_dir = dir.path().join("agents/agentA");
        fs::create_dir_all(&agent_dir).unwrap();
        fs::write(
            agent_dir.join("inquiries.json"),
            r#"{"inquiries": [{
                "id": "7f1c1264-8934-4c9e-9d3c-1b2a3c4d5e6f",
                "question": "q", "source": "s", "entropy": 0.0, "context": "",
                "passes": [
                    {"number": 1, "scheduled": "300000000000000-01-01T00:00:00Z", "completed": null, "output": null},
                    {"number": 2, "scheduled": null, "completed": null, "output": null},
                    {"number": 3, "scheduled": null, "completed": null, "output": null}
                ],
                "tags": [], "status": "in_progress",
                "created": "2026-01-01T00:00:00Z", "persisted": false
            }]}"#,
        )
        .unwrap();

        let store = open(dir.path(), "agentA");
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_deleted_document_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(dir.path(), "agentA");
            store.create("q", "s", 0.5, "", 0).unwrap();
        }
        fs::remove_file(dir.path().join("agents/agentA/inquiries.json")).unwrap();

        let store = open(dir.path(), "agentA");
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_agents_are_disjoint() {
        let dir = TempDir::new().unwrap();
        let mut a = open(dir.path(), "agentA");
        a.create("question for A", "s", 0.0, "", 0).unwrap();

        let b = open(dir.path(), "agentB");
        assert!(b.list().is_empty());
        assert_eq!(open(dir.path(), "agentA").list().len(), 1);
    }

    #[test]
    fn test_find_due_pass_scan_order_tiebreak() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");

        // Second inquiry scheduled earlier, but collection order wins.
        let first = store.create("first", "s", 0.0, "", 500).unwrap().id;
        store.create("second", "s", 0.0, "", 100).unwrap();

        assert_eq!(store.find_due_pass(1_000), Some((first, 1)));
    }

    #[test]
    fn test_find_due_pass_none_when_future() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        store.create("q", "s", 0.0, "", 5_000).unwrap();
        assert_eq!(store.find_due_pass(4_999), None);
    }

    #[test]
    fn test_complete_pass_advances_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        let id = store.create("q", "s", 0.8, "", 0).unwrap().id;

        let updated = store.complete_pass(id, 1, "A", 0).unwrap().unwrap();
        assert_eq!(updated.pass(1).unwrap().output(), Some("A"));
        assert_eq!(updated.pass(2).unwrap().scheduled_at(), Some(1_000));
        assert_eq!(updated.status, InquiryStatus::InProgress);

        // Survives a reload.
        let store = open(dir.path(), "agentA");
        assert_eq!(store.get(id).unwrap().pass(1).unwrap().output(), Some("A"));
        assert_eq!(store.find_due_pass(999), None);
        assert_eq!(store.find_due_pass(1_000), Some((id, 2)));
    }

    #[test]
    fn test_complete_final_pass_marks_inquiry_done() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        let id = store.create("q", "s", 0.0, "", 0).unwrap().id;

        store.complete_pass(id, 1, "a", 10).unwrap();
        store.complete_pass(id, 2, "b", 1_100).unwrap();
        let done = store.complete_pass(id, 3, "c", 2_200).unwrap().unwrap();

        assert_eq!(done.status, InquiryStatus::Completed);
        assert_eq!(done.completed, Some(2_200));
        assert_eq!(store.find_due_pass(u64::MAX), None);
    }

    #[test]
    fn test_complete_unknown_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        store.create("q", "s", 0.0, "", 0).unwrap();

        let before = fs::read_to_string(store.file_path()).unwrap();
        let result = store.complete_pass(Uuid::new_v4(), 1, "x", 0).unwrap();
        assert!(result.is_none());
        // Nothing persisted by the no-op.
        assert_eq!(fs::read_to_string(store.file_path()).unwrap(), before);
    }

    #[test]
    fn test_complete_unknown_pass_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        let id = store.create("q", "s", 0.0, "", 0).unwrap().id;

        assert!(store.complete_pass(id, 9, "x", 0).unwrap().is_none());
        assert!(store.get(id).unwrap().pass(1).unwrap().output().is_none());
    }

    #[test]
    fn test_export_queue_and_mark_exported_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        let id = store.create("q", "s", 0.0, "", 0).unwrap().id;

        assert!(store.list_completed_unexported().is_empty());

        store.complete_pass(id, 1, "a", 0).unwrap();
        store.complete_pass(id, 2, "b", 1_000).unwrap();
        store.complete_pass(id, 3, "c", 2_000).unwrap();

        let queue = store.list_completed_unexported();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, id);

        assert!(store.mark_exported(id).unwrap());
        assert!(store.list_completed_unexported().is_empty());

        // Second call: still found, still true, no error.
        assert!(store.mark_exported(id).unwrap());
        assert!(store.get(id).unwrap().persisted);

        assert!(!store.mark_exported(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_tag_preserves_everything_else() {
        let dir = TempDir::new().unwrap();
        let mut store = open(dir.path(), "agentA");
        let id = store.create("q", "s", 0.4, "", 0).unwrap().id;
        store.complete_pass(id, 1, "a", 0).unwrap();

        assert!(store.tag(id, vec!["revisit".to_string()]).unwrap());

        let store = open(dir.path(), "agentA");
        let inq = store.get(id).unwrap();
        assert_eq!(inq.tags, vec!["revisit"]);
        assert_eq!(inq.pass(1).unwrap().output(), Some("a"));
        assert!(!inq.persisted);
    }

    #[test]
    fn test_agent_id_sanitized_on_open() {
        let dir = TempDir::new().unwrap();
        let store = open(dir.path(), "my agent!");
        assert_eq!(store.agent_id(), "my_agent_");
        assert!(dir.path().join("agents/my_agent_").exists());
    }
}

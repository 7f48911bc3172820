use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::session::Session;

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL log of what happened during a wizard session.
///
/// Every line carries `type`, `session_id`, `seq`, `ts` and a snapshot of
/// where the wizard stood: `step`, `step_title`, `audience`, `turns` and
/// `references`. The caller payload is merged last and can override them.
#[derive(Debug, Clone)]
pub struct SessionLog {
    inner: Arc<SessionLogInner>,
}

#[derive(Debug)]
struct SessionLogInner {
    path: PathBuf,
    cursor: Mutex<Cursor>,
}

/// Identity of the current session and the next sequence number in it.
#[derive(Debug)]
struct Cursor {
    session_id: String,
    next_seq: u64,
}

impl SessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_session_id(path, new_session_id())
    }

    pub fn with_session_id(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionLogInner {
                path: path.into(),
                cursor: Mutex::new(Cursor {
                    session_id: session_id.into(),
                    next_seq: 0,
                }),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> String {
        self.inner
            .cursor
            .lock()
            .map(|cursor| cursor.session_id.clone())
            .unwrap_or_default()
    }

    /// Starts a fresh session id with its own sequence; returns the id.
    pub fn rotate(&self) -> anyhow::Result<String> {
        let mut cursor = self.lock_cursor()?;
        cursor.session_id = new_session_id();
        cursor.next_seq = 0;
        Ok(cursor.session_id.clone())
    }

    /// Appends one event describing `session` as it is now.
    pub fn record(
        &self,
        event_type: &str,
        session: &Session,
        payload: EventPayload,
    ) -> anyhow::Result<Value> {
        let mut event = session_snapshot(session);
        event.insert("type".to_string(), Value::from(event_type));
        event.insert("ts".to_string(), Value::from(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Held across the write so seq order matches line order.
        let mut cursor = self.lock_cursor()?;
        event
            .entry("session_id")
            .or_insert_with(|| Value::from(cursor.session_id.clone()));
        event.entry("seq").or_insert_with(|| Value::from(cursor.next_seq));

        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        cursor.next_seq += 1;

        Ok(Value::Object(event))
    }

    fn lock_cursor(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Cursor>> {
        self.inner
            .cursor
            .lock()
            .map_err(|_| anyhow::anyhow!("session log lock poisoned"))
    }
}

fn session_snapshot(session: &Session) -> EventPayload {
    let step = session.step();
    let mut snapshot = EventPayload::new();
    snapshot.insert("step".to_string(), Value::from(step.number()));
    snapshot.insert("step_title".to_string(), Value::from(step.title()));
    snapshot.insert(
        "audience".to_string(),
        session
            .audience()
            .map(|audience| Value::from(audience.to_string()))
            .unwrap_or(Value::Null),
    );
    snapshot.insert("turns".to_string(), Value::from(session.transcript().len()));
    snapshot.insert(
        "references".to_string(),
        Value::from(session.reference_images().iter().flatten().count()),
    );
    snapshot
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;
    use crate::category::Audience;
    use crate::image::ImageData;
    use crate::session::Action;

    fn lines(path: &Path) -> anyhow::Result<Vec<Value>> {
        Ok(fs::read_to_string(path)?
            .lines()
            .map(serde_json::from_str::<Value>)
            .collect::<Result<_, _>>()?)
    }

    #[test]
    fn record_snapshots_wizard_position() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session.jsonl");
        let log = SessionLog::with_session_id(&path, "session-123");
        let session = Session::new()
            .reduce(Action::SetGarment(ImageData::new(b"jpeg".to_vec(), "image/jpeg")))?
            .reduce(Action::SetAudience(Audience::Female))?;

        let emitted = log.record("garment_ready", &session, EventPayload::new())?;

        let parsed = lines(&path)?;
        assert_eq!(parsed, vec![emitted]);
        let event = &parsed[0];
        assert_eq!(event["type"], "garment_ready");
        assert_eq!(event["session_id"], "session-123");
        assert_eq!(event["seq"], 0);
        assert_eq!(event["step"], 1);
        assert_eq!(event["step_title"], "Garment");
        assert_eq!(event["audience"], Audience::Female.to_string());
        assert_eq!(event["turns"], 0);
        assert_eq!(event["references"], 0);
        DateTime::parse_from_rfc3339(event["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_overrides_snapshot_fields() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = SessionLog::new(temp.path().join("session.jsonl"));
        let mut payload = EventPayload::new();
        payload.insert("step".to_string(), Value::from(4));
        payload.insert("operation".to_string(), Value::from("shoot"));

        let event = log.record("operation_completed", &Session::new(), payload)?;
        assert_eq!(event["step"], 4);
        assert_eq!(event["operation"], "shoot");
        assert_eq!(event["audience"], Value::Null);
        Ok(())
    }

    #[test]
    fn rotate_starts_new_id_and_sequence() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("session.jsonl");
        let log = SessionLog::new(&path);
        let session = Session::new();
        let before = log.session_id();
        log.record("one", &session, EventPayload::new())?;
        log.record("two", &session, EventPayload::new())?;
        let rotated = log.rotate()?;
        log.record("three", &session, EventPayload::new())?;

        assert_ne!(before, rotated);
        let parsed = lines(&path)?;
        let seqs: Vec<u64> = parsed.iter().filter_map(|e| e["seq"].as_u64()).collect();
        assert_eq!(seqs, vec![0, 1, 0]);
        assert_eq!(parsed[1]["session_id"], Value::from(before));
        assert_eq!(parsed[2]["session_id"], Value::from(rotated));
        Ok(())
    }
}

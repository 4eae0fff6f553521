use crate::{Error, Result};
use chrono::DateTime;
use murmur_types::{EngineEvent, EventKind};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;

// NOTE: Event Log Design Rationale
//
// Why SQLite (not an in-process ring or JSONL)?
// - Readers need consistent snapshots while a turn is mid-flight
// - Filtered reads (by kind, by turn) should not scan the whole stream
// - Other collaborators park their tables in the same file; the log never
//   reads them
//
// Why caller-supplied seq (not AUTOINCREMENT)?
// - The unique tuple (session_id, turn_id, seq) is ours to mint, which
//   makes append idempotent under retry: replaying the same event object
//   fails the unique index instead of duplicating
// - Dense per-turn seq gives replay a total order independent of how
//   fan-out groups happened to complete
//
// Why a single writer?
// - One turn runner (plus the daemon between turns) is the whole write
//   load; cross-process coordination is explicitly out of scope

/// Single-writer append-only event log backed by SQLite.
pub struct EventLog {
    conn: Connection,
    seq_counters: HashMap<(String, u64), u64>,
}

impl EventLog {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let log = Self {
            conn,
            seq_counters: HashMap::new(),
        };
        log.init_schema()?;
        Ok(log)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let log = Self {
            conn,
            seq_counters: HashMap::new(),
        };
        log.init_schema()?;
        Ok(log)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                turn_id INTEGER NOT NULL,
                seq INTEGER NOT NULL,
                ts_monotonic REAL NOT NULL,
                ts_wall_iso TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                schema_version INTEGER NOT NULL DEFAULT 1,
                UNIQUE(session_id, turn_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_events_session_turn
                ON events(session_id, turn_id);
            CREATE INDEX IF NOT EXISTS idx_events_kind
                ON events(kind);
            CREATE INDEX IF NOT EXISTS idx_events_session
                ON events(session_id);
            "#,
        )?;
        Ok(())
    }

    /// Next dense sequence number for a turn. Monotonic within a single
    /// writer; resetting a turn restarts its counter at 0.
    pub fn next_seq(&mut self, session_id: &str, turn_id: u64) -> u64 {
        let counter = self
            .seq_counters
            .entry((session_id.to_string(), turn_id))
            .or_insert(0);
        let seq = *counter;
        *counter += 1;
        seq
    }

    /// Reset the sequence counter for a turn (replay scenarios).
    pub fn reset_seq(&mut self, session_id: &str, turn_id: u64) {
        self.seq_counters
            .insert((session_id.to_string(), turn_id), 0);
    }

    /// Append one event. Fails with [`Error::Constraint`] if the event's
    /// `(session_id, turn_id, seq)` tuple already exists; the log is left
    /// unchanged in that case.
    pub fn append(&self, event: &EngineEvent) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO events
                (session_id, turn_id, seq, ts_monotonic, ts_wall_iso,
                 kind, payload_json, schema_version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.session_id,
                event.turn_id as i64,
                event.seq as i64,
                event.ts_monotonic,
                event.ts_wall.to_rfc3339(),
                event.kind.as_str(),
                event.payload.to_string(),
                event.schema_version,
            ],
        )?;
        Ok(())
    }

    /// Append multiple events atomically. Either every event lands or
    /// none do.
    pub fn append_batch(&mut self, events: &[EngineEvent]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO events
                    (session_id, turn_id, seq, ts_monotonic, ts_wall_iso,
                     kind, payload_json, schema_version)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for event in events {
                stmt.execute(params![
                    event.session_id,
                    event.turn_id as i64,
                    event.seq as i64,
                    event.ts_monotonic,
                    event.ts_wall.to_rfc3339(),
                    event.kind.as_str(),
                    event.payload.to_string(),
                    event.schema_version,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All events of one turn, in seq order.
    pub fn replay_turn(&self, session_id: &str, turn_id: u64) -> Result<Vec<EngineEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, turn_id, seq, ts_monotonic, ts_wall_iso,
                   kind, payload_json, schema_version
            FROM events
            WHERE session_id = ?1 AND turn_id = ?2
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map(params![session_id, turn_id as i64], row_to_event)?;
        collect_events(rows)
    }

    /// All events of a session, in `(turn_id, seq)` order.
    pub fn replay_session(&self, session_id: &str) -> Result<Vec<EngineEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, turn_id, seq, ts_monotonic, ts_wall_iso,
                   kind, payload_json, schema_version
            FROM events
            WHERE session_id = ?1
            ORDER BY turn_id, seq
            "#,
        )?;
        let rows = stmt.query_map(params![session_id], row_to_event)?;
        collect_events(rows)
    }

    /// Most recent events of one kind, newest first.
    pub fn get_events_by_kind(
        &self,
        session_id: &str,
        kind: EventKind,
        limit: usize,
    ) -> Result<Vec<EngineEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, turn_id, seq, ts_monotonic, ts_wall_iso,
                   kind, payload_json, schema_version
            FROM events
            WHERE session_id = ?1 AND kind = ?2
            ORDER BY turn_id DESC, seq DESC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt.query_map(params![session_id, kind.as_str(), limit as i64], row_to_event)?;
        collect_events(rows)
    }

    /// Highest turn id seen for a session, or 0 when the session is empty.
    pub fn get_last_turn_id(&self, session_id: &str) -> Result<u64> {
        let max: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(turn_id) FROM events WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.unwrap_or(0) as u64)
    }

    /// Recent session ids, newest writer first.
    pub fn get_session_ids(&self, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id FROM events
            GROUP BY session_id
            ORDER BY MAX(id) DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// Count events, optionally filtered by session and turn.
    pub fn count_events(&self, session_id: Option<&str>, turn_id: Option<u64>) -> Result<u64> {
        let count: i64 = match (session_id, turn_id) {
            (Some(session), Some(turn)) => self.conn.query_row(
                "SELECT COUNT(*) FROM events WHERE session_id = ?1 AND turn_id = ?2",
                params![session, turn as i64],
                |row| row.get(0),
            )?,
            (Some(session), None) => self.conn.query_row(
                "SELECT COUNT(*) FROM events WHERE session_id = ?1",
                params![session],
                |row| row.get(0),
            )?,
            _ => self
                .conn
                .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }
}

type RawRow = (String, i64, i64, f64, String, String, String, u32);

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<RawRow>>,
) -> Result<Vec<EngineEvent>> {
    let mut events = Vec::new();
    for row in rows {
        let (session_id, turn_id, seq, ts_monotonic, ts_wall_iso, kind, payload_json, version) =
            row?;
        let kind = EventKind::parse(&kind)
            .ok_or_else(|| Error::Corrupt(format!("unknown event kind: {kind}")))?;
        let ts_wall = DateTime::parse_from_rfc3339(&ts_wall_iso)
            .map_err(|e| Error::Corrupt(format!("bad wall timestamp: {e}")))?
            .to_utc();
        let payload = serde_json::from_str(&payload_json)
            .map_err(|e| Error::Corrupt(format!("bad payload json: {e}")))?;
        events.push(EngineEvent {
            session_id,
            turn_id: turn_id as u64,
            seq: seq as u64,
            ts_monotonic,
            ts_wall,
            kind,
            payload,
            schema_version: version,
        });
    }
    Ok(events)
}

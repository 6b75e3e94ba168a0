use crate::models::{LogKind, LogRecord};
use crate::util::parse_timestamp_ms;
use std::collections::HashSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum EntryId {
    /// Client-side placeholder until the server assigns an id.
    Temp(u64),
    Server(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryState {
    Pending,
    /// Authored here and acknowledged by the server.
    Confirmed,
    /// Came from a server fetch.
    Synced,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LogEntry {
    pub id: EntryId,
    pub project_id: i64,
    pub kind: LogKind,
    pub message: String,
    pub created_at_ms: i64,
    pub state: EntryState,
}

impl LogEntry {
    pub fn from_record(r: LogRecord) -> Self {
        Self {
            id: EntryId::Server(r.id),
            project_id: r.project_id,
            kind: r.log_type,
            message: r.message,
            created_at_ms: r
                .created_at
                .as_deref()
                .and_then(parse_timestamp_ms)
                .unwrap_or(0),
            state: EntryState::Synced,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct LogStreams {
    pub user: Vec<LogEntry>,
    pub system: Vec<LogEntry>,
}

/// Optimistic activity log for one project.
///
/// Entry lifecycle: `append` creates a Pending entry, then exactly one of
/// `confirm` (id rewritten in place) or `rollback` (entry removed).
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ActivityLog {
    entries: Vec<LogEntry>,
    next_temp: u64,
}

impl ActivityLog {
    /// `seed` should come from the clock so temp ids from different
    /// mounts never collide.
    pub fn new(seed: u64) -> Self {
        Self {
            entries: Vec::new(),
            next_temp: seed,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, project_id: i64, kind: LogKind, message: &str, now_ms: i64) -> EntryId {
        let id = EntryId::Temp(self.next_temp);
        self.next_temp += 1;
        self.entries.push(LogEntry {
            id,
            project_id,
            kind,
            message: message.to_string(),
            created_at_ms: now_ms,
            state: EntryState::Pending,
        });
        id
    }

    /// Returns false when the temp entry is gone (rolled back or cleared).
    pub fn confirm(&mut self, temp: EntryId, server_id: i64) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.id == temp) else {
            return false;
        };
        let server = EntryId::Server(server_id);
        if self.entries.iter().any(|e| e.id == server) {
            // A poll already delivered it.
            self.entries.remove(pos);
        } else {
            let e = &mut self.entries[pos];
            e.id = server;
            e.state = EntryState::Confirmed;
        }
        true
    }

    pub fn rollback(&mut self, temp: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| !(e.id == temp && e.is_pending()));
        self.entries.len() != before
    }

    /// Replace server-known entries with a fresh snapshot.
    ///
    /// Pending entries survive. Entries confirmed after the snapshot was
    /// taken (id above anything in it) survive too.
    pub fn merge_server(&mut self, records: Vec<LogRecord>) {
        let fresh: Vec<LogEntry> = records.into_iter().map(LogEntry::from_record).collect();
        let known: HashSet<EntryId> = fresh.iter().map(|e| e.id).collect();
        let max_id = fresh
            .iter()
            .filter_map(|e| match e.id {
                EntryId::Server(id) => Some(id),
                EntryId::Temp(_) => None,
            })
            .max();

        self.entries.retain(|e| match (e.state, e.id) {
            (EntryState::Pending, _) => true,
            (EntryState::Confirmed, EntryId::Server(id)) => {
                !known.contains(&e.id) && max_id.map(|m| id > m).unwrap_or(true)
            }
            _ => false,
        });
        self.entries.extend(fresh);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Deduplicated by id, ordered by creation time, split by kind.
    pub fn streams(&self) -> LogStreams {
        let mut seen = HashSet::new();
        let mut all: Vec<&LogEntry> = self.entries.iter().filter(|e| seen.insert(e.id)).collect();
        all.sort_by_key(|e| e.created_at_ms);

        let mut out = LogStreams::default();
        for e in all {
            match e.kind {
                LogKind::User => out.user.push(e.clone()),
                LogKind::System => out.system.push(e.clone()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, kind: LogKind, message: &str, created_at: &str) -> LogRecord {
        LogRecord {
            id,
            project_id: 1,
            log_type: kind,
            message: message.to_string(),
            created_at: Some(created_at.to_string()),
        }
    }

    fn ids(entries: &[LogEntry]) -> Vec<EntryId> {
        entries.iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_append_is_immediately_visible() {
        let mut log = ActivityLog::new(1000);
        let id = log.append(1, LogKind::User, "note", 5);
        assert_eq!(id, EntryId::Temp(1000));
        let s = log.streams();
        assert_eq!(ids(&s.user), vec![id]);
        assert!(s.user[0].is_pending());
        assert!(s.system.is_empty());
    }

    #[test]
    fn test_rejected_append_disappears_from_both_streams() {
        let mut log = ActivityLog::new(1);
        log.merge_server(vec![record(3, LogKind::System, "boot", "2024-01-01T00:00:00")]);
        let temp = log.append(1, LogKind::User, "will fail", 10);

        assert!(log.rollback(temp));
        let s = log.streams();
        assert!(s.user.iter().all(|e| e.id != temp));
        assert!(s.system.iter().all(|e| e.id != temp));
        assert_eq!(s.system.len(), 1);
        assert!(!log.rollback(temp));
    }

    #[test]
    fn test_confirm_rewrites_id_in_place() {
        let mut log = ActivityLog::new(1);
        let temp = log.append(1, LogKind::User, "hello", 42);
        assert!(log.confirm(temp, 99));

        let s = log.streams();
        assert_eq!(s.user.len(), 1);
        assert_eq!(s.user[0].id, EntryId::Server(99));
        assert_eq!(s.user[0].message, "hello");
        assert_eq!(s.user[0].created_at_ms, 42);
        assert_eq!(s.user[0].state, EntryState::Confirmed);
    }

    #[test]
    fn test_confirm_after_poll_delivered_it_leaves_one_entry() {
        let mut log = ActivityLog::new(1);
        let temp = log.append(1, LogKind::User, "hello", 42);
        log.merge_server(vec![record(99, LogKind::User, "hello", "2024-01-01T00:00:00")]);
        // Pending survives the merge, so the id is briefly shown twice.
        assert_eq!(log.len(), 2);

        assert!(log.confirm(temp, 99));
        let s = log.streams();
        assert_eq!(ids(&s.user), vec![EntryId::Server(99)]);
    }

    #[test]
    fn test_concurrent_appends_resolve_independently() {
        let mut log = ActivityLog::new(1);
        let a = log.append(1, LogKind::User, "a", 10);
        let b = log.append(1, LogKind::User, "b", 20);
        assert_ne!(a, b);

        // b resolves first, a fails.
        log.confirm(b, 7);
        log.rollback(a);
        let s = log.streams();
        assert_eq!(ids(&s.user), vec![EntryId::Server(7)]);
    }

    #[test]
    fn test_streams_sorted_by_created_at() {
        let mut log = ActivityLog::new(1);
        log.merge_server(vec![
            record(2, LogKind::User, "later", "2024-01-01T00:00:10"),
            record(1, LogKind::User, "earlier", "2024-01-01T00:00:05"),
        ]);
        let s = log.streams();
        let messages: Vec<_> = s.user.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["earlier", "later"]);
    }

    #[test]
    fn test_duplicate_ids_render_once() {
        let mut log = ActivityLog::new(1);
        log.merge_server(vec![
            record(1, LogKind::User, "a", "2024-01-01T00:00:01"),
            record(1, LogKind::User, "a", "2024-01-01T00:00:01"),
            record(2, LogKind::System, "b", "2024-01-01T00:00:02"),
            record(2, LogKind::System, "b", "2024-01-01T00:00:02"),
            record(3, LogKind::System, "c", "2024-01-01T00:00:03"),
        ]);
        let s = log.streams();
        let mut all = ids(&s.user);
        all.extend(ids(&s.system));
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_merge_drops_stale_synced_entries() {
        let mut log = ActivityLog::new(1);
        log.merge_server(vec![record(1, LogKind::User, "a", "2024-01-01T00:00:01")]);
        log.merge_server(vec![record(2, LogKind::User, "b", "2024-01-01T00:00:02")]);
        assert_eq!(ids(&log.streams().user), vec![EntryId::Server(2)]);
    }

    #[test]
    fn test_confirmed_entry_survives_older_snapshot() {
        let mut log = ActivityLog::new(1);
        let temp = log.append(1, LogKind::User, "new", 50);
        log.confirm(temp, 10);

        // Snapshot fetched before the create landed.
        log.merge_server(vec![record(9, LogKind::User, "old", "2024-01-01T00:00:00")]);
        let user = ids(&log.streams().user);
        assert!(user.contains(&EntryId::Server(10)));
        assert!(user.contains(&EntryId::Server(9)));
    }

    #[test]
    fn test_confirm_after_clear_is_noop() {
        let mut log = ActivityLog::new(1);
        let temp = log.append(1, LogKind::User, "x", 1);
        log.clear();
        assert!(!log.confirm(temp, 5));
        assert!(log.is_empty());
    }
}

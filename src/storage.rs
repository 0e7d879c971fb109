use crate::error::PersistenceError;
use crate::types::{EventRecord, HasIdentity, IdentityKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// What to do when one batch carries the same new identity key more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Only the first record carrying a new key is appended.
    #[default]
    FirstWins,
    /// Append every incoming record whose key is not already stored, repeats included.
    KeepAll,
}

#[derive(Debug, Clone)]
pub struct Merged<T> {
    pub merged: Vec<T>,
    pub added: usize,
}

/// Appends the `incoming` entries whose identity key is not in `existing`.
///
/// Existing entries keep their order and are never dropped; survivors follow in
/// their incoming order.
pub fn merge<T: HasIdentity>(
    existing: Vec<T>,
    incoming: Vec<T>,
    policy: DuplicatePolicy,
) -> Merged<T> {
    let mut known: HashSet<IdentityKey> =
        existing.iter().map(HasIdentity::identity_key).collect();
    let mut merged = existing;
    let before = merged.len();

    for entry in incoming {
        let key = entry.identity_key();
        if known.contains(&key) {
            debug!("Skipping known event: {} ({})", key.title, key.date);
            continue;
        }
        if policy == DuplicatePolicy::FirstWins {
            known.insert(key);
        }
        merged.push(entry);
    }

    let added = merged.len() - before;
    Merged { merged, added }
}

/// Result of one read-merge-write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    /// Entries in the collection after the merge
    pub total: usize,
}

/// Backing storage for the persisted collection.
///
/// Entries are kept as raw JSON objects so keys written by older tools survive a merge.
pub trait CollectionStore: Send + Sync {
    /// Every stored entry, in stored order. A store that was never written is empty.
    fn load(&self) -> Result<Vec<Value>, PersistenceError>;

    /// Replaces the whole collection. Either every entry is written or nothing changes.
    fn replace(&self, entries: &[Value]) -> Result<(), PersistenceError>;
}

/// JSON array on disk, replaced atomically through a sibling temporary file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_err(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl CollectionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Value>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| PersistenceError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| PersistenceError::Decode {
            path: self.path.clone(),
            source: e,
        })
    }

    fn replace(&self, entries: &[Value]) -> Result<(), PersistenceError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut ser).map_err(PersistenceError::Encode)?;
        buf.push(b'\n');

        // Same directory as the target so the final rename stays on one filesystem
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.write_err(e))?;
        tmp.write_all(&buf).map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        debug!("Wrote {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// In-memory store for development/testing
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<Vec<Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<Value>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    // A writer that panicked mid-replace cannot leave a half-written Vec behind
    fn guard(&self) -> MutexGuard<'_, Vec<Value>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored entries decoded as records; entries that do not decode are left out.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.guard()
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }
}

impl CollectionStore for InMemoryStore {
    fn load(&self) -> Result<Vec<Value>, PersistenceError> {
        Ok(self.guard().clone())
    }

    fn replace(&self, entries: &[Value]) -> Result<(), PersistenceError> {
        *self.guard() = entries.to_vec();
        Ok(())
    }
}

/// Owns the read-merge-write cycle over a [`CollectionStore`].
///
/// Single writer: the pipeline calls [`DedupStore::merge_and_persist`] once, after every
/// worker has finished.
pub struct DedupStore {
    store: Arc<dyn CollectionStore>,
    policy: DuplicatePolicy,
}

impl DedupStore {
    pub fn new(store: Arc<dyn CollectionStore>, policy: DuplicatePolicy) -> Self {
        Self { store, policy }
    }

    /// Appends the new events and writes the collection back.
    ///
    /// Stored entries are carried through untouched. When nothing new is added the
    /// store is not written at all.
    pub fn merge_and_persist(
        &self,
        incoming: Vec<EventRecord>,
    ) -> Result<MergeOutcome, PersistenceError> {
        let existing = self.store.load()?;
        let existing_len = existing.len();
        let incoming = incoming
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PersistenceError::Encode)?;

        let Merged { merged, added } = merge(existing, incoming, self.policy);
        if added > 0 {
            self.store.replace(&merged)?;
        }

        info!(
            "Merged {} new events into {} existing ({} total)",
            added,
            existing_len,
            merged.len()
        );
        Ok(MergeOutcome {
            added,
            total: merged.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::UNKNOWN;
    use serde_json::json;
    use tempfile::tempdir;

    fn event(title: &str, date: &str, location: &str) -> EventRecord {
        EventRecord {
            title: title.to_string(),
            description_source: UNKNOWN.to_string(),
            description_generated: None,
            date: date.to_string(),
            schedule: UNKNOWN.to_string(),
            location: location.to_string(),
            address: UNKNOWN.to_string(),
            prices: vec![],
        }
    }

    fn entry(title: &str, date: &str, location: &str) -> Value {
        serde_json::to_value(event(title, date, location)).unwrap()
    }

    fn titles(records: &[EventRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn appends_only_unknown_keys_in_order() {
        let existing = vec![event("B", "1/01", "X"), event("A", "2/01", "X")];
        let incoming = vec![
            event("C", "3/01", "X"),
            event("A", "2/01", "X"),
            event("D", "4/01", "X"),
        ];
        let outcome = merge(existing, incoming, DuplicatePolicy::KeepAll);
        assert_eq!(outcome.added, 2);
        assert_eq!(titles(&outcome.merged), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn identity_ignores_non_key_fields() {
        let mut changed = event("A", "2/01", "X");
        changed.prices = vec!["10 €".to_string()];
        changed.description_generated = Some("nuovo".to_string());
        let outcome = merge(vec![event("A", "2/01", "X")], vec![changed], DuplicatePolicy::KeepAll);
        assert_eq!(outcome.added, 0);
        assert!(outcome.merged[0].prices.is_empty());
    }

    #[test]
    fn raw_and_normalized_dates_are_different_keys() {
        let outcome = merge(
            vec![event("A", "5 Mar", "X")],
            vec![event("A", "5/03", "X")],
            DuplicatePolicy::KeepAll,
        );
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn batch_duplicates_follow_policy() {
        let incoming = vec![event("N", "1/02", "Y"), event("N", "1/02", "Y")];

        let keep_all = merge(vec![], incoming.clone(), DuplicatePolicy::KeepAll);
        assert_eq!(keep_all.added, 2);

        let first_wins = merge(vec![], incoming, DuplicatePolicy::FirstWins);
        assert_eq!(first_wins.added, 1);
    }

    #[test]
    fn default_policy_never_stores_a_key_twice() {
        let store = Arc::new(InMemoryStore::new());
        let dedup = DedupStore::new(store.clone(), DuplicatePolicy::default());
        let r = event("N", "1/02", "Y");

        let outcome = dedup.merge_and_persist(vec![r.clone(), r]).unwrap();
        assert_eq!(outcome, MergeOutcome { added: 1, total: 1 });
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn second_merge_is_idempotent() {
        let store = Arc::new(InMemoryStore::with_entries(vec![entry("A", "1/01", "X")]));
        let dedup = DedupStore::new(store.clone(), DuplicatePolicy::KeepAll);
        let incoming = vec![event("B", "2/01", "X"), event("C", "3/01", "Y")];

        assert_eq!(dedup.merge_and_persist(incoming.clone()).unwrap().added, 2);
        let after_first = store.load().unwrap();

        let second = dedup.merge_and_persist(incoming).unwrap();
        assert_eq!(second, MergeOutcome { added: 0, total: 3 });
        assert_eq!(store.load().unwrap(), after_first);
    }

    const HISTORICAL: &str = r#"[
  {
    "Titolo evento": "Palio di Siena",
    "Descrizione di Virgilio.it": "N/A",
    "Data": "2/07",
    "Orario": "N/A",
    "Luogo": "Piazza del Campo",
    "Prezzo": "N/A",
    "Link": "https://www.virgilio.it/italia/siena/eventi/palio"
  }
]"#;

    #[test]
    fn merging_nothing_leaves_historical_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Eventi_Virgilio.it.json");
        fs::write(&path, HISTORICAL).unwrap();
        let dedup = DedupStore::new(Arc::new(JsonFileStore::new(&path)), DuplicatePolicy::default());

        let known = event("Palio di Siena", "2/07", "Piazza del Campo");
        let outcome = dedup.merge_and_persist(vec![known]).unwrap();
        assert_eq!(outcome, MergeOutcome { added: 0, total: 1 });
        assert_eq!(fs::read_to_string(&path).unwrap(), HISTORICAL);

        assert_eq!(dedup.merge_and_persist(vec![]).unwrap().added, 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), HISTORICAL);
    }

    #[test]
    fn appending_keeps_stored_entries_as_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Eventi_Virgilio.it.json");
        fs::write(&path, HISTORICAL).unwrap();
        let store = JsonFileStore::new(&path);
        let dedup = DedupStore::new(Arc::new(JsonFileStore::new(&path)), DuplicatePolicy::default());

        let outcome = dedup.merge_and_persist(vec![event("Jazz", "5/03", "Logge")]).unwrap();
        assert_eq!(outcome, MergeOutcome { added: 1, total: 2 });

        let stored = store.load().unwrap();
        let old: Value = serde_json::from_str::<Vec<Value>>(HISTORICAL).unwrap().remove(0);
        assert_eq!(stored[0], old);
        assert_eq!(stored[0]["Prezzo"], json!("N/A"));
        assert!(stored[0].get("Indirizzo").is_none());
        assert_eq!(stored[1]["Titolo evento"], json!("Jazz"));

        // key order of the stored entry is preserved
        let keys: Vec<&String> = stored[0].as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "Titolo evento");
        assert_eq!(keys[6], "Link");
    }

    #[test]
    fn file_store_round_trips_and_creates_on_first_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eventi.json");
        let store = JsonFileStore::new(&path);

        assert!(store.load().unwrap().is_empty());
        assert!(!path.exists());

        let entries = vec![entry("Jazz", "Dal 2/04 al 10/04", "Piazza Salimbeni")];
        store.replace(&entries).unwrap();
        assert_eq!(store.load().unwrap(), entries);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n    {\n        \"Titolo evento\": \"Jazz\""));

        // only the collection itself is left behind
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn failed_write_reports_error() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("missing").join("eventi.json"));
        let err = store.replace(&[entry("A", "1/01", "X")]).unwrap_err();
        assert!(matches!(err, PersistenceError::Write { .. }));
    }

    #[test]
    fn failed_rename_leaves_target_and_no_temp_file() {
        let dir = tempdir().unwrap();
        // a non-empty directory cannot be renamed over
        let target = dir.path().join("eventi.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), "kept").unwrap();

        let store = JsonFileStore::new(&target);
        let err = store.replace(&[entry("A", "1/01", "X")]).unwrap_err();
        assert!(matches!(err, PersistenceError::Write { .. }));

        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "kept");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("eventi.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn failed_persist_keeps_previous_file_contents() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("eventi.json");
        let store = JsonFileStore::new(&path);
        let before = vec![entry("A", "1/01", "X")];
        store.replace(&before).unwrap();
        let bytes_before = fs::read(&path).unwrap();

        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o555)).unwrap();
        // privileged users ignore directory permissions, nothing to check then
        let canary = dir.path().join("canary");
        if fs::write(&canary, "").is_ok() {
            fs::remove_file(&canary).unwrap();
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let dedup = DedupStore::new(Arc::new(JsonFileStore::new(&path)), DuplicatePolicy::default());
        let result = dedup.merge_and_persist(vec![event("B", "2/01", "X")]);
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(PersistenceError::Write { .. })));
        assert_eq!(store.load().unwrap(), before);
        assert_eq!(fs::read(&path).unwrap(), bytes_before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eventi.json");
        fs::write(&path, "{ not an array").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
    }

    struct BrokenStore {
        inner: InMemoryStore,
    }

    impl CollectionStore for BrokenStore {
        fn load(&self) -> Result<Vec<Value>, PersistenceError> {
            self.inner.load()
        }

        fn replace(&self, _entries: &[Value]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Write {
                path: PathBuf::from("broken"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            })
        }
    }

    #[test]
    fn failed_persist_surfaces_error() {
        let before = vec![entry("A", "1/01", "X")];
        let store = Arc::new(BrokenStore {
            inner: InMemoryStore::with_entries(before.clone()),
        });
        let dedup = DedupStore::new(store.clone(), DuplicatePolicy::default());

        assert!(dedup.merge_and_persist(vec![event("B", "2/01", "X")]).is_err());
        assert_eq!(store.inner.load().unwrap(), before);
    }

    #[test]
    fn poisoned_memory_store_still_writes() {
        let store = Arc::new(InMemoryStore::with_entries(vec![entry("A", "1/01", "X")]));
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(store.entries.is_poisoned());

        store.replace(&[entry("B", "2/01", "X")]).unwrap();
        assert_eq!(titles(&store.snapshot()), vec!["B"]);
    }
}

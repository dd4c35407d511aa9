//! Durable, schema-tolerant persistence of the member list.
//!
//! Three on-disk generations are understood:
//! - bare list: `["@a", "@b"]`
//! - members key: `{"members": ["@a", ...]}` (entries may already be records)
//! - users key (current): `{"users": [{"type": "username", "value": "@a"}, ...]}`
//!
//! Reads fail open: a missing, corrupt or unrecognized file loads as an empty
//! list and is logged. Writes always produce the users-key shape.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{member::Member, Result};

/// Historical on-disk schema generations, oldest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Generation {
    BareList,
    MembersKey,
    UsersKey,
}

impl Generation {
    pub const CURRENT: Generation = Generation::UsersKey;

    /// Classify a parsed document. `users` wins over `members` when both exist.
    pub fn detect(doc: &Value) -> Option<Self> {
        match doc {
            Value::Array(_) => Some(Generation::BareList),
            Value::Object(map) if map.contains_key("users") => Some(Generation::UsersKey),
            Value::Object(map) if map.contains_key("members") => Some(Generation::MembersKey),
            _ => None,
        }
    }
}

/// A successfully decoded document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub generation: Generation,
    pub members: Vec<Member>,
}

/// Decode a parsed document of any known generation.
///
/// Returns `None` when the shape is not recognized. Individual entries that
/// cannot be decoded are skipped.
pub fn decode(doc: &Value) -> Option<Decoded> {
    let generation = Generation::detect(doc)?;
    let entries = match (generation, doc) {
        (Generation::BareList, Value::Array(entries)) => entries,
        (Generation::MembersKey, Value::Object(map)) => map.get("members")?.as_array()?,
        (Generation::UsersKey, Value::Object(map)) => map.get("users")?.as_array()?,
        _ => return None,
    };

    let members = match generation {
        Generation::BareList => decode_bare_list(entries),
        Generation::MembersKey => decode_members_key(entries),
        Generation::UsersKey => decode_users_key(entries),
    };

    Some(Decoded {
        generation,
        members: dedup_identities(members),
    })
}

fn decode_bare_list(entries: &[Value]) -> Vec<Member> {
    entries.iter().filter_map(decode_legacy_entry).collect()
}

fn decode_members_key(entries: &[Value]) -> Vec<Member> {
    entries.iter().filter_map(decode_legacy_entry).collect()
}

fn decode_users_key(entries: &[Value]) -> Vec<Member> {
    entries.iter().filter_map(decode_record).collect()
}

/// Legacy entries are handle scalars (strings, or numbers from hand-edited files),
/// or records written by a newer build.
fn decode_legacy_entry(entry: &Value) -> Option<Member> {
    match entry {
        Value::String(s) if !s.trim().is_empty() => Some(Member::username(s)),
        Value::Number(n) => Some(Member::username(&n.to_string())),
        Value::Object(_) => decode_record(entry),
        other => {
            tracing::warn!(entry = %other, "skipping legacy member entry");
            None
        }
    }
}

fn decode_record(entry: &Value) -> Option<Member> {
    match serde_json::from_value::<Member>(entry.clone()) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(entry = %entry, error = %e, "skipping undecodable member record");
            None
        }
    }
}

/// Keep the first entry for each identity; later copies are dropped.
fn dedup_identities(members: Vec<Member>) -> Vec<Member> {
    let mut out: Vec<Member> = Vec::with_capacity(members.len());
    for m in members {
        if out.iter().any(|kept| kept.same_identity(&m)) {
            tracing::warn!(member = %m, "dropping duplicate member entry");
            continue;
        }
        out.push(m);
    }
    out
}

#[derive(Serialize)]
struct UsersFile<'a> {
    users: &'a [Member],
}

/// Serialize members in the current shape: 4-space pretty JSON, trailing newline.
pub fn encode(members: &[Member]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    UsersFile { users: members }.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// What `migrate_on_startup` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Migration {
    /// No file existed; an empty current-shape file was written.
    Created,
    /// An older generation was rewritten in the current shape.
    Upgraded { from: Generation },
    /// Already current; nothing written.
    Current,
    /// The file exists but could not be read or decoded; left untouched.
    Unrecognized,
}

enum ReadOutcome {
    Missing,
    Unreadable,
    Decoded(Decoded),
}

/// Registry Store backed by a single JSON file.
#[derive(Clone, Debug)]
pub struct MemberStore {
    path: PathBuf,
}

impl MemberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the member list. Never fails; see module docs.
    pub fn load(&self) -> Vec<Member> {
        match self.read() {
            ReadOutcome::Decoded(d) => d.members,
            ReadOutcome::Missing | ReadOutcome::Unreadable => Vec::new(),
        }
    }

    /// Overwrite the file with `members` in the current shape.
    pub fn save(&self, members: &[Member]) -> Result<()> {
        let bytes = encode(members)?;

        // Write a sibling temp file and rename it over the target, so readers
        // never observe a truncated file.
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        tracing::debug!(path = %self.path.display(), count = members.len(), "saved members");
        Ok(())
    }

    /// One-way upgrade of the file to the current generation.
    pub fn migrate_on_startup(&self) -> Result<Migration> {
        match self.read() {
            ReadOutcome::Missing => {
                self.save(&[])?;
                tracing::info!(path = %self.path.display(), "created empty members file");
                Ok(Migration::Created)
            }
            ReadOutcome::Unreadable => Ok(Migration::Unrecognized),
            ReadOutcome::Decoded(d) if d.generation == Generation::CURRENT => {
                Ok(Migration::Current)
            }
            ReadOutcome::Decoded(d) => {
                self.save(&d.members)?;
                tracing::info!(
                    path = %self.path.display(),
                    from = ?d.generation,
                    count = d.members.len(),
                    "upgraded members file"
                );
                Ok(Migration::Upgraded { from: d.generation })
            }
        }
    }

    fn read(&self) -> ReadOutcome {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "members file not found");
                return ReadOutcome::Missing;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read members file"
                );
                return ReadOutcome::Unreadable;
            }
        };

        let doc: Value = match serde_json::from_str(&txt) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "members file is not valid JSON"
                );
                return ReadOutcome::Unreadable;
            }
        };

        match decode(&doc) {
            Some(d) => ReadOutcome::Decoded(d),
            None => {
                tracing::warn!(
                    path = %self.path.display(),
                    "members file has an unrecognized shape"
                );
                ReadOutcome::Unreadable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture(name: &str) -> String {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name);
        fs::read_to_string(path).unwrap()
    }

    fn store_with(dir: &tempfile::TempDir, contents: &str) -> MemberStore {
        let path = dir.path().join("members.json");
        fs::write(&path, contents).unwrap();
        MemberStore::new(path)
    }

    fn handles(names: &[&str]) -> Vec<Member> {
        names.iter().map(|n| Member::username(n)).collect()
    }

    #[test]
    fn detects_each_generation() {
        assert_eq!(
            Generation::detect(&json!(["@a"])),
            Some(Generation::BareList)
        );
        assert_eq!(
            Generation::detect(&json!({"members": []})),
            Some(Generation::MembersKey)
        );
        assert_eq!(
            Generation::detect(&json!({"users": [], "members": ["@x"]})),
            Some(Generation::UsersKey)
        );
        assert_eq!(Generation::detect(&json!({"other": []})), None);
        assert_eq!(Generation::detect(&json!("@a")), None);
    }

    #[test]
    fn golden_bare_list() {
        let d = decode(&serde_json::from_str(&fixture("members.gen1.json")).unwrap()).unwrap();
        assert_eq!(d.generation, Generation::BareList);
        assert_eq!(d.members, handles(&["@alice", "@bob", "@carol"]));
    }

    #[test]
    fn golden_members_key() {
        let d = decode(&serde_json::from_str(&fixture("members.gen2.json")).unwrap()).unwrap();
        assert_eq!(d.generation, Generation::MembersKey);
        assert_eq!(d.members, handles(&["@alice", "@bob", "@carol"]));
    }

    #[test]
    fn golden_members_key_with_records_passes_them_through() {
        let d =
            decode(&serde_json::from_str(&fixture("members.gen2-mixed.json")).unwrap()).unwrap();
        assert_eq!(
            d.members,
            vec![
                Member::username("@alice"),
                Member::identified(42, "Dana"),
                Member::username("@17"),
                Member::username("@erin"),
            ]
        );
    }

    #[test]
    fn golden_bare_list_with_duplicates_keeps_first_of_each() {
        let d =
            decode(&serde_json::from_str(&fixture("members.gen1-dupes.json")).unwrap()).unwrap();
        assert_eq!(d.generation, Generation::BareList);
        // Numbers are handle scalars; booleans and nulls are skipped.
        assert_eq!(d.members, handles(&["@a", "@bravo", "@4242"]));
    }

    #[test]
    fn users_key_duplicates_are_dropped() {
        let doc = json!({"users": [
            {"type": "id", "user_id": 1, "name": "First"},
            {"type": "username", "value": "@same"},
            {"type": "id", "user_id": 1, "name": "Second"},
            {"type": "username", "value": "@same"}
        ]});
        assert_eq!(
            decode(&doc).unwrap().members,
            vec![Member::identified(1, "First"), Member::username("@same")]
        );
    }

    #[test]
    fn migrating_duplicates_persists_a_single_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, r#"["@a", "a"]"#);
        assert_eq!(
            store.migrate_on_startup().unwrap(),
            Migration::Upgraded {
                from: Generation::BareList
            }
        );
        assert_eq!(store.load(), handles(&["@a"]));
        let doc: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(doc, json!({"users": [{"type": "username", "value": "@a"}]}));
    }

    #[test]
    fn golden_users_key() {
        let d = decode(&serde_json::from_str(&fixture("members.gen3.json")).unwrap()).unwrap();
        assert_eq!(d.generation, Generation::UsersKey);
        assert_eq!(
            d.members,
            vec![
                Member::username("@alice"),
                Member::identified(123456789, "Борис"),
            ]
        );
    }

    #[test]
    fn users_key_skips_unknown_record_types() {
        let doc = json!({"users": [
            {"type": "username", "value": "@a"},
            {"type": "email", "value": "a@example.com"},
            {"type": "id", "user_id": 5},
            {"type": "id", "user_id": 6, "name": "Six"}
        ]});
        assert_eq!(
            decode(&doc).unwrap().members,
            vec![Member::username("@a"), Member::identified(6, "Six")]
        );
    }

    #[test]
    fn non_list_payload_is_unrecognized() {
        assert_eq!(decode(&json!({"users": "oops"})), None);
        assert_eq!(decode(&json!({"members": {"a": 1}})), None);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_with(&dir, "{not json").load().is_empty());
        assert!(store_with(&dir, "42").load().is_empty());
        assert!(store_with(&dir, "{\"foo\": [\"@a\"]}").load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("members.json"));
        let members = vec![
            Member::username("@a"),
            Member::identified(-100, "Ünïcode & <tags>"),
            Member::username("@b"),
        ];
        store.save(&members).unwrap();
        assert_eq!(store.load(), members);
    }

    #[test]
    fn current_file_round_trips_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let original = fixture("members.gen3.json");
        let store = store_with(&dir, &original);

        assert_eq!(store.migrate_on_startup().unwrap(), Migration::Current);
        store.save(&store.load()).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), original);
    }

    #[test]
    fn migrating_legacy_fixtures_is_idempotent() {
        for name in ["members.gen1.json", "members.gen2.json"] {
            let dir = tempfile::tempdir().unwrap();
            let store = store_with(&dir, &fixture(name));
            let once = store.load();

            assert!(matches!(
                store.migrate_on_startup().unwrap(),
                Migration::Upgraded { .. }
            ));
            let after_first_save = fs::read_to_string(store.path()).unwrap();
            assert_eq!(store.load(), once, "{name}");

            assert_eq!(store.migrate_on_startup().unwrap(), Migration::Current);
            store.save(&store.load()).unwrap();
            assert_eq!(fs::read_to_string(store.path()).unwrap(), after_first_save);
        }
    }

    #[test]
    fn upgrade_writes_users_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, r#"["@x", "y"]"#);
        assert_eq!(
            store.migrate_on_startup().unwrap(),
            Migration::Upgraded {
                from: Generation::BareList
            }
        );
        let doc: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(
            doc,
            json!({"users": [
                {"type": "username", "value": "@x"},
                {"type": "username", "value": "@y"}
            ]})
        );
    }

    #[test]
    fn migrate_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("members.json"));
        assert_eq!(store.migrate_on_startup().unwrap(), Migration::Created);
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "{\n    \"users\": []\n}\n"
        );
    }

    #[test]
    fn migrate_leaves_corrupt_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "{broken");
        assert_eq!(store.migrate_on_startup().unwrap(), Migration::Unrecognized);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{broken");
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("members.json"));
        store.save(&handles(&["@a"])).unwrap();
        store.save(&handles(&["@a", "@b"])).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["members.json".to_string()]);
        assert_eq!(store.load(), handles(&["@a", "@b"]));
    }

    #[test]
    fn readers_never_see_a_partial_file_during_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("members.json"));
        let members = handles(&["@alpha", "@bravo", "@charlie"]);
        store.save(&members).unwrap();

        let writer = {
            let store = store.clone();
            let members = members.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    store.save(&members).unwrap();
                }
            })
        };
        for _ in 0..200 {
            assert_eq!(store.load(), members);
        }
        writer.join().unwrap();
    }

    #[test]
    fn save_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemberStore::new(dir.path().join("no-such-dir").join("members.json"));
        assert!(matches!(
            store.save(&handles(&["@a"])),
            Err(crate::Error::Io(_))
        ));
    }
}

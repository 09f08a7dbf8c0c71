//! The on-disk shape of the datastore: every user, every post and both id counters in one
//! JSON document. Map keys are decimal ids; the `id` inside each entity is what counts.
use crate::datastore::structs::{Post, PostId, User, UserId};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A snapshot as read back from disk.
#[derive(Deserialize, Debug, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub users: BTreeMap<String, User>,
    #[serde(default)]
    pub posts: BTreeMap<String, Post>,
    #[serde(default = "first_id")]
    pub next_user_id: u64,
    #[serde(default = "first_id")]
    pub next_post_id: u64,
}

/// A snapshot borrowed from the live maps, for writing.
#[derive(Serialize, Debug)]
pub struct SnapshotRef<'a> {
    pub users: &'a BTreeMap<UserId, User>,
    pub posts: &'a BTreeMap<PostId, Post>,
    pub next_user_id: u64,
    pub next_post_id: u64,
}

pub fn first_id() -> u64 {
    1
}

/// Read and parse the snapshot at `path`. `Ok(None)` means there is no file yet.
pub fn read(path: &Path) -> anyhow::Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("couldn't read snapshot {}", path.display()))?;
    let snapshot = serde_json::from_str(&contents)
        .with_context(|| format!("couldn't parse snapshot {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Replace the snapshot at `path`. The document is written to a sibling temp file and renamed
/// over the old one, so readers see either the previous snapshot or the new one.
pub fn write(path: &Path, snapshot: &SnapshotRef<'_>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("couldn't create directory {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(snapshot)?;
    let tmp = temp_path(path);
    let result = replace_with(&tmp, path, &data);
    if result.is_err() {
        // Whatever made it to the temp file is useless now.
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn replace_with(tmp: &Path, path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut file =
        fs::File::create(tmp).with_context(|| format!("couldn't create {}", tmp.display()))?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path).with_context(|| format!("couldn't replace snapshot {}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

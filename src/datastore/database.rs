use crate::datastore::snapshot::{self, Snapshot, SnapshotRef};
use crate::datastore::structs::{Post, PostId, PostUpdate, User, UserId, UserUpdate};
use crate::metrics;
use crate::twoface::{Cause, DescribeErr, ExternalError, Fallible};
use anyhow::{anyhow, Context};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

/// What happened when the datastore read its snapshot at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStatus {
    /// No snapshot existed, so the store started empty.
    Missing,
    /// The snapshot was loaded.
    Restored { users: usize, posts: usize },
    /// A snapshot existed but couldn't be read. The store started empty anyway, and the next
    /// write will replace the broken file.
    StartedEmpty { reason: String },
}

const IDS_EXHAUSTED: ExternalError = ExternalError {
    cause: Cause::ServerError,
    text: "No ids left",
};

const PERSIST_FAILED: ExternalError = ExternalError {
    cause: Cause::ServerError,
    text: "Could not save data",
};

/// In-memory users and posts, written through to a JSON snapshot file after every change.
///
/// Ids are handed out in increasing order, so iterating the maps yields entities in the
/// order they were created. Nothing in here is synchronised; see `SharedStore` for that.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    users: BTreeMap<UserId, User>,
    posts: BTreeMap<PostId, Post>,
    next_user_id: UserId,
    next_post_id: PostId,
    restore_status: RestoreStatus,
}

impl Database {
    /// Open the datastore backed by `path`, loading its snapshot if there is one.
    /// Never fails: an unreadable snapshot is logged and recorded in `restore_status`.
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let mut db = Self {
            path: path.into(),
            users: BTreeMap::new(),
            posts: BTreeMap::new(),
            next_user_id: snapshot::first_id(),
            next_post_id: snapshot::first_id(),
            restore_status: RestoreStatus::Missing,
        };
        let loaded = snapshot::read(&db.path).and_then(|found| found.map(|s| db.load(s)).transpose());
        let status = match loaded {
            Ok(None) => {
                info!(path = %db.path.display(), "no snapshot found, starting empty");
                RestoreStatus::Missing
            }
            Ok(Some(())) => {
                info!(
                    path = %db.path.display(),
                    users = db.users.len(),
                    posts = db.posts.len(),
                    "restored snapshot"
                );
                RestoreStatus::Restored {
                    users: db.users.len(),
                    posts: db.posts.len(),
                }
            }
            Err(e) => {
                error!(path = %db.path.display(), "error loading snapshot: {:#}", e);
                RestoreStatus::StartedEmpty {
                    reason: format!("{:#}", e),
                }
            }
        };
        db.restore_status = status;
        db.update_gauges();
        db
    }

    /// Replace the in-memory state with `snapshot`. Nothing changes if it is rejected.
    fn load(&mut self, snapshot: Snapshot) -> anyhow::Result<()> {
        // The id inside each record wins over the map key.
        let users: BTreeMap<UserId, User> =
            snapshot.users.into_values().map(|u| (u.id, u)).collect();
        let mut posts: BTreeMap<PostId, Post> =
            snapshot.posts.into_values().map(|p| (p.id, p)).collect();
        for post in posts.values_mut() {
            let mut seen = BTreeSet::new();
            post.likes.retain(|&user_id| seen.insert(user_id));
        }
        let next_user_id = id_after(users.keys().next_back(), snapshot.next_user_id)
            .context("snapshot holds the largest possible user id")?;
        let next_post_id = id_after(posts.keys().next_back(), snapshot.next_post_id)
            .context("snapshot holds the largest possible post id")?;
        self.users = users;
        self.posts = posts;
        self.next_user_id = next_user_id;
        self.next_post_id = next_post_id;
        Ok(())
    }

    pub fn restore_status(&self) -> &RestoreStatus {
        &self.restore_status
    }

    /// Reserve the next user id. Ids are never handed out twice, even after deletes.
    pub fn next_user_id(&mut self) -> Fallible<UserId> {
        take_id(&mut self.next_user_id)
    }

    /// Reserve the next post id. Ids are never handed out twice, even after deletes.
    pub fn next_post_id(&mut self) -> Fallible<PostId> {
        take_id(&mut self.next_post_id)
    }

    /// Insert or replace a user by id.
    pub fn save_user(&mut self, user: User) -> Fallible<User> {
        self.users.insert(user.id, user.clone());
        self.persist()?;
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn get_all_users(&self) -> Vec<User> {
        self.users.values().cloned().collect()
    }

    pub fn update_user(&mut self, id: UserId, update: UserUpdate) -> Fallible<Option<User>> {
        let Some(user) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        user.apply(update);
        let user = user.clone();
        self.persist()?;
        Ok(Some(user))
    }

    /// Remove the user and every post they wrote.
    pub fn delete_user(&mut self, id: UserId) -> Fallible<bool> {
        if self.users.remove(&id).is_none() {
            return Ok(false);
        }
        let before = self.posts.len();
        self.posts.retain(|_, post| post.author_id != id);
        debug!(user_id = id, posts = before - self.posts.len(), "cascade deleted posts");
        self.persist()?;
        Ok(true)
    }

    /// Insert or replace a post by id.
    pub fn save_post(&mut self, post: Post) -> Fallible<Post> {
        self.posts.insert(post.id, post.clone());
        self.persist()?;
        Ok(post)
    }

    /// Look up a post. Every hit counts as a view, and the new count is saved.
    pub fn get_post(&mut self, id: PostId) -> Fallible<Option<Post>> {
        let Some(post) = self.posts.get_mut(&id) else {
            return Ok(None);
        };
        post.views += 1;
        let post = post.clone();
        self.persist()?;
        Ok(Some(post))
    }

    pub fn get_all_posts(&self) -> Vec<Post> {
        self.posts.values().cloned().collect()
    }

    pub fn update_post(&mut self, id: PostId, update: PostUpdate) -> Fallible<Option<Post>> {
        let Some(post) = self.posts.get_mut(&id) else {
            return Ok(None);
        };
        post.apply(update);
        let post = post.clone();
        self.persist()?;
        Ok(Some(post))
    }

    pub fn delete_post(&mut self, id: PostId) -> Fallible<bool> {
        if self.posts.remove(&id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Returns false if the post doesn't exist or the user already liked it.
    pub fn like_post(&mut self, post_id: PostId, user_id: UserId) -> Fallible<bool> {
        match self.posts.get_mut(&post_id) {
            Some(post) if !post.is_liked_by(user_id) => post.likes.push(user_id),
            _ => return Ok(false),
        }
        self.persist()?;
        Ok(true)
    }

    /// Returns false if the post doesn't exist or the user hadn't liked it.
    pub fn unlike_post(&mut self, post_id: PostId, user_id: UserId) -> Fallible<bool> {
        match self.posts.get_mut(&post_id) {
            Some(post) if post.is_liked_by(user_id) => post.likes.retain(|&id| id != user_id),
            _ => return Ok(false),
        }
        self.persist()?;
        Ok(true)
    }

    /// Write the whole datastore to its snapshot file.
    pub fn persist(&self) -> Fallible<()> {
        let start = Instant::now();
        let result = snapshot::write(
            &self.path,
            &SnapshotRef {
                users: &self.users,
                posts: &self.posts,
                next_user_id: self.next_user_id,
                next_post_id: self.next_post_id,
            },
        );
        metrics::PERSIST_SECS.observe(start.elapsed().as_secs_f64());
        self.update_gauges();
        if let Err(e) = &result {
            metrics::PERSIST_FAILURES.inc();
            error!(path = %self.path.display(), "couldn't save snapshot: {:#}", e);
        } else {
            debug!(path = %self.path.display(), "saved snapshot");
        }
        result.describe_err(PERSIST_FAILED)
    }

    fn update_gauges(&self) {
        metrics::STORED_USERS.set(self.users.len() as i64);
        metrics::STORED_POSTS.set(self.posts.len() as i64);
    }
}

/// The counter to resume from: the stored one, unless it would reissue an existing id.
/// `None` if the largest existing id has no successor.
fn id_after(max_id: Option<&u64>, stored: u64) -> Option<u64> {
    match max_id {
        Some(&max_id) => max_id.checked_add(1).map(|next| next.max(stored)),
        None => Some(stored),
    }
}

/// Hand out `counter` and advance it. The last representable id is never handed out,
/// so the counter can always move past whatever it returned.
fn take_id(counter: &mut u64) -> Fallible<u64> {
    let id = *counter;
    *counter = id
        .checked_add(1)
        .ok_or_else(|| anyhow!("id counter exhausted at {}", id))
        .describe_err(IDS_EXHAUSTED)?;
    Ok(id)
}

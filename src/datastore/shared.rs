use crate::datastore::database::Database;
use crate::datastore::structs::{
    NewPost, NewUser, Post, PostId, PostUpdate, User, UserId, UserUpdate,
};
use crate::twoface::{ExternalError, Fallible, TfError};
use actix_web::web::block;
use anyhow::anyhow;
use std::sync::{Arc, Mutex};

pub const EMAIL_TAKEN: ExternalError = ExternalError::invalid_field("Email already registered");
pub const LOGIN_TAKEN: ExternalError = ExternalError::invalid_field("Login already taken");
pub const USER_NOT_FOUND: ExternalError = ExternalError::not_found("User not found");

/// The datastore as the web server sees it. `Database` isn't safe to touch from several
/// workers at once (even reads write, because of view counting), so every call takes one
/// lock and runs on the blocking thread pool.
#[derive(Clone)]
pub struct SharedStore {
    db: Arc<Mutex<Database>>,
}

impl SharedStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Run `f` with exclusive access to the datastore.
    pub async fn with_db<F, R>(&self, f: F) -> Fallible<R>
    where
        F: FnOnce(&mut Database) -> Fallible<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        block(move || {
            let mut db = db.lock().map_err(|_| anyhow!("datastore lock poisoned"))?;
            f(&mut db)
        })
        .await?
    }

    /// Write the snapshot one last time, e.g. on shutdown.
    pub async fn flush(&self) -> Fallible<()> {
        self.with_db(|db| db.persist()).await
    }

    /// Create a user, unless their email or login is already in use.
    pub async fn register_user(&self, new_user: NewUser) -> Fallible<User> {
        self.with_db(move |db| {
            for user in db.users() {
                if user.email == new_user.email {
                    return Err(TfError::plain(EMAIL_TAKEN));
                }
                if user.login == new_user.login {
                    return Err(TfError::plain(LOGIN_TAKEN));
                }
            }
            let id = db.next_user_id()?;
            db.save_user(User::new(id, new_user))
        })
        .await
    }

    pub async fn get_user(&self, id: UserId) -> Fallible<Option<User>> {
        self.with_db(move |db| Ok(db.get_user(id).cloned())).await
    }

    pub async fn list_users(&self) -> Fallible<Vec<User>> {
        self.with_db(|db| Ok(db.get_all_users())).await
    }

    /// Update a user, unless the new login belongs to someone else.
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Fallible<Option<User>> {
        self.with_db(move |db| {
            if let Some(login) = &update.login {
                if db.users().any(|u| u.id != id && &u.login == login) {
                    return Err(TfError::plain(LOGIN_TAKEN));
                }
            }
            db.update_user(id, update)
        })
        .await
    }

    pub async fn delete_user(&self, id: UserId) -> Fallible<bool> {
        self.with_db(move |db| db.delete_user(id)).await
    }

    /// Create a post for an existing author. `Ok(None)` if the author doesn't exist.
    pub async fn create_post(&self, new_post: NewPost) -> Fallible<Option<Post>> {
        self.with_db(move |db| {
            if db.get_user(new_post.author_id).is_none() {
                return Ok(None);
            }
            let id = db.next_post_id()?;
            db.save_post(Post::new(id, new_post)).map(Some)
        })
        .await
    }

    /// Fetch a post, counting the view.
    pub async fn view_post(&self, id: PostId) -> Fallible<Option<Post>> {
        self.with_db(move |db| db.get_post(id)).await
    }

    pub async fn list_posts(&self) -> Fallible<Vec<Post>> {
        self.with_db(|db| Ok(db.get_all_posts())).await
    }

    /// Update a post. The post is fetched first, so an edit also counts as a view.
    pub async fn update_post(&self, id: PostId, update: PostUpdate) -> Fallible<Option<Post>> {
        self.with_db(move |db| {
            if db.get_post(id)?.is_none() {
                return Ok(None);
            }
            db.update_post(id, update)
        })
        .await
    }

    pub async fn delete_post(&self, id: PostId) -> Fallible<bool> {
        self.with_db(move |db| db.delete_post(id)).await
    }

    /// Like a post on behalf of an existing user.
    pub async fn like_post(&self, post_id: PostId, user_id: UserId) -> Fallible<bool> {
        self.with_db(move |db| {
            if db.get_user(user_id).is_none() {
                return Err(TfError {
                    internal: anyhow!("user {} does not exist", user_id),
                    external: USER_NOT_FOUND,
                });
            }
            db.like_post(post_id, user_id)
        })
        .await
    }

    pub async fn unlike_post(&self, post_id: PostId, user_id: UserId) -> Fallible<bool> {
        self.with_db(move |db| db.unlike_post(post_id, user_id)).await
    }
}

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type PostId = u64;

/// Current local time, truncated to the microsecond precision the snapshot stores.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    let micros = now.nanosecond() / 1_000;
    now.with_nanosecond(micros * 1_000).unwrap_or(now)
}

/// A user of the website.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub login: String,
    /// Stored exactly as given. Never leaves the datastore through the API.
    pub password: String,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
    #[serde(default)]
    pub following: Vec<UserId>,
    #[serde(default)]
    pub followers: Vec<UserId>,
}

impl User {
    pub fn new(id: UserId, new_user: NewUser) -> Self {
        let created_at = now();
        Self {
            id,
            email: new_user.email,
            login: new_user.login,
            password: new_user.password,
            created_at,
            updated_at: created_at,
            following: Vec::new(),
            followers: Vec::new(),
        }
    }

    /// Overwrite every field that is set in `update`, then bump `updated_at`.
    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(login) = update.login {
            self.login = login;
        }
        if let Some(password) = update.password {
            self.password = password;
        }
        if let Some(following) = update.following {
            self.following = following;
        }
        if let Some(followers) = update.followers {
            self.followers = followers;
        }
        self.updated_at = now();
    }
}

/// Everything needed to create a user, except the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub login: String,
    pub password: String,
}

/// Partial update of a user. Unset fields are left alone.
#[derive(Default, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub following: Option<Vec<UserId>>,
    pub followers: Option<Vec<UserId>>,
}

/// A post from a user
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
    /// User ids that liked this post. Never holds the same id twice.
    #[serde(default)]
    pub likes: Vec<UserId>,
    #[serde(default)]
    pub views: u64,
}

impl Post {
    pub fn new(id: PostId, new_post: NewPost) -> Self {
        let created_at = now();
        Self {
            id,
            author_id: new_post.author_id,
            title: new_post.title,
            content: new_post.content,
            created_at,
            updated_at: created_at,
            likes: Vec::new(),
            views: 0,
        }
    }

    /// Overwrite every field that is set in `update`, then bump `updated_at`.
    pub fn apply(&mut self, update: PostUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        self.updated_at = now();
    }

    pub fn is_liked_by(&self, user_id: UserId) -> bool {
        self.likes.contains(&user_id)
    }
}

/// Everything needed to create a post, except the id.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: UserId,
    pub title: String,
    pub content: String,
}

/// Partial update of a post. Unset fields are left alone.
#[derive(Default, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// ISO-8601 local timestamps with microseconds and no offset, e.g. `2024-03-01T09:15:00.000042`.
/// Reading is lenient: any fractional precision (or none) is accepted, and so is RFC 3339
/// with an offset, which gets converted to local time.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn format(t: &NaiveDateTime) -> String {
        t.format(FORMAT).to_string()
    }

    pub fn parse(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").or_else(|naive_err| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Local).naive_local())
                .map_err(|_| naive_err)
        })
    }

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(de::Error::custom)
    }
}

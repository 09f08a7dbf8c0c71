//! For every user in `datastore`, this module has a matching struct that leaves out the password.
use crate::api::{created, observe, CoerceColl, Message, State};
use crate::datastore::structs::{timestamp, NewUser, User, UserId, UserUpdate};
use crate::datastore::shared::USER_NOT_FOUND;
use crate::twoface::{DescribeNone, ExternalError, Fallible, TfError};
use actix_web::{web, HttpResponse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const MIN_PASSWORD_LEN: usize = 6;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_user))
        .route("/", web::post().to(create_user))
        .route("", web::get().to(list_users))
        .route("/", web::get().to(list_users))
        .route("/{user_id}", web::get().to(get_user))
        .route("/{user_id}", web::put().to(update_user))
        .route("/{user_id}", web::delete().to(delete_user))
        .route("/{user_id}/", web::get().to(get_user))
        .route("/{user_id}/", web::put().to(update_user))
        .route("/{user_id}/", web::delete().to(delete_user));
}

/// A User without the password.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingUser {
    pub id: UserId,
    pub email: String,
    pub login: String,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
}

impl From<User> for UserFacingUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            login: u.login,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct CreateUserBody {
    pub email: String,
    pub login: String,
    pub password: String,
    pub password_confirm: String,
}

impl CreateUserBody {
    fn validate(self) -> Fallible<NewUser> {
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TfError::plain(ExternalError::invalid_field(
                "password must be at least 6 characters",
            )));
        }
        if self.password != self.password_confirm {
            return Err(TfError::plain(ExternalError::invalid_field("passwords do not match")));
        }
        Ok(NewUser {
            email: self.email,
            login: self.login,
            password: self.password,
        })
    }
}

/// Only the email and login can be changed through the API.
#[derive(Serialize, Deserialize, Default)]
pub struct UpdateUserBody {
    pub email: Option<String>,
    pub login: Option<String>,
}

impl From<UpdateUserBody> for UserUpdate {
    fn from(body: UpdateUserBody) -> Self {
        Self {
            email: body.email,
            login: body.login,
            ..Default::default()
        }
    }
}

async fn create_user(
    state: web::Data<State>,
    body: web::Json<CreateUserBody>,
) -> Fallible<HttpResponse> {
    observe("create_user", || async move {
        let new_user = body.into_inner().validate()?;
        let user = state.ds.register_user(new_user).await?;
        Ok(created(UserFacingUser::from(user)))
    })
    .await
}

async fn list_users(state: web::Data<State>) -> Fallible<web::Json<Vec<UserFacingUser>>> {
    observe("list_users", || async move {
        let users = state.ds.list_users().await?.coerce_into();
        Ok(web::Json(users))
    })
    .await
}

async fn get_user(
    state: web::Data<State>,
    user_id: web::Path<UserId>,
) -> Fallible<web::Json<UserFacingUser>> {
    observe("get_user", || async move {
        let user = state.ds.get_user(*user_id).await?.describe_none(USER_NOT_FOUND)?;
        Ok(web::Json(user.into()))
    })
    .await
}

async fn update_user(
    state: web::Data<State>,
    user_id: web::Path<UserId>,
    body: web::Json<UpdateUserBody>,
) -> Fallible<web::Json<UserFacingUser>> {
    observe("update_user", || async move {
        let update = UserUpdate::from(body.into_inner());
        let user = state
            .ds
            .update_user(*user_id, update)
            .await?
            .describe_none(USER_NOT_FOUND)?;
        Ok(web::Json(user.into()))
    })
    .await
}

async fn delete_user(
    state: web::Data<State>,
    user_id: web::Path<UserId>,
) -> Fallible<web::Json<Message>> {
    observe("delete_user", || async move {
        if !state.ds.delete_user(*user_id).await? {
            return Err(TfError::plain(USER_NOT_FOUND));
        }
        Ok(web::Json(Message::new("User deleted successfully")))
    })
    .await
}

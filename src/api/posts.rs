use crate::api::{created, observe, CoerceColl, Message, PostUser, State};
use crate::datastore::shared::USER_NOT_FOUND;
use crate::datastore::structs::{timestamp, NewPost, Post, PostId, PostUpdate, UserId};
use crate::twoface::{Cause, DescribeNone, ExternalError, Fallible, TfError};
use actix_web::{web, HttpResponse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

const MIN_CONTENT_LEN: usize = 10;
const POST_NOT_FOUND: ExternalError = ExternalError::not_found("Post not found");

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::post().to(create_post))
        .route("/", web::post().to(create_post))
        .route("", web::get().to(list_posts))
        .route("/", web::get().to(list_posts))
        .route("/{post_id}", web::get().to(get_post))
        .route("/{post_id}", web::put().to(update_post))
        .route("/{post_id}", web::delete().to(delete_post))
        .route("/{post_id}/", web::get().to(get_post))
        .route("/{post_id}/", web::put().to(update_post))
        .route("/{post_id}/", web::delete().to(delete_post))
        .route("/{post_id}/like/{user_id}", web::post().to(like_post))
        .route("/{post_id}/like/{user_id}/", web::post().to(like_post))
        .route("/{post_id}/unlike/{user_id}", web::post().to(unlike_post))
        .route("/{post_id}/unlike/{user_id}/", web::post().to(unlike_post));
}

/// A Post as the API shows it: likes are reported as a count, not as the set of users.
#[derive(Serialize, Deserialize, Eq, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingPost {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(with = "timestamp")]
    pub updated_at: NaiveDateTime,
    pub likes: usize,
    pub views: u64,
}

impl From<Post> for UserFacingPost {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            author_id: p.author_id,
            title: p.title,
            content: p.content,
            created_at: p.created_at,
            updated_at: p.updated_at,
            likes: p.likes.len(),
            views: p.views,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct WritePostBody {
    pub title: String,
    pub content: String,
}

/// The author is passed in the query string, e.g. `POST /api/posts?authorId=1`.
#[derive(Serialize, Deserialize)]
pub struct AuthorQuery {
    #[serde(rename = "authorId")]
    pub author_id: UserId,
}

impl WritePostBody {
    fn validate(self, author_id: UserId) -> Fallible<NewPost> {
        if self.title.is_empty() {
            return Err(TfError::plain(ExternalError::invalid_field("title cannot be empty")));
        }
        if self.content.chars().count() < MIN_CONTENT_LEN {
            return Err(TfError::plain(ExternalError::invalid_field(
                "content must be at least 10 characters",
            )));
        }
        Ok(NewPost {
            author_id,
            title: self.title,
            content: self.content,
        })
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct UpdatePostBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl From<UpdatePostBody> for PostUpdate {
    fn from(body: UpdatePostBody) -> Self {
        Self {
            title: body.title,
            content: body.content,
        }
    }
}

// Insert a post into the datastore
async fn create_post(
    state: web::Data<State>,
    query: web::Query<AuthorQuery>,
    body: web::Json<WritePostBody>,
) -> Fallible<HttpResponse> {
    observe("create_post", || async move {
        let new_post = body.into_inner().validate(query.author_id)?;
        let post = state.ds.create_post(new_post).await?.describe_none(USER_NOT_FOUND)?;
        Ok(created(UserFacingPost::from(post)))
    })
    .await
}

// Listing doesn't count as viewing.
async fn list_posts(state: web::Data<State>) -> Fallible<web::Json<Vec<UserFacingPost>>> {
    observe("list_posts", || async move {
        let posts = state.ds.list_posts().await?.coerce_into();
        Ok(web::Json(posts))
    })
    .await
}

async fn get_post(
    state: web::Data<State>,
    post_id: web::Path<PostId>,
) -> Fallible<web::Json<UserFacingPost>> {
    observe("get_post", || async move {
        let post = state.ds.view_post(*post_id).await?.describe_none(POST_NOT_FOUND)?;
        Ok(web::Json(post.into()))
    })
    .await
}

async fn update_post(
    state: web::Data<State>,
    post_id: web::Path<PostId>,
    body: web::Json<UpdatePostBody>,
) -> Fallible<web::Json<UserFacingPost>> {
    observe("update_post", || async move {
        let update = PostUpdate::from(body.into_inner());
        let post = state
            .ds
            .update_post(*post_id, update)
            .await?
            .describe_none(POST_NOT_FOUND)?;
        Ok(web::Json(post.into()))
    })
    .await
}

async fn delete_post(
    state: web::Data<State>,
    post_id: web::Path<PostId>,
) -> Fallible<web::Json<Message>> {
    observe("delete_post", || async move {
        if !state.ds.delete_post(*post_id).await? {
            return Err(TfError::plain(POST_NOT_FOUND));
        }
        Ok(web::Json(Message::new("Post deleted successfully")))
    })
    .await
}

async fn like_post(
    state: web::Data<State>,
    path: web::Path<PostUser>,
) -> Fallible<web::Json<Message>> {
    observe("like_post", || async move {
        if !state.ds.like_post(path.post_id, path.user_id).await? {
            return Err(TfError::plain(ExternalError {
                cause: Cause::UserActionInvalid,
                text: "Unable to like post",
            }));
        }
        Ok(web::Json(Message::new("Post liked successfully")))
    })
    .await
}

async fn unlike_post(
    state: web::Data<State>,
    path: web::Path<PostUser>,
) -> Fallible<web::Json<Message>> {
    observe("unlike_post", || async move {
        if !state.ds.unlike_post(path.post_id, path.user_id).await? {
            return Err(TfError::plain(ExternalError {
                cause: Cause::UserActionInvalid,
                text: "Unable to unlike post",
            }));
        }
        Ok(web::Json(Message::new("Post unliked successfully")))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use crate::datastore::structs::NewUser;
    use actix_web::{http::StatusCode, test};
    use serde_json::json;

    async fn signup(state: &State, login: &str) {
        let new_user = NewUser {
            email: format!("{}@x.com", login),
            login: login.to_owned(),
            password: "secret1".to_owned(),
        };
        state.ds.register_user(new_user).await.unwrap();
    }

    fn write_post(author_id: UserId) -> test::TestRequest {
        test::TestRequest::post()
            .uri(&format!("/api/posts/?authorId={}", author_id))
            .set_json(json!({"title": "T", "content": "1234567890"}))
    }

    #[actix_rt::test]
    async fn test_views_and_likes() {
        let (state, path) = testing::state();
        signup(&state, "a").await;
        let app = testing::test_app!(state);

        let resp = test::call_service(&app, write_post(1).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let post: UserFacingPost = test::read_body_json(resp).await;
        assert_eq!((post.id, post.author_id, post.likes, post.views), (1, 1, 0, 0));

        let views = [(1, "/api/posts/1"), (2, "/api/posts/1/"), (3, "/api/posts/1")];
        for (expected_views, uri) in views {
            let req = test::TestRequest::get().uri(uri).to_request();
            let post: UserFacingPost = test::call_and_read_body_json(&app, req).await;
            assert_eq!(post.views, expected_views);
        }

        let req = test::TestRequest::post().uri("/api/posts/1/like/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::post().uri("/api/posts/1/like/1/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        let req = test::TestRequest::post().uri("/api/posts/1/like/7").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        // Editing reads the post first, so it counts as a view. Listing doesn't.
        let req = test::TestRequest::put()
            .uri("/api/posts/1/")
            .set_json(json!({"title": "New title"}))
            .to_request();
        let post: UserFacingPost = test::call_and_read_body_json(&app, req).await;
        assert_eq!(post.title, "New title");
        assert_eq!(post.content, "1234567890");
        assert_eq!(post.views, 4);
        let req = test::TestRequest::get().uri("/api/posts").to_request();
        let posts: Vec<UserFacingPost> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].likes, 1);
        assert_eq!(posts[0].views, 4);

        // Editing a missing post is a 404 and counts nothing.
        let req = test::TestRequest::put()
            .uri("/api/posts/9")
            .set_json(json!({"title": "x"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post().uri("/api/posts/1/unlike/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::post().uri("/api/posts/1/unlike/1/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        let _ = std::fs::remove_file(&path);
    }

    #[actix_rt::test]
    async fn test_post_validation_and_missing_author() {
        let (state, path) = testing::state();
        let app = testing::test_app!(state.clone());

        let resp = test::call_service(&app, write_post(1).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        signup(&state, "a").await;
        for body in [
            json!({"title": "", "content": "1234567890"}),
            json!({"title": "T", "content": "too short"}),
        ] {
            let req = test::TestRequest::post()
                .uri("/api/posts?authorId=1")
                .set_json(body)
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        }
        let _ = std::fs::remove_file(&path);
    }

    #[actix_rt::test]
    async fn test_deleting_author_deletes_posts() {
        let (state, path) = testing::state();
        signup(&state, "a").await;
        signup(&state, "b").await;
        let app = testing::test_app!(state);
        test::call_service(&app, write_post(1).to_request()).await;
        test::call_service(&app, write_post(2).to_request()).await;

        let req = test::TestRequest::delete().uri("/api/users/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/posts/1").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let req = test::TestRequest::get().uri("/api/posts").to_request();
        let posts: Vec<UserFacingPost> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author_id, 2);

        let req = test::TestRequest::delete().uri("/api/posts/2/").to_request();
        let msg: Message = test::call_and_read_body_json(&app, req).await;
        assert_eq!(msg, Message::new("Post deleted successfully"));
        let req = test::TestRequest::delete().uri("/api/posts/2").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        let _ = std::fs::remove_file(&path);
    }
}

use chrono::{NaiveDateTime, Utc};
use diesel::insert_into;
use diesel::prelude::*;
use rocket::form::Form;
use rocket::response::Redirect;
use serde::Serialize;

use crate::db::schema::{comments, users};
use crate::db::DbConnection;
use crate::post::Post;
use crate::types::{AppError, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{post_path, serialize_date};

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Post))]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: NaiveDateTime,
}

impl Comment {
    pub fn count(connection: &mut SqliteConnection) -> Result<i64, AppError> {
        let count = comments::table.count().get_result::<i64>(connection)?;
        Ok(count)
    }
}

#[derive(Serialize, Debug)]
pub struct CommentView {
    id: i32,
    text: String,
    #[serde(serialize_with = "serialize_date")]
    created: NaiveDateTime,
    author: User,
}

impl From<(Comment, User)> for CommentView {
    fn from(comment_and_author: (Comment, User)) -> Self {
        let (comment, author) = comment_and_author;
        CommentView {
            id: comment.id,
            text: comment.text,
            created: comment.created,
            author,
        }
    }
}

impl CommentView {
    /// Comments on `post`, newest first.
    pub fn for_post(post: &Post, connection: &mut SqliteConnection) -> Result<Vec<CommentView>, AppError> {
        let data = Comment::belonging_to(post)
            .inner_join(users::table)
            .order((comments::created.desc(), comments::id.desc()))
            .select((comments::all_columns, users::all_columns))
            .load::<(Comment, User)>(connection)?;
        Ok(data.into_iter().map(CommentView::from).collect())
    }
}

#[derive(Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: NaiveDateTime,
}

impl NewComment {
    pub fn new<T: Into<String>>(post: &Post, author: &User, text: T) -> NewComment {
        NewComment {
            post_id: post.id,
            author_id: author.id,
            text: text.into(),
            created: Utc::now().naive_utc(),
        }
    }

    pub fn insert(&self, connection: &mut SqliteConnection) -> Result<Comment, AppError> {
        let comment = insert_into(comments::table)
            .values(self)
            .get_result::<Comment>(connection)?;
        Ok(comment)
    }
}

#[derive(Debug, FromForm)]
pub struct CommentForm {
    text: Option<String>,
}

impl Validate for CommentForm {
    type Error = ValidationError;
    fn validate(self, _connection: &mut SqliteConnection) -> Result<Self, ValidationError> {
        let mut error = ValidationError::default();
        if self.text.as_deref().map_or(true, |text| text.trim().is_empty()) {
            error.add_error("text", "This field is required.");
        }
        error.into_result(self)
    }
}

#[post("/<username>/<post_id>/comment", data = "<form>")]
pub fn add_comment(
    username: &str,
    post_id: i32,
    current_user: CurrentUser,
    mut connection: DbConnection,
    form: Form<CommentForm>,
) -> Result<Redirect, AppError> {
    let user = current_user?;
    let post = Post::load_for_author(username, post_id, &mut connection)?;

    match form.into_inner().validate(&mut connection) {
        Ok(form) => {
            let text = form.text.unwrap_or_default();
            let comment = NewComment::new(&post, &user, text).insert(&mut connection)?;
            tracing::info!("{} commented on post {} ({})", user.username, post.id, comment.id);
        }
        Err(errors) => tracing::debug!("comment on post {} rejected: {:?}", post.id, errors),
    }

    Ok(Redirect::to(post_path(username, post_id)))
}

#[get("/<username>/<post_id>/comment")]
pub fn comment_redirect(
    username: &str,
    post_id: i32,
    current_user: CurrentUser,
) -> Result<Redirect, AppError> {
    current_user?;
    Ok(Redirect::to(post_path(username, post_id)))
}

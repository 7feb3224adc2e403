use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use diesel::{insert_into, update};
use image::ImageFormat;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::{Metadata, Template};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::Path;

use crate::cache::PageCache;
use crate::comment::CommentView;
use crate::config::Settings;
use crate::db::schema::{follows, groups, posts, users};
use crate::db::DbConnection;
use crate::group::Group;
use crate::pagination::{Page, Paginator};
use crate::types::{AppError, PageResponse, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{decode_image, post_path, read_upload, serialize_date, store_image};

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize)]
pub struct Post {
    pub id: i32,
    pub text: String,
    #[serde(serialize_with = "serialize_date")]
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// A post shows as the first fifteen characters of its text.
impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.text.chars().take(15).collect();
        f.write_str(&preview)
    }
}

impl Post {
    /// Loads a post, insisting that it was written by `username`.
    pub fn load_for_author(
        username: &str,
        post_id: i32,
        connection: &mut SqliteConnection,
    ) -> Result<Post, AppError> {
        posts::table
            .inner_join(users::table)
            .filter(posts::id.eq(post_id))
            .filter(users::username.eq(username))
            .select(posts::all_columns)
            .get_result::<Post>(connection)
            .map_err(|e| e.into())
    }

    pub fn count(connection: &mut SqliteConnection) -> Result<i64, AppError> {
        let count = posts::table.count().get_result::<i64>(connection)?;
        Ok(count)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub text: String,
    pub pub_date: NaiveDateTime,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl NewPost {
    pub fn new<T: Into<String>>(author: &User, text: T) -> NewPost {
        NewPost {
            text: text.into(),
            pub_date: Utc::now().naive_utc(),
            author_id: author.id,
            group_id: None,
            image: None,
        }
    }

    pub fn insert(&self, connection: &mut SqliteConnection) -> Result<Post, AppError> {
        let post = insert_into(posts::table)
            .values(self)
            .get_result::<Post>(connection)?;
        Ok(post)
    }
}

/// A post joined with its author and group, ready for templates.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author: User,
    pub group: Option<Group>,
}

impl From<(Post, User, Option<Group>)> for PostView {
    fn from(row: (Post, User, Option<Group>)) -> Self {
        let (post, author, group) = row;
        PostView {
            post,
            author,
            group,
        }
    }
}

impl PostView {
    pub fn load(
        username: &str,
        post_id: i32,
        connection: &mut SqliteConnection,
    ) -> Result<PostView, AppError> {
        let row = posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .filter(posts::id.eq(post_id))
            .filter(users::username.eq(username))
            .select((
                posts::all_columns,
                users::all_columns,
                groups::all_columns.nullable(),
            ))
            .get_result::<(Post, User, Option<Group>)>(connection)?;
        Ok(row.into())
    }
}

/// Which posts a listing page shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PostFilter {
    All,
    Group(i32),
    Author(i32),
    /// Posts by every author the given user follows.
    FollowedBy(i32),
}

impl PostFilter {
    fn query(self) -> posts::BoxedQuery<'static, Sqlite> {
        let query = posts::table.into_boxed();
        match self {
            PostFilter::All => query,
            PostFilter::Group(group) => query.filter(posts::group_id.eq(group)),
            PostFilter::Author(author) => query.filter(posts::author_id.eq(author)),
            PostFilter::FollowedBy(user) => query.filter(
                posts::author_id.eq_any(
                    follows::table
                        .filter(follows::user_id.eq(user))
                        .select(follows::author_id),
                ),
            ),
        }
    }

    pub fn count(self, connection: &mut SqliteConnection) -> Result<i64, AppError> {
        let count = self.query().count().get_result::<i64>(connection)?;
        Ok(count)
    }

    pub fn paginator(
        self,
        per_page: i64,
        connection: &mut SqliteConnection,
    ) -> Result<Paginator, AppError> {
        Ok(Paginator::new(self.count(connection)?, per_page))
    }

    /// Loads one page of matching posts, newest first.
    pub fn page(
        self,
        raw_page: Option<&str>,
        per_page: i64,
        connection: &mut SqliteConnection,
    ) -> Result<Page<PostView>, AppError> {
        let paginator = self.paginator(per_page, connection)?;
        let number = paginator.page_number(raw_page);
        self.load_page(&paginator, number, connection)
    }

    pub fn load_page(
        self,
        paginator: &Paginator,
        number: i64,
        connection: &mut SqliteConnection,
    ) -> Result<Page<PostView>, AppError> {
        let ids = self
            .query()
            .select(posts::id)
            .order((posts::pub_date.desc(), posts::id.desc()))
            .limit(paginator.per_page())
            .offset(paginator.offset(number))
            .load::<i32>(connection)?;

        let rows = posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .filter(posts::id.eq_any(ids))
            .order((posts::pub_date.desc(), posts::id.desc()))
            .select((
                posts::all_columns,
                users::all_columns,
                groups::all_columns.nullable(),
            ))
            .load::<(Post, User, Option<Group>)>(connection)?;

        let views = rows.into_iter().map(PostView::from).collect();
        Ok(paginator.page(number, views))
    }
}

#[derive(Debug, FromForm)]
pub struct PostForm<'r> {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<TempFile<'r>>,
}

impl<'r> PostForm<'r> {
    /// Reads the upload into memory. Browsers send an empty part when no file
    /// was chosen, which counts as no image.
    pub async fn into_submission(self) -> io::Result<PostSubmission> {
        let image = match &self.image {
            Some(file) if file.len() > 0 => Some(Upload {
                name: file.name().map(str::to_owned),
                bytes: read_upload(file).await?,
                format: None,
            }),
            _ => None,
        };
        Ok(PostSubmission {
            text: self.text.unwrap_or_default(),
            group: self.group,
            group_id: None,
            image,
        })
    }
}

#[derive(Debug)]
pub struct Upload {
    pub name: Option<String>,
    pub bytes: Vec<u8>,
    /// Set once the bytes decoded as an image.
    pub format: Option<ImageFormat>,
}

impl Upload {
    pub async fn store(&self, media_root: &Path) -> io::Result<String> {
        let format = self
            .format
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "upload is not a checked image"))?;
        store_image(&self.bytes, format, self.name.as_deref(), media_root).await
    }
}

/// A post form with its upload in memory. `group_id` is filled in by
/// validation.
#[derive(Debug)]
pub struct PostSubmission {
    pub text: String,
    pub group: Option<String>,
    pub group_id: Option<i32>,
    pub image: Option<Upload>,
}

impl Validate for PostSubmission {
    type Error = AppError;
    fn validate(mut self, connection: &mut SqliteConnection) -> Result<Self, AppError> {
        let mut error = ValidationError::default();

        if self.text.trim().is_empty() {
            error.add_error("text", "This field is required.");
        }

        self.group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(id) if Group::exists(id, connection)? => Some(id),
                _ => {
                    error.add_error("group", "Select a valid choice.");
                    None
                }
            },
        };

        if let Some(upload) = &mut self.image {
            upload.format = decode_image(&upload.bytes);
            if upload.format.is_none() {
                error.add_error(
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                );
            }
        }

        error.into_result(self).map_err(AppError::from)
    }
}

/// What the post form shows back to the user.
#[derive(Debug, Default, Serialize)]
pub struct PostFormValues {
    pub text: String,
    pub group: Option<i32>,
}

impl<'a> From<&'a PostSubmission> for PostFormValues {
    fn from(submission: &'a PostSubmission) -> Self {
        PostFormValues {
            text: submission.text.clone(),
            group: submission
                .group
                .as_deref()
                .and_then(|group| group.trim().parse().ok()),
        }
    }
}

impl<'a> From<&'a Post> for PostFormValues {
    fn from(post: &'a Post) -> Self {
        PostFormValues {
            text: post.text.clone(),
            group: post.group_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct PostFormContext<'a> {
    user: &'a User,
    edit: bool,
    post: Option<&'a Post>,
    form: PostFormValues,
    groups: Vec<Group>,
    errors: &'a ValidationError,
}

impl<'a> PostFormContext<'a> {
    fn render(self) -> Template {
        Template::render("new_post", self)
    }
}

#[derive(Debug, Serialize)]
struct IndexContext<'a> {
    user: Option<&'a User>,
    page: Page<PostView>,
}

/// The main feed. Rendered pages are cached per viewer for a short while.
#[get("/?<page>")]
pub fn index(
    page: Option<&str>,
    current_user: Option<User>,
    cache: &State<PageCache>,
    settings: &State<Settings>,
    metadata: Metadata<'_>,
    mut connection: DbConnection,
) -> Result<RawHtml<String>, AppError> {
    let paginator = PostFilter::All.paginator(settings.posts_per_page, &mut connection)?;
    let number = paginator.page_number(page);
    let viewer = current_user.as_ref().map_or(0, |user| user.id);
    let key = format!("index:{}#{}", number, viewer);
    if let Some(body) = cache.get(&key) {
        return Ok(RawHtml(body));
    }

    let posts = PostFilter::All.load_page(&paginator, number, &mut connection)?;
    let context = IndexContext {
        user: current_user.as_ref(),
        page: posts,
    };
    let (_, body) = metadata
        .render("index", context)
        .ok_or(AppError::Internal)?;
    cache.insert(key, body.clone());
    Ok(RawHtml(body))
}

#[get("/new")]
pub fn new_post_form(
    current_user: CurrentUser,
    mut connection: DbConnection,
) -> Result<Template, AppError> {
    let user = current_user?;
    let errors = ValidationError::default();
    Ok(PostFormContext {
        user: &user,
        edit: false,
        post: None,
        form: PostFormValues::default(),
        groups: Group::load_all(&mut connection)?,
        errors: &errors,
    }
    .render())
}

#[post("/new", data = "<form>")]
pub async fn new_post(
    current_user: CurrentUser,
    settings: &State<Settings>,
    mut connection: DbConnection,
    form: Form<PostForm<'_>>,
) -> Result<PageResponse, AppError> {
    let user = current_user?;
    let submission = form.into_inner().into_submission().await?;
    let values = PostFormValues::from(&submission);

    let submission = match submission.validate(&mut connection) {
        Ok(submission) => submission,
        Err(AppError::Validation(errors)) => {
            tracing::debug!("new post rejected: {:?}", errors);
            return Ok(PageResponse::Render(
                PostFormContext {
                    user: &user,
                    edit: false,
                    post: None,
                    form: values,
                    groups: Group::load_all(&mut connection)?,
                    errors: &errors,
                }
                .render(),
            ));
        }
        Err(other) => return Err(other),
    };

    let image = match &submission.image {
        Some(upload) => Some(upload.store(&settings.media_root).await?),
        None => None,
    };

    let mut new_post = NewPost::new(&user, submission.text);
    new_post.group_id = submission.group_id;
    new_post.image = image;
    let post = new_post.insert(&mut connection)?;
    tracing::info!("{} published post {}", user.username, post.id);

    Ok(PageResponse::Redirect(Redirect::to("/")))
}

#[derive(Debug, Serialize)]
struct PostContext<'a> {
    user: Option<&'a User>,
    post: &'a PostView,
    author: &'a User,
    comments: Vec<CommentView>,
    comments_count: usize,
    posts_count: i64,
}

#[get("/<username>/<post_id>")]
pub fn post_view(
    username: &str,
    post_id: i32,
    current_user: Option<User>,
    mut connection: DbConnection,
) -> Result<Template, AppError> {
    let post = PostView::load(username, post_id, &mut connection)?;
    let comments = CommentView::for_post(&post.post, &mut connection)?;
    let posts_count = PostFilter::Author(post.author.id).count(&mut connection)?;

    Ok(Template::render(
        "post",
        PostContext {
            user: current_user.as_ref(),
            post: &post,
            author: &post.author,
            comments_count: comments.len(),
            comments,
            posts_count,
        },
    ))
}

#[get("/<username>/<post_id>/edit")]
pub fn post_edit_form(
    username: &str,
    post_id: i32,
    current_user: CurrentUser,
    mut connection: DbConnection,
) -> Result<PageResponse, AppError> {
    let user = current_user?;
    let post = Post::load_for_author(username, post_id, &mut connection)?;
    if post.author_id != user.id {
        return Ok(PageResponse::Redirect(Redirect::to(post_path(username, post_id))));
    }

    let errors = ValidationError::default();
    Ok(PageResponse::Render(
        PostFormContext {
            user: &user,
            edit: true,
            post: Some(&post),
            form: PostFormValues::from(&post),
            groups: Group::load_all(&mut connection)?,
            errors: &errors,
        }
        .render(),
    ))
}

#[post("/<username>/<post_id>/edit", data = "<form>")]
pub async fn post_edit(
    username: &str,
    post_id: i32,
    current_user: CurrentUser,
    settings: &State<Settings>,
    mut connection: DbConnection,
    form: Form<PostForm<'_>>,
) -> Result<PageResponse, AppError> {
    let user = current_user?;
    let post = Post::load_for_author(username, post_id, &mut connection)?;
    if post.author_id != user.id {
        tracing::info!("{} may not edit post {}", user.username, post.id);
        return Ok(PageResponse::Redirect(Redirect::to(post_path(username, post_id))));
    }

    let submission = form.into_inner().into_submission().await?;
    let values = PostFormValues::from(&submission);
    let submission = match submission.validate(&mut connection) {
        Ok(submission) => submission,
        Err(AppError::Validation(errors)) => {
            tracing::debug!("edit of post {} rejected: {:?}", post.id, errors);
            return Ok(PageResponse::Render(
                PostFormContext {
                    user: &user,
                    edit: true,
                    post: Some(&post),
                    form: values,
                    groups: Group::load_all(&mut connection)?,
                    errors: &errors,
                }
                .render(),
            ));
        }
        Err(other) => return Err(other),
    };

    let image = match &submission.image {
        Some(upload) => Some(upload.store(&settings.media_root).await?),
        None => post.image.clone(),
    };

    update(&post)
        .set((
            posts::text.eq(submission.text),
            posts::group_id.eq(submission.group_id),
            posts::image.eq(image),
        ))
        .execute(&mut *connection)?;

    Ok(PageResponse::Redirect(Redirect::to(post_path(username, post_id))))
}

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{delete, insert_into, select};
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Serialize;
use std::borrow::Cow;

use crate::config::Settings;
use crate::db::schema::follows;
use crate::db::DbConnection;
use crate::pagination::Page;
use crate::post::{PostFilter, PostView};
use crate::types::AppError;
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::profile_path;

/// A directed subscription: `user_id` follows `author_id`.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
pub struct Follow {
    pub id: i32,
    pub user_id: i32,
    pub author_id: i32,
}

impl Follow {
    pub fn exists(
        follower: i32,
        author: i32,
        connection: &mut SqliteConnection,
    ) -> Result<bool, AppError> {
        use crate::db::schema::follows::dsl::*;
        let query = select(exists(
            follows
                .filter(user_id.eq(follower))
                .filter(author_id.eq(author)),
        ));
        Ok(query.get_result::<bool>(connection)?)
    }

    pub fn create(
        follower: i32,
        author: i32,
        connection: &mut SqliteConnection,
    ) -> Result<usize, AppError> {
        use crate::db::schema::follows::dsl::*;
        let inserted = insert_into(follows)
            .values((user_id.eq(follower), author_id.eq(author)))
            .on_conflict((user_id, author_id))
            .do_nothing()
            .execute(connection)?;
        Ok(inserted)
    }

    pub fn remove(
        follower: i32,
        author: i32,
        connection: &mut SqliteConnection,
    ) -> Result<usize, AppError> {
        use crate::db::schema::follows::dsl::*;
        let removed = delete(
            follows
                .filter(user_id.eq(follower))
                .filter(author_id.eq(author)),
        )
        .execute(connection)?;
        Ok(removed)
    }

    pub fn load_all(connection: &mut SqliteConnection) -> Result<Vec<Follow>, AppError> {
        let all = follows::table.order(follows::id.asc()).load::<Follow>(connection)?;
        Ok(all)
    }
}

#[derive(Debug, Serialize)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub following: bool,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
}

impl<'a> Profile<'a> {
    pub fn load(
        author: &'a User,
        following: bool,
        connection: &mut SqliteConnection,
    ) -> Result<Profile<'a>, AppError> {
        let posts_count = PostFilter::Author(author.id).count(connection)?;
        let followers_count = follows::table
            .filter(follows::author_id.eq(author.id))
            .count()
            .get_result::<i64>(connection)?;
        let following_count = follows::table
            .filter(follows::user_id.eq(author.id))
            .count()
            .get_result::<i64>(connection)?;

        Ok(Profile {
            username: Cow::Borrowed(author.username.as_str()),
            following,
            posts_count,
            followers_count,
            following_count,
        })
    }
}

#[derive(Debug, Serialize)]
struct ProfileContext<'a> {
    user: Option<&'a User>,
    author: &'a User,
    profile: Profile<'a>,
    follow: bool,
    page: Page<PostView>,
}

#[derive(Debug, Serialize)]
struct FeedContext<'a> {
    user: Option<&'a User>,
    page: Page<PostView>,
}

#[get("/<username>?<page>")]
pub fn profile(
    username: &str,
    page: Option<&str>,
    current_user: Option<User>,
    settings: &State<Settings>,
    mut connection: DbConnection,
) -> Result<Template, AppError> {
    let author = User::load_by_name(username, &mut connection)?;
    let following = match &current_user {
        Some(current) => Follow::exists(current.id, author.id, &mut connection)?,
        None => false,
    };
    let posts = PostFilter::Author(author.id).page(page, settings.posts_per_page, &mut connection)?;
    let profile = Profile::load(&author, following, &mut connection)?;

    Ok(Template::render(
        "profile",
        ProfileContext {
            user: current_user.as_ref(),
            author: &author,
            follow: following,
            profile,
            page: posts,
        },
    ))
}

#[get("/follow?<page>")]
pub fn follow_index(
    page: Option<&str>,
    current_user: CurrentUser,
    settings: &State<Settings>,
    mut connection: DbConnection,
) -> Result<Template, AppError> {
    let user = current_user?;
    let posts = PostFilter::FollowedBy(user.id).page(page, settings.posts_per_page, &mut connection)?;

    Ok(Template::render(
        "follow",
        FeedContext {
            user: Some(&user),
            page: posts,
        },
    ))
}

#[get("/<username>/follow")]
pub fn profile_follow(
    username: &str,
    current_user: CurrentUser,
    mut connection: DbConnection,
) -> Result<Redirect, AppError> {
    let current = current_user?;
    let author = User::load_by_name(username, &mut connection)?;

    if current.id != author.id && !Follow::exists(current.id, author.id, &mut connection)? {
        Follow::create(current.id, author.id, &mut connection)?;
        tracing::info!("{} now follows {}", current.username, author.username);
    }

    Ok(Redirect::to(profile_path(username)))
}

#[get("/<username>/unfollow")]
pub fn profile_unfollow(
    username: &str,
    current_user: CurrentUser,
    mut connection: DbConnection,
) -> Result<Redirect, AppError> {
    let current = current_user?;
    let author = User::load_by_name(username, &mut connection)?;

    if Follow::remove(current.id, author.id, &mut connection)? == 0 {
        return Err(AppError::NotFound);
    }
    tracing::info!("{} unfollowed {}", current.username, author.username);

    Ok(Redirect::to(profile_path(username)))
}

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{insert_into, select};
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Serialize;
use slug::slugify;
use std::fmt;

use crate::config::Settings;
use crate::db::schema::groups;
use crate::db::DbConnection;
use crate::pagination::Page;
use crate::post::{PostFilter, PostView};
use crate::types::AppError;
use crate::users::models::User;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl Group {
    pub fn load_by_slug(slug_: &str, connection: &mut SqliteConnection) -> Result<Group, AppError> {
        use crate::db::schema::groups::dsl::*;
        groups
            .filter(slug.eq(slug_))
            .get_result::<Group>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_all(connection: &mut SqliteConnection) -> Result<Vec<Group>, AppError> {
        use crate::db::schema::groups::dsl::*;
        let all = groups.order(title.asc()).load::<Group>(connection)?;
        Ok(all)
    }

    pub fn exists(group_id: i32, connection: &mut SqliteConnection) -> Result<bool, AppError> {
        let found = select(exists(groups::table.find(group_id))).get_result::<bool>(connection)?;
        Ok(found)
    }
}

#[derive(Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl NewGroup {
    /// Builds a group whose slug is derived from the title.
    pub fn new<T: Into<String>, D: Into<String>>(title: T, description: D) -> NewGroup {
        let title = title.into();
        NewGroup {
            slug: slugify(&title),
            title,
            description: description.into(),
        }
    }

    pub fn with_slug<S: Into<String>>(mut self, slug: S) -> NewGroup {
        self.slug = slug.into();
        self
    }

    pub fn insert(&self, connection: &mut SqliteConnection) -> Result<Group, AppError> {
        let group = insert_into(groups::table)
            .values(self)
            .get_result::<Group>(connection)?;
        Ok(group)
    }
}

#[derive(Debug, Serialize)]
struct GroupContext<'a> {
    user: Option<&'a User>,
    group: &'a Group,
    page: Page<PostView>,
}

#[get("/group/<slug>?<page>")]
pub fn group_posts(
    slug: &str,
    page: Option<&str>,
    current_user: Option<User>,
    settings: &State<Settings>,
    mut connection: DbConnection,
) -> Result<Template, AppError> {
    let group = Group::load_by_slug(slug, &mut connection)?;
    let posts = PostFilter::Group(group.id).page(page, settings.posts_per_page, &mut connection)?;

    Ok(Template::render(
        "group",
        GroupContext {
            user: current_user.as_ref(),
            group: &group,
            page: posts,
        },
    ))
}

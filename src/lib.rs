#[macro_use]
extern crate rocket;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;

pub mod about;
pub mod cache;
pub mod comment;
pub mod config;
pub mod db;
pub mod group;
pub mod pagination;
pub mod post;
pub mod profile;
pub mod types;
pub mod users;
mod utils;

use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::request::Request;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use serde_json::json;
use std::fs;

use cache::PageCache;
use config::Settings;

#[catch(404)]
fn not_found(req: &Request) -> (Status, Template) {
    let context = json!({
        "user": null,
        "path": req.uri().path().to_string(),
    });
    (Status::NotFound, Template::render("misc/404", context))
}

#[catch(500)]
fn server_error(_req: &Request) -> (Status, Template) {
    let context = json!({ "user": null });
    (Status::InternalServerError, Template::render("misc/500", context))
}

/// Builds the application from environment settings.
pub fn rocket() -> db::Result<Rocket<Build>> {
    let settings = Settings::from_env()?;
    build(settings)
}

/// Opens the database, applies migrations and mounts every route.
pub fn build(settings: Settings) -> db::Result<Rocket<Build>> {
    let pool = db::init_pool(&settings)?;
    db::run_migrations(&pool)?;
    fs::create_dir_all(&settings.media_root)?;
    let cache = PageCache::new(settings.index_cache_ttl);
    let media = FileServer::from(&settings.media_root);

    Ok(rocket::build()
        .manage(pool)
        .manage(cache)
        .manage(settings)
        .mount(
            "/",
            routes![
                post::index,
                post::new_post_form,
                post::new_post,
                post::post_view,
                post::post_edit_form,
                post::post_edit,
                group::group_posts,
                comment::add_comment,
                comment::comment_redirect,
                profile::profile,
                profile::follow_index,
                profile::profile_follow,
                profile::profile_unfollow,
            ],
        )
        .mount(
            "/auth",
            routes![
                users::signup_form,
                users::signup,
                users::login_form,
                users::login,
                users::logout,
            ],
        )
        .mount("/about", routes![about::author, about::tech])
        .mount("/media", media)
        .register("/", catchers![not_found, server_error])
        .attach(Template::fairing()))
}

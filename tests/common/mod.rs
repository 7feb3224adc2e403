#![allow(dead_code)]

use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::sqlite::SqliteConnection;
use rocket::http::{ContentType, Status};
use rocket::local::blocking::{Client, LocalResponse};
use std::path::PathBuf;
use tempfile::TempDir;

use yatube::cache::PageCache;
use yatube::config::Settings;
use yatube::db::Pool;
use yatube::group::{Group, NewGroup};
use yatube::post::{NewPost, Post};
use yatube::users::models::User;

pub const PASSWORD: &str = "correct-horse";

/// A running site backed by a throwaway SQLite file and media directory.
pub struct TestApp {
    pub client: Client,
    pub media_root: PathBuf,
    _dir: TempDir,
}

pub fn setup() -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let database = dir.path().join("yatube.sqlite3");
    let media_root = dir.path().join("media");
    let settings = Settings::new(database.to_str().expect("utf-8 path"), media_root.clone());

    let rocket = yatube::build(settings).expect("valid settings");
    let client = Client::tracked(rocket).expect("valid rocket instance");

    TestApp {
        client,
        media_root,
        _dir: dir,
    }
}

impl TestApp {
    pub fn connection(&self) -> PooledConnection<ConnectionManager<SqliteConnection>> {
        let pool = self.client.rocket().state::<Pool>().expect("managed pool");
        pool.get().expect("database connection")
    }

    pub fn cache(&self) -> &PageCache {
        self.client.rocket().state::<PageCache>().expect("managed cache")
    }

    pub fn create_user(&self, username: &str) -> User {
        User::create(username, PASSWORD, &mut self.connection()).expect("user created")
    }

    pub fn create_group(&self, title: &str, slug: &str) -> Group {
        NewGroup::new(title, "Group for tests")
            .with_slug(slug)
            .insert(&mut self.connection())
            .expect("group created")
    }

    pub fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        let mut post = NewPost::new(author, text);
        post.group_id = group.map(|group| group.id);
        post.insert(&mut self.connection()).expect("post created")
    }

    /// Signs in as `username`, dropping whoever was signed in before.
    pub fn login(&self, username: &str) {
        self.logout();
        let response = self
            .client
            .post("/auth/login/")
            .header(ContentType::Form)
            .body(format!("username={}&password={}", username, PASSWORD))
            .dispatch();
        assert_eq!(response.status(), Status::SeeOther);
    }

    pub fn logout(&self) {
        let response = self.client.get("/auth/logout/").dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    pub fn get_body(&self, uri: &str) -> String {
        let response = self.client.get(uri.to_string()).dispatch();
        assert_eq!(response.status(), Status::Ok, "GET {}", uri);
        response.into_string().unwrap_or_default()
    }

    pub fn post_form<'c>(&'c self, uri: &str, body: &str) -> LocalResponse<'c> {
        self.client
            .post(uri.to_string())
            .header(ContentType::Form)
            .body(body.to_string())
            .dispatch()
    }
}

pub fn location<'a>(response: &'a LocalResponse<'_>) -> Option<&'a str> {
    response.headers().get_one("Location")
}

/// Where a guest asking for `path` gets sent.
pub fn login_redirect(path: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(path))
}

pub fn post_cards(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}

/// A 1x1 transparent GIF.
pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x01, 0x44, 0x00, 0x3b,
];

pub const BOUNDARY: &str = "X-YATUBE-BOUNDARY";

pub fn multipart_content_type() -> ContentType {
    ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
}

/// Builds a multipart body from text fields and an optional `image` file part.
pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

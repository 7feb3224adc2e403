mod common;

use diesel::prelude::*;
use rocket::http::Status;

use common::*;
use yatube::db::schema::posts;
use yatube::post::Post;

#[test]
fn index_lists_posts_newest_first() {
    let app = setup();
    let leo = app.create_user("leo");
    app.create_post(&leo, "First chapter", None);
    app.create_post(&leo, "Second chapter", None);

    let body = app.get_body("/");
    let first = body.find("First chapter").expect("first post listed");
    let second = body.find("Second chapter").expect("second post listed");
    assert!(second < first);
    assert_eq!(post_cards(&body), 2);
}

#[test]
fn index_is_paginated_by_ten() {
    let app = setup();
    let leo = app.create_user("leo");
    for n in 0..13 {
        app.create_post(&leo, &format!("Post number {}", n), None);
    }

    assert_eq!(post_cards(&app.get_body("/")), 10);
    assert_eq!(post_cards(&app.get_body("/?page=2")), 3);
    // Out of range and garbage page numbers fall back instead of failing.
    assert_eq!(post_cards(&app.get_body("/?page=99")), 3);
    assert_eq!(post_cards(&app.get_body("/?page=abc")), 10);
}

#[test]
fn index_is_cached_until_cleared() {
    let app = setup();
    let leo = app.create_user("leo");
    app.create_post(&leo, "Before caching", None);

    let cached = app.get_body("/");
    app.create_post(&leo, "Written after caching", None);

    let again = app.get_body("/");
    assert_eq!(cached, again);
    assert!(!again.contains("Written after caching"));

    app.cache().clear();
    assert!(app.get_body("/").contains("Written after caching"));
}

#[test]
fn group_page_shows_only_group_posts() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Leo Tolstoy fans", "tolstoy");
    app.create_post(&leo, "War and Peace", Some(&group));
    app.create_post(&leo, "Unrelated note", None);

    let body = app.get_body("/group/tolstoy/");
    assert!(body.contains("Leo Tolstoy fans"));
    assert!(body.contains("War and Peace"));
    assert!(!body.contains("Unrelated note"));
    assert_eq!(post_cards(&body), 1);
}

#[test]
fn unknown_group_is_not_found() {
    let app = setup();
    let response = app.client.get("/group/missing/").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn profile_and_post_pages_render() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Classics", "classics");
    let post = app.create_post(&leo, "Anna Karenina", Some(&group));

    let profile = app.get_body("/leo/");
    assert!(profile.contains("Anna Karenina"));
    assert!(profile.contains("Classics"));

    let detail = app.get_body(&format!("/leo/{}/", post.id));
    assert!(detail.contains("Anna Karenina"));
    assert!(detail.contains("/group/classics/"));
}

#[test]
fn unknown_pages_are_not_found() {
    let app = setup();
    let leo = app.create_user("leo");
    let post = app.create_post(&leo, "Only post", None);
    app.create_user("fyodor");

    for uri in &[
        "/nobody/".to_string(),
        "/leo/9999/".to_string(),
        format!("/fyodor/{}/", post.id),
    ] {
        let response = app.client.get(uri.clone()).dispatch();
        assert_eq!(response.status(), Status::NotFound, "GET {}", uri);
    }
}

#[test]
fn guest_is_sent_to_login_for_new_post() {
    let app = setup();

    let response = app.client.get("/new/").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some("/auth/login/?next=%2Fnew%2F"));

    let response = app.post_form("/new/", "text=sneaky");
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some("/auth/login/?next=%2Fnew%2F"));

    let count = Post::count(&mut app.connection()).unwrap();
    assert_eq!(count, 0);
}

#[test]
fn signed_in_user_creates_post_with_group_and_image() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Classics", "classics");
    app.login("leo");

    assert!(app.get_body("/new/").contains("multipart/form-data"));

    let group_id = group.id.to_string();
    let body = multipart_body(
        &[("text", "A post with a picture"), ("group", &group_id)],
        Some(("small.gif", "image/gif", SMALL_GIF)),
    );
    let response = app
        .client
        .post("/new/")
        .header(multipart_content_type())
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some("/"));

    let mut connection = app.connection();
    assert_eq!(Post::count(&mut connection).unwrap(), 1);
    let post = posts::table.first::<Post>(&mut *connection).unwrap();
    assert_eq!(post.text, "A post with a picture");
    assert_eq!(post.author_id, leo.id);
    assert_eq!(post.group_id, Some(group.id));

    let image = post.image.expect("image stored");
    assert!(image.starts_with("posts/"));
    assert!(app.media_root.join(&image).is_file());

    let response = app.client.get(format!("/media/{}", image)).dispatch();
    assert_eq!(response.status(), Status::Ok);

    app.cache().clear();
    let file_name = image.rsplit('/').next().unwrap();
    assert!(app.get_body("/").contains(file_name));
}

#[test]
fn post_without_text_is_rejected() {
    let app = setup();
    app.create_user("leo");
    app.login("leo");

    let response = app.post_form("/new/", "text=++&group=");
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_string().unwrap();
    assert!(body.contains("This field is required."));
    assert_eq!(Post::count(&mut app.connection()).unwrap(), 0);
}

#[test]
fn non_image_upload_is_rejected() {
    let app = setup();
    app.create_user("leo");
    app.login("leo");

    let body = multipart_body(
        &[("text", "Not a picture")],
        Some(("notes.txt", "text/plain", &b"just text"[..])),
    );
    let response = app
        .client
        .post("/new/")
        .header(multipart_content_type())
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(response.into_string().unwrap().contains("Upload a valid image."));
    assert_eq!(Post::count(&mut app.connection()).unwrap(), 0);
}

#[test]
fn author_edits_own_post() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Classics", "classics");
    let post = app.create_post(&leo, "Draft text", None);
    app.login("leo");

    let edit_uri = format!("/leo/{}/edit/", post.id);
    assert!(app.get_body(&edit_uri).contains("Draft text"));

    let response = app.post_form(&edit_uri, &format!("text=Final+text&group={}", group.id));
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some(format!("/leo/{}/", post.id).as_str()));

    let updated = posts::table
        .find(post.id)
        .first::<Post>(&mut *app.connection())
        .unwrap();
    assert_eq!(updated.text, "Final text");
    assert_eq!(updated.group_id, Some(group.id));
    assert_eq!(Post::count(&mut app.connection()).unwrap(), 1);
}

#[test]
fn only_the_author_may_edit() {
    let app = setup();
    let leo = app.create_user("leo");
    app.create_user("fyodor");
    let post = app.create_post(&leo, "Leo's words", None);
    let edit_uri = format!("/leo/{}/edit/", post.id);
    let view_uri = format!("/leo/{}/", post.id);

    let response = app.client.get(edit_uri.clone()).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(
        location(&response),
        Some(login_redirect(&edit_uri).as_str())
    );

    app.login("fyodor");
    let response = app.client.get(edit_uri.clone()).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some(view_uri.as_str()));

    let response = app.post_form(&edit_uri, "text=Hijacked");
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response), Some(view_uri.as_str()));

    let unchanged = posts::table
        .find(post.id)
        .first::<Post>(&mut *app.connection())
        .unwrap();
    assert_eq!(unchanged.text, "Leo's words");
}

#[test]
fn index_cache_does_not_grow_with_junk_page_numbers() {
    let app = setup();
    let leo = app.create_user("leo");
    app.create_post(&leo, "Only post", None);

    for n in 0..200 {
        assert_eq!(post_cards(&app.get_body(&format!("/?page=x{}", n))), 1);
    }
    assert_eq!(app.cache().len(), 1);
}

fn upload_post(app: &TestApp, filename: &str, content_type: &str, bytes: &[u8]) -> Status {
    let body = multipart_body(
        &[("text", "Look at this")],
        Some((filename, content_type, bytes)),
    );
    app.client
        .post("/new/")
        .header(multipart_content_type())
        .body(body)
        .dispatch()
        .status()
}

#[test]
fn upload_is_checked_by_content_not_label() {
    let app = setup();
    app.create_user("leo");
    app.login("leo");

    let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>";
    assert_eq!(upload_post(&app, "x.svg", "image/svg+xml", svg), Status::Ok);
    assert_eq!(upload_post(&app, "fake.gif", "image/gif", b"GIF89a not really"), Status::Ok);
    assert_eq!(Post::count(&mut app.connection()).unwrap(), 0);

    // A real GIF labelled as text still counts as an image, stored as .gif.
    assert_eq!(upload_post(&app, "pixel", "application/octet-stream", SMALL_GIF), Status::SeeOther);
    let post = posts::table.first::<Post>(&mut *app.connection()).unwrap();
    assert!(post.image.unwrap().ends_with(".gif"));
}

#[test]
fn unknown_or_malformed_group_is_rejected() {
    let app = setup();
    app.create_user("leo");
    app.login("leo");

    for group in &["9999", "abc"] {
        let response = app.post_form("/new/", &format!("text=hi&group={}", group));
        assert_eq!(response.status(), Status::Ok, "group={}", group);
        assert!(response.into_string().unwrap().contains("Select a valid choice."));
    }
    assert_eq!(Post::count(&mut app.connection()).unwrap(), 0);
}

#[test]
fn invalid_group_on_edit_keeps_post_unchanged() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Classics", "classics");
    let post = app.create_post(&leo, "Grouped post", Some(&group));
    app.login("leo");

    let response = app.post_form(&format!("/leo/{}/edit/", post.id), "text=Changed&group=abc");
    assert_eq!(response.status(), Status::Ok);

    let stored = posts::table
        .find(post.id)
        .first::<Post>(&mut *app.connection())
        .unwrap();
    assert_eq!(stored.text, "Grouped post");
    assert_eq!(stored.group_id, Some(group.id));
}

#[test]
fn edit_without_new_file_keeps_image() {
    let app = setup();
    app.create_user("leo");
    app.login("leo");
    assert_eq!(upload_post(&app, "small.gif", "image/gif", SMALL_GIF), Status::SeeOther);

    let post = posts::table.first::<Post>(&mut *app.connection()).unwrap();
    let image = post.image.clone().expect("image stored");

    let response = app.post_form(&format!("/leo/{}/edit/", post.id), "text=New+words&group=");
    assert_eq!(response.status(), Status::SeeOther);

    let stored = posts::table
        .find(post.id)
        .first::<Post>(&mut *app.connection())
        .unwrap();
    assert_eq!(stored.text, "New words");
    assert_eq!(stored.image, Some(image));
}

#[test]
fn group_and_profile_pages_are_paginated() {
    let app = setup();
    let leo = app.create_user("leo");
    let group = app.create_group("Classics", "classics");
    for n in 0..13 {
        app.create_post(&leo, &format!("Chapter {}", n), Some(&group));
    }

    assert_eq!(post_cards(&app.get_body("/group/classics/")), 10);
    assert_eq!(post_cards(&app.get_body("/group/classics/?page=2")), 3);
    assert_eq!(post_cards(&app.get_body("/leo/")), 10);
    assert_eq!(post_cards(&app.get_body("/leo/?page=2")), 3);
}

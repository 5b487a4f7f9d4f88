mod common;

use axum::http::StatusCode;
use chrono::{DateTime, TimeDelta, Utc};
use common::{Part, generate_unique_school_name, png, setup_test_app, start_time};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_and_get_school(pool: PgPool) {
    let app = setup_test_app(pool);
    let name = generate_unique_school_name();
    let id = app.create_school(&name).await;

    let (status, body) = app.get(&format!("/api/schools/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], name);
    assert!(body["logo_url"].is_null());
    assert!(body["logo_delete_pending_until"].is_null());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_school_duplicate_name(pool: PgPool) {
    let app = setup_test_app(pool);
    let name = generate_unique_school_name();
    app.create_school(&name).await;

    let (status, _) = app
        .post_json("/api/schools", json!({ "name": name }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_school_validation(pool: PgPool) {
    let app = setup_test_app(pool);
    let (status, _) = app.post_json("/api/schools", json!({ "name": "" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_get_nonexistent_school(pool: PgPool) {
    let app = setup_test_app(pool);
    let (status, _) = app
        .get(&format!("/api/schools/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_schools_filters_by_name(pool: PgPool) {
    let app = setup_test_app(pool);
    let marker = uuid::Uuid::new_v4().to_string();
    app.create_school(&format!("Al-Noor {}", marker)).await;
    app.create_school(&generate_unique_school_name()).await;

    let (status, body) = app
        .get(&format!("/api/schools?name={}&limit=5", marker))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_first_logo_upload_sets_current_only(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    let (status, body) = app
        .patch_multipart(&uri, &[Part::Text("phone", "+44 20 7946 0000"), png("logo", "a.png")])
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["phone"], "+44 20 7946 0000");
    let key = body["logo_object_key"].as_str().unwrap();
    assert!(key.starts_with(&format!("schools/{}/logo/", id)));
    assert_eq!(body["uploaded_image_url"], body["logo_url"]);
    assert!(body["moved_old_image_url"].is_null());
    assert!(body["logo_url_old"].is_null());
    assert_eq!(body["media"][0]["outcome"], "replaced");
    assert!(app.storage.contains(key));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_replacing_logo_retains_previous_until_swept(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    let (_, first) = app.patch_multipart(&uri, &[png("logo", "a.png")]).await;
    let first_key = first["logo_object_key"].as_str().unwrap().to_string();

    let (status, second) = app.patch_multipart(&uri, &[png("logo", "b.png")]).await;
    assert_eq!(status, StatusCode::OK, "{second}");

    // The displaced logo now lives in the trash and is tracked as old.
    let old_key = second["logo_object_key_old"].as_str().unwrap().to_string();
    assert_eq!(old_key, format!(".trash/30d/{}", first_key));
    assert_eq!(second["moved_old_image_url"], second["logo_url_old"]);
    assert!(!app.storage.contains(&first_key));
    assert!(app.storage.contains(&old_key));

    let pending: DateTime<Utc> =
        serde_json::from_value(second["logo_delete_pending_until"].clone()).unwrap();
    assert_eq!(pending, start_time() + TimeDelta::days(30));

    // Not due yet.
    let (_, due) = app.get("/api/media/due").await;
    assert!(due["data"].as_array().unwrap().is_empty());

    app.clock.advance(TimeDelta::days(31));

    let (_, due) = app.get("/api/media/due").await;
    let due = due["data"].as_array().unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0]["table"], "schools");
    assert_eq!(due[0]["slot"], "logo");
    assert_eq!(due[0]["object_key"], old_key);

    let (status, report) = app.send(common::json_request("POST", "/api/media/sweep", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["reclaimed"], 1);
    assert!(!app.storage.contains(&old_key));

    let (_, school) = app.get(&uri).await;
    assert!(school["logo_url_old"].is_null());
    assert!(school["logo_object_key_old"].is_null());
    assert!(school["logo_delete_pending_until"].is_null());
    assert_eq!(school["logo_object_key"], second["logo_object_key"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_third_replace_supersedes_pending_old(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    app.patch_multipart(&uri, &[png("icon", "1.png")]).await;
    let (_, second) = app.patch_multipart(&uri, &[png("icon", "2.png")]).await;
    let superseded = second["icon_object_key_old"].as_str().unwrap().to_string();

    let (status, third) = app.patch_multipart(&uri, &[png("icon", "3.png")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.storage.contains(&superseded));
    assert_ne!(third["icon_object_key_old"], second["icon_object_key_old"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_same_explicit_url_is_a_no_op(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    let (_, first) = app.patch_multipart(&uri, &[png("background", "bg.png")]).await;

    let (status, again) = app
        .patch_json(
            &uri,
            json!({
                "background_url": first["background_url"],
                "background_object_key": first["background_object_key"],
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{again}");
    assert_eq!(again["media"][0]["outcome"], "unchanged");
    assert!(again["background_url_old"].is_null());
    assert!(again["moved_old_image_url"].is_null());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_explicit_url_key_is_resolved(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let stored = app.storage.put("imports/logo.png", b"png");

    let (status, body) = app
        .patch_json(
            &format!("/api/schools/{}", id),
            json!({ "logo_url": stored.url }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["logo_object_key"], "imports/logo.png");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_unresolvable_explicit_url_is_rejected(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;

    let (status, _) = app
        .patch_json(
            &format!("/api/schools/{}", id),
            json!({ "logo_url": "https://elsewhere.test/logo.png" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_upload_leaves_school_untouched(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);
    app.storage.fail_uploads(true);

    let (status, _) = app
        .patch_multipart(&uri, &[Part::Text("name", "Renamed"), png("logo", "a.png")])
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, school) = app.get(&uri).await;
    assert_ne!(school["name"], "Renamed");
    assert!(school["logo_url"].is_null());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_rejected_mime_type(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;

    let (status, _) = app
        .patch_multipart(
            &format!("/api/schools/{}", id),
            &[Part::File {
                name: "logo",
                filename: "logo.svg",
                content_type: "image/svg+xml",
                bytes: b"<svg/>",
            }],
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.storage.keys().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_failed_trash_move_is_non_fatal(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    let (_, first) = app.patch_multipart(&uri, &[png("logo", "a.png")]).await;
    app.storage.fail_trash(true);

    let (status, second) = app.patch_multipart(&uri, &[png("logo", "b.png")]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["moved_old_image_url"].is_null());
    assert_eq!(second["logo_url_old"], first["logo_url"]);
    assert!(!second["media"][0]["warnings"].as_array().unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_clear_logo(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    app.patch_multipart(&uri, &[png("logo", "a.png")]).await;

    let (status, body) = app.delete(&format!("{}/media/logo", uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["logo_url"].is_null());
    assert!(body["logo_url_old"].is_string());
    assert_eq!(body["media"][0]["outcome"], "cleared");

    // Clearing an empty slot changes nothing.
    let (status, body) = app.delete(&format!("{}/media/icon", uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["media"][0]["outcome"], "unchanged");

    let (status, _) = app.delete(&format!("{}/media/banner", uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_school_removes_assets(pool: PgPool) {
    let app = setup_test_app(pool);
    let id = app.create_school(&generate_unique_school_name()).await;
    let uri = format!("/api/schools/{}", id);

    app.patch_multipart(&uri, &[png("logo", "a.png")]).await;
    app.patch_multipart(&uri, &[png("logo", "b.png"), png("icon", "i.png")])
        .await;
    assert_eq!(app.storage.keys().len(), 3);

    let (status, _) = app.delete(&uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.storage.keys().is_empty());

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

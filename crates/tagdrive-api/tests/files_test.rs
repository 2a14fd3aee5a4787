//! File API integration tests.
//!
//! Run with: `cargo test -p tagdrive-api --test files_test`

mod helpers;

use std::io::{Cursor, Read};

use helpers::{create_test_png, filenames, setup_test_app, setup_test_app_with};
use serde_json::Value;

#[tokio::test]
async fn test_upload_then_query_by_expression() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    let a = app.add_tag(&cookie, "a").await;
    let b = app.add_tag(&cookie, "b").await;
    let c = app.add_tag(&cookie, "c").await;
    assert_eq!((a, b, c), (1, 2, 3));

    let statuses = app
        .upload(&cookie, "photo.png", create_test_png(64, 48), "1,2")
        .await;
    assert_eq!(statuses[0]["filename"], "photo.png");
    assert_eq!(statuses[0]["isError"], false);
    assert_eq!(statuses[0]["status"], "uploaded");

    assert!(app.list_files(&cookie, &[("expr", "1&3")]).await.is_empty());
    assert_eq!(
        filenames(&app.list_files(&cookie, &[("expr", "1")]).await),
        ["photo.png"]
    );
    assert_eq!(
        filenames(&app.list_files(&cookie, &[("expr", "1|3")]).await),
        ["photo.png"]
    );
    assert_eq!(
        filenames(&app.list_files(&cookie, &[("expr", "!3")]).await),
        ["photo.png"]
    );

    let file: Value = app
        .client()
        .get("/api/file/1")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(file["origin"], "/data/1");
    assert_eq!(file["preview"], "/data/resized/1");
    assert_eq!(file["tags"], serde_json::json!([1, 2]));
}

#[tokio::test]
async fn test_bad_expression_is_rejected() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    let response = app
        .client()
        .get("/api/files")
        .add_header("Cookie", cookie)
        .add_query_param("expr", "1&")
        .await;

    assert_eq!(response.status_code(), 400);
    assert_eq!(response.json::<Value>()["code"], "BAD_EXPRESSION_SYNTAX");
}

#[tokio::test]
async fn test_sort_search_and_paging() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    app.upload(&cookie, "beta.txt", vec![b'x'; 30], "").await;
    app.upload(&cookie, "alpha.txt", vec![b'x'; 10], "").await;
    app.upload(&cookie, "gamma.md", vec![b'x'; 20], "").await;

    let by_name = app.list_files(&cookie, &[]).await;
    assert_eq!(filenames(&by_name), ["alpha.txt", "beta.txt", "gamma.md"]);

    let by_size_desc = app
        .list_files(&cookie, &[("sort", "size"), ("order", "desc")])
        .await;
    assert_eq!(filenames(&by_size_desc), ["beta.txt", "gamma.md", "alpha.txt"]);

    let searched = app.list_files(&cookie, &[("search", "TXT")]).await;
    assert_eq!(filenames(&searched), ["alpha.txt", "beta.txt"]);

    let regexp = app
        .list_files(&cookie, &[("search", "^g.*\\.md$"), ("isRegexp", "true")])
        .await;
    assert_eq!(filenames(&regexp), ["gamma.md"]);

    let page = app
        .list_files(&cookie, &[("offset", "1"), ("count", "1")])
        .await;
    assert_eq!(filenames(&page), ["beta.txt"]);

    let out_of_bounds = app
        .client()
        .get("/api/files")
        .add_header("Cookie", cookie)
        .add_query_param("offset", "4")
        .await;
    assert_eq!(out_of_bounds.status_code(), 400);
}

#[tokio::test]
async fn test_recent_files_newest_first() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    for name in ["1.txt", "2.txt", "3.txt"] {
        app.upload(&cookie, name, b"data".to_vec(), "").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let response = app
        .client()
        .get("/api/files/recent")
        .add_header("Cookie", cookie)
        .add_query_param("number", "2")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(filenames(&response.json::<Vec<Value>>()), ["3.txt", "2.txt"]);
}

#[tokio::test]
async fn test_data_endpoints_serve_bytes() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    app.upload(&cookie, "notes.txt", b"hello tagdrive".to_vec(), "")
        .await;
    app.upload(&cookie, "pic.png", create_test_png(300, 200), "")
        .await;

    let original = app
        .client()
        .get("/data/1")
        .add_header("Cookie", cookie.clone())
        .await;
    assert_eq!(original.status_code(), 200);
    assert_eq!(original.as_bytes().as_ref(), b"hello tagdrive");
    assert!(original
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let no_preview = app
        .client()
        .get("/data/resized/1")
        .add_header("Cookie", cookie.clone())
        .await;
    assert_eq!(no_preview.status_code(), 404);

    let preview = app
        .client()
        .get("/data/resized/2")
        .add_header("Cookie", cookie)
        .await;
    assert_eq!(preview.status_code(), 200);
    let thumb = image::load_from_memory(preview.as_bytes()).unwrap();
    assert!(thumb.width() < 300);
}

#[tokio::test]
async fn test_upload_larger_than_memory_threshold() {
    let app = setup_test_app_with(|config| {
        config.web.upload_max_in_memory_bytes = 1024;
    })
    .await;
    let cookie = app.login().await;

    let data: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    assert!(data.len() < app.state.config.web.upload_max_size_bytes);

    let statuses = app.upload(&cookie, "big.bin", data.clone(), "").await;
    assert_eq!(statuses[0]["isError"], false);

    let file: Value = app
        .client()
        .get("/api/file/1")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(file["size"], data.len() as u64);

    let stored = app
        .client()
        .get("/data/1")
        .add_header("Cookie", cookie)
        .await;
    assert_eq!(stored.status_code(), 200);
    assert_eq!(stored.as_bytes().as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_upload_rejects_empty_filename() {
    let app = setup_test_app().await;
    let cookie = app.login().await;

    let statuses = app.upload(&cookie, "", b"x".to_vec(), "").await;
    assert_eq!(statuses[0]["isError"], true);
    assert_eq!(statuses[0]["filename"], "");

    assert!(app.list_files(&cookie, &[]).await.is_empty());
}

#[tokio::test]
async fn test_edit_file_fields() {
    let app = setup_test_app().await;
    let cookie = app.login().await;
    let tag = app.add_tag(&cookie, "work").await;
    app.upload(&cookie, "old.txt", b"x".to_vec(), "").await;

    let rename = app
        .client()
        .put("/api/file/1/name")
        .add_header("Cookie", cookie.clone())
        .form(&[("new-name", "new.txt")])
        .await;
    assert_eq!(rename.status_code(), 200);

    let empty_name = app
        .client()
        .put("/api/file/1/name")
        .add_header("Cookie", cookie.clone())
        .form(&[("new-name", "")])
        .await;
    assert_eq!(empty_name.status_code(), 400);

    let tags = app
        .client()
        .put("/api/file/1/tags")
        .add_header("Cookie", cookie.clone())
        .form(&[("tags", format!("{},99", tag))])
        .await;
    assert_eq!(tags.status_code(), 200);

    let description = app
        .client()
        .put("/api/file/1/description")
        .add_header("Cookie", cookie.clone())
        .form(&[("description", "quarterly report")])
        .await;
    assert_eq!(description.status_code(), 200);

    let file: Value = app
        .client()
        .get("/api/file/1")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(file["filename"], "new.txt");
    assert_eq!(file["type"]["ext"], ".txt");
    assert_eq!(file["tags"], serde_json::json!([tag]));
    assert_eq!(file["description"], "quarterly report");

    let bad_id = app
        .client()
        .put("/api/file/abc/name")
        .add_header("Cookie", cookie)
        .form(&[("new-name", "x")])
        .await;
    assert_eq!(bad_id.status_code(), 400);
    assert_eq!(bad_id.json::<Value>()["error"], "bad id syntax");
}

#[tokio::test]
async fn test_bulk_tag_changes() {
    let app = setup_test_app().await;
    let cookie = app.login().await;
    let tag = app.add_tag(&cookie, "bulk").await;
    app.upload(&cookie, "a.txt", b"a".to_vec(), "").await;
    app.upload(&cookie, "b.txt", b"b".to_vec(), "").await;

    let added = app
        .client()
        .post("/api/files/tags")
        .add_header("Cookie", cookie.clone())
        .form(&[("files", "1,2"), ("tags", tag.to_string().as_str())])
        .await;
    assert_eq!(added.status_code(), 200);
    let tagged = app
        .list_files(&cookie, &[("expr", tag.to_string().as_str())])
        .await;
    assert_eq!(filenames(&tagged), ["a.txt", "b.txt"]);

    let removed = app
        .client()
        .delete("/api/files/tags")
        .add_header("Cookie", cookie.clone())
        .add_query_param("files", "1")
        .add_query_param("tags", tag)
        .await;
    assert_eq!(removed.status_code(), 200);
    let tagged = app
        .list_files(&cookie, &[("expr", tag.to_string().as_str())])
        .await;
    assert_eq!(filenames(&tagged), ["b.txt"]);
}

#[tokio::test]
async fn test_delete_recover_and_force_delete() {
    let app = setup_test_app().await;
    let cookie = app.login().await;
    app.upload(&cookie, "keep.txt", b"k".to_vec(), "").await;
    app.upload(&cookie, "drop.txt", b"d".to_vec(), "").await;

    let trashed: Vec<Value> = app
        .client()
        .delete("/api/files")
        .add_header("Cookie", cookie.clone())
        .add_query_param("ids", "1,42")
        .await
        .json();
    assert_eq!(trashed[0]["status"], "added into trash");
    assert_eq!(trashed[1]["isError"], true);
    assert_eq!(trashed[1]["filename"], "");

    let file: Value = app
        .client()
        .get("/api/file/1")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(file["deleted"], true);

    let recover = app
        .client()
        .post("/api/files/recover")
        .add_header("Cookie", cookie.clone())
        .form(&[("ids", "1")])
        .await;
    assert_eq!(recover.status_code(), 200);
    let file: Value = app
        .client()
        .get("/api/file/1")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(file["deleted"], false);

    let empty_recover = app
        .client()
        .post("/api/files/recover")
        .add_header("Cookie", cookie.clone())
        .await;
    assert_eq!(empty_recover.status_code(), 400);

    let forced: Vec<Value> = app
        .client()
        .delete("/api/files")
        .add_header("Cookie", cookie.clone())
        .add_query_param("ids", "2")
        .add_query_param("force", "true")
        .await
        .json();
    assert_eq!(forced[0]["status"], "deleted");
    assert_eq!(forced[0]["filename"], "drop.txt");

    let gone = app
        .client()
        .get("/api/file/2")
        .add_header("Cookie", cookie.clone())
        .await;
    assert_eq!(gone.status_code(), 404);
    let data = app
        .client()
        .get("/data/2")
        .add_header("Cookie", cookie)
        .await;
    assert_eq!(data.status_code(), 404);
}

#[tokio::test]
async fn test_download_archive() {
    let app = setup_test_app().await;
    let cookie = app.login().await;
    app.upload(&cookie, "one.txt", b"first".to_vec(), "").await;
    app.upload(&cookie, "two.txt", b"second".to_vec(), "").await;

    let response = app
        .client()
        .get("/api/files/download")
        .add_header("Cookie", cookie)
        .add_query_param("ids", "1,2")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("content-type"), "application/zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
    let mut content = String::new();
    archive
        .by_name("two.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "second");
}

#[tokio::test]
async fn test_metadata_survives_restart() {
    let app = setup_test_app().await;
    let cookie = app.login().await;
    app.upload(&cookie, "persist.txt", b"p".to_vec(), "").await;

    app.state.stores.shutdown(None).await;

    let config = app.state.config.clone();
    let stores = tagdrive_services::Stores::open(&config).await.unwrap();
    let file = stores.files.get_file(1).await.unwrap();
    assert_eq!(file.filename, "persist.txt");
}

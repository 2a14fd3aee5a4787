//! Share token integration tests.
//!
//! Run with: `cargo test -p tagdrive-api --test share_test`

mod helpers;

use helpers::{filenames, setup_test_app, TestApp};
use serde_json::Value;

/// Five files; the tag of file N is N. Returns the owner cookie.
async fn seed(app: &TestApp) -> String {
    let cookie = app.login().await;
    for n in 1..=5 {
        let tag = app.add_tag(&cookie, &format!("t{}", n)).await;
        app.upload(&cookie, &format!("f{}.txt", n), vec![b'0' + n as u8], &tag.to_string())
            .await;
    }
    cookie
}

async fn create_token(app: &TestApp, cookie: &str, ids: &str) -> String {
    let response = app
        .client()
        .post("/api/share/token")
        .add_header("Cookie", cookie.to_string())
        .form(&[("ids", ids)])
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json::<Value>()["token"]
        .as_str()
        .expect("token missing")
        .to_string()
}

#[tokio::test]
async fn test_shared_listing_is_filtered() {
    let app = setup_test_app().await;
    let cookie = seed(&app).await;
    let token = create_token(&app, &cookie, "1,3,5,9").await;

    let ids: Vec<u64> = app
        .client()
        .get(&format!("/api/share/token/{}", token))
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(ids, vec![1, 3, 5]);

    let files: Vec<Value> = app
        .client()
        .get("/api/files")
        .add_query_param("shareToken", &token)
        .add_query_param("expr", "1|2|3")
        .await
        .json();
    assert_eq!(filenames(&files), ["f1.txt", "f3.txt"]);

    let tags: Value = app
        .client()
        .get("/api/tags")
        .add_query_param("shareToken", &token)
        .await
        .json();
    let mut tag_ids: Vec<&String> = tags.as_object().unwrap().keys().collect();
    tag_ids.sort();
    assert_eq!(tag_ids, ["1", "3", "5"]);
}

#[tokio::test]
async fn test_shared_file_access() {
    let app = setup_test_app().await;
    let cookie = seed(&app).await;
    let token = create_token(&app, &cookie, "2").await;

    let shared = app
        .client()
        .get("/api/file/2")
        .add_query_param("shareToken", &token)
        .await;
    assert_eq!(shared.status_code(), 200);

    let data = app
        .client()
        .get("/data/2")
        .add_query_param("shareToken", &token)
        .await;
    assert_eq!(data.status_code(), 200);
    assert_eq!(data.as_bytes().as_ref(), b"2");

    let hidden = app
        .client()
        .get("/api/file/3")
        .add_query_param("shareToken", &token)
        .await;
    assert_eq!(hidden.status_code(), 404);

    let hidden_data = app
        .client()
        .get("/data/3")
        .add_query_param("shareToken", &token)
        .await;
    assert_eq!(hidden_data.status_code(), 404);
}

#[tokio::test]
async fn test_shared_download_skips_foreign_files() {
    let app = setup_test_app().await;
    let cookie = seed(&app).await;
    let token = create_token(&app, &cookie, "4").await;

    let response = app
        .client()
        .get("/api/files/download")
        .add_query_param("shareToken", &token)
        .add_query_param("ids", "1,4")
        .await;
    assert_eq!(response.status_code(), 200);

    let archive = zip::ZipArchive::new(std::io::Cursor::new(response.as_bytes().to_vec())).unwrap();
    let names: Vec<&str> = archive.file_names().collect();
    assert_eq!(names, ["f4.txt"]);
}

#[tokio::test]
async fn test_token_shrinks_with_deleted_files() {
    let app = setup_test_app().await;
    let cookie = seed(&app).await;
    let token = create_token(&app, &cookie, "1,2").await;

    app.client()
        .delete("/api/files")
        .add_header("Cookie", cookie.clone())
        .add_query_param("ids", "1")
        .add_query_param("force", "1")
        .await;

    let ids = app.state.share().get_file_ids(&token).await.unwrap();
    assert_eq!(ids, vec![2]);

    app.client()
        .delete("/api/files")
        .add_header("Cookie", cookie.clone())
        .add_query_param("ids", "2")
        .add_query_param("force", "1")
        .await;

    let files: Vec<Value> = app
        .client()
        .get("/api/files")
        .add_query_param("shareToken", &token)
        .await
        .json();
    assert!(files.is_empty());
}

#[tokio::test]
async fn test_list_and_delete_tokens() {
    let app = setup_test_app().await;
    let cookie = seed(&app).await;
    let first = create_token(&app, &cookie, "1").await;
    let second = create_token(&app, &cookie, "2,3").await;

    let all: Value = app
        .client()
        .get("/api/share/tokens")
        .add_header("Cookie", cookie.clone())
        .await
        .json();
    assert_eq!(all[&first], serde_json::json!([1]));
    assert_eq!(all[&second], serde_json::json!([2, 3]));

    let deleted = app
        .client()
        .delete(&format!("/api/share/token/{}", first))
        .add_header("Cookie", cookie.clone())
        .await;
    assert_eq!(deleted.status_code(), 200);

    let response = app
        .client()
        .get("/api/files")
        .add_query_param("shareToken", &first)
        .await;
    assert_eq!(response.status_code(), 400);

    let unknown = app
        .client()
        .get(&format!("/api/share/token/{}", first))
        .add_header("Cookie", cookie)
        .await;
    assert_eq!(unknown.status_code(), 400);
}

use crosspost_common::CrosspostError;
use crosspost_config::TwitterConfig;
use crosspost_social::twitter::{TweetOptions, TwitterClient};
use reqwest::Method;
use serde_json::{Value, json};
use std::io::Write;
use std::path::Path;
use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const UPLOAD_PATH: &str = "/1.1/media/upload.json";

fn test_config(server: &MockServer) -> TwitterConfig {
    let mut config = TwitterConfig::new("ck", "cs", "at", "ats");
    config.api_base = format!("{}/", server.uri());
    config.upload_base = format!("{}/", server.uri());
    config
}

async fn mount_verify(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id_str": "42",
            "screen_name": "crossbot",
            "name": "Cross Bot"
        })))
        .mount(server)
        .await;
}

async fn session(server: &MockServer) -> TwitterClient {
    mount_verify(server).await;
    TwitterClient::initialize(&test_config(server)).await.unwrap()
}

/// INIT and FINALIZE for one media id; the first INIT mounted answers first.
async fn mount_media(server: &MockServer, media_id: &str) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("command=INIT"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({ "media_id_string": media_id })),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("command=FINALIZE"))
        .and(body_string_contains(format!("media_id={media_id}")))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "media_id_string": media_id,
            "processing_info": { "state": "pending", "check_after_secs": 1 }
        })))
        .mount(server)
        .await;
}

async fn mount_append(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("APPEND"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

async fn mount_tweet(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(header_exists("authorization"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "data": { "id": "1799", "text": "hello" } })),
        )
        .mount(server)
        .await;
}

fn upload_step(request: &Request) -> Option<String> {
    if request.url.path() != UPLOAD_PATH {
        return None;
    }
    let body = String::from_utf8_lossy(&request.body);
    let step = if body.contains("command=INIT") {
        "INIT"
    } else if body.contains("command=FINALIZE") {
        "FINALIZE"
    } else {
        "APPEND"
    };
    Some(step.to_string())
}

fn temp_media(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file
}

#[tokio::test]
async fn initialize_verifies_credentials() {
    let server = MockServer::start().await;
    let client = session(&server).await;

    assert_eq!(client.account().id_str, "42");
    assert_eq!(client.account().screen_name.as_deref(), Some("crossbot"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let auth = requests[0].headers.get("authorization").unwrap();
    let auth = auth.to_str().unwrap();
    assert!(auth.starts_with("OAuth "));
    assert!(auth.contains("oauth_consumer_key=\"ck\""));
    assert!(auth.contains("oauth_token=\"at\""));
    assert!(auth.contains("oauth_signature_method=\"HMAC-SHA1\""));
}

#[tokio::test]
async fn rejected_credentials_fail_initialize() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{ "code": 32, "message": "Could not authenticate you." }]
        })))
        .mount(&server)
        .await;

    let err = TwitterClient::initialize(&test_config(&server))
        .await
        .err()
        .unwrap();
    match err {
        CrosspostError::Auth { status, message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Could not authenticate you.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn throttled_verification_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1.1/account/verify_credentials.json"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "errors": [{ "code": 88, "message": "Rate limit exceeded" }]
        })))
        .mount(&server)
        .await;

    let err = TwitterClient::initialize(&test_config(&server))
        .await
        .err()
        .unwrap();
    match err {
        CrosspostError::Provider {
            status, message, ..
        } => {
            assert_eq!(status, 429);
            assert_eq!(message, "Rate limit exceeded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn blank_credentials_never_reach_the_network() {
    let server = MockServer::start().await;
    let mut config = test_config(&server);
    config.access_token_secret = String::new();

    let err = TwitterClient::initialize(&config).await.err().unwrap();
    assert!(matches!(err, CrosspostError::Config(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn send_message_without_media() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    mount_tweet(&server).await;

    let tweet = client
        .send_message::<&Path>("hello", &[], &TweetOptions::new())
        .await
        .unwrap();
    assert_eq!(tweet.data.id, "1799");

    let requests = server.received_requests().await.unwrap();
    let post = requests.last().unwrap();
    assert_eq!(post.url.path(), "/2/tweets");
    let body: Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body, json!({ "text": "hello" }));
}

#[tokio::test]
async fn send_message_uploads_each_file_in_order() {
    let server = MockServer::start().await;
    let client = session(&server).await.with_chunk_size(3);
    mount_media(&server, "m-1").await;
    mount_media(&server, "m-2").await;
    mount_append(&server).await;
    mount_tweet(&server).await;

    let first = temp_media(".png", b"abcdefg");
    let second = temp_media(".gif", b"xy");

    let mut options = TweetOptions::new();
    options.insert("reply_settings".into(), json!("following"));
    client
        .send_message("hello", &[first.path(), second.path()], &options)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let steps: Vec<String> = requests.iter().filter_map(upload_step).collect();
    assert_eq!(
        steps,
        vec![
            "INIT", "APPEND", "APPEND", "APPEND", "FINALIZE", "INIT", "APPEND", "FINALIZE"
        ]
    );

    let init = String::from_utf8_lossy(&requests[1].body).into_owned();
    assert!(init.contains("total_bytes=7"));
    assert!(init.contains("media_type=image%2Fpng"));

    let last_segment = String::from_utf8_lossy(&requests[4].body).into_owned();
    assert!(last_segment.contains("m-1"));
    assert!(last_segment.contains("name=\"segment_index\"\r\n\r\n2"));
    assert!(last_segment.contains("g"));

    let tweet = requests.last().unwrap();
    assert_eq!(tweet.url.path(), "/2/tweets");
    let body: Value = serde_json::from_slice(&tweet.body).unwrap();
    assert_eq!(body["text"], "hello");
    assert_eq!(body["reply_settings"], "following");
    assert_eq!(body["media"]["media_ids"], json!(["m-1", "m-2"]));
}

#[tokio::test]
async fn failed_upload_stops_before_tweeting() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "code": 324, "message": "Invalid media" }]
        })))
        .mount(&server)
        .await;
    mount_tweet(&server).await;

    let media = temp_media(".png", b"abc");
    let err = client
        .send_message("hello", &[media.path()], &TweetOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "twitter error 400: Invalid media");

    let requests = server.received_requests().await.unwrap();
    assert!(!requests.iter().any(|r| r.url.path() == "/2/tweets"));
}

#[tokio::test]
async fn duplicate_tweet_reports_provider_status() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "You are not allowed to create a Tweet with duplicate content.",
            "title": "Forbidden",
            "status": 403
        })))
        .mount(&server)
        .await;

    let err = client
        .send_message::<&Path>("again", &[], &TweetOptions::new())
        .await
        .unwrap_err();
    match err {
        CrosspostError::Provider {
            status, message, ..
        } => {
            assert_eq!(status, 403);
            assert!(message.contains("duplicate content"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn request_get_puts_fields_in_query() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("GET"))
        .and(path("/1.1/statuses/user_timeline.json"))
        .and(query_param("count", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id_str": "1" }])))
        .mount(&server)
        .await;

    let answer = client
        .request(
            "statuses/user_timeline",
            Method::GET,
            Some(&[("count", Some("2")), ("max_id", None)][..]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(answer, json!([{ "id_str": "1" }]));

    let requests = server.received_requests().await.unwrap();
    let query = requests.last().unwrap().url.query().unwrap_or_default().to_string();
    assert_eq!(query, "count=2");
}

#[tokio::test]
async fn request_post_sends_urlencoded_fields() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("POST"))
        .and(path("/1.1/friendships/create.json"))
        .and(body_string_contains("screen_name=someone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "following": true })))
        .mount(&server)
        .await;

    let answer = client
        .request(
            "/friendships/create",
            Method::POST,
            Some(&[("screen_name", Some("someone"))][..]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(answer["following"], true);
}

#[tokio::test]
async fn request_with_files_sends_multipart() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("POST"))
        .and(path("/1.1/account/update_profile_image.json"))
        .and(body_string_contains("name=\"image\""))
        .and(body_string_contains("PIXELS"))
        .and(body_string_contains("name=\"skip_status\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id_str": "42" })))
        .expect(1)
        .mount(&server)
        .await;

    let image = temp_media(".png", b"PIXELS");
    client
        .request(
            "account/update_profile_image",
            Method::POST,
            Some(&[("skip_status", Some("true"))][..]),
            Some(&[("image", image.path())][..]),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn at_prefixed_field_with_files_is_rejected() {
    let server = MockServer::start().await;
    let client = session(&server).await;

    let image = temp_media(".png", b"PIXELS");
    let err = client
        .request(
            "statuses/update",
            Method::POST,
            Some(&[("status", Some("@someone hi"))][..]),
            Some(&[("media", image.path())][..]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrosspostError::InvalidRequest(_)));

    // only the verification call went out
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn at_prefixed_field_without_files_is_sent() {
    let server = MockServer::start().await;
    let client = session(&server).await;
    Mock::given(method("POST"))
        .and(path("/1.1/statuses/update.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id_str": "9" })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .request(
            "statuses/update",
            Method::POST,
            Some(&[("status", Some("@someone hi"))][..]),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn unreadable_upload_file_is_rejected() {
    let server = MockServer::start().await;
    let client = session(&server).await;

    let err = client
        .request(
            "account/update_profile_image",
            Method::POST,
            None,
            Some(&[("image", Path::new("/no/such/file.png"))][..]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrosspostError::InvalidRequest(_)));
}

#[tokio::test]
async fn files_require_post() {
    let server = MockServer::start().await;
    let client = session(&server).await;

    let image = temp_media(".png", b"PIXELS");
    let err = client
        .request(
            "account/update_profile_image",
            Method::GET,
            None,
            Some(&[("image", image.path())][..]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrosspostError::InvalidRequest(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

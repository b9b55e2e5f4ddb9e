//! OAuth 1.0a user-context client for posting to Twitter/X.
//!
//! [`TwitterClient::initialize`] verifies the configured credentials once and hands
//! back a session value; every later call borrows that session instead of reaching
//! for process-wide state. Tweets go through the v2 endpoint, media through the
//! v1.1 chunked upload protocol (`INIT` / `APPEND` / `FINALIZE`), and anything else
//! through [`TwitterClient::request`].
use crate::twitter::oauth::OAuthSigner;
use crate::twitter::types::{CreatedTweet, MediaUpload, TweetOptions, VerifiedAccount};
use crate::{http_to_crosspost, is_rejection, require};
use crosspost_common::{CrosspostError, Provider, Result};
use crosspost_config::TwitterConfig;
use crosspost_http::{Auth, Body, HttpClient, HttpError, HttpResponse, RequestOpts};
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::borrow::Cow;
use std::path::Path;

const LEGACY_API_PREFIX: &str = "1.1/";
const VERIFY_CREDENTIALS_PATH: &str = "1.1/account/verify_credentials.json";
const MEDIA_UPLOAD_PATH: &str = "1.1/media/upload.json";
const TWEETS_PATH: &str = "2/tweets";

/// Largest `APPEND` segment we send.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

enum SignedBody {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
    Multipart(Form),
}

struct SignedTransport {
    signer: OAuthSigner,
    api: HttpClient,
    upload: HttpClient,
}

impl SignedTransport {
    async fn send(
        &self,
        http: &HttpClient,
        method: Method,
        path: &str,
        mut query: Vec<(String, String)>,
        body: SignedBody,
    ) -> Result<HttpResponse> {
        let mut url = http
            .resolve(path, true)
            .map_err(|e| http_to_crosspost(Provider::Twitter, e))?;
        let mut inline: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        inline.append(&mut query);
        url.set_query(None);

        let mut signed_params = inline.clone();
        if let SignedBody::Form(fields) = &body {
            signed_params.extend(fields.iter().cloned());
        }
        let authorization = self
            .signer
            .authorization(method.as_str(), url.as_str(), &signed_params)?;

        let body = match body {
            SignedBody::Empty => None,
            SignedBody::Form(fields) => Some(Body::Form(fields)),
            SignedBody::Json(value) => Some(Body::json(&value).map_err(twitter_error)?),
            SignedBody::Multipart(form) => Some(Body::Multipart(form)),
        };

        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: AUTHORIZATION,
                value: authorization,
            }),
            query: (!inline.is_empty()).then(|| {
                inline
                    .iter()
                    .map(|(k, v)| (k.as_str(), Cow::Borrowed(v.as_str())))
                    .collect()
            }),
            allow_absolute: true,
            ..Default::default()
        };

        http.send(method, url.as_str(), body, opts)
            .await
            .map_err(twitter_error)
    }

    async fn verify_credentials(&self) -> Result<VerifiedAccount> {
        let resp = self
            .send(
                &self.api,
                Method::GET,
                VERIFY_CREDENTIALS_PATH,
                Vec::new(),
                SignedBody::Empty,
            )
            .await
            .map_err(|e| match e {
                CrosspostError::Provider {
                    status, message, ..
                } if is_rejection(status) => CrosspostError::Auth {
                    status: Some(status),
                    message,
                },
                other => other,
            })?;
        resp.json().map_err(twitter_error)
    }
}

/// A verified Twitter session.
pub struct TwitterClient {
    transport: SignedTransport,
    account: VerifiedAccount,
    chunk_size: usize,
}

impl TwitterClient {
    /// Build the signed session and verify the credentials against Twitter.
    pub async fn initialize(config: &TwitterConfig) -> Result<Self> {
        require("twitter.consumer_key", &config.consumer_key)?;
        require("twitter.consumer_secret", &config.consumer_secret)?;
        require("twitter.access_token", &config.access_token)?;
        require("twitter.access_token_secret", &config.access_token_secret)?;

        let api = HttpClient::new(&config.api_base)
            .map_err(|e| CrosspostError::Config(format!("twitter.api_base: {e}")))?;
        let upload = HttpClient::new(&config.upload_base)
            .map_err(|e| CrosspostError::Config(format!("twitter.upload_base: {e}")))?;

        let transport = SignedTransport {
            signer: OAuthSigner::new(config),
            api,
            upload,
        };
        let account = transport.verify_credentials().await?;
        tracing::info!(
            target: "social.twitter",
            account_id = %account.id_str,
            screen_name = ?account.screen_name,
            "twitter.session.verified"
        );

        Ok(Self {
            transport,
            account,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Override the `APPEND` segment size.
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn account(&self) -> &VerifiedAccount {
        &self.account
    }

    /// Check the credentials again and refresh the cached account.
    pub async fn verify_credentials(&mut self) -> Result<&VerifiedAccount> {
        self.account = self.transport.verify_credentials().await?;
        Ok(&self.account)
    }

    /// Upload every media file in order, then post the tweet referencing them.
    pub async fn send_message<P: AsRef<Path>>(
        &self,
        text: &str,
        media: &[P],
        options: &TweetOptions,
    ) -> Result<CreatedTweet> {
        let mut media_ids = Vec::with_capacity(media.len());
        for item in media {
            media_ids.push(self.upload_media(item.as_ref()).await?);
        }

        let body = tweet_body(text, &media_ids, options);
        let tweet: CreatedTweet = self
            .transport
            .send(
                &self.transport.api,
                Method::POST,
                TWEETS_PATH,
                Vec::new(),
                SignedBody::Json(body),
            )
            .await?
            .json()
            .map_err(twitter_error)?;

        tracing::info!(
            target: "social.twitter",
            tweet_id = %tweet.data.id,
            media = media_ids.len(),
            "twitter.tweet.created"
        );
        Ok(tweet)
    }

    /// Chunked media upload; returns the `media_id_string` to attach to a tweet.
    pub async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(CrosspostError::InvalidRequest(format!(
                "media file {} is empty",
                path.display()
            )));
        }
        let media_type = guess_media_type(path);
        let file_name = file_name(path);

        let init: MediaUpload = self
            .upload_command(SignedBody::Form(vec![
                ("command".into(), "INIT".into()),
                ("total_bytes".into(), bytes.len().to_string()),
                ("media_type".into(), media_type.clone()),
            ]))
            .await?
            .json()
            .map_err(twitter_error)?;
        let media_id = init.media_id_string;

        for (index, chunk) in bytes.chunks(self.chunk_size).enumerate() {
            let form = Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.clone())
                .text("segment_index", index.to_string())
                .part(
                    "media",
                    Part::bytes(chunk.to_vec()).file_name(file_name.clone()),
                );
            self.upload_command(SignedBody::Multipart(form)).await?;
            tracing::trace!(%media_id, segment = index, len = chunk.len(), "twitter.media.append");
        }

        let finalized: MediaUpload = self
            .upload_command(SignedBody::Form(vec![
                ("command".into(), "FINALIZE".into()),
                ("media_id".into(), media_id.clone()),
            ]))
            .await?
            .json()
            .map_err(twitter_error)?;

        if let Some(info) = &finalized.processing_info {
            tracing::debug!(
                media_id = %finalized.media_id_string,
                state = %info.state,
                check_after_secs = ?info.check_after_secs,
                "twitter.media.processing"
            );
        }
        tracing::debug!(%media_type, bytes = bytes.len(), media_id = %finalized.media_id_string, "twitter.media.uploaded");
        Ok(finalized.media_id_string)
    }

    async fn upload_command(&self, body: SignedBody) -> Result<HttpResponse> {
        self.transport
            .send(
                &self.transport.upload,
                Method::POST,
                MEDIA_UPLOAD_PATH,
                Vec::new(),
                body,
            )
            .await
    }

    /// Generic signed call for endpoints without a dedicated method.
    ///
    /// `resource` is either an absolute URL or a v1.1 resource such as
    /// `statuses/user_timeline` (`.json` is appended when it has no extension).
    /// `None` values in `data` are dropped. With `files` (POST only), everything goes
    /// out as multipart; otherwise POST fields are urlencoded and other methods put them
    /// in the query string.
    pub async fn request(
        &self,
        resource: &str,
        method: Method,
        data: Option<&[(&str, Option<&str>)]>,
        files: Option<&[(&str, &Path)]>,
    ) -> Result<Value> {
        let fields: Vec<(String, String)> = data
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v.to_string())))
            .collect();
        let files = files.unwrap_or_default();

        if !files.is_empty() {
            if method != Method::POST {
                return Err(CrosspostError::InvalidRequest(format!(
                    "file uploads need POST, got {method}"
                )));
            }
            if let Some((key, _)) = fields.iter().find(|(_, v)| v.starts_with('@')) {
                return Err(CrosspostError::InvalidRequest(format!(
                    "field '{key}' starts with '@' and cannot be sent together with a file upload"
                )));
            }
        }

        let mut query = Vec::new();
        let body = if !files.is_empty() {
            let mut form = Form::new();
            for (k, v) in fields {
                form = form.text(k, v);
            }
            for (key, path) in files {
                form = form.part(key.to_string(), file_part(path).await?);
            }
            SignedBody::Multipart(form)
        } else if method == Method::POST {
            SignedBody::Form(fields)
        } else {
            query = fields;
            SignedBody::Empty
        };

        let resource = normalize_resource(resource);
        tracing::debug!(%resource, %method, "twitter.request");
        self.transport
            .send(&self.transport.api, method, &resource, query, body)
            .await?
            .json()
            .map_err(twitter_error)
    }
}

fn twitter_error(e: HttpError) -> CrosspostError {
    match e {
        HttpError::Api {
            status,
            message,
            body,
            ..
        } => CrosspostError::Provider {
            provider: Provider::Twitter,
            status: status.as_u16(),
            message: message.unwrap_or_else(|| {
                format!("Server error #{} with answer {}", status.as_u16(), body)
            }),
        },
        other => http_to_crosspost(Provider::Twitter, other),
    }
}

fn tweet_body(text: &str, media_ids: &[String], options: &TweetOptions) -> Value {
    let mut body = options.clone();
    body.insert("text".into(), Value::String(text.to_string()));
    if !media_ids.is_empty() {
        body.insert("media".into(), json!({ "media_ids": media_ids }));
    }
    Value::Object(body)
}

/// `statuses/show?id=1` -> `1.1/statuses/show.json?id=1`; absolute URLs pass through.
fn normalize_resource(resource: &str) -> String {
    if resource.contains("://") {
        return resource.to_string();
    }
    let resource = resource.trim_start_matches('/');
    let (path, query) = match resource.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (resource, None),
    };
    let mut out = format!("{LEGACY_API_PREFIX}{path}");
    if !path.contains('.') {
        out.push_str(".json");
    }
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    out
}

fn guess_media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

async fn file_part(path: &Path) -> Result<Part> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(CrosspostError::InvalidRequest(format!(
            "cannot read the file {}; check that it exists and is readable",
            path.display()
        )));
    }
    let bytes = tokio::fs::read(path).await?;
    Part::bytes(bytes)
        .file_name(file_name(path))
        .mime_str(&guess_media_type(path))
        .map_err(|e| CrosspostError::InvalidRequest(format!("multipart part: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn normalizes_bare_resources() {
        assert_eq!(
            normalize_resource("statuses/user_timeline"),
            "1.1/statuses/user_timeline.json"
        );
        assert_eq!(
            normalize_resource("/statuses/show?id=20"),
            "1.1/statuses/show.json?id=20"
        );
        assert_eq!(
            normalize_resource("help/configuration.json"),
            "1.1/help/configuration.json"
        );
        assert_eq!(
            normalize_resource("https://api.twitter.com/2/users/me"),
            "https://api.twitter.com/2/users/me"
        );
    }

    #[test]
    fn tweet_body_without_media_omits_media() {
        let body = tweet_body("hi", &[], &TweetOptions::new());
        assert_eq!(body, json!({ "text": "hi" }));
    }

    #[test]
    fn tweet_body_keeps_media_order_and_options() {
        let mut options = TweetOptions::new();
        options.insert("reply_settings".into(), json!("following"));
        options.insert("text".into(), json!("ignored"));
        let body = tweet_body("hi", &["3".into(), "1".into(), "2".into()], &options);
        assert_eq!(
            body,
            json!({
                "text": "hi",
                "reply_settings": "following",
                "media": { "media_ids": ["3", "1", "2"] }
            })
        );
    }

    #[test]
    fn api_errors_prefer_provider_message() {
        let err = twitter_error(HttpError::Api {
            status: StatusCode::FORBIDDEN,
            message: Some("Status is a duplicate.".into()),
            body: "{}".into(),
            request_id: "-".into(),
        });
        assert_eq!(err.to_string(), "twitter error 403: Status is a duplicate.");
    }

    #[test]
    fn api_errors_fall_back_to_raw_answer() {
        let err = twitter_error(HttpError::Api {
            status: StatusCode::BAD_GATEWAY,
            message: None,
            body: "<html>".into(),
            request_id: "-".into(),
        });
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("Server error #502 with answer <html>"));
    }

    #[test]
    fn media_types_come_from_extension() {
        assert_eq!(guess_media_type(Path::new("a/b/cat.png")), "image/png");
        assert_eq!(guess_media_type(Path::new("clip.mp4")), "video/mp4");
        assert_eq!(
            guess_media_type(Path::new("blob")),
            "application/octet-stream"
        );
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Bearer token issued by LinkedIn's OAuth endpoint (or handed over by the caller).
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// What the caller holds when starting a share: a code to exchange, or a usable token.
#[derive(Debug, Clone)]
pub enum AccessGrant {
    AuthorizationCode(String),
    BearerToken(AccessToken),
}

/// The string flag (`code` / `token`) older callers pass next to the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Code,
    Token,
}

impl AccessType {
    pub fn grant(self, value: impl Into<String>) -> AccessGrant {
        match self {
            AccessType::Code => AccessGrant::AuthorizationCode(value.into()),
            AccessType::Token => AccessGrant::BearerToken(AccessToken::new(value)),
        }
    }
}

impl FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(AccessType::Code),
            "token" => Ok(AccessType::Token),
            other => Err(format!("unknown access type '{other}', expected 'code' or 'token'")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Authenticated member as returned by `GET /v2/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberProfile {
    pub id: String,
    #[serde(rename = "localizedFirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "localizedLastName", default)]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Who a post (and its uploaded media) belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    Person(String),
    Organization(String),
}

impl Author {
    pub fn urn(&self) -> String {
        match self {
            Author::Person(id) => format!("urn:li:person:{id}"),
            Author::Organization(id) => format!("urn:li:organization:{id}"),
        }
    }
}

/// How to pick the author of a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorScope {
    /// The member behind the access token, looked up through the profile endpoint.
    Member,
    /// An organisation page the member administers.
    Organization(String),
}

/// Single-use upload target returned by `registerUpload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTicket {
    pub asset: String,
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterUploadResponse {
    pub value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterUploadValue {
    pub asset: String,
    pub upload_mechanism: UploadMechanism,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    pub http_request: UploadHttpRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadHttpRequest {
    pub upload_url: String,
}

impl From<RegisterUploadResponse> for UploadTicket {
    fn from(r: RegisterUploadResponse) -> Self {
        UploadTicket {
            asset: r.value.asset,
            upload_url: r.value.upload_mechanism.http_request.upload_url,
        }
    }
}

/// Media attached to a share, before anything has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    None,
    Article { url: String },
    Image { path: PathBuf },
}

/// Resolved post content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostContent {
    Text,
    Article { url: String },
    Image { asset: String },
}

/// Body of `POST /v2/ugcPosts`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgcPost {
    author: String,
    lifecycle_state: &'static str,
    specific_content: SpecificContent,
    visibility: Visibility,
    #[serde(skip)]
    organization: bool,
}

#[derive(Debug, Clone, Serialize)]
struct SpecificContent {
    #[serde(rename = "com.linkedin.ugc.ShareContent")]
    share_content: ShareContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareContent {
    share_commentary: ShareCommentary,
    share_media_category: MediaCategory,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media: Vec<ShareMedia>,
}

#[derive(Debug, Clone, Serialize)]
struct ShareCommentary {
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaCategory {
    None,
    Article,
    Image,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareMedia {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Visibility {
    #[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
    member_network: &'static str,
}

impl UgcPost {
    /// Published, publicly visible post by `author`.
    pub fn new(author: &Author, text: impl Into<String>, content: PostContent) -> Self {
        let (category, media) = match content {
            PostContent::Text => (MediaCategory::None, Vec::new()),
            PostContent::Article { url } => (
                MediaCategory::Article,
                vec![ShareMedia {
                    status: "READY",
                    original_url: Some(url),
                    media: None,
                }],
            ),
            PostContent::Image { asset } => (
                MediaCategory::Image,
                vec![ShareMedia {
                    status: "READY",
                    original_url: None,
                    media: Some(asset),
                }],
            ),
        };
        Self {
            author: author.urn(),
            lifecycle_state: "PUBLISHED",
            specific_content: SpecificContent {
                share_content: ShareContent {
                    share_commentary: ShareCommentary { text: text.into() },
                    share_media_category: category,
                    media,
                },
            },
            visibility: Visibility {
                member_network: "PUBLIC",
            },
            organization: matches!(author, Author::Organization(_)),
        }
    }

    pub fn author_urn(&self) -> &str {
        &self.author
    }

    pub fn category(&self) -> MediaCategory {
        self.specific_content.share_content.share_media_category
    }

    pub(crate) fn is_organization(&self) -> bool {
        self.organization
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UgcPostCreated {
    #[serde(default)]
    pub id: Option<String>,
}

/// Outcome of a successful share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostReceipt {
    /// URN of the created post, when LinkedIn reported one.
    pub id: Option<String>,
    pub author: String,
}

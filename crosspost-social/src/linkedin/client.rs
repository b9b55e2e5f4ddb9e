//! LinkedIn v2 client: OAuth code exchange, profile lookup, asset upload and UGC posts.
//!
//! A share is a fixed chain of dependent calls. Every stage takes the typed result of
//! the previous one, so a failure stops the chain before the next request is built.
//! Nothing is rolled back: an image uploaded before a failed post stays orphaned.
use crate::linkedin::types::{
    AccessGrant, AccessToken, Attachment, Author, AuthorScope, MemberProfile, PostContent,
    PostReceipt, RegisterUploadResponse, TokenResponse, UgcPost, UgcPostCreated, UploadTicket,
};
use crate::{http_to_auth, http_to_crosspost, require};
use crosspost_common::{CrosspostError, Provider, Result};
use crosspost_config::LinkedInConfig;
use crosspost_http::{Auth, Body, HttpClient, RequestOpts};
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::json;
use std::path::Path;

const FEEDSHARE_IMAGE_RECIPE: &str = "urn:li:digitalmediaRecipe:feedshare-image";
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

#[derive(Clone)]
pub struct LinkedInClient {
    oauth: HttpClient,
    api: HttpClient,
    redirect_uri: String,
    client_id: String,
    client_secret: String,
}

impl LinkedInClient {
    pub fn new(config: &LinkedInConfig) -> Result<Self> {
        require("linkedin.redirect_uri", &config.redirect_uri)?;
        require("linkedin.client_id", &config.client_id)?;
        require("linkedin.client_secret", &config.client_secret)?;

        let oauth = HttpClient::new(&config.oauth_base)
            .map_err(|e| CrosspostError::Config(format!("linkedin.oauth_base: {e}")))?;
        let api = HttpClient::new(&config.api_base)
            .map_err(|e| CrosspostError::Config(format!("linkedin.api_base: {e}")))?;

        Ok(Self {
            oauth,
            api,
            redirect_uri: config.redirect_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Exchange an authorization code for a bearer token.
    pub async fn get_access_token(&self, code: &str) -> Result<AccessToken> {
        let fields = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
        ];
        let resp: TokenResponse = self
            .oauth
            .post_form_json("accessToken", fields, RequestOpts::default())
            .await
            .map_err(|e| http_to_auth(Provider::LinkedIn, e))?;

        match resp.access_token {
            Some(token) if !token.is_empty() => {
                tracing::debug!(expires_in = ?resp.expires_in, "linkedin.token.exchanged");
                Ok(AccessToken::new(token))
            }
            _ => Err(CrosspostError::Auth {
                status: None,
                message: "token endpoint answered without an access_token".into(),
            }),
        }
    }

    /// Fetch the member behind `token`; its `id` scopes member-authored posts.
    pub async fn get_profile(&self, token: &AccessToken) -> Result<MemberProfile> {
        self.api
            .get_json(
                "me",
                RequestOpts {
                    auth: Some(Auth::Bearer(token.as_str())),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| http_to_crosspost(Provider::LinkedIn, e))
    }

    /// Declare a feed-share image owned by `owner` and get its one-time upload URL.
    pub async fn register_upload(&self, token: &AccessToken, owner: &Author) -> Result<UploadTicket> {
        let body = json!({
            "registerUploadRequest": {
                "recipes": [FEEDSHARE_IMAGE_RECIPE],
                "owner": owner.urn(),
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });
        let resp: RegisterUploadResponse = self
            .api
            .post_json_opts(
                "assets",
                &body,
                RequestOpts {
                    auth: Some(Auth::Bearer(token.as_str())),
                    query: Some(vec![("action", "registerUpload".into())]),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| http_to_crosspost(Provider::LinkedIn, e))?;

        let ticket = UploadTicket::from(resp);
        tracing::debug!(asset = %ticket.asset, "linkedin.upload.registered");
        Ok(ticket)
    }

    /// PUT the image bytes to the ticket's upload URL. The answer body is ignored.
    pub async fn upload_image(
        &self,
        ticket: &UploadTicket,
        token: &AccessToken,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let len = bytes.len();
        self.api
            .put_bytes(
                &ticket.upload_url,
                bytes,
                RequestOpts {
                    auth: Some(Auth::Bearer(token.as_str())),
                    allow_absolute: true,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| http_to_crosspost(Provider::LinkedIn, e))?;
        tracing::debug!(asset = %ticket.asset, bytes = len, "linkedin.upload.done");
        Ok(())
    }

    /// Publish a UGC post.
    pub async fn create_post(&self, token: &AccessToken, post: &UgcPost) -> Result<PostReceipt> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-restli-protocol-version"),
            HeaderValue::from_static(RESTLI_PROTOCOL_VERSION),
        );
        if post.is_organization() {
            headers.insert(
                HeaderName::from_static("x-restli-method"),
                HeaderValue::from_static("create"),
            );
        }

        let body = Body::json(post).map_err(|e| http_to_crosspost(Provider::LinkedIn, e))?;
        let resp = self
            .api
            .send(
                Method::POST,
                "ugcPosts",
                Some(body),
                RequestOpts {
                    auth: Some(Auth::Bearer(token.as_str())),
                    headers: Some(headers),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| http_to_crosspost(Provider::LinkedIn, e))?;

        let created: Option<UgcPostCreated> = resp
            .json()
            .map_err(|e| http_to_crosspost(Provider::LinkedIn, e))?;
        let id = created
            .and_then(|c| c.id)
            .or_else(|| resp.header("x-restli-id").map(str::to_string));

        tracing::info!(
            target: "social.linkedin",
            author = %post.author_urn(),
            category = ?post.category(),
            id = ?id,
            "linkedin.post.created"
        );
        Ok(PostReceipt {
            id,
            author: post.author_urn().to_string(),
        })
    }

    /// Turn a grant into a usable token, exchanging the code when needed.
    pub async fn resolve_token(&self, grant: &AccessGrant) -> Result<AccessToken> {
        match grant {
            AccessGrant::AuthorizationCode(code) => self.get_access_token(code).await,
            AccessGrant::BearerToken(token) => Ok(token.clone()),
        }
    }

    /// Member scope needs a profile lookup; organisation ids come from the caller.
    pub async fn resolve_author(&self, token: &AccessToken, scope: &AuthorScope) -> Result<Author> {
        match scope {
            AuthorScope::Member => Ok(Author::Person(self.get_profile(token).await?.id)),
            AuthorScope::Organization(id) => {
                require("organization id", id)?;
                Ok(Author::Organization(id.clone()))
            }
        }
    }

    /// Run the whole share chain: token, author, optional image upload, post.
    pub async fn share(
        &self,
        grant: &AccessGrant,
        scope: &AuthorScope,
        text: &str,
        attachment: &Attachment,
    ) -> Result<PostReceipt> {
        // A missing image fails before any request is sent.
        let image = match attachment {
            Attachment::Image { path } => Some(read_image(path).await?),
            _ => None,
        };

        let token = self.resolve_token(grant).await?;
        let author = self.resolve_author(&token, scope).await?;

        let content = match (attachment, image) {
            (Attachment::Image { .. }, Some(bytes)) => {
                let ticket = self.register_upload(&token, &author).await?;
                self.upload_image(&ticket, &token, bytes).await?;
                PostContent::Image {
                    asset: ticket.asset,
                }
            }
            (Attachment::Article { url }, _) => PostContent::Article { url: url.clone() },
            _ => PostContent::Text,
        };

        self.create_post(&token, &UgcPost::new(&author, text, content))
            .await
    }

    pub async fn share_image(
        &self,
        grant: &AccessGrant,
        image: impl AsRef<Path>,
        text: &str,
    ) -> Result<PostReceipt> {
        let attachment = Attachment::Image {
            path: image.as_ref().to_path_buf(),
        };
        self.share(grant, &AuthorScope::Member, text, &attachment)
            .await
    }

    pub async fn share_article(
        &self,
        grant: &AccessGrant,
        url: &str,
        text: &str,
    ) -> Result<PostReceipt> {
        let attachment = Attachment::Article {
            url: url.to_string(),
        };
        self.share(grant, &AuthorScope::Member, text, &attachment)
            .await
    }

    pub async fn share_none(&self, grant: &AccessGrant, text: &str) -> Result<PostReceipt> {
        self.share(grant, &AuthorScope::Member, text, &Attachment::None)
            .await
    }

    pub async fn share_image_org(
        &self,
        grant: &AccessGrant,
        organization_id: &str,
        image: impl AsRef<Path>,
        text: &str,
    ) -> Result<PostReceipt> {
        let attachment = Attachment::Image {
            path: image.as_ref().to_path_buf(),
        };
        let scope = AuthorScope::Organization(organization_id.to_string());
        self.share(grant, &scope, text, &attachment).await
    }

    pub async fn share_article_org(
        &self,
        grant: &AccessGrant,
        organization_id: &str,
        url: &str,
        text: &str,
    ) -> Result<PostReceipt> {
        let attachment = Attachment::Article {
            url: url.to_string(),
        };
        let scope = AuthorScope::Organization(organization_id.to_string());
        self.share(grant, &scope, text, &attachment).await
    }
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(CrosspostError::InvalidRequest(format!(
            "image {} is empty",
            path.display()
        )));
    }
    Ok(bytes)
}

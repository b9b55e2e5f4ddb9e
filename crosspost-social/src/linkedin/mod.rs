//! LinkedIn share integration (OAuth 2.0 + UGC posts).
//!
//! [`client::LinkedInClient`] holds the application credentials; [`types`] carries the
//! typed stages of a share (token, author, upload ticket, post body, receipt).
pub mod client;
pub mod types;

pub use client::LinkedInClient;
pub use types::{
    AccessGrant, AccessToken, AccessType, Attachment, Author, AuthorScope, MemberProfile,
    PostContent, PostReceipt, UgcPost, UploadTicket,
};

//! Twitter/X posting surface.
//!
//! Submodules provide the OAuth 1.0a signer, the session client, and typed
//! response models.
pub mod client;
pub mod oauth;
pub mod types;

pub use client::TwitterClient;
pub use types::{CreatedTweet, TweetOptions, VerifiedAccount};

use serde::{Deserialize, Serialize};

/// Extra top-level fields merged into the tweet creation body (`reply`, `quote_tweet_id`, ...).
pub type TweetOptions = serde_json::Map<String, serde_json::Value>;

/// Account returned by `account/verify_credentials`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedAccount {
    pub id_str: String,
    #[serde(default)]
    pub screen_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Answer of the `INIT` and `FINALIZE` media upload commands.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUpload {
    pub media_id_string: String,
    #[serde(default)]
    pub processing_info: Option<ProcessingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingInfo {
    pub state: String,
    #[serde(default)]
    pub check_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedTweet {
    pub data: TweetData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
}

use anyhow::{Context, Result};
use clap::Subcommand;
use crosspost_config::CrosspostConfig;
use crosspost_social::twitter::{TweetOptions, TwitterClient};
use reqwest::Method;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum TwitterCommand {
    /// Check the configured credentials.
    Verify,
    /// Post a tweet, uploading media first.
    Send {
        #[arg(long)]
        text: String,
        /// Media files, attached in the given order.
        #[arg(long = "media")]
        media: Vec<PathBuf>,
        /// Extra JSON object merged into the tweet body, e.g. '{"reply":{"in_reply_to_tweet_id":"1"}}'.
        #[arg(long)]
        options: Option<String>,
    },
    /// Signed call to any endpoint, e.g. `statuses/user_timeline -p count=5`.
    Call {
        resource: String,
        #[arg(long, default_value = "GET")]
        method: Method,
        /// `key=value` parameters.
        #[arg(long = "param", short = 'p', value_parser = parse_pair)]
        params: Vec<(String, String)>,
        /// `field=path` file uploads.
        #[arg(long = "file", value_parser = parse_pair)]
        files: Vec<(String, String)>,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

pub async fn run(cfg: &CrosspostConfig, cmd: TwitterCommand) -> Result<Value> {
    let section = cfg
        .twitter
        .as_ref()
        .context("no twitter section in config")?;
    let client = TwitterClient::initialize(section).await?;

    match cmd {
        TwitterCommand::Verify => Ok(serde_json::to_value(client.account())?),
        TwitterCommand::Send {
            text,
            media,
            options,
        } => {
            let options: TweetOptions = match options {
                Some(raw) => serde_json::from_str(&raw).context("--options must be a JSON object")?,
                None => TweetOptions::new(),
            };
            let tweet = client.send_message(&text, media.as_slice(), &options).await?;
            Ok(serde_json::to_value(tweet)?)
        }
        TwitterCommand::Call {
            resource,
            method,
            params,
            files,
        } => {
            let data: Vec<(&str, Option<&str>)> = params
                .iter()
                .map(|(k, v)| (k.as_str(), Some(v.as_str())))
                .collect();
            let files: Vec<(&str, &Path)> = files
                .iter()
                .map(|(k, v)| (k.as_str(), Path::new(v)))
                .collect();
            let answer = client
                .request(
                    &resource,
                    method,
                    (!data.is_empty()).then_some(data.as_slice()),
                    (!files.is_empty()).then_some(files.as_slice()),
                )
                .await?;
            Ok(answer)
        }
    }
}

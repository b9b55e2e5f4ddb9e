use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use crosspost_config::CrosspostConfig;
use crosspost_social::linkedin::{AccessType, LinkedInClient};
use serde_json::{Value, json};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum LinkedinCommand {
    /// Exchange an authorization code for an access token.
    Token {
        #[arg(long)]
        code: String,
    },
    /// Publish a post as the member or an organisation.
    Share(ShareArgs),
}

#[derive(Args)]
pub struct ShareArgs {
    /// What `--credential` holds: `code` or `token`.
    #[arg(long, default_value = "token")]
    grant: AccessType,

    /// Authorization code or access token.
    #[arg(long, env = "LINKEDIN_CREDENTIAL", hide_env_values = true)]
    credential: String,

    /// Post on behalf of this organisation id instead of the member.
    #[arg(long)]
    org: Option<String>,

    #[arg(long, conflicts_with = "article")]
    image: Option<PathBuf>,

    #[arg(long)]
    article: Option<String>,

    #[arg(long)]
    text: String,
}

pub async fn run(cfg: &CrosspostConfig, cmd: LinkedinCommand) -> Result<Value> {
    let section = cfg
        .linkedin
        .as_ref()
        .context("no linkedin section in config")?;
    let client = LinkedInClient::new(section)?;

    match cmd {
        LinkedinCommand::Token { code } => {
            let token = client.get_access_token(&code).await?;
            Ok(json!({ "access_token": token.as_str() }))
        }
        LinkedinCommand::Share(args) => {
            let grant = args.grant.grant(args.credential);
            let receipt = match (args.org.as_deref(), args.image, args.article) {
                (None, Some(image), _) => client.share_image(&grant, image, &args.text).await?,
                (None, None, Some(url)) => client.share_article(&grant, &url, &args.text).await?,
                (None, None, None) => client.share_none(&grant, &args.text).await?,
                (Some(org), Some(image), _) => {
                    client
                        .share_image_org(&grant, org, image, &args.text)
                        .await?
                }
                (Some(org), None, Some(url)) => {
                    client
                        .share_article_org(&grant, org, &url, &args.text)
                        .await?
                }
                (Some(_), None, None) => {
                    anyhow::bail!("organisation shares need --image or --article")
                }
            };
            Ok(serde_json::to_value(receipt)?)
        }
    }
}

//! Terminal front end for the Aperture data layer. Stands in for the
//! mobile UI: one command per user-facing operation, session persisted
//! between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use aperture_core::{DataGateway, FeedPost, Session};
use aperture_services::media::{AlwaysOnline, ConnectivityProbe, HttpProbe};
use aperture_services::relative::relative_time;
use aperture_services::{Composer, Draft, Engagement, Feed, SessionManager, SessionSnapshot};
use aperture_supabase::{Supabase, SupabaseConfig};

/// Signed image links shown in listings stay valid this long.
const IMAGE_URL_TTL_SECS: u32 = 3600;

#[derive(Parser)]
#[command(name = "aperture", about = "Terminal client for the Aperture photo feed")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account and sign in
    SignUp { email: String, password: String },
    /// Sign in with an existing account
    SignIn { email: String, password: String },
    /// Sign out and forget the stored session
    SignOut,
    /// Exchange the refresh token for a fresh session
    Refresh,
    /// Create your profile (required once after sign-up)
    SetupProfile {
        user_name: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Show the signed-in identity
    Whoami,
    /// Show the feed, newest first
    Feed,
    /// Show one user's posts (defaults to your own)
    Posts {
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// Create a post from a local image
    Post {
        image: PathBuf,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Like a post
    Like { post: Uuid },
    /// Remove your like from a post
    Unlike { post: Uuid },
    /// Comment on a post
    Comment { post: Uuid, text: String },
    /// Show a post's comments
    Comments { post: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aperture=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let url = std::env::var("APERTURE_URL").context("APERTURE_URL is not set")?;
    let anon_key = std::env::var("APERTURE_ANON_KEY").context("APERTURE_ANON_KEY is not set")?;
    let gateway = Arc::new(Supabase::new(SupabaseConfig { url, anon_key }));

    // Restore the previous run's session before anything reads it.
    let session_file = session_file_path();
    if let Some(session) = load_session(&session_file) {
        gateway.restore_session(session).await;
    }

    let manager = SessionManager::new(Arc::clone(&gateway));
    let snapshot = manager.bootstrap().await;

    match cli.command {
        Command::SignUp { email, password } => {
            let snapshot = manager.sign_up(&email, &password).await?;
            persist_session(&session_file, snapshot.session.as_ref())?;
            println!("signed up as {email}");
            println!("next: aperture setup-profile <username>");
        }
        Command::SignIn { email, password } => {
            let snapshot = manager.sign_in(&email, &password).await?;
            persist_session(&session_file, snapshot.session.as_ref())?;
            println!("signed in as {email}");
            if !snapshot.profile_complete() {
                println!("no profile yet, run: aperture setup-profile <username>");
            }
        }
        Command::SignOut => {
            let result = manager.sign_out().await;
            let _ = std::fs::remove_file(&session_file);
            result?;
            println!("signed out");
        }
        Command::Refresh => {
            let session = gateway.refresh_session().await?;
            persist_session(&session_file, Some(&session))?;
            println!("session refreshed for {}", session.email);
        }
        Command::SetupProfile {
            user_name,
            name,
            bio,
        } => {
            let profile = manager.create_profile(&user_name, name, bio).await?;
            println!("profile created: @{}", profile.user_name);
        }
        Command::Whoami => match (&snapshot.session, &snapshot.profile) {
            (Some(session), Some(profile)) => {
                println!("{} (@{})", session.email, profile.user_name);
                if let Some(name) = &profile.name {
                    println!("name: {name}");
                }
                if let Some(bio) = &profile.bio {
                    println!("bio: {bio}");
                }
            }
            (Some(session), None) => {
                println!("{}, profile not set up yet", session.email);
            }
            _ => println!("not signed in"),
        },
        Command::Feed => {
            let viewer = require_user(&snapshot)?;
            let feed = Feed::new(Arc::clone(&gateway));
            render_posts(&feed.fetch_all(viewer).await?, gateway.as_ref()).await;
        }
        Command::Posts { user } => {
            let viewer = require_user(&snapshot)?;
            let feed = Feed::new(Arc::clone(&gateway));
            render_posts(&feed.fetch_for_user(viewer, user).await?, gateway.as_ref()).await;
        }
        Command::Post { image, caption } => {
            let composer = Composer::new(Arc::clone(&gateway), connectivity_probe());
            match composer.submit(&snapshot, Draft { image, caption }).await? {
                Some(post) => {
                    println!("posted {}", post.id);
                    println!("image: {}", gateway.public_url(&post.image_path));
                }
                None => println!("another upload is still in progress"),
            }
        }
        Command::Like { post } => {
            Engagement::new(Arc::clone(&gateway))
                .toggle_like(&snapshot, post, true)
                .await?;
            println!("liked {post}");
        }
        Command::Unlike { post } => {
            Engagement::new(Arc::clone(&gateway))
                .toggle_like(&snapshot, post, false)
                .await?;
            println!("unliked {post}");
        }
        Command::Comment { post, text } => {
            let view = Engagement::new(Arc::clone(&gateway))
                .add_comment(&snapshot, post, &text)
                .await?;
            println!("@{}: {}", view.user_name.as_deref().unwrap_or("you"), view.content);
        }
        Command::Comments { post } => {
            let comments = Engagement::new(Arc::clone(&gateway)).comments(post).await?;
            if comments.is_empty() {
                println!("no comments yet");
            }
            let now = Utc::now();
            for comment in comments {
                println!(
                    "@{} ({}): {}",
                    comment.user_name.as_deref().unwrap_or("unknown"),
                    relative_time(comment.created_at, now),
                    comment.content
                );
            }
        }
    }

    Ok(())
}

async fn render_posts(posts: &[FeedPost], gateway: &Supabase) {
    if posts.is_empty() {
        println!("no posts yet");
        return;
    }
    let now = Utc::now();
    for post in posts {
        let liked = if post.has_liked { ", liked by you" } else { "" };
        println!(
            "{}  @{}  {}",
            post.id,
            post.user_name.as_deref().unwrap_or("unknown"),
            relative_time(post.created_at, now)
        );
        if let Some(caption) = &post.caption {
            println!("  {caption}");
        }
        println!("  {} like(s){liked}", post.likes_count);
        // The posts bucket is not public; hand out a signed link and fall
        // back to the public URL if signing is unavailable.
        match gateway.signed_url(&post.image_path, IMAGE_URL_TTL_SECS).await {
            Ok(url) => println!("  {url}"),
            Err(error) => {
                debug!(%error, "signing image URL failed; falling back to public URL");
                println!("  {}", gateway.public_url(&post.image_path));
            }
        }
        println!();
    }
}

fn require_user(snapshot: &SessionSnapshot) -> Result<Uuid> {
    snapshot
        .user_id()
        .context("not signed in; run `aperture sign-in` first")
}

fn connectivity_probe() -> Arc<dyn ConnectivityProbe> {
    match std::env::var("APERTURE_PROBE_URL") {
        Ok(url) => Arc::new(HttpProbe::new(url)),
        Err(_) => Arc::new(AlwaysOnline),
    }
}

fn session_file_path() -> PathBuf {
    std::env::var("APERTURE_SESSION_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("aperture")
                .join("session.json")
        })
}

fn load_session(path: &Path) -> Option<Session> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(session) => Some(session),
        Err(error) => {
            debug!(%error, "ignoring unreadable session file");
            None
        }
    }
}

fn persist_session(path: &Path, session: Option<&Session>) -> Result<()> {
    let Some(session) = session else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(session)?)?;
    Ok(())
}

//! Provision users, tokens and chats without going through the REST API.

use clap::{Parser, Subcommand};

use roomcast::config::Config;
use roomcast::error::AppError;
use roomcast::models::user::CreateUser;

#[derive(Parser)]
#[command(name = "roomcast-seed", about = "Seed a roomcast database")]
struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a user (or reuse an existing one) and print a fresh token.
    User {
        #[arg(long)]
        email: String,
    },
    /// Open the chat between two existing users and print its id.
    Chat {
        #[arg(long)]
        a: String,
        #[arg(long)]
        b: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomcast=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let database_url = cli.database_url.unwrap_or(config.database_url);

    let db = roomcast::db::create_pool(&database_url)
        .await
        .expect("failed to create database pool");

    let result = match cli.command {
        Command::User { email } => seed_user(&db, &email, config.token_ttl_secs).await,
        Command::Chat { a, b } => seed_chat(&db, &a, &b).await,
    };

    if let Err(e) = result {
        eprintln!("seed failed: {e:?}");
        std::process::exit(1);
    }
}

async fn seed_user(db: &sqlx::SqlitePool, email: &str, ttl_secs: i64) -> Result<(), AppError> {
    let user = match roomcast::db::users::get_user_by_email(db, email).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => {
            roomcast::db::users::create_user(
                db,
                &CreateUser {
                    email: email.to_string(),
                },
            )
            .await?
        }
        Err(e) => return Err(e),
    };

    let token = roomcast::db::users::issue_token(db, user.id, ttl_secs).await?;
    println!("user_id={} token={token}", user.id);
    Ok(())
}

async fn seed_chat(db: &sqlx::SqlitePool, a: &str, b: &str) -> Result<(), AppError> {
    let user_a = roomcast::db::users::get_user_by_email(db, a).await?;
    let user_b = roomcast::db::users::get_user_by_email(db, b).await?;

    let (chat_id, created) = roomcast::db::chats::open_direct_chat(db, user_a.id, user_b.id).await?;
    println!("chat_id={chat_id} created={created}");
    Ok(())
}

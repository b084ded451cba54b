use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pawsitive_client::config::Config;
use pawsitive_client::error::ClientError;
use pawsitive_client::notify::ReadTarget;
use pawsitive_client::search::{SearchBox, SearchState};
use pawsitive_client::view::ViewScope;
use pawsitive_client::App;

const DEFAULT_TOKEN_PATH: &str = ".pawsitive-token";

const USAGE: &str = "usage: pawsitive <command>

commands:
  login <email>      log in (password is read from the terminal)
  logout             forget the stored session
  whoami             show the current user
  feed               list posts from people you follow
  notifications      list notifications
  read-all           mark every notification as read
  search <term>      search users
  listen             print live alerts until Ctrl-C";

#[tokio::main]
async fn main() -> ExitCode {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let mut config = Config::from_env();
    if config.token_path.is_none() {
        config.token_path = Some(PathBuf::from(DEFAULT_TOKEN_PATH));
    }
    tracing::debug!(api_url = %config.api_url, gateway_url = %config.gateway_url, "client configured");

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    let result = match (command, args.get(1)) {
        ("login", Some(email)) => login(&app, email).await,
        ("logout", _) => logout(&app).await,
        ("whoami", _) => whoami(&app).await,
        ("feed", _) => feed(&app).await,
        ("notifications", _) => notifications(&app).await,
        ("read-all", _) => read_all(&app).await,
        ("search", Some(term)) => search(&app, term).await,
        ("listen", _) => listen(&app).await,
        _ => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(ClientError::Unauthenticated) => {
            eprintln!("not logged in; run `pawsitive login <email>`");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Resume the stored session or fail with `Unauthenticated`.
async fn require_session(app: &App) -> Result<(), ClientError> {
    match app.sessions.resume().await? {
        Some(_) => Ok(()),
        None => Err(ClientError::Unauthenticated),
    }
}

async fn login(app: &App, email: &str) -> Result<(), ClientError> {
    eprint!("password: ");
    let password = rpassword::read_password()
        .map_err(|_| ClientError::field("password", "Could not read password"))?;
    let session = app.sessions.login(email, &password).await?;
    println!("logged in as {} ({})", session.display_name, session.user_id);
    Ok(())
}

async fn logout(app: &App) -> Result<(), ClientError> {
    app.sessions.resume().await?;
    app.sessions.logout().await;
    println!("logged out");
    Ok(())
}

async fn whoami(app: &App) -> Result<(), ClientError> {
    require_session(app).await?;
    if let Some(session) = app.sessions.current() {
        println!("{} ({})", session.display_name, session.user_id);
        println!("token expires {}", session.token.expires_at().to_rfc3339());
    }
    Ok(())
}

async fn feed(app: &App) -> Result<(), ClientError> {
    require_session(app).await?;
    let posts = app.sessions.check(app.api.feed().await).await?;
    if posts.is_empty() {
        println!("nothing here yet");
    }
    for post in posts {
        let liked = if post.is_liked { "♥" } else { "♡" };
        println!("[{}] @{}: {}", post.id, post.user.username, post.caption);
        println!("    {liked} {}  💬 {}", post.likes, post.comments.len());
    }
    Ok(())
}

async fn notifications(app: &App) -> Result<(), ClientError> {
    require_session(app).await?;
    let snapshot = app.notifications.fetch_all().await?;
    println!("{} unread", snapshot.unread_count);
    for n in &snapshot.notifications {
        let marker = if n.read { " " } else { "•" };
        println!("{marker} {:?} from @{} -> {}", n.kind, n.sender.username, n.route());
    }
    Ok(())
}

async fn read_all(app: &App) -> Result<(), ClientError> {
    require_session(app).await?;
    app.notifications.fetch_all().await?;
    app.notifications.mark_read(ReadTarget::AllUnread).await?;
    println!("{} unread", app.notifications.unread_count());
    Ok(())
}

async fn search(app: &App, term: &str) -> Result<(), ClientError> {
    require_session(app).await?;
    let scope = ViewScope::new();
    let search = SearchBox::users(app.api.clone(), scope.handle());
    let mut state = search.subscribe();
    search.input(term);

    if matches!(*state.borrow_and_update(), SearchState::Idle) {
        println!("type at least 2 characters");
        return Ok(());
    }
    loop {
        if state.changed().await.is_err() {
            return Ok(());
        }
        let current = state.borrow_and_update().clone();
        match current {
            SearchState::Ready { results, .. } => {
                if results.is_empty() {
                    println!("no users found");
                }
                for user in results {
                    println!("@{} ({}) {}", user.username, user.id, user.display_name());
                }
                return Ok(());
            }
            SearchState::Failed { message, .. } => {
                return Err(ClientError::Server { status: 0, message });
            }
            SearchState::Idle | SearchState::Pending(_) => {}
        }
    }
}

async fn listen(app: &App) -> Result<(), ClientError> {
    if app.start().await?.is_none() {
        return Err(ClientError::Unauthenticated);
    }
    if let Err(e) = app.notifications.fetch_all().await {
        tracing::warn!(error = %e, "initial notification fetch failed");
    }
    println!("{} unread; listening, Ctrl-C to stop", app.notifications.unread_count());

    let mut alerts = app.alerts.subscribe();
    let mut badge = app.notifications.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            alert = alerts.recv() => match alert {
                Ok(alert) if alert.body.is_empty() => println!("🔔 {} ({})", alert.title, alert.route),
                Ok(alert) => println!("🔔 {}: {} ({})", alert.title, alert.body, alert.route),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "alert output lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            changed = badge.changed() => {
                if changed.is_err() {
                    break;
                }
                let unread = badge.borrow_and_update().unread_count;
                println!("   {unread} unread");
            }
        }
    }

    app.shutdown().await;
    Ok(())
}

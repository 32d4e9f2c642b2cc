use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use postfeed::config::{
    ClientConfig, ConfigError, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PAGE_LIMIT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATE_DIR, HttpTimeouts,
};
use postfeed::net::api::{ApiError, FeedApi};
use postfeed::net::gateway::HttpGateway;
use postfeed::net::types::{CommentDraft, Identity, Post, PostDraft, SignInForm, SignUpForm};
use postfeed::state::events::AuthEvents;
use postfeed::state::feed::{DeleteOutcome, DeleteTarget, FeedController, FeedError};
use postfeed::state::routes::Route;
use postfeed::state::session::{SessionError, SessionStore};
use postfeed::state::storage::{DurableStorage, FileStorage, StorageError};
use postfeed::util::notify::{Notice, NoticeLevel, Notifier, TracingNotifier};
use postfeed::util::time_ago::{comment_count_label, time_ago_now};

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not signed in; run `postfeed sign-in` first")]
    NotSignedIn,
    #[error("password confirmation does not match")]
    PasswordMismatch,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "postfeed", about = "Posts and comments feed client")]
struct Cli {
    #[arg(long, env = "POSTFEED_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Session storage directory.
    #[arg(long, env = "POSTFEED_STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    /// Posts per page.
    #[arg(long, env = "POSTFEED_PAGE_LIMIT", default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: u32,

    #[arg(long, env = "POSTFEED_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "POSTFEED_CONNECT_TIMEOUT_SECS", default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Send notices to the log instead of stderr.
    #[arg(long, short)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let timeouts =
            HttpTimeouts { request_secs: self.request_timeout_secs, connect_secs: self.connect_timeout_secs };
        ClientConfig::build(self.base_url.clone(), self.state_dir.clone(), self.limit, timeouts)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    SignUp {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "POSTFEED_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to `--password`.
        #[arg(long)]
        password_confirmation: Option<String>,
    },
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long, env = "POSTFEED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    SignOut,
    Whoami,
    Posts(PostsCommand),
    Comments(CommentsCommand),
}

#[derive(Args, Debug)]
struct PostsCommand {
    #[command(subcommand)]
    command: PostsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PostsSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    Show {
        post_id: i64,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    Edit {
        post_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    Delete {
        post_id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct CommentsCommand {
    #[command(subcommand)]
    command: CommentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum CommentsSubcommand {
    List {
        post_id: i64,
    },
    Create {
        post_id: i64,
        #[arg(long)]
        body: String,
    },
    Edit {
        post_id: i64,
        comment_id: i64,
        #[arg(long)]
        body: String,
    },
    Delete {
        post_id: i64,
        comment_id: i64,
        #[arg(long)]
        yes: bool,
    },
}

/// Prints notices to stderr so stdout stays parseable.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => eprintln!("{}", notice.text),
            NoticeLevel::Error => eprintln!("error: {}", notice.text),
        }
    }
}

struct App {
    config: ClientConfig,
    session: SessionStore,
    gateway: Arc<HttpGateway>,
}

impl App {
    fn open(cli: &Cli) -> Result<Self, CliError> {
        let config = cli.client_config()?;
        tracing::debug!(base_url = %config.base_url, state_dir = %config.state_dir.display(), "client configured");

        let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::open(config.state_dir.clone())?);
        let notifier: Arc<dyn Notifier> =
            if cli.quiet { Arc::new(TracingNotifier) } else { Arc::new(ConsoleNotifier) };
        let events = AuthEvents::new();
        let session = SessionStore::mount(storage.clone(), &events, notifier.clone());
        let gateway = Arc::new(HttpGateway::new(&config, storage, events, notifier)?);
        Ok(Self { config, session, gateway })
    }

    /// Feed controller for a signed-in viewer.
    fn feed(&self) -> Result<FeedController<Arc<HttpGateway>>, CliError> {
        if self.session.navigate(Route::Posts) != Route::Posts {
            return Err(CliError::NotSignedIn);
        }
        Ok(FeedController::new(self.gateway.clone(), self.config.page_limit, self.session.identity()))
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let app = App::open(&cli)?;

    match cli.command {
        Command::SignUp { name, email, password, password_confirmation } => {
            let password_confirmation = password_confirmation.unwrap_or_else(|| password.clone());
            if password_confirmation != password {
                return Err(CliError::PasswordMismatch);
            }
            let form = SignUpForm { name, email, password, password_confirmation };
            let user = app.session.sign_up(app.gateway.as_ref(), &form).await?;
            print_whoami(&user);
            Ok(())
        }
        Command::SignIn { email, password } => {
            let form = SignInForm { email, password };
            let user = app.session.sign_in(app.gateway.as_ref(), &form).await?;
            print_whoami(&user);
            Ok(())
        }
        Command::SignOut => {
            if !app.session.logout()? {
                eprintln!("already signed out");
            }
            Ok(())
        }
        Command::Whoami => match app.session.identity().filter(|_| app.session.is_authenticated()) {
            Some(user) => {
                print_whoami(&user);
                Ok(())
            }
            None => Err(CliError::NotSignedIn),
        },
        Command::Posts(posts) => run_posts(&app, posts).await,
        Command::Comments(comments) => run_comments(&app, comments).await,
    }
}

async fn run_posts(app: &App, posts: PostsCommand) -> Result<(), CliError> {
    let feed = app.feed()?;
    match posts.command {
        PostsSubcommand::List { pages } => {
            for _ in 0..pages.max(1) {
                if feed.load_more().await? == 0 {
                    break;
                }
            }
            print_feed(&feed);
            Ok(())
        }
        PostsSubcommand::Show { post_id } => print_json(&feed.open_post(post_id).await?),
        PostsSubcommand::Create { title, body } => print_json(&feed.create_post(&PostDraft { title, body }).await?),
        PostsSubcommand::Edit { post_id, title, body } => {
            let current = feed.open_post(post_id).await?;
            let patch = PostDraft { title: title.unwrap_or(current.title), body: body.unwrap_or(current.body) };
            print_json(&feed.edit_post(post_id, &patch).await?)
        }
        PostsSubcommand::Delete { post_id, yes } => {
            feed.open_post(post_id).await?;
            report_delete(feed.delete_post(post_id, |target| yes || confirm(target)).await?);
            Ok(())
        }
    }
}

async fn run_comments(app: &App, comments: CommentsCommand) -> Result<(), CliError> {
    let feed = app.feed()?;
    match comments.command {
        CommentsSubcommand::List { post_id } => print_json(&app.gateway.list_comments(post_id).await?),
        CommentsSubcommand::Create { post_id, body } => {
            feed.open_post(post_id).await?;
            print_json(&feed.create_comment(post_id, &body).await?)
        }
        CommentsSubcommand::Edit { post_id, comment_id, body } => {
            feed.open_post(post_id).await?;
            print_json(&feed.edit_comment(post_id, comment_id, &CommentDraft { body }).await?)
        }
        CommentsSubcommand::Delete { post_id, comment_id, yes } => {
            feed.open_post(post_id).await?;
            let outcome = feed.delete_comment(post_id, comment_id, |target| yes || confirm(target)).await?;
            report_delete(outcome);
            Ok(())
        }
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_whoami(user: &Identity) {
    println!("{} <{}> (id {})", user.name, user.email, user.id);
}

fn print_feed<A: FeedApi>(feed: &FeedController<A>) {
    let posts = feed.posts();
    if posts.is_empty() {
        println!("No posts yet");
        return;
    }
    for post in &posts {
        print_post(post);
    }
    let cursor = feed.cursor();
    println!("-- {} of {} posts (page {})", posts.len(), cursor.total_count, cursor.current_page);
}

fn print_post(post: &Post) {
    let when = time_ago_now(&post.created_at).unwrap_or_else(|| post.created_at.clone());
    println!("#{} {}", post.id, post.title);
    println!("    by {} | {} | {}", post.user.name, when, comment_count_label(post.comments.len()));
    for line in post.body.lines() {
        println!("    {line}");
    }
    println!();
}

fn report_delete(outcome: DeleteOutcome) {
    if outcome == DeleteOutcome::Declined {
        eprintln!("cancelled");
    }
}

/// Ask on stdin. Anything other than `y`/`yes` declines.
fn confirm(target: &DeleteTarget) -> bool {
    eprint!("{} [y/N] ", target.prompt());
    if io::stderr().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

//! Command implementations for learnsync.
//!
//! This module contains the implementation of all CLI commands.

mod completions;
mod queue;
mod session;
mod sync;

pub use completions::completions;
pub use queue::queue;
pub use session::{logout, watch};
pub use sync::sync;

use crate::api::ApiClient;
use crate::cli::args::{Cli, Commands, OutputFormat};
use crate::config::Config;
use crate::error::LearnsyncError;
use crate::features::queue::{ActionQueue, SqliteActionStore};
use crate::features::reconcile::Reconciler;
use crate::features::Session;
use crate::storage::ProgressCache;

/// Environment variable overriding `server.token`.
pub const TOKEN_ENV: &str = "LEARNSYNC_TOKEN";

/// The session type the CLI works with.
pub type AppSession = Session<SqliteActionStore, ApiClient, ApiClient>;

/// Resolved settings shared by every command.
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub user: Option<String>,
}

impl Context {
    /// Combine parsed arguments with the loaded configuration.
    #[must_use]
    pub fn new(cli_output: Option<OutputFormat>, cli_user: Option<String>, config: Config) -> Self {
        let format = cli_output.unwrap_or(config.general.default_output);
        let user = cli_user.or_else(|| config.general.user.clone());
        Self {
            config,
            format,
            user,
        }
    }

    /// The user to act for.
    ///
    /// # Errors
    ///
    /// Returns `Config` if neither `--user` nor `general.user` is set.
    pub fn owner(&self) -> Result<&str, LearnsyncError> {
        self.user.as_deref().ok_or_else(|| {
            LearnsyncError::Config(
                "No user given: pass --user or set general.user in config.yaml".to_string(),
            )
        })
    }

    /// Open the queue, reconciler, and progress cache against the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the local database cannot be opened or the HTTP
    /// client cannot be built.
    pub fn open_session(&self) -> Result<AppSession, LearnsyncError> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.config.server.token.clone());
        let client = ApiClient::new(&self.config.server)?.with_token(token);

        let policy = self.config.queue.retry_policy(self.config.server.timeout());
        let queue = ActionQueue::new(SqliteActionStore::open()?, client.clone(), policy)?;
        let reconciler = Reconciler::new(client);
        let cache = ProgressCache::open()?;

        Ok(Session::new(queue, reconciler, cache))
    }
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the first error the command hits.
pub async fn execute(cli: Cli, config: Config) -> Result<String, LearnsyncError> {
    let ctx = Context::new(cli.output, cli.user, config);

    match cli.command {
        Commands::Queue(args) => queue(&ctx, args.command).await,
        Commands::Sync(args) => sync(&ctx, args.command).await,
        Commands::Watch(args) => watch(&ctx, &args).await,
        Commands::Logout { force } => logout(&ctx, force),
        Commands::Completions { shell } => completions(shell),
    }
}

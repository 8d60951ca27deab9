use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use crate::features::reconcile::ResolutionStrategy;

#[derive(Parser)]
#[command(name = "learnsync")]
#[command(about = "Offline action queue and progress sync for the learning platform")]
#[command(long_about = "learnsync - offline durability and sync for the learning platform

Records lesson completions, quiz submissions, bookmarks, and notes in a
durable local queue and delivers them to the server in order once the
device is online. Compares local progress with the server to surface
divergence between devices.

QUICK START:
  learnsync queue complete lesson-42        Record a completed lesson
  learnsync queue note lesson-42 \"recap\"    Save a note
  learnsync queue status                    Show what is waiting to sync
  learnsync sync verify                     Compare progress with the server
  learnsync watch                           Keep syncing in the background

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

For more information on a specific command, run:
  learnsync <command> --help")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output, or 'json' for
    /// machine-readable output. Defaults to `general.default_output`.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity (-v info, -vv debug)
    ///
    /// Logs go to stderr. `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// User whose actions and progress to work with
    ///
    /// Defaults to `general.user` from the config file.
    #[arg(long, global = true, env = "LEARNSYNC_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record actions and manage the offline queue
    ///
    /// Every action is stored locally before anything else happens, so it
    /// survives crashes and restarts. Unless --offline is given, the server
    /// is probed and the queue drained right away.
    ///
    /// # Examples
    ///
    ///   learnsync queue complete lesson-1 --time-spent 300
    ///   learnsync queue quiz quiz-7 --answer q1=b --answer 'q2=["a","c"]'
    ///   learnsync queue bookmark lesson-3 --offline
    ///   learnsync queue list
    ///   learnsync queue retry
    #[command(alias = "q")]
    Queue(QueueArgs),

    /// Compare local progress with the server
    ///
    /// Reconciliation only reports divergence. It never changes local
    /// progress or the queue.
    ///
    /// # Examples
    ///
    ///   learnsync sync status
    ///   learnsync sync verify
    ///   learnsync sync verify --remote --strategy server-wins
    #[command(alias = "s")]
    Sync(SyncArgs),

    /// Probe, drain, and verify on an interval until interrupted
    ///
    /// Each iteration checks connectivity, delivers queued actions when
    /// online, and compares progress with the server.
    ///
    /// # Examples
    ///
    ///   learnsync watch
    ///   learnsync watch --interval 60
    Watch(WatchArgs),

    /// Clear the local session
    ///
    /// Discards every queued action and the user's cached progress.
    /// Actions not yet delivered are lost, so --force is required.
    Logout {
        /// Discard unsynced actions without asking
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    ///
    /// # Examples
    ///
    ///   learnsync completions bash > /usr/local/etc/bash_completion.d/learnsync
    ///   learnsync completions zsh > ~/.zsh/completions/_learnsync
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommands,
}

/// Delivery flags shared by the recording commands.
#[derive(Args, Clone, Copy)]
pub struct DeliveryArgs {
    /// Only queue the action; skip the connectivity probe and drain
    #[arg(long)]
    pub offline: bool,
}

/// Queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommands {
    /// Record a completed lesson
    Complete {
        /// Lesson ID
        lesson_id: String,

        /// Seconds spent on the lesson
        #[arg(long)]
        time_spent: Option<u32>,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Record a quiz submission
    Quiz {
        /// Quiz ID
        quiz_id: String,

        /// Answer as QUESTION=VALUE; VALUE may be JSON (repeatable)
        #[arg(long = "answer", short = 'a', value_parser = parse_answer)]
        answers: Vec<(String, serde_json::Value)>,

        /// Score reported by the client
        #[arg(long, value_parser = parse_score)]
        score: Option<f64>,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Toggle a lesson bookmark
    Bookmark {
        /// Lesson ID
        lesson_id: String,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Save a note on a lesson
    Note {
        /// Lesson ID
        lesson_id: String,

        /// Note text
        content: String,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },

    /// Show queue status
    Status,

    /// List the user's queued actions in delivery order
    List {
        /// Maximum actions to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Deliver queued actions now
    Drain,

    /// Reset retry counts and deliver again
    ///
    /// Fails while offline.
    Retry,
}

#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommands,
}

/// Reconciliation subcommands.
#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show the server's sync status next to the local fingerprint
    Status,

    /// Diff local progress against the server
    Verify {
        /// Let the server compute the diff
        #[arg(long)]
        remote: bool,

        /// Strategy used to suggest a resolution per conflict
        /// (server-wins, client-wins, latest-wins, manual)
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<ResolutionStrategy>,
    },
}

#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between iterations (defaults to `sync.interval_secs`)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Stop after this many iterations
    #[arg(long, short = 'n')]
    pub iterations: Option<u32>,
}

fn parse_answer(s: &str) -> Result<(String, serde_json::Value), String> {
    let (question, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION=VALUE, got '{s}'"))?;

    if question.is_empty() {
        return Err("question id cannot be empty".to_string());
    }

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((question.to_string(), value))
}

fn parse_score(s: &str) -> Result<f64, String> {
    let score: f64 = s.parse().map_err(|e| format!("invalid score '{s}': {e}"))?;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(format!("score must be a finite number, got '{s}'"))
    }
}

fn parse_strategy(s: &str) -> Result<ResolutionStrategy, String> {
    ResolutionStrategy::parse(s).ok_or_else(|| {
        format!("unknown strategy '{s}' (server-wins, client-wins, latest-wins, manual)")
    })
}

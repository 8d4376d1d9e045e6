//! # feed-client
//!
//! Line-oriented terminal client. Reads commands from stdin, drives a
//! [`FeedController`] and prints the feed with relative timestamps.

pub mod command;
pub mod render;

pub use command::{Command, CommandError, HELP};
pub use render::{relative_time, render_feed, time_left};

use futures::StreamExt;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use feed_common::{AppConfig, AppResult, ConfigError};
use feed_core::{PostId, SessionProvider, UserId};
use feed_service::{FeedContext, FeedController, FeedError};

/// Message shown when the client cannot start for lack of configuration
pub fn setup_message(err: &ConfigError) -> String {
    format!(
        "Setup required: {err}\n\
         \n\
         To use the shared feed, set DATABASE_URL and REDIS_URL (in the\n\
         environment or a .env file) to real connection strings.\n\
         To try it on this device only, set FEED_MODE=local."
    )
}

/// Result of executing one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Print(String),
    Quit,
}

/// A running session: the context plus the current user's controller
pub struct Client {
    context: FeedContext,
    controller: FeedController,
}

impl Client {
    /// Start a controller for the session's current user
    pub async fn connect(context: FeedContext) -> AppResult<Self> {
        let controller = context.current_controller().await?;
        let client = Self {
            context,
            controller,
        };
        client.open().await;
        Ok(client)
    }

    async fn open(&self) {
        if let Err(e) = self.controller.load_initial().await {
            warn!(error = %e, "Initial load failed");
        }
        self.controller.start().await;
        info!(user_id = %self.controller.user_id(), mode = %self.controller.mode(), "Session opened");
    }

    pub fn controller(&self) -> &FeedController {
        &self.controller
    }

    /// Replace the controller with one for `user_id`
    async fn switch_user(&mut self, user_id: UserId) {
        self.controller.stop();
        self.controller = self.context.controller(user_id);
        self.open().await;
    }

    /// React to the session reporting a different user (or none)
    pub async fn on_session_change(&mut self, change: Option<UserId>) -> AppResult<bool> {
        let user_id = match change {
            Some(user_id) => user_id,
            None => self.context.session().current_user_id().await?,
        };
        if &user_id == self.controller.user_id() {
            return Ok(false);
        }
        self.switch_user(user_id).await;
        Ok(true)
    }

    pub fn render(&self) -> String {
        render_feed(&self.controller.feed(), self.context.clock().now())
    }

    /// Run one command and say what to print
    pub async fn execute(&mut self, command: Command) -> Step {
        let output = match command {
            Command::Post(text) => match self.controller.create_post(&text).await {
                Ok(_) => self.render(),
                Err(e) => describe_error(&e),
            },
            Command::React(n) => match self.post_at(n) {
                Some(post_id) => match self.controller.toggle_reaction(&post_id).await {
                    Ok(()) => self.render(),
                    Err(e) => format!("{}\n{}", describe_error(&e), self.render()),
                },
                None => format!("no post number {n}"),
            },
            Command::Shuffle => {
                self.controller.shuffle();
                self.render()
            }
            Command::Reload => match self.controller.load_initial().await {
                Ok(_) => self.render(),
                Err(e) => describe_error(&e),
            },
            Command::Sweep => match self.controller.sweep().await {
                Ok(report) => format!("{} expired post(s) removed", report.removed),
                Err(e) => describe_error(&e),
            },
            Command::List => self.render(),
            Command::Reset => match self.context.reset_identity().await {
                Ok(user_id) => {
                    self.switch_user(user_id).await;
                    format!("You are now someone new.\n{}", self.render())
                }
                Err(e) => describe_error(&e),
            },
            Command::Help => HELP.to_string(),
            Command::Quit => return Step::Quit,
        };
        Step::Print(output)
    }

    fn post_at(&self, n: usize) -> Option<PostId> {
        self.controller
            .feed()
            .into_iter()
            .nth(n.checked_sub(1)?)
            .map(|entry| entry.post.id)
    }

    pub fn shutdown(&self) {
        self.controller.stop();
    }
}

fn describe_error(err: &FeedError) -> String {
    match err {
        FeedError::Remote(_) => format!("Could not reach the feed ({err}). Try again."),
        _ => err.to_string(),
    }
}

/// Run the interactive client until `quit` or end of input
pub async fn run(config: AppConfig) -> AppResult<()> {
    let context = FeedContext::from_config(&config).await?;
    let mut sessions = context.session().session_changes();
    let mut client = Client::connect(context).await?;

    println!("{}", client.render());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.parse::<Command>() {
                    Ok(command) => match client.execute(command).await {
                        Step::Print(output) => println!("{output}"),
                        Step::Quit => break,
                    },
                    Err(CommandError::Empty) => {}
                    Err(e) => println!("{e}"),
                }
            }
            Some(change) = sessions.next() => {
                if client.on_session_change(change).await? {
                    println!("\nSession changed.\n{}", client.render());
                }
            }
        }
    }

    client.shutdown();
    info!("Feed client exiting");
    Ok(())
}

//! REPL command parsing

use std::str::FromStr;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Publish a post
    Post(String),
    /// Toggle the reaction on the n-th visible post (1-based)
    React(usize),
    Shuffle,
    Reload,
    Sweep,
    List,
    /// Start over with a fresh anonymous identity
    Reset,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,

    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "post" | "p" => {
                if rest.is_empty() {
                    Err(CommandError::Usage("post <text>"))
                } else {
                    Ok(Self::Post(rest.to_string()))
                }
            }
            "react" | "r" => rest
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Self::React)
                .ok_or(CommandError::Usage("react <n>")),
            "shuffle" => Ok(Self::Shuffle),
            "reload" => Ok(Self::Reload),
            "sweep" => Ok(Self::Sweep),
            "list" | "ls" => Ok(Self::List),
            "reset" => Ok(Self::Reset),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
commands:
  post <text>   publish a post (1-140 characters, gone after 24 h)
  react <n>     toggle your reaction on post n
  shuffle       show the feed in random order
  reload        fetch the feed again
  sweep         drop expired posts now
  list          show the feed
  reset         start over with a new anonymous identity
  quit          leave";

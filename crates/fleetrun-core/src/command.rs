//! Remote command construction.
//!
//! A [`RemoteCommand`] stays structured until the transport needs a single
//! string for the remote shell. Building one never touches the network or the
//! filesystem.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::RunId;

/// Request to run the command inside a detached tmux session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWrap {
    /// tmux session name.
    pub name: String,
}

impl SessionWrap {
    /// Use `name` when given, otherwise the run identifier.
    pub fn named_or_run_id(name: Option<&str>, run_id: &RunId) -> Self {
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => run_id.to_string(),
        };
        Self { name }
    }
}

/// The command executed on every host of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteCommand {
    /// Run the text directly in the remote shell.
    Plain(String),
    /// Start a detached tmux session running the text and return immediately.
    Detached { session: String, inner: String },
}

impl RemoteCommand {
    /// Join positional CLI tokens into the command text.
    ///
    /// Tokens are joined with single spaces in their original order; any
    /// quoting the caller supplied is passed through untouched.
    pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
        tokens
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the remote command from the caller's text.
    pub fn build(text: impl Into<String>, wrap: Option<&SessionWrap>) -> Self {
        let text = text.into();
        match wrap {
            Some(wrap) => Self::Detached {
                session: wrap.name.clone(),
                inner: text,
            },
            None => Self::Plain(text),
        }
    }

    /// The caller's command text, without any wrapping.
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Detached { inner, .. } => inner,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached { .. })
    }

    /// Argument vector of the command, for executors that accept one.
    pub fn argv(&self) -> Vec<String> {
        match self {
            Self::Plain(text) => vec![text.clone()],
            Self::Detached { session, inner } => vec![
                "tmux".to_string(),
                "new-session".to_string(),
                "-d".to_string(),
                "-s".to_string(),
                session.clone(),
                inner.clone(),
            ],
        }
    }

    /// Render as a single string for a remote shell.
    ///
    /// The detached form embeds the inner text between double quotes without
    /// escaping it. Text containing `"` breaks the wrap; see
    /// [`RemoteCommand::has_quote_hazard`].
    pub fn render(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Detached { session, inner } => {
                format!("tmux new-session -d -s {} \"{}\"", session, inner)
            }
        }
    }

    /// True when the rendered wrap will not survive the remote shell intact.
    pub fn has_quote_hazard(&self) -> bool {
        match self {
            Self::Plain(_) => false,
            Self::Detached { inner, .. } => inner.contains('"'),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

//! Command tokenization for the process launcher.
//!
//! The command string is split on plain spaces. There is no quoting, escaping
//! or shell metacharacter handling: `sh -c "a b"` becomes four tokens.

use std::fmt;

use crate::error::{MyncError, Result};

/// Program and arguments to launch with the session's descriptors as stdio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    /// Tokenize `line`; runs of spaces collapse and empty tokens are dropped
    pub fn parse(line: &str) -> Result<Self> {
        let tokens: Vec<String> = line
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
        if tokens.is_empty() {
            return Err(MyncError::config("no command provided"));
        }
        Ok(Self { tokens })
    }

    /// First token, used as a path when it contains `/`, else searched on PATH
    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    /// Tokens after the program
    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    /// Whether the program is a literal path rather than a PATH lookup
    pub fn is_path(&self) -> bool {
        self.program().contains('/')
    }

    /// Build a tokio process command from the tokens, unchanged
    pub fn to_process(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(self.program());
        cmd.args(self.args());
        cmd
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

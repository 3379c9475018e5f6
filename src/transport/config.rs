//! Spawn configuration for the PTY transport.

use std::time::Duration;

/// Token that marks a command line as needing the privilege handshake.
const ESCALATION_TOKEN: &str = "sudo";

/// Configuration for spawning a child process on a PTY.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Program to spawn.
    pub command: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,

    /// Default timeout for session operations.
    pub timeout: Duration,

    /// Terminal width for the PTY.
    pub terminal_width: u16,

    /// Terminal height for the PTY.
    pub terminal_height: u16,
}

impl SpawnConfig {
    /// Create a config for the given program with defaults.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
        }
    }

    /// The full command line, for error messages and token checks.
    pub fn command_line(&self) -> String {
        let mut line = self.command.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Whether the command or any argument carries the escalation token.
    ///
    /// A spawn that matches gets the one-time password-prompt race at open.
    pub fn wants_escalation(&self) -> bool {
        self.command.contains(ESCALATION_TOKEN)
            || self.args.iter().any(|a| a.contains(ESCALATION_TOKEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let mut config = SpawnConfig::new("ssh");
        config.args = vec!["-p".into(), "22".into(), "host".into()];
        assert_eq!(config.command_line(), "ssh -p 22 host");
    }

    #[test]
    fn test_escalation_token_in_command() {
        let config = SpawnConfig::new("sudo");
        assert!(config.wants_escalation());
    }

    #[test]
    fn test_escalation_token_in_args() {
        let mut config = SpawnConfig::new("sh");
        config.args = vec!["-c".into(), "sudo tcpdump -i any".into()];
        assert!(config.wants_escalation());
    }

    #[test]
    fn test_no_escalation_token() {
        let mut config = SpawnConfig::new("sh");
        config.args = vec!["-c".into(), "ls".into()];
        assert!(!config.wants_escalation());
    }
}

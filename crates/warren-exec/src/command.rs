//! Reusable command description

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A command to be executed on the managed host
///
/// Unlike `tokio::process::Command` this type is `Clone`, comparable and can
/// be rendered for logs, which lets collaborators be tested by inspecting the
/// commands they issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    user: Option<String>,
}

impl CommandSpec {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.env.insert(key.into(), val.into());
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Run the command as another account
    #[must_use]
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Program name
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments
    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Environment overrides
    #[must_use]
    pub fn get_envs(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Working directory, if any
    #[must_use]
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Account to run as, if any
    #[must_use]
    pub fn get_user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Program and arguments as actually spawned
    ///
    /// When a user is set the command is wrapped in `sudo -u <user> -H env`,
    /// because sudo resets the environment of the child.
    #[must_use]
    pub fn argv(&self) -> (String, Vec<String>) {
        match &self.user {
            Some(user) => {
                let mut argv = vec![
                    "-u".to_string(),
                    user.clone(),
                    "-H".to_string(),
                    "--".to_string(),
                    "env".to_string(),
                ];
                argv.extend(self.env.iter().map(|(k, v)| format!("{k}={v}")));
                argv.push(self.program.clone());
                argv.extend(self.args.iter().cloned());
                ("sudo".to_string(), argv)
            }
            None => (self.program.clone(), self.args.clone()),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_program_and_args() {
        let cmd = CommandSpec::new("git").args(["fetch", "--tags", "origin"]);
        assert_eq!(cmd.to_string(), "git fetch --tags origin");
    }

    #[test]
    fn test_argv_plain() {
        let cmd = CommandSpec::new("make").arg("deps").env("GOPATH", "/srv/x");
        let (program, args) = cmd.argv();

        assert_eq!(program, "make");
        assert_eq!(args, vec!["deps"]);
    }

    #[test]
    fn test_argv_as_user_wraps_in_sudo() {
        let cmd = CommandSpec::new("go")
            .args(["get", "example.com/pkg/..."])
            .env("GOPATH", "/srv/warren")
            .as_user("warren");
        let (program, args) = cmd.argv();

        assert_eq!(program, "sudo");
        assert_eq!(
            args,
            vec![
                "-u",
                "warren",
                "-H",
                "--",
                "env",
                "GOPATH=/srv/warren",
                "go",
                "get",
                "example.com/pkg/...",
            ]
        );
    }
}

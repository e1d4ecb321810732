//! Command type for building executable commands

use crate::isolation::{Channel, StreamIsolation};
use async_process::Command as AsyncCommand;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// A command to be executed
///
/// This is a builder for creating commands that can be converted to `async_process::Command`
/// when needed. Unlike `AsyncCommand`, this type is `Clone` and can be spawned again for
/// every rerun of a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The program to execute
    program: OsString,
    /// The arguments to pass to the program
    args: Vec<OsString>,
    /// Environment variables to set
    env: BTreeMap<OsString, OsString>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &BTreeMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Prepare this command for execution with the given channel policy.
    ///
    /// On Unix the child leads a new process group so that signals reach
    /// anything it forks as well. A child reading an inherited stdin stays in
    /// the caller's group, where a terminal still lets it read.
    pub(crate) fn prepare(&self, isolation: &StreamIsolation) -> AsyncCommand {
        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd.args(&self.args);
        for (key, val) in &self.env {
            std_cmd.env(key, val);
        }
        if let Some(dir) = &self.current_dir {
            std_cmd.current_dir(dir);
        }

        #[cfg(unix)]
        if isolation.is_isolated(Channel::Stdin) {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        // Stdio goes on the async command so `output()` keeps our choice.
        let mut cmd = AsyncCommand::from(std_cmd);
        cmd.stdin(isolation.stdio(Channel::Stdin))
            .stdout(isolation.stdio(Channel::Stdout))
            .stderr(isolation.stdio(Channel::Stderr))
            .kill_on_drop(true);
        cmd
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(word: &OsStr) -> String {
    let word = word.to_string_lossy();
    if !word.is_empty() && !word.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        return word.into_owned();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("php")
            .arg("worker.php")
            .arg("--flag")
            .env("TEST_VAR", "test_value")
            .current_dir("/tmp")
            .build();

        assert_eq!(cmd.get_program(), "php");
        assert_eq!(cmd.get_args(), &["worker.php", "--flag"]);
        assert_eq!(
            cmd.get_envs().get(OsStr::new("TEST_VAR")),
            Some(&OsString::from("test_value"))
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_display_quotes_awkward_arguments() {
        let cmd = Command::builder("fetch-worker")
            .arg("https://example.com -H 'Accept: */*'")
            .arg("")
            .arg("plain")
            .build();

        assert_eq!(
            cmd.to_string(),
            r#"fetch-worker 'https://example.com -H '\''Accept: */*'\''' '' plain"#
        );
    }

    #[test]
    fn test_clone_is_reusable() {
        let cmd1 = Command::builder("sh").arg("job.sh").env("KEY", "VALUE").build();
        let cmd2 = cmd1.clone();
        assert_eq!(cmd1, cmd2);
        let _first = cmd1.prepare(&StreamIsolation::default());
        let _second = cmd1.prepare(&StreamIsolation::all(false));
    }
}

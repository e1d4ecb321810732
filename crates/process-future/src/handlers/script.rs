//! Scripts run through the interpreter registered for their extension

use crate::command::Command;
use crate::descriptor;
use crate::error::{Error, Result};
use crate::handle::ProcessHandle;
use crate::options::SpawnOptions;
use crate::transform::Passthrough;
use std::collections::BTreeMap;
use std::path::Path;

/// Handle to a script whose result is its raw stdout
pub type ScriptHandle = ProcessHandle<Passthrough>;

impl ProcessHandle<Passthrough> {
    /// Spawn the script named by the first word of `descriptor`.
    ///
    /// The interpreter is looked up by file extension in `interpreters`; the
    /// remaining words are passed to the script as arguments.
    pub fn script(
        descriptor: &str,
        interpreters: &BTreeMap<String, String>,
        options: SpawnOptions,
    ) -> Result<Self> {
        let command = script_command(descriptor, interpreters)?;
        Self::spawn(command, Passthrough, options)
    }
}

/// Build the interpreter invocation for a script descriptor
pub fn script_command(
    descriptor: &str,
    interpreters: &BTreeMap<String, String>,
) -> Result<Command> {
    let mut words = descriptor::split(descriptor)?.into_iter();
    let unsupported = || Error::UnsupportedProcess {
        descriptor: descriptor.to_string(),
    };

    let script = words.next().ok_or_else(unsupported)?;
    let interpreter = Path::new(&script)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| interpreters.get(ext))
        .ok_or_else(unsupported)?;

    // An interpreter may carry its own flags, e.g. `python3 -u`.
    let mut interpreter = descriptor::split(interpreter)?.into_iter();
    let program = interpreter.next().ok_or_else(unsupported)?;

    let mut command = Command::new(program);
    command.args(interpreter).arg(script).args(words);
    Ok(command)
}

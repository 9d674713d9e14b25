//! External command execution.
//!
//! Every evaluator, converter and git invocation goes through [`exec`]:
//! the child runs to completion, stdout is returned on success and stderr
//! becomes the error message on failure. There is no streaming.

use crate::error::{RenderError, Result};
use std::{
    ffi::OsString,
    path::Path,
    process::{Output, Stdio},
};
use tokio::{io::AsyncWriteExt, process::Command};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command with arguments, returning a future of its stdout.
///
/// # Examples
/// ```ignore
/// // Without working directory
/// exec!(["jsonnet"]; file).await?;
///
/// // With working directory
/// exec!(repo; ["git"]; "worktree", "add", dir, "HEAD").await?;
///
/// // Piping input to stdin
/// exec!(input = json.as_bytes(); ["yq", "-P"];).await?;
/// ```
#[macro_export]
macro_rules! exec {
    (input = $input:expr; $($rest:tt)*) => {
        $crate::exec_internal!(@parse_root Some($input); $($rest)*)
    };
    ($($rest:tt)*) => {
        $crate::exec_internal!(@parse_root None; $($rest)*)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! exec_internal {
    // Parse root and command (with root)
    (@parse_root $input:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some($root),
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
            $input,
        )
    };
    // Parse command (without root)
    (@parse_root $input:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            None,
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::filter_args(&[$($crate::utils::exec::internal::to_os($arg)),*]),
            $input,
        )
    };
}

// ============================================================================
// Argument Conversion
// ============================================================================

#[doc(hidden)]
pub mod internal {
    use std::ffi::OsString;

    /// Convert to `OsString`.
    #[inline]
    pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
        s.into()
    }

    /// Trait for converting to command vector.
    pub trait ToCmd {
        fn to_cmd(self) -> Vec<OsString>;
    }

    impl<const N: usize> ToCmd for [&str; N] {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.into_iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &[String] {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &Vec<String> {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.iter().map(OsString::from).collect()
        }
    }

    impl ToCmd for &Vec<OsString> {
        #[inline]
        fn to_cmd(self) -> Vec<OsString> {
            self.clone()
        }
    }

    /// Convert command to `Vec<OsString>`.
    #[inline]
    pub fn to_cmd_vec<C: ToCmd>(cmd: C) -> Vec<OsString> {
        cmd.to_cmd()
    }

    /// Filter out empty args.
    #[inline]
    pub fn filter_args(args: &[OsString]) -> Vec<OsString> {
        args.iter().filter(|a| !a.is_empty()).cloned().collect()
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Run a command to completion and return its stdout, trailing whitespace trimmed.
///
/// `input`, when given, is written to the child's stdin while its output is
/// collected, then stdin is closed.
///
/// # Errors
/// [`RenderError::Execution`] if the command cannot be spawned or exits
/// non-zero. The message is the captured stderr, or `Process exited with
/// code N` when stderr was empty.
pub async fn exec(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
    input: Option<&[u8]>,
) -> Result<String> {
    let (name, mut command) = prepare(root, cmd, args)?;

    command
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| RenderError::execution(&name, format!("Failed to execute `{name}`: {e}")))?;

    let stdin = child.stdin.take();
    let feed = async move {
        if let (Some(mut stdin), Some(input)) = (stdin, input) {
            stdin.write_all(input).await?;
            stdin.shutdown().await?;
        }
        Ok::<_, std::io::Error>(())
    };

    // Feed stdin while draining stdout/stderr, otherwise a large document
    // fills the pipe buffers and both sides block.
    let (fed, output) = tokio::join!(feed, child.wait_with_output());
    let output = output
        .map_err(|e| RenderError::execution(&name, format!("`{name}` process failed: {e}")))?;

    if !output.status.success() {
        return Err(RenderError::execution(&name, failure_message(&output)));
    }
    // A child that exits successfully without reading all input is not an error.
    let _ = fed;

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_owned())
}

/// Check whether a tool can be run at all (`<program> --version`).
pub async fn probe(program: &str) -> bool {
    exec(None, &[OsString::from(program)], &[OsString::from("--version")], None)
        .await
        .is_ok()
}

/// Prepare a Command from components.
fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let Some(program) = cmd.first() else {
        return Err(RenderError::invalid("Empty command"));
    };
    let name = program.to_string_lossy().into_owned();

    let mut command = Command::new(program);
    command.args(&cmd[1..]).args(args);

    if let Some(dir) = root {
        command.current_dir(dir);
    }

    Ok((name, command))
}

/// Error text for a failed process: its stderr, or the exit code.
fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_owned();
    }
    match output.status.code() {
        Some(code) => format!("Process exited with code {code}"),
        None => format!("Process terminated: {}", output.status),
    }
}

// ============================================================================
// Tests
// ============================================================================

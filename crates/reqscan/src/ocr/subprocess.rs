//! Locating and running external recognition engines.

use super::error::BackendError;
use std::collections::HashSet;
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Candidate executables for `command`, in lookup order.
///
/// The override wins, then an explicit path in `command`, then every `PATH` entry.
fn tool_candidates(command: &str, override_path: Option<OsString>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let mut push_candidate = |path: PathBuf| {
        if seen.insert(path.clone()) {
            candidates.push(path);
        }
    };

    if let Some(value) = override_path.filter(|v| !v.is_empty()) {
        push_candidate(PathBuf::from(value));
    }

    let command_path = Path::new(command);
    if command_path.components().count() > 1 || command_path.is_absolute() {
        push_candidate(command_path.to_path_buf());
    }

    if let Some(path_env) = env::var_os("PATH") {
        for dir in env::split_paths(&path_env) {
            push_candidate(dir.join(command));
            if cfg!(target_os = "windows") {
                push_candidate(dir.join(format!("{}.exe", command)));
            }
        }
    }

    candidates
}

/// Resolve an engine executable.
///
/// # Errors
///
/// `BackendError::Unavailable` naming the override variable when nothing is found.
pub(crate) fn locate_tool(command: &str, override_var: &str) -> Result<PathBuf, BackendError> {
    for candidate in tool_candidates(command, env::var_os(override_var)) {
        if let Ok(metadata) = std::fs::metadata(&candidate)
            && metadata.is_file()
        {
            return Ok(candidate);
        }
    }

    Err(BackendError::Unavailable(format!(
        "'{}' was not found on PATH. Install it or set {} to the executable.",
        command, override_var
    )))
}

/// Run `<program> --version` and return the first line it prints.
pub(crate) fn probe_version(program: &Path) -> Result<String, BackendError> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| BackendError::Unavailable(format!("'{}' could not be executed: {}", program.display(), e)))?;

    if !output.status.success() {
        return Err(BackendError::Unavailable(format!(
            "'{}' failed its --version check ({})",
            program.display(),
            output.status
        )));
    }

    // Some tools print their banner on stderr
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}

/// Run a program to completion, optionally feeding `stdin`, and return its stdout.
///
/// # Errors
///
/// Spawn failures, non-zero exits (with the tail of stderr) and non-UTF-8 output.
pub(crate) fn run(program: &Path, args: &[String], stdin: Option<&[u8]>) -> Result<String, BackendError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BackendError::Unavailable(format!("failed to start '{}': {}", program.display(), e)))?;

    let output = std::thread::scope(|scope| {
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // Fed concurrently with draining stdout
            scope.spawn(move || {
                let _ = pipe.write_all(input);
            });
        }
        child.wait_with_output()
    })
    .map_err(|e| BackendError::ProcessingFailed(format!("'{}' did not complete: {}", program.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().filter(|line| !line.trim().is_empty()).collect();
        let tail = lines[lines.len().saturating_sub(3)..].join(" | ");
        return Err(BackendError::ProcessingFailed(format!(
            "'{}' exited with {}: {}",
            program.display(),
            output.status,
            tail
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| BackendError::MalformedOutput(format!("'{}' printed non-UTF-8 output: {}", program.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_comes_first() {
        let candidates = tool_candidates("custom-ocr", Some(OsString::from("/opt/engines/custom-ocr")));
        assert_eq!(candidates[0], PathBuf::from("/opt/engines/custom-ocr"));
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let candidates = tool_candidates("custom-ocr", Some(OsString::new()));
        assert!(!candidates.contains(&PathBuf::new()));
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let err = locate_tool("reqscan-no-such-engine-binary", "REQSCAN_TEST_UNSET_VAR").unwrap_err();
        match err {
            BackendError::Unavailable(msg) => assert!(msg.contains("REQSCAN_TEST_UNSET_VAR")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_explicit_path_is_a_candidate() {
        let candidates = tool_candidates("/usr/local/bin/tesseract", None);
        assert!(candidates.contains(&PathBuf::from("/usr/local/bin/tesseract")));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_feeds_stdin_and_captures_stdout() {
        let out = run(Path::new("/bin/sh"), &["-c".to_string(), "cat".to_string()], Some(b"line one\nline two".as_slice())).unwrap();
        assert_eq!(out, "line one\nline two");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_failed_exit() {
        let err = run(Path::new("/bin/sh"), &["-c".to_string(), "echo bad >&2; exit 3".to_string()], None).unwrap_err();
        match err {
            BackendError::ProcessingFailed(msg) => assert!(msg.contains("bad")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

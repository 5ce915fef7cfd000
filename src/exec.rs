//! Invocation of external build tools.
//!
//! A tool run succeeds iff the process exits with status zero. Stdout and
//! stderr are captured together so a failure can be reported with everything
//! the tool printed.

use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

fn command(program: &Path) -> Command {
    #[cfg(windows)]
    {
        let lower = program.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(program);
            return cmd;
        }
    }

    Command::new(program)
}

/// Runs `program` with `args` and returns its combined output.
pub fn run_tool<I, S>(program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let rendered = render(program, &args);

    let mut cmd = command(program);
    cmd.args(&args);

    debug!(command = %rendered, "running build tool");
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute {} (is it installed?)", program.display()))?;
    let text = combined(&output);
    debug!(command = %rendered, status = %output.status, bytes = text.len(), "build tool finished");

    if !output.status.success() {
        bail!("`{rendered}` failed ({}):\n{}", output.status, text.trim_end());
    }
    Ok(text)
}

fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

fn render(program: &Path, args: &[std::ffi::OsString]) -> String {
    let mut out = program.display().to_string();
    for a in args {
        out.push(' ');
        out.push_str(&a.to_string_lossy());
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::fake_tool;

    #[test]
    fn run_tool_returns_stdout_and_stderr() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let tool = fake_tool(dir.path(), "tool", "echo out-line\necho err-line >&2\n")?;

        let text = run_tool(&tool, ["a"])?;
        assert!(text.contains("out-line"));
        assert!(text.contains("err-line"));
        Ok(())
    }

    #[test]
    fn run_tool_attaches_output_to_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let tool = fake_tool(dir.path(), "tool", "echo \"cannot resolve $1\" >&2\nexit 3\n")?;

        let err = run_tool(&tool, ["pom.xml"]).unwrap_err().to_string();
        assert!(err.contains("failed"));
        assert!(err.contains("cannot resolve pom.xml"));
        Ok(())
    }

    #[test]
    fn run_tool_passes_arguments_verbatim() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let tool = fake_tool(dir.path(), "tool", "for a; do echo \"[$a]\"; done\n")?;

        let text = run_tool(&tool, ["-f", "dir with space/pom.xml"])?;
        assert_eq!(text, "[-f]\n[dir with space/pom.xml]\n");
        Ok(())
    }

    #[test]
    fn run_tool_reports_missing_program() {
        let err = run_tool(Path::new("/nonexistent/buildtree-tool"), ["x"]).unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}

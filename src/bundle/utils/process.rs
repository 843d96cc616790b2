//! External tool invocation.
//!
//! Every collaborator (dependency dumpers, metadata editors, cache
//! generators) runs synchronously; a nonzero exit aborts the whole run with
//! the tool's stderr echoed. This hook runs once inside a build pipeline,
//! so there is no retry or partial-success handling.

use std::process::Command;

use crate::error::{Error, Result};

fn tool_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Runs a tool, capturing its output; returns stdout on success.
pub fn run_capture(mut cmd: Command) -> Result<String> {
    let tool = tool_name(&cmd);
    log::info!("running {cmd:?}");
    let output = cmd.output().map_err(|e| Error::ToolLaunch {
        tool: tool.clone(),
        source: e,
    })?;
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        log::error!("{stderr}");
        return Err(Error::ToolFailed { tool, stderr });
    }
    if !stderr.is_empty() {
        log::debug!("{tool} stderr: {stderr}");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a tool with inherited stdio, checking only the exit status.
pub fn run_status(mut cmd: Command) -> Result<()> {
    let tool = tool_name(&cmd);
    log::info!("running {cmd:?}");
    let status = cmd.status().map_err(|e| Error::ToolLaunch {
        tool: tool.clone(),
        source: e,
    })?;
    if !status.success() {
        return Err(Error::ToolFailed {
            tool,
            stderr: String::new(),
        });
    }
    Ok(())
}

//! External diff viewer launch.
//!
//! Optional last step of a data comparison: hand the two export files to a
//! third-party two-file diff tool as a detached process. No configured
//! tool path simply skips the step; a configured path that does not exist
//! is an error, as is launching before both files are on disk.

use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::error::{CompareError, Result};

/// Launch the diff viewer, if one is configured.
///
/// Returns `true` when a viewer was launched. The child process is
/// detached; its exit status is not observed.
pub fn launch_diff_viewer(tool: Option<&str>, left: &Path, right: &Path) -> Result<bool> {
    let Some(tool) = tool else {
        info!("no diff tool configured, skipping viewer launch");
        return Ok(false);
    };

    if !Path::new(tool).exists() {
        return Err(CompareError::Config(format!(
            "diff tool not found at {}",
            tool
        )));
    }
    if !left.exists() || !right.exists() {
        return Err(CompareError::Config(
            "one or both export files not found".to_string(),
        ));
    }

    Command::new(tool).arg(left).arg(right).spawn()?;
    info!(tool = %tool, "diff viewer launched");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_tool_skips() {
        let launched =
            launch_diff_viewer(None, Path::new("/nonexistent/a"), Path::new("/nonexistent/b"))
                .unwrap();
        assert!(!launched);
    }

    #[test]
    fn test_missing_tool_is_an_error() {
        let err = launch_diff_viewer(
            Some("/nonexistent/diff-tool"),
            Path::new("/nonexistent/a"),
            Path::new("/nonexistent/b"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("diff tool not found"));
    }

    #[test]
    fn test_missing_files_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();

        let err = launch_diff_viewer(
            Some(tool.to_str().unwrap()),
            &dir.path().join("missing-left"),
            &dir.path().join("missing-right"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("export files not found"));
    }
}

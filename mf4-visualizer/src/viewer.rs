//! Opening exported files in the platform's default viewer

use std::io;
use std::path::Path;
use std::process::Command;

/// Command that opens `path` with the desktop's default application
pub fn viewer_command(path: &Path) -> Command {
    if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(path);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(path);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    }
}

/// Launch the viewer and wait for the launcher to return
pub fn open_in_viewer(path: &Path) -> io::Result<()> {
    let status = viewer_command(path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("viewer exited with {}", status),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_command_targets_file() {
        let path = Path::new("mf4_exports/all_plots.pdf");
        let command = viewer_command(path);
        let program = command.get_program().to_string_lossy().into_owned();
        let expected = if cfg!(target_os = "windows") {
            "cmd"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        assert_eq!(program, expected);
        assert_eq!(command.get_args().last(), Some(path.as_os_str()));
    }
}

//! Shell profile editing.
//!
//! The PATH export is appended to the user's profile for future login shells.
//! It has no effect on this process or the commands it spawns; those receive
//! their PATH explicitly from [`crate::environment::ToolchainEnv`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, RoopstrapError};

/// Append `line` to the profile at `path` unless an identical line is already there.
///
/// Surrounding whitespace is ignored on both sides of the comparison and is
/// not written.
///
/// Creates the file (but not its parent directory) if missing. A newline is
/// inserted first when the existing file does not end with one.
///
/// Returns `true` if the line was appended.
pub fn append_profile_line(path: &Path, line: &str) -> Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Err(RoopstrapError::profile("profile line must not be empty"));
    }
    if line.contains(['\n', '\r']) {
        return Err(RoopstrapError::profile("profile line must be a single line"));
    }

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if existing.lines().any(|l| l.trim() == line) {
        debug!("{} already contains '{}'", path.display(), line);
        return Ok(false);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{line}")?;

    info!("Appended '{}' to {}", line, path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "export PATH=$PATH:$HOME/bin";

    #[test]
    fn test_creates_missing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        assert!(append_profile_line(&path, EXPORT).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{EXPORT}\n"));
    }

    #[test]
    fn test_appends_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        fs::write(&path, "alias ll='ls -l'\n").unwrap();

        assert!(append_profile_line(&path, EXPORT).unwrap());
        assert!(!append_profile_line(&path, EXPORT).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(EXPORT).count(), 1);
        assert!(content.starts_with("alias ll='ls -l'\n"));
    }

    #[test]
    fn test_separates_from_unterminated_last_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".profile");
        fs::write(&path, "umask 022").unwrap();

        append_profile_line(&path, EXPORT).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("umask 022\n{EXPORT}\n")
        );
    }

    #[test]
    fn test_surrounding_whitespace_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        let padded = format!("{EXPORT} ");

        assert!(append_profile_line(&path, &padded).unwrap());
        assert!(!append_profile_line(&path, &padded).unwrap());
        assert!(!append_profile_line(&path, EXPORT).unwrap());

        fs::write(&path, format!("  {EXPORT}\t\n")).unwrap();
        assert!(!append_profile_line(&path, &padded).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches(EXPORT).count(), 1);
    }

    #[test]
    fn test_rejects_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        assert!(append_profile_line(&path, "   ").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_rejects_multiline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        assert!(append_profile_line(&path, "a\nb").is_err());
        assert!(!path.exists());
    }
}

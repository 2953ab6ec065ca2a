//! Sandbox rules enforced by the executor independent of individual
//! tools: no shell interpolation, an application launch allowlist, a
//! filesystem prefix allowlist with a fixed system-path denylist, and a
//! maximum file read size.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '>', '<', '\n'];

const DENYLISTED_PREFIXES: &[&str] =
    &["/etc", "/var", "/usr", "/bin", "/sbin", "/System", "/Library", "/private"];

const DENYLISTED_SUBSTRINGS: &[&str] = &[".ssh", ".gnupg", ".aws", ".config"];

/// A sandbox rule was violated.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SandboxError {
    /// An argument contained a shell metacharacter; tools must invoke
    /// processes with an argv vector, never a shell-interpolated string.
    #[error("argument contains a shell metacharacter: {0:?}")]
    ShellMetacharacter(String),
    /// The named application is not on the launch allowlist.
    #[error("application not allowed: {0}")]
    ApplicationNotAllowed(String),
    /// The path falls under a denylisted system prefix or substring.
    #[error("path denied: {0}")]
    PathDenied(PathBuf),
    /// The path is outside every configured allowed prefix.
    #[error("path not in an allowed directory: {0}")]
    PathNotAllowed(PathBuf),
    /// A file read would exceed the configured maximum size.
    #[error("file of {actual} bytes exceeds the {limit}-byte read limit")]
    FileTooLarge {
        /// Size of the file being read.
        actual: u64,
        /// Configured maximum.
        limit: u64,
    },
}

/// Sandbox configuration shared by every tool execution.
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    allowed_path_prefixes: Vec<PathBuf>,
    allowed_applications: HashSet<String>,
    max_file_read_bytes: u64,
}

impl SandboxPolicy {
    /// Construct a policy from its configured allowlists.
    pub fn new(
        allowed_path_prefixes: Vec<PathBuf>,
        allowed_applications: HashSet<String>,
        max_file_read_bytes: u64,
    ) -> Self {
        Self { allowed_path_prefixes, allowed_applications, max_file_read_bytes }
    }

    /// Reject any argument containing a shell metacharacter. Tools must
    /// exec with an argv vector; this catches accidental or malicious
    /// attempts to build a shell-interpolated command string.
    pub fn check_no_shell_interpolation(&self, arg: &str) -> Result<(), SandboxError> {
        if let Some(c) = arg.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            return Err(SandboxError::ShellMetacharacter(c.to_string()));
        }
        Ok(())
    }

    /// Check an application name against the launch allowlist.
    pub fn check_application(&self, name: &str) -> Result<(), SandboxError> {
        if self.allowed_applications.contains(name) {
            Ok(())
        } else {
            Err(SandboxError::ApplicationNotAllowed(name.to_string()))
        }
    }

    /// Check a filesystem path against the denylist and the configured
    /// allowed prefixes. Denylist is checked first and always applies,
    /// even for a path that also happens to fall under an allowed
    /// prefix.
    pub fn check_path(&self, path: &Path) -> Result<(), SandboxError> {
        let rendered = path.to_string_lossy();

        for prefix in DENYLISTED_PREFIXES {
            if rendered.starts_with(prefix) {
                return Err(SandboxError::PathDenied(path.to_path_buf()));
            }
        }
        for needle in DENYLISTED_SUBSTRINGS {
            if rendered.contains(needle) {
                return Err(SandboxError::PathDenied(path.to_path_buf()));
            }
        }

        if self.allowed_path_prefixes.iter().any(|prefix| path.starts_with(prefix)) {
            Ok(())
        } else {
            Err(SandboxError::PathNotAllowed(path.to_path_buf()))
        }
    }

    /// Check a file's size against the maximum read size.
    pub fn check_read_size(&self, size_bytes: u64) -> Result<(), SandboxError> {
        if size_bytes > self.max_file_read_bytes {
            Err(SandboxError::FileTooLarge { actual: size_bytes, limit: self.max_file_read_bytes })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SandboxPolicy {
        SandboxPolicy::new(
            vec![PathBuf::from("/home/user/documents")],
            HashSet::from(["Safari".to_string(), "Calculator".to_string()]),
            1_000_000,
        )
    }

    #[test]
    fn shell_metacharacters_are_rejected() {
        let policy = policy();
        assert!(policy.check_no_shell_interpolation("hello; rm -rf /").is_err());
        assert!(policy.check_no_shell_interpolation("$(whoami)").is_err());
        assert!(policy.check_no_shell_interpolation("plain text").is_ok());
    }

    #[test]
    fn unlisted_application_is_rejected() {
        let policy = policy();
        assert!(policy.check_application("Terminal").is_err());
        assert!(policy.check_application("Safari").is_ok());
    }

    #[test]
    fn denylisted_prefix_wins_even_inside_an_allowed_prefix() {
        let policy = SandboxPolicy::new(
            vec![PathBuf::from("/etc")],
            HashSet::new(),
            1_000,
        );
        assert!(policy.check_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn ssh_substring_is_denied_anywhere() {
        let policy = policy();
        assert!(policy.check_path(Path::new("/home/user/documents/.ssh/id_rsa")).is_err());
    }

    #[test]
    fn path_outside_allowed_prefixes_is_rejected() {
        let policy = policy();
        assert!(policy.check_path(Path::new("/home/user/downloads/file.txt")).is_err());
        assert!(policy.check_path(Path::new("/home/user/documents/file.txt")).is_ok());
    }

    #[test]
    fn oversized_read_is_rejected() {
        let policy = policy();
        assert!(policy.check_read_size(2_000_000).is_err());
        assert!(policy.check_read_size(500).is_ok());
    }
}

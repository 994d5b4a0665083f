use regex::Regex;
use thiserror::Error;

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_BRANCH_LEN: usize = 255;
pub const MAX_PATH_LEN: usize = 4096;

const FORBIDDEN_BRANCH_SEQUENCES: [&str; 9] = ["..", "~", "^", ":", "?", "*", "[", "\\", " "];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("invalid name: cannot use '{0}'")]
    Reserved(String),

    #[error("name can only contain letters, numbers, hyphens, underscores, and forward slashes (found: {0})")]
    InvalidCharacters(String),

    #[error("branch name cannot contain '{0}'")]
    ForbiddenSequence(&'static str),

    #[error("branch name cannot start or end with '/'")]
    BadSlash,

    #[error("branch name cannot start with '-'")]
    LeadingDash,

    #[error("branch name cannot end with '.lock'")]
    LockSuffix,
}

pub struct WorktreeValidator {
    name_pattern: Regex,
}

impl WorktreeValidator {
    pub fn new() -> Self {
        Self {
            name_pattern: Regex::new(r"^[a-zA-Z0-9_/\-]+$").expect("Invalid regex pattern"),
        }
    }

    pub fn validate_name(&self, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(ValidationError::Empty("name"));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ValidationError::TooLong {
                field: "name",
                max: MAX_NAME_LEN,
            });
        }

        if name == "." || name == ".." {
            return Err(ValidationError::Reserved(name.to_string()));
        }

        if !self.name_pattern.is_match(name) {
            let invalid_chars: String = name
                .chars()
                .filter(|c| !matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '/'))
                .collect();
            return Err(ValidationError::InvalidCharacters(invalid_chars));
        }

        Ok(())
    }

    /// An empty branch is accepted; callers fall back to the worktree name.
    pub fn validate_branch(&self, branch: &str) -> Result<(), ValidationError> {
        let branch = branch.trim();

        if branch.is_empty() {
            return Ok(());
        }

        if branch.starts_with('-') {
            return Err(ValidationError::LeadingDash);
        }

        if branch.len() > MAX_BRANCH_LEN {
            return Err(ValidationError::TooLong {
                field: "branch name",
                max: MAX_BRANCH_LEN,
            });
        }

        if let Some(seq) = FORBIDDEN_BRANCH_SEQUENCES
            .iter()
            .copied()
            .find(|seq| branch.contains(*seq))
        {
            return Err(ValidationError::ForbiddenSequence(seq));
        }

        if branch.starts_with('/') || branch.ends_with('/') {
            return Err(ValidationError::BadSlash);
        }

        if branch.ends_with(".lock") {
            return Err(ValidationError::LockSuffix);
        }

        Ok(())
    }

    pub fn validate_path(&self, path: &str) -> Result<(), ValidationError> {
        let path = path.trim();

        if path.is_empty() {
            return Err(ValidationError::Empty("path"));
        }

        if path.len() > MAX_PATH_LEN {
            return Err(ValidationError::TooLong {
                field: "path",
                max: MAX_PATH_LEN,
            });
        }

        Ok(())
    }
}

impl Default for WorktreeValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns free-form input into something `validate_name` is likely to accept.
pub fn sanitize_name(name: &str) -> String {
    let mut sanitized = name.trim().replace(' ', "-");
    while sanitized.contains("--") {
        sanitized = sanitized.replace("--", "-");
    }
    sanitized
}

use std::path::PathBuf;

/// The error taxonomy exposed to callers of `freedom-core`. Every public
/// operation in components A-I returns `CoreResult<T>`; nothing is ever
/// swallowed silently.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An external tool exited non-zero or could not be started.
    #[error("'{tool}' failed (exit {exit:?}): {stderr}")]
    ToolFailure {
        tool: String,
        args: Vec<String>,
        exit: Option<i32>,
        stderr: String,
    },

    /// Allocation arithmetic determined that the requested pages would not
    /// fit in the available free space.
    #[error("insufficient space: needed {needed} bytes, only {available} available")]
    InsufficientSpace { needed: u64, available: u64 },

    /// A required external binary is missing from `PATH`.
    #[error("required tool '{missing_tool}' not found on PATH")]
    PreflightFailure { missing_tool: String },

    /// An operation's precondition (e.g. "no backing pages") was not met.
    #[error("precondition not met: {what}")]
    PreconditionUnmet { what: String },

    /// `mdadm --assemble` found a member count inconsistent with what was
    /// expected from the backing-page set.
    #[error("RAID array inconsistent: expected {expected} member(s), found {found}")]
    ArrayInconsistent { expected: usize, found: usize },

    /// `cryptsetup luksOpen` rejected the provided header/key/offset tuple.
    #[error("header, key, and offset did not open a consistent mapping")]
    WrongTuple,

    /// A destructive command was attempted without explicit confirmation.
    #[error("refusing destructive operation without confirmation")]
    RefusedUnconfirmed,

    /// A named key, header, or device could not be found.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

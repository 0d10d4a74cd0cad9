use thiserror::Error;

use crate::process::ProcessError;

#[derive(Error, Debug)]
pub enum ProgramError {
    #[error("failed to acquire listeners: {0}")]
    Listener(#[from] ProcessError),

    #[error("retry budget exhausted, program is Fatal")]
    StartFailed,
}

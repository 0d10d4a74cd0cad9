use thiserror::Error;

use crate::program::ProgramError;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("program not found: `{0}`")]
    ProgramNotFound(String),

    #[error(transparent)]
    Program(#[from] ProgramError),
}

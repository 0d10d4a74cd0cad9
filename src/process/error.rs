use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to bind listener `{addr}`: {source}")]
    ListenerBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process not started")]
    ProcessNotStarted,

    #[error("could not retrieve exit status")]
    WaitError,

    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("system error: {0}")]
    NixError(#[from] nix::Error),
}

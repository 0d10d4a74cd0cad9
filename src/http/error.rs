use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("failed to bind control API to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http server error: {0}")]
    Server(#[from] std::io::Error),
}

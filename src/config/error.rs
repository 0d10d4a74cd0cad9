use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error reading config file: `{0}`")]
    IOError(#[from] std::io::Error),

    #[error("error parsing config: `{0}`")]
    TomlError(#[from] toml::de::Error),

    #[error("error resolving include pattern: `{0}`")]
    GlobError(#[from] glob::PatternError),
}

use thiserror::Error;

/// Errors surfaced by the replay host and CLI.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Probe configuration error: {0}")]
    Config(#[from] phasekit_probe::ConfigError),
    #[error("Controller error: {0}")]
    Sample(#[from] phasekit_sample::SampleError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Trace line {line}: {msg}")]
    Trace { line: usize, msg: String },
    #[error("Invalid replay configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

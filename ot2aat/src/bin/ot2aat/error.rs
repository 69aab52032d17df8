use std::path::PathBuf;

use ot2aat::CompilerError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not create file '{path}': '{inner}'")]
    FileWrite {
        path: PathBuf,
        inner: std::io::Error,
    },
    #[error("write error: '{0}'")]
    Write(#[from] std::io::Error),
    #[error(transparent)]
    Compile(#[from] CompilerError),
    #[error("could not serialize rules: '{0}'")]
    Yaml(#[from] serde_yaml::Error),
}

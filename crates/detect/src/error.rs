use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectError>;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Code host error: {0}")]
    Codehost(#[from] repoguard_codehost::CodehostError),
}

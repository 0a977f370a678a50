#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("Sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backup error: {0}")]
    Backup(String),
}

pub(crate) type Result<T> = core::result::Result<T, Error>;

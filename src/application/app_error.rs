use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unauthorized")]
    InvalidCredentials,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Payment provider error: {0}")]
    Gateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

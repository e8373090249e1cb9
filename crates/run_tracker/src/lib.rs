use std::error::Error;

use model::ModelError;
use thiserror::Error;

pub mod client;
pub mod config;
pub mod database;
pub mod memory;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("the requested item does not exist")]
    NotFound,
    #[error("{0}")]
    InvalidCoordinate(String),
    #[error("finish datetime must be after start datetime")]
    InvalidFinishPoint,
    #[error("run has already been finished")]
    AlreadyFinished,
    #[error("{0}")]
    InvalidInput(String),
    #[error("user {0} does not exist")]
    UnknownUser(i64),
    /// Lock wait timeouts and connectivity problems. Safe to retry.
    #[error("temporary storage failure: {0}")]
    TransientStoreFailure(database::DatabaseError),
    #[error(transparent)]
    Other(Box<dyn Error + Send + Sync>),
}

impl RequestError {
    /// Errors caused by the request itself. Repeating it will fail again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate(_)
                | Self::InvalidFinishPoint
                | Self::AlreadyFinished
                | Self::InvalidInput(_)
                | Self::UnknownUser(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStoreFailure(_))
    }
}

impl From<ModelError> for RequestError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::InvalidCoordinate { .. } => {
                Self::InvalidCoordinate(value.to_string())
            }
            ModelError::InvalidFinishPoint => Self::InvalidFinishPoint,
            ModelError::AlreadyFinished => Self::AlreadyFinished,
            ModelError::InvalidTransition(_) | ModelError::InvalidUser(_) => {
                Self::InvalidInput(value.to_string())
            }
        }
    }
}

impl From<database::DatabaseError> for RequestError {
    fn from(value: database::DatabaseError) -> Self {
        match value {
            database::DatabaseError::NotFound => Self::NotFound,
            why if why.is_transient() => Self::TransientStoreFailure(why),
            why => Self::Other(Box::new(why)),
        }
    }
}

pub type RequestResult<O> = Result<O, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use database::DatabaseError;

    #[test]
    fn model_errors_are_client_errors() {
        let errors = [
            ModelError::InvalidCoordinate {
                name: "latitude",
                value: "91".to_owned(),
                min: -90,
                max: 90,
            },
            ModelError::InvalidFinishPoint,
            ModelError::AlreadyFinished,
            ModelError::InvalidUser("first name is empty".to_owned()),
        ];
        for error in errors {
            let error = RequestError::from(error);
            assert!(error.is_client_error());
            assert!(!error.is_retryable());
        }
    }

    #[test]
    fn transient_database_errors_are_retryable() {
        assert!(RequestError::from(DatabaseError::LockTimeout).is_retryable());
        let unavailable = DatabaseError::Unavailable("connection reset".into());
        assert!(RequestError::from(unavailable).is_retryable());

        let corrupt = RequestError::from(DatabaseError::Corrupt(ModelError::InvalidFinishPoint));
        assert!(!corrupt.is_retryable());
        assert!(!corrupt.is_client_error());
    }
}

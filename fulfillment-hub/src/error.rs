//! Handler-level error type
//!
//! `ServiceError` bridges store and infrastructure failures (`StoreError`,
//! `BoxError`) and domain errors to the API-layer `AppError`, so handlers
//! can use `?` on everything they call.

use axum::response::IntoResponse;
use shared::error::{AppError, ErrorCode};

use crate::db::StoreError;
use crate::orders::SyncError;
use crate::tokens::TokenError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug)]
pub enum ServiceError {
    /// Store or infrastructure failure (logged, mapped to DatabaseError)
    Db(BoxError),
    /// Domain error already carrying its ErrorCode
    App(AppError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ServiceError::App(AppError::not_found(what)),
            other => ServiceError::Db(other.into()),
        }
    }
}

impl From<BoxError> for ServiceError {
    fn from(e: BoxError) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Store(e) => e.into(),
            other => ServiceError::App(other.into()),
        }
    }
}

impl From<SyncError> for ServiceError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Store(e) => e.into(),
            SyncError::Token(e) => e.into(),
            other => ServiceError::App(other.into()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service store error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn store_failures_become_500() {
        let err: ServiceError = StoreError::Corrupt("bad row".into()).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::DatabaseError);
        assert_eq!(app.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_errors_keep_their_code() {
        let err: ServiceError = TokenError::NotFound("c9".into()).into();
        let app: AppError = err.into();
        assert_eq!(app.code, ErrorCode::CredentialNotFound);
        assert_eq!(app.http_status(), StatusCode::NOT_FOUND);
    }
}

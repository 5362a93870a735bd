use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::{
    borrow::Cow,
    fmt::{self, Display},
};

pub enum AppError {
    InternalServerError(anyhow::Error),
    ResponseStatusError(StatusCode, Cow<'static, str>),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct AppErrorResponse {
            status: u16,
            message: Cow<'static, str>,
        }

        match self {
            AppError::InternalServerError(err) => {
                tracing::error!(error = ?err, "request failed");
                AppError::from(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                    .into_response()
            }
            AppError::ResponseStatusError(code, s) => (
                code,
                Json(AppErrorResponse {
                    status: code.as_u16(),
                    message: s,
                }),
            )
                .into_response(),
        }
    }
}

// no `std::error::Error` impl, it would overlap the blanket `From` below
impl Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(err) => write!(f, "{err:#}"),
            AppError::ResponseStatusError(code, s) => write!(f, "{}: {s}", code.as_u16()),
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> AppError {
        AppError::InternalServerError(e.into())
    }
}

impl AppError {
    pub fn from(code: StatusCode, s: impl Into<Cow<'static, str>>) -> AppError {
        AppError::ResponseStatusError(code, s.into())
    }

    pub fn bad_request(e: impl Display) -> AppError {
        AppError::from(StatusCode::BAD_REQUEST, e.to_string())
    }

    pub fn not_found(what: &'static str) -> AppError {
        AppError::from(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

/// Body of every successful write: the status line shown to the user.
#[derive(Serialize, Debug)]
pub struct StatusMessage {
    pub message: Cow<'static, str>,
}

impl StatusMessage {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Json<StatusMessage> {
        Json(StatusMessage {
            message: message.into(),
        })
    }
}

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors produced by the server shell itself. API errors are handled inside
/// `weft-api`; this covers the layers wrapped around it.
#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut response =
          (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        response.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"weft\""),
        );
        response
      }
    }
  }
}

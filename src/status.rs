//! Uniform outcome returned by every operation: coarse code, failing location, optional cause and request id.

use crate::context::Context;
use crate::error::SqlError;
use std::fmt;

/// Coarse outcome code. Numeric values follow the gRPC numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Cancelled,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    ResourceExhausted,
    Internal,
}

impl StatusCode {
    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Cancelled => 1,
            StatusCode::InvalidArgument => 3,
            StatusCode::DeadlineExceeded => 4,
            StatusCode::NotFound => 5,
            StatusCode::ResourceExhausted => 8,
            StatusCode::Internal => 13,
        }
    }

    /// HTTP equivalent, used for the response descriptor of an access record.
    pub fn http_status(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Cancelled => 499,
            StatusCode::InvalidArgument => 400,
            StatusCode::DeadlineExceeded => 504,
            StatusCode::NotFound => 404,
            StatusCode::ResourceExhausted => 429,
            StatusCode::Internal => 500,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "Cancelled",
            StatusCode::InvalidArgument => "InvalidArgument",
            StatusCode::DeadlineExceeded => "DeadlineExceeded",
            StatusCode::NotFound => "NotFound",
            StatusCode::ResourceExhausted => "ResourceExhausted",
            StatusCode::Internal => "Internal",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a core operation. `code == Ok` iff `cause` is `None`; `NotFound` is the one
/// cause-less failure and is only produced by consumer helpers.
#[derive(Debug)]
pub struct Status {
    code: StatusCode,
    location: &'static str,
    cause: Option<SqlError>,
    request_id: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: StatusCode::Ok,
            location: "",
            cause: None,
            request_id: None,
        }
    }

    pub fn not_found(location: &'static str) -> Self {
        Status {
            code: StatusCode::NotFound,
            location,
            cause: None,
            request_id: None,
        }
    }

    /// Failure status. `code` must not be `Ok`; an `Ok` code is promoted to `Internal` so the
    /// code/cause invariant holds.
    pub fn error(code: StatusCode, location: &'static str, cause: SqlError) -> Self {
        let code = if code == StatusCode::Ok {
            StatusCode::Internal
        } else {
            code
        };
        Status {
            code,
            location,
            cause: Some(cause),
            request_id: None,
        }
    }

    /// Maps a cause to its natural code: cancellation, timeout and rate limiting keep their own
    /// codes, missing client and bad requests are `InvalidArgument`, everything else `Internal`.
    pub fn from_cause(location: &'static str, cause: SqlError) -> Self {
        let code = match &cause {
            SqlError::Cancelled => StatusCode::Cancelled,
            SqlError::Timeout(_) | SqlError::DeadlineExceeded => StatusCode::DeadlineExceeded,
            SqlError::RateLimited(_) => StatusCode::ResourceExhausted,
            SqlError::ClientUnavailable | SqlError::InvalidRequest(_) => StatusCode::InvalidArgument,
            _ => StatusCode::Internal,
        };
        Status::error(code, location, cause)
    }

    /// Copies the correlation id from `ctx`, if it carries one.
    pub fn with_request_id(mut self, ctx: &Context) -> Self {
        if let Some(id) = ctx.request_id() {
            self.request_id = Some(id.to_string());
        }
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn location(&self) -> &'static str {
        self.location
    }

    pub fn cause(&self) -> Option<&SqlError> {
        self.cause.as_ref()
    }

    pub fn into_cause(self) -> Option<SqlError> {
        self.cause
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            None => write!(f, "{}", self.code),
            Some(cause) => write!(f, "{} [{}: {}]", self.code, self.location, cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_no_cause() {
        let s = Status::ok();
        assert!(s.is_ok());
        assert!(s.cause().is_none());
        assert_eq!(s.to_string(), "OK");
    }

    #[test]
    fn error_with_ok_code_is_promoted() {
        let s = Status::error(StatusCode::Ok, "exec", SqlError::backend("boom"));
        assert_eq!(s.code(), StatusCode::Internal);
        assert!(s.cause().is_some());
    }

    #[test]
    fn cause_maps_to_code() {
        assert_eq!(Status::from_cause("q", SqlError::Cancelled).code(), StatusCode::Cancelled);
        assert_eq!(
            Status::from_cause("q", SqlError::ClientUnavailable).code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            Status::from_cause("q", SqlError::RateLimited("c".into())).code(),
            StatusCode::ResourceExhausted
        );
        assert_eq!(Status::from_cause("q", SqlError::backend("x")).code(), StatusCode::Internal);
    }

    #[test]
    fn request_id_copied_from_context() {
        let ctx = Context::background().with_request_id("req-42");
        let s = Status::from_cause("query", SqlError::ClientUnavailable).with_request_id(&ctx);
        assert_eq!(s.request_id(), Some("req-42"));
        assert_eq!(s.location(), "query");
    }
}

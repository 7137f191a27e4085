use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub enum Error {
    /// Login exhausted its attempts or the response carried no token.
    Authentication(String),
    /// A resource fetch exhausted its attempts.
    Fetch { resource: String, reason: String },
    /// Response body was not valid JSON or did not have the expected shape.
    Parse(String),
    Status(u16),
    Unauthorized,
    Timeout,
    Transport(String),
    Configuration(String),
    /// No snapshot has been collected yet.
    Unavailable,
    FormatError,
    InternalError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(s) => write!(f, "authentication failed: {}", s),
            Error::Fetch { resource, reason } => {
                write!(f, "failed to fetch {}: {}", resource, reason)
            }
            Error::Parse(s) => write!(f, "invalid response: {}", s),
            Error::Status(status) => write!(f, "HTTP {}", status),
            Error::Unauthorized => write!(f, "unauthorized"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Transport(s) => write!(f, "transport error: {}", s),
            Error::Configuration(s) => write!(f, "configuration error: {}", s),
            Error::Unavailable => write!(f, "no snapshot available yet"),
            Error::FormatError => write!(f, "unable to format metrics"),
            Error::InternalError => write!(f, "internal error"),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(error.to_string())
        }
    }
}

fn html(status: Status, error: String) -> response::Result<'static> {
    Response::build()
        .status(status)
        .sized_body(error.len(), Cursor::new(error))
        .header(ContentType::new("text", "html"))
        .ok()
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::Authentication(s) => html(
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to downstream API: <code>{}</code></body></html>", s),
            ),
            Error::Fetch { .. } | Error::Unavailable => html(
                Status::ServiceUnavailable,
                format!("<html><body><h3>503 Service Unavailable</h3><code>{}</code></body></html>", self),
            ),
            _ => html(
                Status::InternalServerError,
                format!("<html><body><h3>Unknown exception</h3><code>{:?}</code></body></html>", self),
            ),
        }
    }
}

use crate::{utils::display_maybe_utf8, xerror::XError, SetupRefused};
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Environment variable '{0}' is not set")]
    NoEnv(&'static str),

    #[error("Could not decode display name '{0}'")]
    InvalidDisplayEnv(String),

    #[error("Only local connections are supported, got '{0}'")]
    UnsupportedTransport(String),

    #[error("Could not open unix socket '{0}': {1}")]
    CouldNotOpenUnixSocket(String, #[source] io::Error),

    #[error("Could not read Xauthority file '{0}': {1}")]
    CouldNotReadXAuthFile(String, #[source] io::Error),

    #[error("Could not decode Xauthority file '{0}'")]
    InvalidXAuthFile(String),

    #[error("{0}")]
    CouldNotOpenDisplay(SetupRefused),

    #[error("Server requires further authentication: {}", display_maybe_utf8(.0))]
    AuthenticationRequired(Vec<u8>),

    #[error("Server has no screen {0}")]
    NoSuchScreen(u32),

    #[error("Connection to X server failed: {0}")]
    IOError(#[from] io::Error),

    #[error("X server closed the connection")]
    ConnectionClosed,

    #[error("Could not decode {0} sent by X server")]
    InvalidResponse(&'static str),

    #[error("Reply does not match the request it answers")]
    UnexpectedReply,

    #[error("Request failed: {0}")]
    RequestFailed(XError),

    #[error("No resource ids left in the range assigned by the server")]
    ResourceIdsExhausted,
}

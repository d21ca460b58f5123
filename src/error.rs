use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors travelling through streams.
///
/// Errors are broadcast to every observer of a multicast, so the type is
/// cheap to clone and carries rendered messages instead of boxed sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	#[error("no elements in sequence")]
	Empty,

	#[error("timeout has occurred")]
	Timeout,

	#[error("stream is already completed")]
	AlreadyCompleted,

	#[error("unknown action: {action}")]
	UnknownAction { action: String },

	#[error("invalid payload for `{action}`: {message}")]
	Payload { action: String, message: String },

	#[error("path `{path}` does not exist in state")]
	Path { path: String },

	#[error("operation was aborted")]
	Aborted,

	#[error("failed to spawn future: {0}")]
	Spawn(String),

	#[error("{0}")]
	Message(String),
}

impl Error {
	pub fn msg(message: impl Into<String>) -> Self {
		Error::Message(message.into())
	}

	pub(crate) fn payload(action: &str, err: impl std::fmt::Display) -> Self {
		Error::Payload {
			action: action.to_owned(),
			message: err.to_string(),
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Error::Payload {
			action: String::new(),
			message: err.to_string(),
		}
	}
}

impl From<futures::task::SpawnError> for Error {
	fn from(err: futures::task::SpawnError) -> Self {
		Error::Spawn(err.to_string())
	}
}

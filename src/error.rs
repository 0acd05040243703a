use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::pending::CallbackId;

pub type Result<T> = std::result::Result<T, Error>;

pub const ERR_PARAM_NO_FILENAME: &str = "ERR_PARAM_NO_FILENAME";
pub const ERR_PARAM_NO_CONTENT_TYPE: &str = "ERR_PARAM_NO_CONTENT_TYPE";
pub const ERR_PARAM_NO_DATA: &str = "ERR_PARAM_NO_DATA";
pub const ERR_PARAM_DATA_INVALID: &str = "ERR_PARAM_DATA_INVALID";
pub const ERR_FILE_CACHING_FAILED: &str = "ERR_FILE_CACHING_FAILED";
pub const ERR_LOCAL_FILE_NOT_FOUND: &str = "ERR_LOCAL_FILE_NOT_FOUND";
pub const USER_CANCELLED: &str = "USER_CANCELLED";

// This enum defines the errors that can be sent back to the frontend.
// Variants carrying a stable code display as exactly that code, so the
// frontend can branch on the rejection string without parsing messages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ERR_PARAM_NO_FILENAME")]
    NoFilename,
    #[error("ERR_PARAM_NO_CONTENT_TYPE")]
    NoContentType,
    #[error("ERR_PARAM_NO_DATA")]
    NoData,
    #[error("ERR_PARAM_DATA_INVALID")]
    DataInvalid(#[source] base64::DecodeError),
    #[error("ERR_FILE_CACHING_FAILED")]
    CachingFailed(#[source] std::io::Error),
    #[error("ERR_LOCAL_FILE_NOT_FOUND")]
    LocalFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("USER_CANCELLED")]
    UserCancelled,
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("No pending share request for callback {0}")]
    UnknownCallback(CallbackId),
    #[error("Share request was abandoned before the chooser reported an outcome")]
    Abandoned,
    #[error("Failed to interact with native sharing API: {0}")]
    NativeApi(String),
    #[error("Tauri API error: {0}")]
    Tauri(#[from] tauri::Error),
    #[cfg(mobile)]
    #[error("Plugin invoke error: {0}")]
    PluginInvoke(String),
}

impl Error {
    /// The stable code for errors the frontend is expected to branch on.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::NoFilename => Some(ERR_PARAM_NO_FILENAME),
            Error::NoContentType => Some(ERR_PARAM_NO_CONTENT_TYPE),
            Error::NoData => Some(ERR_PARAM_NO_DATA),
            Error::DataInvalid(_) => Some(ERR_PARAM_DATA_INVALID),
            Error::CachingFailed(_) => Some(ERR_FILE_CACHING_FAILED),
            Error::LocalFileNotFound { .. } => Some(ERR_LOCAL_FILE_NOT_FOUND),
            Error::UserCancelled => Some(USER_CANCELLED),
            _ => None,
        }
    }

    /// Maps a rejection string coming back from the native mobile half.
    #[cfg_attr(not(mobile), allow(dead_code))]
    pub(crate) fn from_native_message(message: String) -> Self {
        match message.as_str() {
            ERR_PARAM_NO_FILENAME => Error::NoFilename,
            ERR_PARAM_NO_CONTENT_TYPE => Error::NoContentType,
            ERR_PARAM_NO_DATA => Error::NoData,
            ERR_FILE_CACHING_FAILED => Error::CachingFailed(std::io::Error::other(message)),
            USER_CANCELLED => Error::UserCancelled,
            _ => match message.strip_prefix("File not found: ") {
                Some(path) => Error::FileNotFound(path.to_string()),
                None => Error::NativeApi(message),
            },
        }
    }
}

#[cfg(mobile)]
impl From<tauri::plugin::mobile::PluginInvokeError> for Error {
    fn from(err: tauri::plugin::mobile::PluginInvokeError) -> Self {
        match err {
            tauri::plugin::mobile::PluginInvokeError::InvokeRejected(rejected) => {
                match rejected.message {
                    Some(message) => Error::from_native_message(message),
                    None => Error::PluginInvoke("native share call was rejected".to_string()),
                }
            }
            other => Error::PluginInvoke(other.to_string()),
        }
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

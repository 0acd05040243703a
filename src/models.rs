use serde::{Deserialize, Serialize};

use crate::pending::CallbackId;
use crate::receivers::ReceiverCandidate;

pub const DEFAULT_STAGING_DIR_NAME: &str = "filesharer";
pub const DEFAULT_DIALOG_TITLE: &str = "Share";

/// Plugin configuration, read from `plugins.file-sharer` in `tauri.conf.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Name of the directory inside the app cache dir that holds staged files.
    pub staging_dir_name: String,
    /// Chooser title used when a request doesn't carry one.
    pub default_dialog_title: String,
    /// Enumerate receivers ourselves for single-file shares instead of
    /// leaving the listing entirely to the platform chooser.
    pub explicit_receivers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            staging_dir_name: DEFAULT_STAGING_DIR_NAME.to_string(),
            default_dialog_title: DEFAULT_DIALOG_TITLE.to_string(),
            explicit_receivers: true,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AndroidShareOptions {
    pub chooser_title: Option<String>,
}

/// Options of the single-file `share` command.
///
/// Either `base64_data` or `path` carries the payload; inline data wins when
/// both are set. `filename` may be omitted when `path` is given.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareFileOptions {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub base64_data: Option<String>,
    /// A local path, possibly still wearing a webview asset prefix.
    pub path: Option<String>,
    pub chooser_title: Option<String>,
    pub android: Option<AndroidShareOptions>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMultipleOptions {
    /// Local paths or `content://` / `file://` URIs.
    pub files: Option<Vec<String>>,
    pub dialog_title: Option<String>,
    pub content_type: Option<String>,
}

/// Payload of the `file-sharer://chooser` event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooserRequest {
    pub id: CallbackId,
    pub title: String,
    pub content_type: String,
    pub candidates: Vec<ReceiverCandidate>,
}

/// The frontend's answer to a [`ChooserRequest`]. `receiver` is `None` when
/// the user dismissed the chooser.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChooserResponse {
    pub id: CallbackId,
    pub receiver: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fields_default_individually() {
        let config: Config = serde_json::from_str(r#"{ "defaultDialogTitle": "Send" }"#).unwrap();
        assert_eq!(config.default_dialog_title, "Send");
        assert_eq!(config.staging_dir_name, DEFAULT_STAGING_DIR_NAME);
        assert!(config.explicit_receivers);
    }

    #[test]
    fn share_options_use_camel_case() {
        let options: ShareFileOptions = serde_json::from_str(
            r#"{
                "filename": "a.txt",
                "contentType": "text/plain",
                "base64Data": "aGk=",
                "android": { "chooserTitle": "Send via" }
            }"#,
        )
        .unwrap();
        assert_eq!(options.content_type.as_deref(), Some("text/plain"));
        assert_eq!(options.base64_data.as_deref(), Some("aGk="));
        assert_eq!(
            options.android.and_then(|a| a.chooser_title).as_deref(),
            Some("Send via")
        );
    }

    #[test]
    fn dismissed_chooser_response_has_no_receiver() {
        let response: ChooserResponse =
            serde_json::from_str(r#"{ "id": "67e55044-10b1-426f-9247-bb680e5fe0c8" }"#).unwrap();
        assert_eq!(response.receiver, None);
        assert_eq!(response.id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
    }
}

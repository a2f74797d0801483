pub mod controller;
pub mod mic_check;
pub mod submission;
pub mod timer;

pub use controller::*;
pub use mic_check::*;
pub use submission::*;
pub use timer::*;

use serde::{Deserialize, Serialize};

/// A question as loaded for the session. The controller only ever stores
/// answers against ids present in this loaded set.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

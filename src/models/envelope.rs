use serde::{Deserialize, Serialize};

/// Response envelope shared by every console endpoint.
/// Code 200 is success; any other code carries a user-facing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: u16,
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub const SUCCESS: u16 = 200;

    pub fn ok(data: T) -> Self {
        Self {
            code: Self::SUCCESS,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: Self::SUCCESS,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }
}

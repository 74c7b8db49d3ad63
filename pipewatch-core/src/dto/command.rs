//! Command response DTO

use serde::{Deserialize, Serialize};

/// Response to start, cancel and reset requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

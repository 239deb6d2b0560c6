//! Opaque continuation tokens
//!
//! A token is the standard, padded base64 of the JSON of the last index
//! entry a page returned.

use crate::error::{ApiError, Result};
use crate::paths::TimestampKey;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Position in the timestamp index a page ended at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCursor {
    pub timestamp: i64,
    #[serde(rename = "postId")]
    pub post_id: String,
    pub owner: String,
}

impl FeedCursor {
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = STANDARD.decode(token.trim())?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::validation(format!("malformed token: {}", e)))
    }

    /// Sort key shared with index entries
    pub(crate) fn sort_key(&self) -> (i64, &str) {
        (self.timestamp, &self.post_id)
    }
}

impl From<&TimestampKey> for FeedCursor {
    fn from(key: &TimestampKey) -> Self {
        Self {
            timestamp: key.timestamp,
            post_id: key.post_id.clone(),
            owner: key.owner.clone(),
        }
    }
}

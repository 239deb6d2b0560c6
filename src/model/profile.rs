//! Profile records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display attributes stored on the private profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Any other display attribute, stored as given
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input for creating the current account's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateProfileInput {
    pub username: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
}

/// Full replacement of the display attributes
pub type UpdateProfileInput = ProfileDetails;

/// A resolved profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub alias: String,
    #[serde(rename = "pub", default)]
    pub pub_key: String,
    #[serde(flatten)]
    pub details: ProfileDetails,
    /// Aliases with a live edge in this profile's friend set
    #[serde(default)]
    pub friends: Vec<String>,
}

use super::SocialClient;
use crate::error::{ApiError, Result};
use crate::events::SocialEvent;
use crate::friends::{Compensation, Saga};
use crate::model::{CreateProfileInput, Profile, ProfileDetails, UpdateProfileInput};
use crate::paths;
use crate::resolve::ResolutionProbe;
use crate::store::{is_unresolved_marker, live_keys, reference, GraphStore, META_KEY};
use serde_json::{Map, Value};
use tracing::info;

/// Keys of a profile record that are not display attributes
const RECORD_KEYS: [&str; 4] = ["alias", "pub", "friends", META_KEY];

impl<S: GraphStore + ?Sized> SocialClient<S> {
    /// Create the current account's profile and publish it under `profiles`
    pub async fn create_profile(&self, input: CreateProfileInput) -> Result<Profile> {
        paths::validate_segment("username", &input.username)?;
        if !self.ctx.is_self(&input.username) {
            return Err(ApiError::validation(format!(
                "profile {} does not belong to the current account",
                input.username
            )));
        }
        let alias = self.ctx.alias();
        let public_path = paths::public_profile(alias);
        if self.record_exists(&public_path).await {
            return Err(ApiError::conflict(format!("profile {} already exists", alias)));
        }

        let mut record = display_attributes(&input.details)?;
        record.insert("alias".into(), Value::from(alias));
        record.insert("pub".into(), Value::from(self.ctx.pub_key()));
        let record = Value::Object(record);

        let private_path = paths::private_profile(alias);
        let mut saga = Saga::new(self.store.as_ref(), "create_profile");
        saga.put(&private_path, record, Compensation::erase_of(&private_path))
            .await?;
        saga.put(&public_path, reference(&private_path), Compensation::Nothing)
            .await?;

        info!(alias = %alias, "Profile created");
        self.emit(SocialEvent::ProfileCreated {
            alias: alias.to_string(),
        });

        Ok(Profile {
            alias: alias.to_string(),
            pub_key: self.ctx.pub_key().to_string(),
            details: input.details,
            friends: Vec::new(),
        })
    }

    /// Replace every display attribute of the current account's profile
    pub async fn update_profile(&self, input: UpdateProfileInput) -> Result<Profile> {
        let alias = self.ctx.alias();
        let path = paths::private_profile(alias);
        let Some(current) = self.read_check(&path).await else {
            return Err(ApiError::NotFound(format!("profile {}", alias)));
        };

        // The store merges objects, so cleared attributes are written as null
        let mut update = display_attributes(&input)?;
        for field in ["fullName", "avatar", "about", "email"] {
            update.entry(field).or_insert(Value::Null);
        }
        if let Some(stored) = current.as_object() {
            for key in stored.keys() {
                if !RECORD_KEYS.contains(&key.as_str()) {
                    update.entry(key.clone()).or_insert(Value::Null);
                }
            }
        }
        let ack = self.store.put_at(&path, Value::Object(update)).await;
        if let Some(message) = ack.err {
            return Err(ApiError::StoreWrite { path, message });
        }

        self.emit(SocialEvent::ProfileUpdated {
            alias: alias.to_string(),
        });
        self.get_current_profile().await
    }

    /// Resolved public profile of `alias`
    pub async fn get_profile(&self, alias: &str) -> Result<Profile> {
        paths::validate_segment("alias", alias)?;
        let probe = ResolutionProbe::root().scalar("alias");
        let record = self
            .resolver()
            .resolve(&paths::public_profile(alias), &probe)
            .await?;
        profile_from_record(alias, &record)
    }

    pub async fn get_current_profile(&self) -> Result<Profile> {
        let alias = self.ctx.alias().to_string();
        self.get_profile(&alias).await
    }
}

/// Serialized display attributes without the keys the record reserves
fn display_attributes(details: &ProfileDetails) -> Result<Map<String, Value>> {
    let mut map = match serde_json::to_value(details)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.retain(|key, _| !RECORD_KEYS.contains(&key.as_str()));
    Ok(map)
}

fn profile_from_record(alias: &str, record: &Value) -> Result<Profile> {
    let attributes: Map<String, Value> = record
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(key, value)| {
            !RECORD_KEYS.contains(&key.as_str()) && !value.is_null() && !is_unresolved_marker(value)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let details: ProfileDetails = serde_json::from_value(Value::Object(attributes))?;
    Ok(Profile {
        alias: record
            .get("alias")
            .and_then(Value::as_str)
            .unwrap_or(alias)
            .to_string(),
        pub_key: record
            .get("pub")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        details,
        friends: record.get("friends").map(live_keys).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::context::AccountContext;
    use crate::store::MemoryGraphStore;
    use std::sync::Arc;

    fn alice() -> SocialClient<MemoryGraphStore> {
        SocialClient::with_config(
            Arc::new(MemoryGraphStore::new()),
            AccountContext::new("alice", "pk-alice").unwrap(),
            ClientConfig::for_local(),
        )
    }

    fn input(username: &str) -> CreateProfileInput {
        CreateProfileInput {
            username: username.into(),
            details: ProfileDetails {
                full_name: Some("Alice A".into()),
                avatar: Some("avatar.png".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let client = alice();
        client.create_profile(input("alice")).await.unwrap();

        let profile = client.get_current_profile().await.unwrap();
        assert_eq!(profile.alias, "alice");
        assert_eq!(profile.pub_key, "pk-alice");
        assert_eq!(profile.details.full_name.as_deref(), Some("Alice A"));
        assert!(profile.friends.is_empty());

        let public = client.store().snapshot("profiles.alice").await.unwrap();
        assert_eq!(public, reference("accounts.alice.profile"));
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let client = alice();
        client.create_profile(input("alice")).await.unwrap();
        let err = client.create_profile(input("alice")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_for_other_account_is_rejected() {
        let err = alice().create_profile(input("bob")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_overwrites_all_display_fields() {
        let client = alice();
        client.create_profile(input("alice")).await.unwrap();

        let updated = client
            .update_profile(ProfileDetails {
                about: Some("hello".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.details.about.as_deref(), Some("hello"));
        assert_eq!(updated.details.full_name, None);
        assert_eq!(updated.alias, "alice");
    }

    #[tokio::test]
    async fn test_extra_attributes_are_kept_and_cleared() {
        let client = alice();
        let mut create = input("alice");
        create.details.extra.insert("misc".into(), Value::from("likes hiking"));
        create.details.extra.insert("friends".into(), Value::from("not a set"));
        client.create_profile(create).await.unwrap();

        let profile = client.get_current_profile().await.unwrap();
        assert_eq!(profile.details.extra.get("misc"), Some(&Value::from("likes hiking")));
        assert!(!profile.details.extra.contains_key("friends"));
        assert!(profile.friends.is_empty());

        let mut update = ProfileDetails::default();
        update.extra.insert("pronouns".into(), Value::from("they/them"));
        let updated = client.update_profile(update).await.unwrap();
        assert_eq!(updated.details.extra.get("pronouns"), Some(&Value::from("they/them")));
        assert!(!updated.details.extra.contains_key("misc"));
        assert_eq!(updated.details.full_name, None);
    }

    #[test]
    fn test_create_input_collects_unknown_attributes() {
        let input: CreateProfileInput = serde_json::from_value(serde_json::json!({
            "username": "alice",
            "fullName": "Alice A",
            "misc": {"color": "green"}
        }))
        .unwrap();
        assert_eq!(input.details.full_name.as_deref(), Some("Alice A"));
        assert_eq!(input.details.extra.get("misc"), Some(&serde_json::json!({"color": "green"})));
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let client = alice();
        assert!(matches!(client.get_profile("nobody").await, Err(ApiError::NotFound(_))));
        assert!(matches!(
            client.update_profile(ProfileDetails::default()).await,
            Err(ApiError::NotFound(_))
        ));
    }
}

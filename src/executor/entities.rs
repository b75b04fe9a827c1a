//! Standard synthetic entities.
//!
//! Names are `prefix + index`. Everything else is derived from the name or the index,
//! so re-running a campaign over the same range produces identical entities. Event
//! timestamps are the one exception.

use super::types::Entity;
use crate::campaign::types::CampaignDescriptor;
use crate::storage::types::now_ms;

use anyhow::Result;
use serde_json::json;

pub const REALM_ROLES_PER_REALM: u32 = 25;
pub const REALM_ROLES_PER_USER: u32 = 4;
pub const GROUPS_PER_REALM: u32 = 20;
pub const GROUPS_PER_USER: u32 = 4;

pub fn realm(descriptor: &CampaignDescriptor, index: u32) -> Result<Entity> {
    let name = descriptor.entity_name(index);
    Ok(Entity::new(
        name.clone(),
        json!({
            "enabled": true,
            "displayName": name,
            "realmRoles": (0..REALM_ROLES_PER_REALM).map(|i| format!("role-{}", i)).collect::<Vec<_>>(),
            "groups": (0..GROUPS_PER_REALM).map(|i| format!("group-{}", i)).collect::<Vec<_>>(),
        }),
    ))
}

pub fn client(descriptor: &CampaignDescriptor, index: u32) -> Result<Entity> {
    let name = descriptor.entity_name(index);
    Ok(Entity::new(
        name.clone(),
        json!({
            "clientId": name,
            "secret": format!("{}-secret", name),
            "redirectUris": ["*"],
            "publicClient": false,
            "serviceAccountsEnabled": true,
        }),
    ))
}

pub fn user(descriptor: &CampaignDescriptor, index: u32) -> Result<Entity> {
    let realm = descriptor
        .realm_name()
        .ok_or_else(|| anyhow::anyhow!("Users can only be created inside a realm"))?;
    let username = descriptor.entity_name(index);

    Ok(Entity::new(
        username.clone(),
        json!({
            "enabled": true,
            "firstName": format!("{}-first", username),
            "lastName": format!("{}-last", username),
            "email": format!("{}@{}.com", username, realm),
            "password": format!("{}-password", username),
            "realmRoles": assign(index, REALM_ROLES_PER_USER, REALM_ROLES_PER_REALM, "role-"),
            "groups": assign(index, GROUPS_PER_USER, GROUPS_PER_REALM, "group-"),
        }),
    ))
}

pub fn session(descriptor: &CampaignDescriptor, index: u32) -> Result<Entity> {
    let realm = descriptor
        .realm_name()
        .ok_or_else(|| anyhow::anyhow!("Sessions can only be created inside a realm"))?;
    let name = descriptor.entity_name(index);

    Ok(Entity::new(
        name,
        json!({
            "user": format!("user-{}", index),
            "client": format!("client-{}", index % 30),
            "realm": realm,
            "offline": true,
        }),
    ))
}

/// Login error event, attributed round-robin to the realms of the campaign's span.
pub fn event(descriptor: &CampaignDescriptor, index: u32) -> Result<Entity> {
    let span = descriptor
        .event_realms
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Events need the realm span they are spread over"))?;

    Ok(Entity::new(
        descriptor.entity_name(index),
        json!({
            "type": "LOGIN",
            "realmId": span.realm_for(index),
            "clientId": "account",
            "userId": "123",
            "ipAddress": "127.0.0.1",
            "error": "error",
            "details": {},
            "time": now_ms(),
        }),
    ))
}

/// Round-robin assignment: entity `index` gets `per_entity` consecutive slots starting
/// at `index * per_entity`, wrapped over `total`.
pub fn assign(index: u32, per_entity: u32, total: u32, prefix: &str) -> Vec<String> {
    if total == 0 {
        return Vec::new();
    }
    let first = index as u64 * per_entity as u64;
    (first..first + per_entity as u64)
        .map(|slot| format!("{}{}", prefix, slot % total as u64))
        .collect()
}

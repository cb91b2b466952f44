//! Best-effort household data fetches
//!
//! Each fetch logs its failure and yields `None`. Authentication recovery
//! happens underneath in the client.

use auth_client::AuthClient;
use serde_json::Value;
use tracing::error;

pub const USER_PATH: &str = "users/me/";
pub const GROUP_PATH: &str = "grupos/meu/";
pub const MEMBERS_PATH: &str = "moradores/";

pub struct Household {
    client: AuthClient,
}

impl Household {
    pub fn new(client: AuthClient) -> Self {
        Self { client }
    }

    pub async fn fetch_user(&self) -> Option<Value> {
        self.client
            .get_json::<Value>(USER_PATH)
            .await
            .map_err(|e| error!(error = %e, "failed to fetch current user"))
            .ok()
    }

    pub async fn fetch_group(&self) -> Option<Value> {
        self.client
            .get_json::<Value>(GROUP_PATH)
            .await
            .map_err(|e| error!(error = %e, "failed to fetch current group"))
            .ok()
    }

    pub async fn fetch_members(&self) -> Option<Vec<Value>> {
        self.client
            .get_json::<Vec<Value>>(MEMBERS_PATH)
            .await
            .map_err(|e| error!(error = %e, "failed to fetch members"))
            .ok()
    }
}

/// Members embedded in a group payload; empty when the group lists none.
pub fn group_members(group: &Value) -> Vec<Value> {
    group
        .get("membros")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

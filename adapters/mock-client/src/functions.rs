//! Edge-function stubs. Each known function name gets a canned behavior;
//! anything else answers with a generic message.

use domain::{Record, RecordStore, Table};
use mock_auth::pause;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{ClientError, MockClient};

/// Security code accepted by `elevate-to-super-admin`.
pub const ELEVATION_SECRET: &str = "DEMO_SECRET";
/// Base32 secret returned by `generate-totp-secret`.
pub const TOTP_SECRET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
/// Tokens `verify-totp` accepts.
pub const ACCEPTED_TOTP_TOKENS: [&str; 2] = ["123456", "000000"];

const RECOVERY_KEY_COUNT: usize = 10;
const RECOVERY_KEY_LEN: usize = 12;

pub struct Functions {
    client: MockClient,
}

impl Functions {
    pub(crate) fn new(client: MockClient) -> Self {
        Self { client }
    }

    pub async fn invoke(&self, name: &str, body: Value) -> Result<Value, ClientError> {
        pause(self.client.config().function_latency).await;
        debug!(function = name, "invoke");
        match name {
            "elevate-to-super-admin" => self.elevate(&body),
            "generate-totp-secret" => Ok(json!({
                "secret": TOTP_SECRET,
                "keyUri": format!("otpauth://totp/KonBase:Demo?secret={}&issuer=KonBase", TOTP_SECRET),
            })),
            "verify-totp" => Ok(verify_totp(&body)),
            "generate-recovery-keys" => Ok(json!({ "keys": recovery_keys() })),
            "complete-2fa-setup" => self.complete_2fa_setup(&body),
            "disable-2fa" => self.disable_2fa(),
            other => Ok(json!({ "message": format!("Mock response from {}", other) })),
        }
    }

    fn session_user(&self) -> Result<String, ClientError> {
        self.client
            .auth()
            .current_user_id()
            .ok_or_else(|| ClientError::new("Not authenticated", 401))
    }

    fn elevate(&self, body: &Value) -> Result<Value, ClientError> {
        let store = self.client.store();
        let profile = match self.client.auth().current_user_id() {
            Some(id) => store.get(Table::Profiles, &id)?,
            None => None,
        };
        let Some(profile) = profile else {
            return Err(ClientError::new("Not authenticated", 401));
        };
        if profile.str("role") != Some("system_admin") {
            return Err(ClientError::new("Only system administrators can be elevated", 403));
        }
        let code = body.get("securityCode").and_then(Value::as_str);
        if code != Some(ELEVATION_SECRET) {
            warn!("elevation rejected: bad security code");
            return Err(ClientError::new("Invalid security code", 403));
        }

        let user_id = profile.id().unwrap_or_default().to_string();
        store.update(Table::Profiles, &user_id, Record::new().with("role", "super_admin"))?;
        self.audit(
            "elevate_to_super_admin",
            "profiles",
            &user_id,
            Some(json!({ "new_role": "super_admin" })),
        );
        info!(user = %user_id, "elevated to super admin");
        Ok(json!({ "success": true, "message": "Successfully elevated to super admin" }))
    }

    fn complete_2fa_setup(&self, body: &Value) -> Result<Value, ClientError> {
        let user_id = self.session_user()?;
        let store = self.client.store();
        store.update(
            Table::Profiles,
            &user_id,
            Record::new().with("two_factor_enabled", true),
        )?;

        let mut row = Record::new().with("user_id", user_id.as_str());
        if let Some(secret) = body.get("secret").filter(|v| v.is_string()) {
            row.set("secret", secret.clone());
        }
        let keys = body
            .get("recoveryKeys")
            .or_else(|| body.get("recovery_keys"))
            .filter(|v| v.is_array());
        if let Some(keys) = keys {
            row.set("recovery_keys", keys.clone());
        }
        store.insert(Table::User2fa, row)?;

        self.audit("enable_2fa", "profile", &user_id, None);
        info!(user = %user_id, "2fa enabled");
        Ok(json!({ "success": true, "message": "2FA has been successfully enabled" }))
    }

    fn disable_2fa(&self) -> Result<Value, ClientError> {
        let user_id = self.session_user()?;
        let store = self.client.store();
        store.update(
            Table::Profiles,
            &user_id,
            Record::new().with("two_factor_enabled", false),
        )?;
        let removed = store.delete_where(Table::User2fa, "user_id", &json!(user_id))?;
        self.audit("disable_2fa", "profile", &user_id, None);
        info!(user = %user_id, removed, "2fa disabled");
        Ok(json!({ "success": true, "message": "2FA has been successfully disabled" }))
    }

    fn audit(&self, action: &str, entity: &str, user_id: &str, changes: Option<Value>) {
        self.client.store().record_audit(action, entity, user_id, changes);
    }
}

fn verify_totp(body: &Value) -> Value {
    let token: String = body
        .get("token")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if ACCEPTED_TOTP_TOKENS.contains(&token.as_str()) {
        json!({ "verified": true, "delta": 0 })
    } else {
        json!({ "verified": false, "delta": null })
    }
}

fn recovery_keys() -> Vec<String> {
    (0..RECOVERY_KEY_COUNT)
        .map(|_| {
            uuid::Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(RECOVERY_KEY_LEN)
                .collect()
        })
        .collect()
}

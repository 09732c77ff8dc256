use {
    cinegate_access::RequiredChannel,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Configuration for the bot account.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// User id allowed to manage the media catalog. `None` disables the
    /// admin commands entirely.
    pub admin_id: Option<u64>,

    /// Channels a user must join (or request to join) before the gate opens.
    /// An empty list means the gate is trivially satisfied.
    pub channels: Vec<RequiredChannel>,

    /// Bot username (without `@`) shown in delivery captions. Filled from
    /// `get_me` at startup when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"[REDACTED]")
            .field("admin_id", &self.admin_id)
            .field("channels", &self.channels.len())
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            admin_id: None,
            channels: Vec::new(),
            username: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = BotConfig::default();
        assert!(cfg.token.expose_secret().is_empty());
        assert_eq!(cfg.admin_id, None);
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn deserialize_from_json() {
        let json = r#"{
            "token": "123:ABC",
            "admin_id": 42,
            "channels": [
                { "id": -1003566642594, "title": "Main", "join_url": "https://t.me/+o1c3" }
            ]
        }"#;
        let cfg: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.admin_id, Some(42));
        assert_eq!(cfg.channels.len(), 1);
        assert_eq!(cfg.channels[0].id, -1003566642594);
    }

    #[test]
    fn serialize_roundtrip() {
        let cfg = BotConfig {
            token: Secret::new("tok".into()),
            admin_id: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: BotConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.token.expose_secret(), "tok");
        assert_eq!(cfg2.admin_id, Some(7));
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = BotConfig {
            token: Secret::new("verysecret".into()),
            ..Default::default()
        };
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("verysecret"));
        assert!(debug.contains("[REDACTED]"));
    }
}

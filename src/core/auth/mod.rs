use serde::{Deserialize, Serialize};

const OFFLINE_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Opaque credential handed over by the authentication front end.
///
/// The installer never refreshes nor persists it. The access token is only sent
/// to URLs starting with one of `authorized_prefixes`, and is otherwise used for
/// argument placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
    #[serde(default)]
    pub authorized_prefixes: Vec<String>,
}

impl Account {
    pub fn offline(username: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            uuid: OFFLINE_UUID.into(),
            access_token: String::new(),
            user_type: "legacy".into(),
            authorized_prefixes: Vec::new(),
        }
    }

    pub fn with_authorized_prefix(mut self, prefix: &str) -> Self {
        self.authorized_prefixes.push(prefix.to_string());
        self
    }

    /// Whether requests to `url` should carry the access token.
    pub fn authorizes(&self, url: &str) -> bool {
        !self.access_token.is_empty()
            && self
                .authorized_prefixes
                .iter()
                .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

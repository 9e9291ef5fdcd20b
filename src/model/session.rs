use serde::Serialize;

/// A freshly issued session: the token handed to the user and the hash that goes in the config
#[derive(Debug, Serialize)]
pub struct IssuedSession {
    pub session_token: String,
    pub token_hash: String,
}

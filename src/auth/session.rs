use secrecy::SecretString;

use crate::config::Config;

/// Opaque authentication session. The exam core only needs a token to attach
/// to outgoing requests, if there is one.
pub trait SessionProvider: Send + Sync {
    fn access_token(&self) -> Option<SecretString>;
}

#[derive(Clone, Default)]
pub struct StaticSessionProvider {
    token: Option<SecretString>,
}

impl StaticSessionProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token: Some(token) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            token: config.api_token.clone(),
        }
    }
}

impl SessionProvider for StaticSessionProvider {
    fn access_token(&self) -> Option<SecretString> {
        self.token.clone()
    }
}

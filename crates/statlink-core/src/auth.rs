//! Credentials lookup for protected sources.

use std::env;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::Source;

/// User name and password for one source.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Applies HTTP basic authentication to a blocking request.
    pub fn apply(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        request.basic_auth(&self.user, Some(&self.password))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of credentials, e.g. environment, keyring or prompt.
pub trait Authenticator: Send + Sync {
    fn credentials(&self, source: &Source) -> Option<Credentials>;

    /// Forgets any cached credentials for the source, typically after a 401.
    fn invalidate(&self, source: &Source);
}

/// Authenticators queried in registration order.
#[derive(Clone, Default)]
pub struct Authenticators {
    chain: Vec<Arc<dyn Authenticator>>,
}

impl Authenticators {
    pub fn new(chain: Vec<Arc<dyn Authenticator>>) -> Self {
        Self { chain }
    }

    pub fn push(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.chain.push(authenticator);
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// First credentials found wins.
    pub fn credentials(&self, source: &Source) -> Option<Credentials> {
        self.chain
            .iter()
            .find_map(|authenticator| authenticator.credentials(source))
    }

    pub fn invalidate(&self, source: &Source) {
        for authenticator in &self.chain {
            authenticator.invalidate(source);
        }
    }
}

impl Debug for Authenticators {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticators")
            .field("len", &self.chain.len())
            .finish()
    }
}

/// Reads `STATLINK_<SOURCE>_USER` and `STATLINK_<SOURCE>_PASSWORD`.
///
/// The source id is upper-cased and every non-alphanumeric character becomes `_`.
#[derive(Debug, Clone)]
pub struct EnvAuthenticator {
    prefix: String,
}

impl Default for EnvAuthenticator {
    fn default() -> Self {
        Self::with_prefix("STATLINK")
    }
}

impl EnvAuthenticator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn variable(&self, source: &Source, suffix: &str) -> String {
        let id = source
            .id()
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() {
                    ch.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect::<String>();
        format!("{}_{id}_{suffix}", self.prefix)
    }
}

impl Authenticator for EnvAuthenticator {
    fn credentials(&self, source: &Source) -> Option<Credentials> {
        let user = env::var(self.variable(source, "USER")).ok()?;
        let password = env::var(self.variable(source, "PASSWORD")).unwrap_or_default();
        Some(Credentials::new(user, password))
    }

    fn invalidate(&self, _source: &Source) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use url::Url;

    use super::*;

    struct Fixed(Option<Credentials>, AtomicUsize);

    impl Authenticator for Fixed {
        fn credentials(&self, _source: &Source) -> Option<Credentials> {
            self.0.clone()
        }

        fn invalidate(&self, _source: &Source) {
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn source() -> Source {
        Source::new("ISTAT-2", "D", Url::parse("https://istat.test").expect("valid url"))
            .expect("valid source")
    }

    #[test]
    fn first_credentials_win_and_invalidate_fans_out() {
        let none = Arc::new(Fixed(None, AtomicUsize::new(0)));
        let first = Arc::new(Fixed(
            Some(Credentials::new("alice", "secret")),
            AtomicUsize::new(0),
        ));
        let second = Arc::new(Fixed(
            Some(Credentials::new("bob", "hunter2")),
            AtomicUsize::new(0),
        ));
        let chain = Authenticators::new(vec![none.clone(), first.clone(), second.clone()]);

        let found = chain.credentials(&source()).expect("credentials");
        assert_eq!(found.user(), "alice");

        chain.invalidate(&source());
        for authenticator in [&none, &first, &second] {
            assert_eq!(authenticator.1.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("alice", "secret"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn env_variable_names_are_normalized() {
        let authenticator = EnvAuthenticator::default();
        assert_eq!(
            authenticator.variable(&source(), "USER"),
            "STATLINK_ISTAT_2_USER"
        );
    }
}

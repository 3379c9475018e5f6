//! Shared privilege-escalation credential store.
//!
//! The sudo password is asked for at most once per store, no matter how
//! many sessions hit an escalation prompt. Stores are explicit values
//! injected into [`SessionBuilder`](super::SessionBuilder); the process-wide
//! default exists for the common case of many sessions sharing one
//! operator.

use std::io::{self, BufRead, Write};
use std::sync::{Arc, OnceLock};

use secrecy::{ExposeSecret, SecretString};

/// Lazily-initialized, write-once credential shared across sessions.
///
/// Initialization happens at most once per store even when multiple
/// sessions race an escalation prompt; later requests reuse the stored
/// secret without re-prompting.
#[derive(Debug, Default)]
pub struct CredentialStore {
    secret: OnceLock<SecretString>,
}

impl CredentialStore {
    /// Create an empty store; the first escalation prompt fills it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with a known password.
    pub fn preset(password: impl Into<String>) -> Self {
        let store = Self::new();
        let _ = store.secret.set(SecretString::from(password.into()));
        store
    }

    /// The process-wide default store.
    pub fn shared() -> Arc<CredentialStore> {
        static SHARED: OnceLock<Arc<CredentialStore>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(CredentialStore::new())))
    }

    /// Whether the secret has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.secret.get().is_some()
    }

    /// Get the secret, initializing it from `f` exactly once.
    pub fn get_or_init_with(&self, f: impl FnOnce() -> String) -> &SecretString {
        self.secret.get_or_init(|| SecretString::from(f()))
    }

    /// Get the secret, asking the human operator once if the store is empty.
    ///
    /// `prompt` is the matched escalation prompt text, echoed to stderr so
    /// the operator sees what is being asked for.
    pub fn get_or_prompt(&self, prompt: &str) -> &SecretString {
        self.get_or_init_with(|| {
            let mut err = io::stderr();
            let _ = write!(err, "{prompt}");
            let _ = err.flush();

            let mut line = String::new();
            let _ = io::stdin().lock().read_line(&mut line);
            line.trim_end_matches(['\r', '\n']).to_string()
        })
    }

    /// Expose the stored secret, if any.
    pub fn expose(&self) -> Option<&str> {
        self.secret.get().map(|s| s.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initializes_exactly_once() {
        let store = CredentialStore::new();
        let mut calls = 0;

        let first = store
            .get_or_init_with(|| {
                calls += 1;
                "hunter2".to_string()
            })
            .expose_secret()
            .to_string();

        let second = store
            .get_or_init_with(|| {
                calls += 1;
                "other".to_string()
            })
            .expose_secret()
            .to_string();

        assert_eq!(first, "hunter2");
        assert_eq!(second, "hunter2");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_preset_skips_prompting() {
        let store = CredentialStore::preset("lab-password");
        assert!(store.is_initialized());
        assert_eq!(store.expose(), Some("lab-password"));
        // get_or_prompt must not touch stdin once initialized.
        assert_eq!(
            store.get_or_prompt("password: ").expose_secret(),
            "lab-password"
        );
    }

    #[test]
    fn test_shared_store_is_stable() {
        let a = CredentialStore::shared();
        let b = CredentialStore::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

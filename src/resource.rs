//! External-resource lazy loader used by the `DOMAIN-SET` and `RULE-SET`
//! rule kinds. Holds a mutex-guarded, at-most-once-loaded list of
//! child lines so a concurrent reader never observes a half-loaded
//! collection. Loading is bytes-in from the caller, not a network fetch;
//! failures are swallowed and leave the collection empty, per the source
//! behavior this engine mirrors.

use std::sync::Mutex;

/// A lazily-loaded, at-most-once-populated list of child rule/domain lines
/// belonging to a `DOMAIN-SET` or `RULE-SET` rule. Cloning produces an
/// independent, still-unloaded handle — the loaded contents are not shared
/// across clones, matching the value-like semantics the rest of the data
/// model has (entities are immutable post-construction except for the
/// external-resource loaders).
#[derive(Debug)]
pub struct ExternalResource {
    url: String,
    loaded: Mutex<Option<Vec<String>>>,
}

impl ExternalResource {
    pub fn new(url: impl Into<String>) -> Self {
        ExternalResource {
            url: url.into(),
            loaded: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True once a load has been attempted (successfully or not).
    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().expect("resource mutex poisoned").is_some()
    }

    /// Loads child lines from `bytes` the caller has already fetched from
    /// wherever the `DOMAIN-SET`/`RULE-SET` URL points. A no-op if already
    /// loaded (at-most-once). Malformed UTF-8 or an empty result simply
    /// leaves the collection empty; no error escapes, mirroring the silent
    /// degradation the source exhibits.
    pub fn load(&self, bytes: &[u8]) {
        let mut guard = self.loaded.lock().expect("resource mutex poisoned");
        if guard.is_some() {
            return;
        }
        let lines = match std::str::from_utf8(bytes) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with(';'))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "external resource load failed, leaving collection empty");
                Vec::new()
            }
        };
        *guard = Some(lines);
    }

    /// Returns the loaded children, or an empty vec if never loaded /
    /// loading failed.
    pub fn children(&self) -> Vec<String> {
        self.loaded
            .lock()
            .expect("resource mutex poisoned")
            .clone()
            .unwrap_or_default()
    }
}

impl Clone for ExternalResource {
    fn clone(&self) -> Self {
        ExternalResource::new(self.url.clone())
    }
}

impl PartialEq for ExternalResource {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

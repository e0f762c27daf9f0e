use alloc::{format, vec::Vec};
use url::Url;

use crate::HostError;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    url: Url,
    state: serde_json::Value,
}

/// Session history and the current location
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Entry>,
    index: usize,
}

impl History {
    /// A history with a single entry at `location`
    pub fn new(location: Url) -> Self {
        Self { entries: alloc::vec![Entry { url: location, state: serde_json::Value::Null }], index: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn current(&self) -> &Entry {
        &self.entries[self.index]
    }

    /// The current location
    pub fn location(&self) -> &Url {
        &self.current().url
    }

    /// The serialized current location
    pub fn href(&self) -> &str {
        self.location().as_str()
    }

    /// The state attached to the current entry
    pub fn state(&self) -> &serde_json::Value {
        &self.current().state
    }

    /// Add an entry, dropping any forward entries
    ///
    /// `url` is resolved against the current location and must stay on the
    /// same origin.
    pub fn push_state(&mut self, state: serde_json::Value, url: Option<&str>) -> Result<(), HostError> {
        let url = match url {
            Some(url) => self.resolve(url)?,
            None => self.location().clone(),
        };

        self.entries.truncate(self.index + 1);
        self.entries.push(Entry { url, state });
        self.index += 1;
        Ok(())
    }

    /// Replace the current entry
    pub fn replace_state(&mut self, state: serde_json::Value, url: Option<&str>) -> Result<(), HostError> {
        let url = match url {
            Some(url) => self.resolve(url)?,
            None => self.location().clone(),
        };
        self.entries[self.index] = Entry { url, state };
        Ok(())
    }

    /// Move through the history by `delta` entries, ignoring moves past either end
    pub fn go(&mut self, delta: i32) {
        let target = self.index as i64 + delta as i64;
        if (0..self.entries.len() as i64).contains(&target) {
            self.index = target as usize;
        }
    }

    pub fn back(&mut self) {
        self.go(-1);
    }

    fn resolve(&self, url: &str) -> Result<Url, HostError> {
        let resolved = self
            .location()
            .join(url)
            .map_err(|err| HostError::syntax(format!("'{url}' is not a valid url: {err}")))?;

        if resolved.origin() != self.location().origin() {
            return Err(HostError::security(format!(
                "a history entry for '{resolved}' cannot be created in a document with origin '{}'",
                self.location().origin().ascii_serialization()
            )));
        }
        Ok(resolved)
    }
}

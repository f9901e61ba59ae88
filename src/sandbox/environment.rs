//! Container environment composition.

/// Variable carrying the invoking user's uid into the container.
pub const HOST_UID_VAR: &str = "HOST_UID";

/// Variable carrying the invoking user's gid into the container.
pub const HOST_GID_VAR: &str = "HOST_GID";

/// Ordered environment for a sandbox container.
///
/// Setting a key twice replaces the value but keeps the key's original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    /// Creates an environment seeded with the host uid/gid mapping.
    #[must_use]
    pub fn with_host_ids(uid: u32, gid: u32) -> Self {
        let mut env = Self::default();
        env.set(HOST_UID_VAR, uid.to_string());
        env.set(HOST_GID_VAR, gid.to_string());
        env
    }

    /// Sets `key` to `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.vars.push((key, value)),
        }
    }

    /// Applies passthrough entries in order.
    ///
    /// `KEY=value` sets a literal value. A bare `KEY` copies the value from
    /// `lookup` and is skipped when the variable is unset or empty.
    pub fn apply_passthrough<'a, I, F>(&mut self, entries: I, lookup: F)
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> Option<String>,
    {
        for entry in entries {
            match entry.split_once('=') {
                Some((key, value)) => self.set(key, value),
                None => {
                    if let Some(value) = lookup(entry).filter(|v| !v.is_empty()) {
                        self.set(entry, value);
                    }
                }
            }
        }
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Renders the environment as `KEY=value` strings.
    #[must_use]
    pub fn to_key_values(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

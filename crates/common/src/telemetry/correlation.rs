//! Request-scoped log correlation.
//!
//! A [`CorrelationContext`] is an owned per-request map with scope frames:
//! entering a scope installs keys and remembers what they shadowed, exiting
//! restores the prior state exactly. Because every request owns its own
//! context there is no cross-request leakage to defend against; the frames
//! exist for nested scopes within one request.

use std::collections::BTreeMap;
use std::fmt;

/// Request-scoped key/value annotations merged into log emissions.
#[derive(Debug, Default)]
pub struct CorrelationContext {
    entries: BTreeMap<String, String>,
    frames: Vec<Vec<(String, Option<String>)>>,
}

impl CorrelationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install keys for the current scope, remembering shadowed values.
    pub fn enter_scope<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut frame = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            let prior = self.entries.insert(key.clone(), value.into());
            frame.push((key, prior));
        }
        self.frames.push(frame);
    }

    /// Remove exactly the keys the innermost scope installed, restoring
    /// whatever they shadowed. Idempotent: with no open scope this is a
    /// no-op.
    pub fn exit_scope(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        // Reverse order so duplicate keys within one frame unwind correctly.
        for (key, prior) in frame.into_iter().rev() {
            match prior {
                Some(value) => {
                    self.entries.insert(key, value);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Value for `key` in the current scope, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of currently open scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders `key=value` pairs, sorted by key, for merging into log lines:
/// `tracing::info!(context = %ctx, "...")`.
impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.entries {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

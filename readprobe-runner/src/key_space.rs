//! The set of object keys a run samples from.

use std::fmt;

use rand::Rng;
use thiserror::Error;

/// Identifier of a stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Creates a key from its string form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Raised when drawing from a [`KeySpace`] without keys.
#[derive(Debug, Error)]
#[error("cannot draw a key from an empty key space")]
pub struct EmptyKeySpace;

/// A fixed collection of object keys to draw reads from.
///
/// Keys are drawn uniformly with replacement, so the same key may be read many times within a
/// run. The key space is loaded once before measuring and never changes afterwards.
#[derive(Clone, Debug, Default)]
pub struct KeySpace {
    keys: Vec<ObjectKey>,
}

impl KeySpace {
    /// Creates a key space from the given keys.
    pub fn new(keys: Vec<ObjectKey>) -> Self {
        Self { keys }
    }

    /// The number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if there are no keys to draw from.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys in load order.
    pub fn keys(&self) -> &[ObjectKey] {
        &self.keys
    }

    /// Draws a key uniformly at random.
    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&ObjectKey, EmptyKeySpace> {
        if self.keys.is_empty() {
            return Err(EmptyKeySpace);
        }

        let index = rng.random_range(0..self.keys.len());
        Ok(&self.keys[index])
    }
}

impl FromIterator<ObjectKey> for KeySpace {
    fn from_iter<T: IntoIterator<Item = ObjectKey>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

pub(crate) mod id_factory;

/// The data of a session with a client.
///
/// A session is a bag of JSON values keyed by strings.
/// Changes are tracked automatically: every mutation marks the session as changed, and only
/// changed, non-empty sessions are written back by
/// [`SessionManager::save`](crate::SessionManager::save).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    data: BTreeMap<String, Value>,
    changed: bool,
}

impl Session {
    /// Create a new, empty and unchanged session.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::Session;
    /// let session = Session::new();
    /// assert!(session.is_empty());
    /// assert!(!session.has_changed());
    /// ```
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of entries in this session.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if this session holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if this session was changed since it was created or loaded.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::Session;
    /// # fn main() -> inproc_session::Result {
    /// let mut session = Session::new();
    /// assert!(!session.has_changed());
    /// session.insert("user", "alice")?;
    /// assert!(session.has_changed());
    /// # Ok(()) }
    /// ```
    pub fn has_changed(&self) -> bool {
        self.changed
    }

    /// Returns the raw value stored under `key`.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the value stored under `key`, converted into `T`.
    ///
    /// Returns `Ok(None)` if there is no such entry, and an error if the entry exists
    /// but cannot be converted into `T`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::Session;
    /// # fn main() -> inproc_session::Result {
    /// let mut session = Session::new();
    /// session.insert("visits", 3)?;
    /// assert_eq!(session.get::<u32>("visits")?, Some(3));
    /// assert_eq!(session.get::<u32>("missing")?, None);
    /// # Ok(()) }
    /// ```
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|value| T::deserialize(value).map_err(crate::Error::from))
            .transpose()
    }

    /// Store `value` under `key`, returning the previous value if there was one.
    /// Marks the session as changed.
    pub fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<Option<Value>> {
        let value = serde_json::to_value(value)?;
        self.changed = true;
        Ok(self.data.insert(key.into(), value))
    }

    /// Remove the entry under `key`, returning its value.
    /// Marks the session as changed if an entry was removed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.changed = true;
        }
        removed
    }

    /// Remove all entries.
    /// Marks the session as changed if it was not empty.
    pub fn delete_all(&mut self) {
        if !self.data.is_empty() {
            self.changed = true;
        }
        self.data.clear();
    }

    /// Iterate over all entries, ordered by key.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.data.iter()
    }

    /// Returns a copy of this session with the change marker cleared.
    pub(crate) fn to_unchanged(&self) -> Self {
        Self {
            data: self.data.clone(),
            changed: false,
        }
    }
}

impl<'a> IntoIterator for &'a Session {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The identifier of a session.
///
/// A session id is a random 128-bit value. It additionally remembers whether it was minted during
/// the current request and was therefore never communicated to the client.
/// That flag is metadata: equality and hashing only consider the value.
#[derive(Clone, Copy)]
pub struct SessionId {
    value: Uuid,
    is_new: bool,
}

impl SessionId {
    /// Create a session id from its parts.
    ///
    /// Session ids are normally created through a
    /// [`SessionIdFactory`](crate::SessionIdFactory).
    pub fn new(value: Uuid, is_new: bool) -> Self {
        Self { value, is_new }
    }

    /// The empty session id, whose value is all zeroes.
    pub fn empty() -> Self {
        Self::new(Uuid::nil(), false)
    }

    /// The 128-bit value of this id.
    pub fn value(&self) -> Uuid {
        self.value
    }

    /// Returns true if this id was minted for the current request and the client does not know it yet.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns true if the value of this id is all zeroes.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use inproc_session::SessionId;
    /// assert!(SessionId::empty().is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.value.is_nil()
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SessionId {}

impl Hash for SessionId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_new {
            write!(f, "{} (new)", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

impl Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({self})")
    }
}

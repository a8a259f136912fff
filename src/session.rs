//! In-memory representation of one user's session.

use std::collections::HashMap;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A single user's session: an opaque identifier, a key/value payload and a
/// dirty flag tracking whether the payload changed since it was loaded.
///
/// A `Session` is not internally synchronized. It belongs to exactly one
/// in-flight request: the middleware resolves (or creates) it, hands it to the
/// handler through the [`Depot`](salvo_core::Depot), and persists it after the
/// handler returns. It must never be shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    values: HashMap<String, Value>,
    dirty: bool,
}

impl Session {
    /// Create a session with a freshly generated id, empty payload and
    /// `dirty = true`, so it is written to the backing store on response.
    pub fn create() -> Self {
        Self {
            id: generate_session_id(),
            values: HashMap::new(),
            dirty: true,
        }
    }

    /// Rebuild a session from payload loaded out of a backing store.
    pub(crate) fn from_parts(id: String, values: HashMap<String, Value>) -> Self {
        Self {
            id,
            values,
            dirty: false,
        }
    }

    /// The session identifier, as carried by the session cookie.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the session identifier. Normally done by
    /// [`SessionStore::regenerate_id`](crate::store::SessionStore::regenerate_id),
    /// not by application code.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Has anything been set or removed since this session was loaded?
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set the dirty flag. Normally managed automatically by [`Session::set`]
    /// and [`Session::remove`].
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Retrieve a value, deserialized into `T`. Returns `None` when the key is
    /// unset or the stored value does not deserialize as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Retrieve the raw stored value for a key.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store a value under `key` and mark the session dirty.
    ///
    /// A value that fails to serialize is dropped with a warning and the key
    /// is left untouched; the session is still marked dirty.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        self.dirty = true;
        match serde_json::to_value(value) {
            Ok(v) => {
                self.values.insert(key.to_string(), v);
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "dropping unserializable session value");
            }
        }
    }

    /// Remove a value and mark the session dirty.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.dirty = true;
        self.values.remove(key)
    }

    /// Check whether a key is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of keys in the payload.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the payload holds no keys.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the full payload, for stores serializing the session.
    pub(crate) fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

/// Generate a session identifier: 128 bits from a cryptographically seeded
/// generator, encoded as two base-36 numbers.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let a: u64 = rng.gen();
    let b: u64 = rng.gen();
    format!("{}{}", to_base36(a), to_base36(b))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    // u64::MAX is 13 base-36 digits
    let mut buf = [0u8; 13];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = DIGITS[(n % 36) as usize];
        n /= 36;
    }
    String::from_utf8_lossy(&buf[i..]).into_owned()
}

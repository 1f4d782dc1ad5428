//! Strict JSON objects for records and stores.
//!
//! `serde_json::Map` keeps the last value of a repeated key. Documents in
//! this crate treat a repeated key as malformed instead, so objects are read
//! entry by entry.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use keevault_common::Error;

/// A JSON object whose keys are known to be unique.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UniqueObject(pub(crate) Map<String, Value>);

impl<'de> Deserialize<'de> for UniqueObject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(UniqueObjectVisitor)
    }
}

pub(crate) struct UniqueObjectVisitor;

impl<'de> Visitor<'de> for UniqueObjectVisitor {
    type Value = UniqueObject;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object with unique keys")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<UniqueObject, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let value: Value = access.next_value()?;
            insert_unique::<A::Error>(&mut map, key, value)?;
        }
        Ok(UniqueObject(map))
    }
}

/// Insert `key`, failing if it is already present.
pub(crate) fn insert_unique<E: de::Error>(
    map: &mut Map<String, Value>,
    key: String,
    value: Value,
) -> std::result::Result<(), E> {
    if map.contains_key(&key) {
        return Err(E::custom(format!("Duplicate key: {}", key)));
    }
    map.insert(key, value);
    Ok(())
}

/// Map a parse failure: well-formed JSON with the wrong shape is a
/// validation error, anything else a serialization error.
pub(crate) fn json_error(e: serde_json::Error) -> Error {
    if e.is_data() {
        Error::Validation(e.to_string())
    } else {
        Error::Serialization(e.to_string())
    }
}

//! Records: the key-value secret groups stored in a vault.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::json::{json_error, UniqueObject};
use keevault_common::{Error, Result};

/// Reserved key holding the record identifier.
pub const ITEM_ID_KEY: &str = "itemId";
/// Reserved key holding the record name.
pub const ITEM_NAME_KEY: &str = "itemName";

/// A named group of string key-value pairs with a stable identifier.
///
/// The id is assigned at creation and can only change by rebuilding the
/// record from a map. Both reserved keys live in the same map as the user
/// entries, so [`Record::to_map`] is the complete serialized form.
///
/// Deserializing rejects repeated keys, so a document can't carry two ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UniqueObject", into = "BTreeMap<String, String>")]
pub struct Record {
    entries: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with a fresh random id.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `name` is empty
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation(
                "Item name must be non-empty".to_string(),
            ));
        }

        let mut entries = BTreeMap::new();
        entries.insert(ITEM_ID_KEY.to_string(), Uuid::new_v4().to_string());
        entries.insert(ITEM_NAME_KEY.to_string(), name);
        Ok(Self { entries })
    }

    /// Rebuild a record from its serialized map.
    ///
    /// The map is deep-copied; later changes to either side are independent.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if a value is not a string
    /// - Returns `Error::Validation` if `itemId` or `itemName` is missing
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    entries.insert(key.clone(), s.clone());
                }
                other => {
                    return Err(Error::Validation(format!(
                        "Value for key '{}' must be a string, got {}",
                        key, other
                    )));
                }
            }
        }
        Self::from_entries(entries)
    }

    /// Rebuild a record from string entries.
    ///
    /// The name follows the same rule as [`Record::new`]. An empty id is
    /// accepted here; [`crate::Store::add_item`] is where ids are required
    /// to be non-empty.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `itemId` or `itemName` is missing
    /// - Returns `Error::Validation` if `itemName` is empty
    pub fn from_entries(entries: BTreeMap<String, String>) -> Result<Self> {
        if !entries.contains_key(ITEM_ID_KEY) {
            return Err(Error::Validation(format!(
                "Item missing required field: {}",
                ITEM_ID_KEY
            )));
        }
        match entries.get(ITEM_NAME_KEY) {
            None => Err(Error::Validation(format!(
                "Item missing required field: {}",
                ITEM_NAME_KEY
            ))),
            Some(name) if name.is_empty() => Err(Error::Validation(
                "Item name must be non-empty".to_string(),
            )),
            Some(_) => Ok(Self { entries }),
        }
    }

    /// Parse a record from a JSON object.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if the JSON is not an object, repeats a
    ///   key, or fails [`Record::from_map`]
    pub fn from_json(json: &str) -> Result<Self> {
        let object: UniqueObject = serde_json::from_str(json).map_err(json_error)?;
        Self::from_map(&object.0)
    }

    /// Serialize as a flat JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    /// Copy of the complete entry map, reserved keys included.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }

    pub fn id(&self) -> &str {
        self.entries
            .get(ITEM_ID_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.entries
            .get(ITEM_NAME_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Rename the record.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `name` is empty
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation(
                "Item name must be non-empty".to_string(),
            ));
        }
        self.entries.insert(ITEM_NAME_KEY.to_string(), name);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Set `key` to `value`, returning the previous value.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `key` is the reserved id key
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Option<String>> {
        let key = key.into();
        if key == ITEM_ID_KEY {
            return Err(Error::Validation(format!(
                "Cannot overwrite reserved key: {}",
                ITEM_ID_KEY
            )));
        }
        Ok(self.entries.insert(key, value.into()))
    }

    /// Remove `key`, returning its value.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `key` is the reserved id key
    pub fn remove(&mut self, key: &str) -> Result<Option<String>> {
        if key == ITEM_ID_KEY {
            return Err(Error::Validation(format!(
                "Cannot remove reserved key: {}",
                ITEM_ID_KEY
            )));
        }
        Ok(self.entries.remove(key))
    }

    /// Remove every entry except the id.
    pub fn clear(&mut self) {
        self.entries.retain(|key, _| key == ITEM_ID_KEY);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    /// Entries other than the reserved id and name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(key, _)| key.as_str() != ITEM_ID_KEY && key.as_str() != ITEM_NAME_KEY)
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of entries, reserved keys included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<UniqueObject> for Record {
    type Error = Error;

    fn try_from(object: UniqueObject) -> Result<Self> {
        Self::from_map(&object.0)
    }
}

impl From<Record> for BTreeMap<String, String> {
    fn from(record: Record) -> Self {
        record.entries
    }
}

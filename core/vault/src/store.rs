//! Stores: named collections of serialized records.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::json::{insert_unique, json_error, UniqueObjectVisitor};
use crate::record::Record;
use keevault_common::{Error, Result};

/// Reserved key holding the store identifier.
pub const STORE_ID_KEY: &str = "storeId";
/// Reserved key holding the store name.
pub const STORE_NAME_KEY: &str = "storeName";

/// A named store of records keyed by record id.
///
/// Records are kept in serialized form, so [`Store::get_item`] always hands
/// out a copy and a changed record must be re-added to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    attributes: BTreeMap<String, String>,
    items: BTreeMap<String, BTreeMap<String, String>>,
}

impl Store {
    /// Create an empty store with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(STORE_ID_KEY.to_string(), Uuid::new_v4().to_string());
        attributes.insert(STORE_NAME_KEY.to_string(), name.into());
        Self {
            attributes,
            items: BTreeMap::new(),
        }
    }

    /// Rebuild a store from its serialized map.
    ///
    /// String values are store attributes; object values are records, parsed
    /// through [`Record::from_map`].
    ///
    /// # Errors
    /// - Returns `Error::Validation` if `storeId` or `storeName` is missing or
    ///   not a string
    /// - Returns `Error::Validation` if any other value is neither a string
    ///   nor a valid record object
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        for required in [STORE_ID_KEY, STORE_NAME_KEY] {
            match map.get(required) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(Error::Validation(format!(
                        "Expecting string value for key: {}",
                        required
                    )));
                }
                None => {
                    return Err(Error::Validation(format!(
                        "Store missing required field: {}",
                        required
                    )));
                }
            }
        }

        let mut store = Self {
            attributes: BTreeMap::new(),
            items: BTreeMap::new(),
        };
        for (key, value) in map {
            match value {
                Value::String(s) => {
                    store.attributes.insert(key.clone(), s.clone());
                }
                Value::Object(item) => {
                    store.add_item(&Record::from_map(item)?)?;
                }
                other => {
                    return Err(Error::Validation(format!(
                        "Value for key '{}' must be a string or an item, got {}",
                        key, other
                    )));
                }
            }
        }
        Ok(store)
    }

    /// Parse a store from a JSON object.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if a key is repeated, at the store level
    ///   or inside a record, or if [`Store::from_map`] rejects the object
    pub fn from_json(json: &str) -> Result<Self> {
        let object: StoreObject = serde_json::from_str(json).map_err(json_error)?;
        Self::from_map(&object.0)
    }

    /// Copy of the serialized store: attributes plus one object per record.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in &self.attributes {
            map.insert(key.clone(), Value::String(value.clone()));
        }
        for (id, item) in &self.items {
            let object = item
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            map.insert(id.clone(), Value::Object(object));
        }
        map
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    pub fn id(&self) -> &str {
        self.attributes
            .get(STORE_ID_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.attributes
            .get(STORE_NAME_KEY)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.attributes.insert(STORE_NAME_KEY.to_string(), name.into());
    }

    /// Add or replace a record, keyed by its id.
    ///
    /// # Returns
    /// - The previously stored serialized record with the same id, if any
    ///
    /// # Errors
    /// - Returns `Error::Validation` if the record id is empty or is one of
    ///   the reserved store keys
    pub fn add_item(&mut self, record: &Record) -> Result<Option<BTreeMap<String, String>>> {
        if record.id().is_empty() {
            return Err(Error::Validation("Item id must be non-empty".to_string()));
        }
        if record.id() == STORE_ID_KEY || record.id() == STORE_NAME_KEY {
            return Err(Error::Validation(format!(
                "Item id collides with reserved store key: {}",
                record.id()
            )));
        }
        Ok(self.items.insert(record.id().to_string(), record.to_map()))
    }

    /// A copy of the record with `id`.
    pub fn get_item(&self, id: &str) -> Option<Record> {
        self.items
            .get(id)
            .and_then(|entries| Record::from_entries(entries.clone()).ok())
    }

    /// Remove the record with `id`, returning its serialized form.
    pub fn remove_item(&mut self, id: &str) -> Option<BTreeMap<String, String>> {
        self.items.remove(id)
    }

    /// All records, in id order.
    pub fn items(&self) -> Vec<Record> {
        self.items
            .values()
            .filter_map(|entries| Record::from_entries(entries.clone()).ok())
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Top-level store object: string attributes and record objects, each key
/// appearing once.
struct StoreObject(Map<String, Value>);

impl<'de> Deserialize<'de> for StoreObject {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StoreObjectVisitor;

        impl<'de> Visitor<'de> for StoreObjectVisitor {
            type Value = StoreObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a store object with unique keys")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<StoreObject, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = Map::new();
                while let Some(key) = access.next_key::<String>()? {
                    let value = match access.next_value::<StoreValue>()? {
                        StoreValue::Attribute(s) => Value::String(s),
                        StoreValue::Item(item) => Value::Object(item),
                    };
                    insert_unique::<A::Error>(&mut map, key, value)?;
                }
                Ok(StoreObject(map))
            }
        }

        deserializer.deserialize_map(StoreObjectVisitor)
    }
}

/// One value of a store object.
enum StoreValue {
    Attribute(String),
    Item(Map<String, Value>),
}

impl<'de> Deserialize<'de> for StoreValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StoreValueVisitor;

        impl<'de> Visitor<'de> for StoreValueVisitor {
            type Value = StoreValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or an item object")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<StoreValue, E> {
                Ok(StoreValue::Attribute(v.to_string()))
            }

            fn visit_map<A>(self, access: A) -> std::result::Result<StoreValue, A::Error>
            where
                A: MapAccess<'de>,
            {
                UniqueObjectVisitor
                    .visit_map(access)
                    .map(|object| StoreValue::Item(object.0))
            }
        }

        deserializer.deserialize_any(StoreValueVisitor)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keevault_common::ErrorKind;
    use serde_json::json;

    fn record(name: &str, last: &str) -> Record {
        let mut record = Record::new(name).unwrap();
        record.put("lastName", last).unwrap();
        record
    }

    #[test]
    fn test_new_store() {
        let store = Store::default();
        assert!(!store.id().is_empty());
        assert_eq!(store.name(), "");
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_item_upserts() {
        let mut store = Store::new("heroes");
        let mut spiderman = record("spiderman", "Parker");

        assert!(store.add_item(&spiderman).unwrap().is_none());
        let original = spiderman.to_map();

        spiderman.put("lastName", "Brock").unwrap();
        let previous = store.add_item(&spiderman).unwrap();
        assert_eq!(previous, Some(original));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_item(spiderman.id()).unwrap().get("lastName"), Some("Brock"));
    }

    #[test]
    fn test_add_item_rejects_empty_id() {
        let mut store = Store::new("s");
        let map = json!({ "itemId": "", "itemName": "n" });
        let record = Record::from_map(map.as_object().unwrap()).unwrap();
        let err = store.add_item(&record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_get_item_returns_copy() {
        let mut store = Store::new("s");
        let mut superman = record("superman", "Kent");
        store.add_item(&superman).unwrap();

        superman.put("lastName", "updated").unwrap();
        let stored = store.get_item(superman.id()).unwrap();
        assert_eq!(stored.get("lastName"), Some("Kent"));

        let mut copy = stored.clone();
        copy.put("lastName", "again").unwrap();
        assert_eq!(store.get_item(superman.id()).unwrap().get("lastName"), Some("Kent"));
    }

    #[test]
    fn test_remove_item() {
        let mut store = Store::new("s");
        let item = record("a", "b");
        store.add_item(&item).unwrap();
        assert!(store.remove_item(item.id()).is_some());
        assert!(store.remove_item(item.id()).is_none());
        assert!(store.get_item(item.id()).is_none());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut store = Store::new("heroes");
        store.add_item(&record("superman", "Kent")).unwrap();
        store.add_item(&record("spiderman", "Parker")).unwrap();

        let restored = Store::from_json(&store.to_json()).unwrap();
        assert_eq!(restored, store);
        assert_eq!(restored.to_map(), store.to_map());
        assert_eq!(restored.items().len(), 2);
    }

    #[test]
    fn test_add_item_rejects_store_keys_as_ids() {
        let mut store = Store::new("s");
        for id in [STORE_ID_KEY, STORE_NAME_KEY] {
            let map = json!({ "itemId": id, "itemName": "n" });
            let record = Record::from_map(map.as_object().unwrap()).unwrap();
            let err = store.add_item(&record).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ValidationError);
        }
        assert!(store.is_empty());
        assert!(Store::from_json(&store.to_json()).is_ok());
    }

    #[test]
    fn test_repeated_keys_rejected() {
        let repeated_store_id = r#"{"storeId":"a","storeId":"b","storeName":"s"}"#;
        let err = Store::from_json(repeated_store_id).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let repeated_store_name = r#"{"storeId":"a","storeName":"s","storeName":"t"}"#;
        assert!(Store::from_json(repeated_store_name).is_err());

        let repeated_item_id = r#"{"storeId":"a","storeName":"s",
            "x":{"itemId":"x","itemId":"y","itemName":"n"}}"#;
        let err = Store::from_json(repeated_item_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let numeric_value = r#"{"storeId":"a","storeName":"s","hello":1}"#;
        assert!(matches!(Store::from_json(numeric_value).unwrap_err(), Error::Validation(_)));
    }

    #[test]
    fn test_from_map_validation() {
        let store = Store::new("s");

        let mut map = store.to_map();
        map.remove(STORE_ID_KEY);
        assert!(Store::from_map(&map).is_err());

        let mut map = store.to_map();
        map.remove(STORE_NAME_KEY);
        assert!(Store::from_map(&map).is_err());

        let mut map = store.to_map();
        map.insert(STORE_NAME_KEY.to_string(), json!(7));
        assert!(Store::from_map(&map).is_err());

        let mut map = store.to_map();
        map.insert("hello".to_string(), json!(1));
        let err = Store::from_map(&map).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        assert!(Store::from_json("{}").is_err());
    }
}

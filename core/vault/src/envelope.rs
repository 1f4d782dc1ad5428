//! On-disk vault envelope.

use serde::{Deserialize, Serialize};

use keevault_common::Result;

/// The persisted vault document.
///
/// - `payload`: base64 of `IV || ciphertext` of the JSON record array
/// - `signature`: base64 signature over the plaintext JSON
/// - `secret_key`: base64 of the wrapped symmetric key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEnvelope {
    pub signature: String,
    pub payload: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
}

impl VaultEnvelope {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let envelope = VaultEnvelope {
            signature: "sig".to_string(),
            payload: "data".to_string(),
            secret_key: "key".to_string(),
        };
        let json = envelope.to_json().unwrap();
        assert_eq!(json, r#"{"signature":"sig","payload":"data","secretKey":"key"}"#);
        assert_eq!(VaultEnvelope::from_json(&json).unwrap(), envelope);
    }

    #[test]
    fn test_missing_field_rejected() {
        assert!(VaultEnvelope::from_json(r#"{"signature":"s","payload":"p"}"#).is_err());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"signature":"s","payload":"p","secretKey":"k","extra":1}"#;
        assert_eq!(VaultEnvelope::from_json(json).unwrap().secret_key, "k");
    }
}

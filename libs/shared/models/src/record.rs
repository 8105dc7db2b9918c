use serde::{de::DeserializeOwned, ser::SerializeMap, Serialize, Serializer};
use serde_json::Value;

/// A persisted entity that lives in a named collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection key, also the remote path segment.
    const COLLECTION: &'static str;
    /// Envelope field name used for single-record responses.
    const SINGULAR: &'static str;

    fn id(&self) -> &str;
}

/// `{ "message": ..., "<singular>": record }`, the shape the remote API
/// returns for create/update and the local store mirrors.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub message: String,
    pub record: T,
}

impl<T: Record> Envelope<T> {
    pub fn new(message: impl Into<String>, record: T) -> Self {
        Self {
            message: message.into(),
            record,
        }
    }

    pub fn into_record(self) -> T {
        self.record
    }

    /// Accepts either the wrapped shape or a bare record.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(mut map) => {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                let record = match map.remove(T::SINGULAR) {
                    Some(inner) => serde_json::from_value(inner)?,
                    None => {
                        map.remove("message");
                        serde_json::from_value(Value::Object(map))?
                    }
                };

                Ok(Self { message, record })
            }
            other => Ok(Self {
                message: String::new(),
                record: serde_json::from_value(other)?,
            }),
        }
    }
}

impl<T: Record> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(T::SINGULAR, &self.record)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::Patient;
    use serde_json::json;

    fn patient_json() -> Value {
        json!({
            "id": 42,
            "name": "Ana",
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_envelope_unwraps_singular_field() {
        let envelope = Envelope::<Patient>::from_value(json!({
            "message": "Paciente criado",
            "patient": patient_json()
        }))
        .unwrap();

        assert_eq!(envelope.message, "Paciente criado");
        assert_eq!(envelope.record.id, "42");
    }

    #[test]
    fn test_envelope_accepts_bare_record() {
        let envelope = Envelope::<Patient>::from_value(patient_json()).unwrap();

        assert!(envelope.message.is_empty());
        assert_eq!(envelope.record.name, "Ana");
    }

    #[test]
    fn test_envelope_serializes_with_singular_key() {
        let record: Patient = serde_json::from_value(patient_json()).unwrap();
        let value = serde_json::to_value(Envelope::new("ok", record)).unwrap();

        assert_eq!(value["message"], "ok");
        assert_eq!(value["patient"]["id"], "42");
    }
}

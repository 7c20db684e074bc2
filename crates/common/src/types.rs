use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix used when rendering an instance ID for external callers.
const INSTANCE_PREFIX: &str = "order-";

/// Unique identifier for one lifecycle instance.
///
/// Rendered as `order-<uuid>`. Parsing accepts the prefixed form as well as
/// a bare UUID, so identifiers copied from logs and from API responses both work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Creates a new random instance ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an instance ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{INSTANCE_PREFIX}{}", self.0)
    }
}

/// Error returned when a string is not a valid instance ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInstanceIdError(String);

impl std::fmt::Display for ParseInstanceIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid instance id: {}", self.0)
    }
}

impl std::error::Error for ParseInstanceIdError {}

impl FromStr for InstanceId {
    type Err = ParseInstanceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(INSTANCE_PREFIX).unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| ParseInstanceIdError(s.to_string()))
    }
}

impl From<Uuid> for InstanceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<InstanceId> for Uuid {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

impl From<InstanceId> for String {
    fn from(id: InstanceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for InstanceId {
    type Error = ParseInstanceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_new_creates_unique_ids() {
        assert_ne!(InstanceId::new(), InstanceId::new());
    }

    #[test]
    fn instance_id_display_is_prefixed() {
        let uuid = Uuid::parse_str("8c727b70-cfcb-4674-8bcd-78e66e32f723").unwrap();
        let id = InstanceId::from_uuid(uuid);
        assert_eq!(id.to_string(), "order-8c727b70-cfcb-4674-8bcd-78e66e32f723");
    }

    #[test]
    fn instance_id_parses_prefixed_and_bare() {
        let uuid = Uuid::new_v4();
        let prefixed: InstanceId = format!("order-{uuid}").parse().unwrap();
        let bare: InstanceId = uuid.to_string().parse().unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.as_uuid(), uuid);
    }

    #[test]
    fn instance_id_rejects_garbage() {
        assert!("order-not-a-uuid".parse::<InstanceId>().is_err());
        assert!("".parse::<InstanceId>().is_err());
    }

    #[test]
    fn instance_id_serializes_as_prefixed_string() {
        let id = InstanceId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: InstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

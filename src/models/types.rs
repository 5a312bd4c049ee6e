use crate::error::DomainError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::value::RawValue;

#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Copy,
            Clone,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            postgres_types::ToSql,
            postgres_types::FromSql,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        #[postgres(transparent)]
        #[serde(transparent)] // JSON = plain UUID string
        pub struct $name(pub uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            #[inline]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
            #[inline]
            pub fn from_uuid(u: uuid::Uuid) -> Self {
                Self(u)
            }
            #[inline]
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(v: uuid::Uuid) -> Self {
                Self(v)
            }
        }
        impl From<$name> for uuid::Uuid {
            fn from(v: $name) -> uuid::Uuid {
                v.0
            }
        }
    };
}

define_id!(PlayerId);
define_id!(StorageId);
define_id!(StorageItemId);
define_id!(StorageCurrencyId);
define_id!(ItemId);
define_id!(CurrencyId);
define_id!(ProductId);
define_id!(ProductItemId);
define_id!(ProductCurrencyId);
define_id!(PriceId);
define_id!(PriceItemId);
define_id!(PriceCurrencyId);
define_id!(ShopId);
define_id!(ShopProductId);

/// Parse an externally supplied id. Empty or malformed ids are rejected as
/// invalid arguments naming the offending field.
pub fn parse_id<T>(field: &'static str, raw: &str) -> Result<T, DomainError>
where
    T: core::str::FromStr,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DomainError::InvalidArgument(format!("no {field} given")));
    }
    raw.parse::<T>()
        .map_err(|_| DomainError::InvalidArgument(format!("{field} is not a valid id")))
}

/// Opaque JSON document attached to players, storages, items and shops.
///
/// The text is kept exactly as it was supplied so it round-trips through
/// persistence without re-encoding.
#[derive(Clone, Debug, PartialEq, Eq, postgres_types::ToSql, postgres_types::FromSql)]
#[postgres(transparent)]
pub struct Metadata(String);

impl Metadata {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let _: serde::de::IgnoredAny = serde_json::from_str(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self("{}".to_string())
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(self.0.clone()).map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Box<RawValue> = Deserialize::deserialize(deserializer)?;
        Ok(Self(raw.get().to_string()))
    }
}

/// Optional name/metadata update accepted by the `Update*` operations of
/// items, players, storages and shops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.metadata.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_keeps_original_text() {
        let raw = r#"{ "b": 1,  "a": [true, null] }"#;
        let meta = Metadata::parse(raw).unwrap();
        assert_eq!(meta.as_str(), raw);

        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, raw);
    }

    #[test]
    fn metadata_rejects_invalid_json() {
        assert!(Metadata::parse("{not json").is_err());
    }

    #[test]
    fn parse_id_rejects_empty_and_garbage() {
        let err = parse_id::<ItemId>("item_id", "  ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(m) if m == "no item_id given"));

        assert!(parse_id::<ItemId>("item_id", "nope").is_err());

        let id = ItemId::new();
        assert_eq!(parse_id::<ItemId>("item_id", &id.to_string()).unwrap(), id);
    }
}

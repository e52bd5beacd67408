//! Data model for the persisted collections.
//!
//! A [`Record`] is a flat JSON object with a numeric `id` next to whatever
//! fields the client sent. Records live in one of the fixed [`Collection`]s,
//! each stored as a JSON array under its own key.
//!
//! ```rust
//! use local_api_shim::local_db_model::{Record, RecordId};
//! use serde_json::json;
//!
//! let record: Record = serde_json::from_value(json!({
//!     "id": 7,
//!     "name": "Electricity Bill",
//!     "amount": 15000
//! }))?;
//!
//! assert_eq!(record.id, RecordId(7));
//! assert_eq!(record.fields["amount"], json!(15000));
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::fmt::{Display, Formatter};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

pub type Fields = Map<String, JsonValue>;

/// Identifier assigned by the store when a record is inserted.
///
/// Serialized as a JSON number. Deserialization also accepts a string of
/// digits, since rows written by older clients sometimes carry the id in the
/// textual form it had in the request url.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Compares against an identifier taken verbatim from a url segment.
    pub fn matches(&self, raw: &str) -> bool {
        raw.parse::<u64>().map(|n| n == self.0).unwrap_or(false)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = RecordId;

            fn expecting(&self, f: &mut Formatter) -> std::fmt::Result {
                f.write_str("a non-negative integer or a string of digits")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RecordId, E> {
                Ok(RecordId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RecordId, E> {
                u64::try_from(v)
                    .map(RecordId)
                    .map_err(|_| E::custom(format!("negative id {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RecordId, E> {
                if v.fract() == 0.0 && v >= 0.0 && v < u64::MAX as f64 {
                    Ok(RecordId(v as u64))
                } else {
                    Err(E::custom(format!("invalid id {v}")))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RecordId, E> {
                v.trim()
                    .parse::<u64>()
                    .map(RecordId)
                    .map_err(|_| E::custom(format!("invalid id '{v}'")))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    /// Every other field of the row. An `id` key is never kept in here.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, mut fields: Fields) -> Self {
        fields.remove("id");
        Self { id, fields }
    }
}

/// One element of a persisted collection array.
///
/// Elements that do not decode as a [`Record`] (no id, a non-numeric id, not
/// an object) are kept verbatim so that rewriting the collection after a
/// mutation carries them forward untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredRow {
    Typed(Record),
    Foreign(JsonValue),
}

impl StoredRow {
    pub fn record(&self) -> Option<&Record> {
        match self {
            StoredRow::Typed(record) => Some(record),
            StoredRow::Foreign(_) => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            StoredRow::Typed(record) => serde_json::to_value(record).unwrap_or(JsonValue::Null),
            StoredRow::Foreign(raw) => raw.clone(),
        }
    }

    /// Field lookup that works for both typed and foreign rows.
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        match self {
            StoredRow::Typed(record) => record.fields.get(name),
            StoredRow::Foreign(raw) => raw.get(name),
        }
    }

    /// Numeric value of `field`, or zero when it is missing or not a number.
    pub fn number(&self, name: &str) -> f64 {
        self.field(name).and_then(JsonValue::as_f64).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Workers,
    Sales,
    Expenses,
    Storage,
    Attendance,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Workers,
        Collection::Sales,
        Collection::Expenses,
        Collection::Storage,
        Collection::Attendance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Workers => "workers",
            Collection::Sales => "sales",
            Collection::Expenses => "expenses",
            Collection::Storage => "storage",
            Collection::Attendance => "attendance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Persistence key, e.g. `alwasiloon_sales`.
    pub fn key(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregate over `sales` and `expenses`. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(serialize_with = "serialize_amount")]
    pub total_income: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub total_expenses: f64,
    #[serde(serialize_with = "serialize_amount")]
    pub net_profit: f64,
    pub sales_count: usize,
}

// Whole amounts go out as integers so clients see `90000`, not `90000.0`.
fn serialize_amount<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

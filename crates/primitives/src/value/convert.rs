use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use super::Value;

impl Value {
	/// Converts the tree into a JSON document.
	pub fn to_json(&self) -> Json {
		match self {
			Self::Null => Json::Null,
			Self::Bool(b) => Json::Bool(*b),
			Self::Number(n) => Json::Number(n.clone()),
			Self::String(s) => Json::String(s.to_string()),
			Self::List(list) => Json::Array(list.iter().map(Self::to_json).collect()),
			Self::Map(map) => Json::Object(
				map.iter()
					.map(|(k, v)| (k.to_string(), v.to_json()))
					.collect(),
			),
		}
	}
}

impl From<Json> for Value {
	fn from(json: Json) -> Self {
		match json {
			Json::Null => Self::Null,
			Json::Bool(b) => Self::Bool(b),
			Json::Number(n) => Self::Number(n),
			Json::String(s) => Self::String(s.into()),
			Json::Array(items) => Self::from_items(items.into_iter().map(Self::from)),
			Json::Object(entries) => {
				Self::from_entries(entries.into_iter().map(|(k, v)| (k, Self::from(v))))
			}
		}
	}
}

impl From<&Json> for Value {
	fn from(json: &Json) -> Self {
		Self::from(json.clone())
	}
}

impl From<Value> for Json {
	fn from(value: Value) -> Self {
		value.to_json()
	}
}

impl From<&Value> for Json {
	fn from(value: &Value) -> Self {
		value.to_json()
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.into())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s.into())
	}
}

impl From<Arc<str>> for Value {
	fn from(s: Arc<str>) -> Self {
		Self::String(s)
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Self::Number(n.into())
	}
}

impl From<u64> for Value {
	fn from(n: u64) -> Self {
		Self::Number(n.into())
	}
}

impl From<usize> for Value {
	fn from(n: usize) -> Self {
		Self::Number((n as u64).into())
	}
}

/// Non-finite floats have no JSON form and become null.
impl From<f64> for Value {
	fn from(n: f64) -> Self {
		serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Self::from_items(items.into_iter().map(Into::into))
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Null => serializer.serialize_unit(),
			Self::Bool(b) => serializer.serialize_bool(*b),
			Self::Number(n) => n.serialize(serializer),
			Self::String(s) => serializer.serialize_str(s),
			Self::List(list) => {
				let mut seq = serializer.serialize_seq(Some(list.len()))?;
				for item in list.iter() {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Self::Map(map) => {
				let mut out = serializer.serialize_map(Some(map.len()))?;
				for (k, v) in map.iter() {
					out.serialize_entry(k.as_ref(), v)?;
				}
				out.end()
			}
		}
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Json::deserialize(deserializer).map(Self::from)
	}
}

/// Compact JSON.
impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_json())
	}
}

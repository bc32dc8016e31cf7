use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::watermark::StyleDescriptor;

/// One named template file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateRecord {
    pub name: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Local>,
    pub settings: StyleDescriptor,
}

impl TemplateRecord {
    pub fn new(name: impl Into<String>, settings: StyleDescriptor) -> Self {
        Self {
            name: name.into(),
            created_at: Local::now(),
            settings,
        }
    }
}

/// RFC 3339 on write. On read, timestamps without an offset are taken as local time.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Local));
        }

        let naive = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| D::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| D::Error::custom(format!("nonexistent local time {:?}", raw)))
    }
}

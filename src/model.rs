use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::config::SensorConfig;

/// Sensors known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum SensorType {
    PhoneRadio,
}

/// Radio technology of a cell reported by the bulk query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellRadio {
    Gsm,
    Cdma,
    Wcdma,
    Lte,
    Nr,
}

/// Legacy radio type of the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PhoneType {
    #[default]
    None,
    Gsm,
    Cdma,
    Sip,
}

/// One entry of the "all visible cells" query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CellInfo {
    pub radio: CellRadio,
    #[serde(default)]
    pub registered: bool,
}

/// Serving cell as reported by the legacy location query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CellLocation {
    Gsm {
        lac: i32,
        cid: i32,
    },
    Cdma {
        base_station_id: i32,
        network_id: i32,
        system_id: i32,
    },
}

/// A single visible cell tower.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    mobile_country_code: String,
    mobile_network_code: String,
    location_area_code: i32,
    cell_id: i32,
}

impl CellRecord {
    pub fn new(
        mobile_country_code: impl Into<String>,
        mobile_network_code: impl Into<String>,
        location_area_code: i32,
        cell_id: i32,
    ) -> Self {
        Self {
            mobile_country_code: mobile_country_code.into(),
            mobile_network_code: mobile_network_code.into(),
            location_area_code,
            cell_id,
        }
    }

    pub fn mobile_country_code(&self) -> &str {
        &self.mobile_country_code
    }

    pub fn mobile_network_code(&self) -> &str {
        &self.mobile_network_code
    }

    pub fn location_area_code(&self) -> i32 {
        self.location_area_code
    }

    pub fn cell_id(&self) -> i32 {
        self.cell_id
    }
}

/// Cells seen during one scan, tagged with the cycle start and the config
/// that was active at the time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellRecordBatch {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub config: SensorConfig,
    pub cells: Vec<CellRecord>,
}

impl CellRecordBatch {
    pub fn new(timestamp: DateTime<Utc>, config: SensorConfig) -> Self {
        Self {
            timestamp,
            config,
            cells: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn sensor_name() {
        assert_eq!(SensorType::PhoneRadio.to_string(), "PhoneRadio");
        assert_eq!(SensorType::PhoneRadio.as_ref(), "PhoneRadio");
    }

    #[test]
    fn batch_json() {
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let mut batch = CellRecordBatch::new(timestamp, SensorConfig::default());
        batch.cells.push(CellRecord::new("310", "260", 1234, 5678));

        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["timestamp"], json!(1_700_000_000_123i64));
        assert_eq!(
            value["cells"],
            json!([{
                "mobileCountryCode": "310",
                "mobileNetworkCode": "260",
                "locationAreaCode": 1234,
                "cellId": 5678,
            }])
        );
    }

    #[test]
    fn cell_location_from_toml() {
        let location: CellLocation = toml::from_str("kind = \"gsm\"\nlac = 7\ncid = 42").unwrap();
        assert_eq!(location, CellLocation::Gsm { lac: 7, cid: 42 });
    }
}

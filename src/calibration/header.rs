// FeatureHeader - fixed sensor column order
//
// Column 0 is always the label column. Feature index `i` in a vector
// corresponds to header column `i + 1`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the label column in calibration files
pub const LABEL_COLUMN: &str = "location";

/// Derive the column id for a sensor reading (`wifi` + `aa` -> `wifi-aa`)
pub fn sensor_id(sensor_type: &str, address: &str) -> String {
    format!("{}-{}", sensor_type, address)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureHeader {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FeatureHeader {
    /// Build from the sensor columns, prepending the label column
    pub fn new<I, S>(sensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = vec![LABEL_COLUMN.to_string()];
        columns.extend(sensors.into_iter().map(Into::into));
        Self::from(columns)
    }

    /// Full header including the label column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Sensor columns only, in feature order
    pub fn sensors(&self) -> &[String] {
        &self.columns[1..]
    }

    /// Feature vector width (`|header| - 1`)
    pub fn width(&self) -> usize {
        self.columns.len() - 1
    }

    /// Feature index for a sensor id, if the sensor was seen in training
    pub fn feature_index(&self, sensor_id: &str) -> Option<usize> {
        self.positions.get(sensor_id).copied()
    }
}

impl From<Vec<String>> for FeatureHeader {
    fn from(mut columns: Vec<String>) -> Self {
        if columns.is_empty() {
            columns.push(LABEL_COLUMN.to_string());
        }
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate().skip(1) {
            // First occurrence wins for duplicated columns
            positions.entry(column.clone()).or_insert(i - 1);
        }
        Self { columns, positions }
    }
}

impl From<FeatureHeader> for Vec<String> {
    fn from(header: FeatureHeader) -> Self {
        header.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_id_format() {
        assert_eq!(sensor_id("wifi", "aa:bb"), "wifi-aa:bb");
        assert_eq!(sensor_id("bluetooth", "x"), "bluetooth-x");
    }

    #[test]
    fn test_label_column_first() {
        let header = FeatureHeader::new(["wifi-aa", "wifi-bb"]);
        assert_eq!(header.columns()[0], LABEL_COLUMN);
        assert_eq!(header.width(), 2);
        assert_eq!(header.sensors(), &["wifi-aa".to_string(), "wifi-bb".to_string()]);
    }

    #[test]
    fn test_feature_index() {
        let header = FeatureHeader::new(["wifi-aa", "wifi-bb"]);
        assert_eq!(header.feature_index("wifi-aa"), Some(0));
        assert_eq!(header.feature_index("wifi-bb"), Some(1));
        assert_eq!(header.feature_index("wifi-zz"), None);
        assert_eq!(header.feature_index(LABEL_COLUMN), None);
    }

    #[test]
    fn test_serde_rebuilds_positions() {
        let header = FeatureHeader::new(["a-1", "b-2"]);
        let json = serde_json::to_string(&header).unwrap();
        let parsed: FeatureHeader = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.feature_index("b-2"), Some(1));
    }
}

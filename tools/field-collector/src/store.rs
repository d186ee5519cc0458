//! In-memory storage of received readings.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use field_reporter::telemetry::{GpsFix, PayloadError, TelemetryRecord};

const CSV_HEADER: [&str; 5] = ["id", "timestamp", "longitude", "latitude", "battery"];

/// A decoded upload as kept by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: String,
    pub longitude: u16,
    pub latitude: u16,
    pub battery: u8,
    /// Device-local `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

impl StoredReading {
    pub fn from_record(record: &TelemetryRecord) -> Result<Self, PayloadError> {
        let fix = GpsFix::parse(&record.payload)?;
        Ok(Self {
            id: record.id.clone(),
            longitude: fix.longitude,
            latitude: fix.latitude,
            battery: fix.battery,
            timestamp: format!("{} {}", record.date, record.time),
        })
    }
}

/// Shared, append-only list of readings in arrival order.
#[derive(Debug, Clone, Default)]
pub struct ReadingStore {
    readings: Arc<RwLock<Vec<StoredReading>>>,
}

impl ReadingStore {
    /// Append `reading`, returning how many readings are now stored.
    pub fn push(&self, reading: StoredReading) -> usize {
        let mut readings = self.readings.write();
        readings.push(reading);
        readings.len()
    }

    pub fn all(&self) -> Vec<StoredReading> {
        self.readings.read().clone()
    }

    /// Render every reading as CSV, header first.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for r in self.readings.read().iter() {
            writer.write_record([
                r.id.clone(),
                r.timestamp.clone(),
                r.longitude.to_string(),
                r.latitude.to_string(),
                r.battery.to_string(),
            ])?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: &str) -> TelemetryRecord {
        TelemetryRecord {
            id: "ESP32_001".into(),
            payload: payload.into(),
            date: "2025-06-14".into(),
            time: "08:00:03".into(),
        }
    }

    #[test]
    fn decodes_payload_into_reading() {
        let reading = StoredReading::from_record(&record("1A2B3C4D5E")).unwrap();
        assert_eq!(
            reading,
            StoredReading {
                id: "ESP32_001".into(),
                longitude: 0x1A2B,
                latitude: 0x3C4D,
                battery: 0x5E,
                timestamp: "2025-06-14 08:00:03".into(),
            }
        );
    }

    #[test]
    fn rejects_bad_payload() {
        assert!(StoredReading::from_record(&record("1A2B")).is_err());
        assert!(StoredReading::from_record(&record("1A2B3C4DZZ")).is_err());
    }

    #[test]
    fn csv_lists_readings_in_arrival_order() {
        let store = ReadingStore::default();
        store.push(StoredReading::from_record(&record("0001000264")).unwrap());
        store.push(StoredReading {
            id: "ESP32_002".into(),
            ..StoredReading::from_record(&record("FFFF000000")).unwrap()
        });

        assert_eq!(
            store.to_csv().unwrap(),
            "id,timestamp,longitude,latitude,battery\n\
             ESP32_001,2025-06-14 08:00:03,1,2,100\n\
             ESP32_002,2025-06-14 08:00:03,65535,0,0\n"
        );
    }

    #[test]
    fn empty_store_still_has_header() {
        assert_eq!(
            ReadingStore::default().to_csv().unwrap(),
            "id,timestamp,longitude,latitude,battery\n"
        );
    }
}

//! HTTP routes.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use field_reporter::telemetry::TelemetryRecord;

use crate::store::{ReadingStore, StoredReading};

/// Build the collector router over `store`.
pub fn router(store: ReadingStore) -> Router {
    Router::new()
        .route("/api/data", get(list_readings).post(receive_reading))
        .route("/api/data.csv", get(download_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Accept one upload from a device.
async fn receive_reading(
    State(store): State<ReadingStore>,
    Json(record): Json<TelemetryRecord>,
) -> (StatusCode, Json<Value>) {
    let reading = match StoredReading::from_record(&record) {
        Ok(reading) => reading,
        Err(e) => {
            warn!(id = %record.id, payload = %record.payload, error = %e, "Rejected upload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "status": "error",
                    "message": format!("Failed to parse payload: {e}"),
                })),
            );
        }
    };

    info!(
        id = %reading.id,
        timestamp = %reading.timestamp,
        longitude = reading.longitude,
        latitude = reading.latitude,
        battery = reading.battery,
        "Received reading"
    );
    let stored = store.push(reading);
    info!(stored, "Reading stored");

    (StatusCode::OK, Json(json!({"status": "success"})))
}

/// Every stored reading, oldest first.
async fn list_readings(State(store): State<ReadingStore>) -> Json<Vec<StoredReading>> {
    Json(store.all())
}

/// Every stored reading as a CSV download.
async fn download_csv(State(store): State<ReadingStore>) -> impl IntoResponse {
    match store.to_csv() {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"gps_data.csv\"",
                ),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render CSV");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use field_reporter::telemetry::{HttpSender, SendError, TelemetrySender};

    use super::*;

    fn record(payload: &str) -> TelemetryRecord {
        TelemetryRecord {
            id: "ESP32_001".into(),
            payload: payload.into(),
            date: "2025-06-14".into(),
            time: "09:00:02".into(),
        }
    }

    fn post(record: &TelemetryRecord) -> Request<Body> {
        Request::post("/api/data")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(record).unwrap()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    #[tokio::test]
    async fn post_stores_decoded_reading() {
        let store = ReadingStore::default();
        let response = router(store.clone())
            .oneshot(post(&record("1A2B3C4D5E")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"status": "success"}));

        let readings = store.all();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].longitude, 0x1A2B);
        assert_eq!(readings[0].timestamp, "2025-06-14 09:00:02");
    }

    #[tokio::test]
    async fn post_with_bad_payload_is_rejected() {
        let store = ReadingStore::default();
        let response = router(store.clone())
            .oneshot(post(&record("XYZ")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "error");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Failed to parse payload")
        );
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn get_lists_stored_readings() {
        let store = ReadingStore::default();
        store.push(StoredReading::from_record(&record("0001000264")).unwrap());

        let response = router(store)
            .oneshot(Request::get("/api/data").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let readings: Vec<StoredReading> =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].battery, 100);
    }

    #[tokio::test]
    async fn csv_download_has_attachment_headers() {
        let store = ReadingStore::default();
        store.push(StoredReading::from_record(&record("0001000264")).unwrap());

        let response = router(store)
            .oneshot(Request::get("/api/data.csv").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert_eq!(
            body,
            "id,timestamp,longitude,latitude,battery\n\
             ESP32_001,2025-06-14 09:00:02,1,2,100\n"
        );
    }

    async fn serve(store: ReadingStore) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(store)).await.unwrap();
        });
        format!("http://{addr}/api/data")
    }

    #[tokio::test]
    async fn http_sender_uploads_to_collector() {
        let store = ReadingStore::default();
        let sender = HttpSender::new(serve(store.clone()).await).unwrap();

        sender.send(&record("1A2B3C4D5E")).await.unwrap();

        let readings = store.all();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, "ESP32_001");
        assert_eq!(readings[0].battery, 0x5E);
    }

    #[tokio::test]
    async fn http_sender_reports_rejection_as_status() {
        let store = ReadingStore::default();
        let sender = HttpSender::new(serve(store.clone()).await).unwrap();

        let err = sender.send(&record("not-hex!!!")).await.unwrap_err();
        assert!(matches!(err, SendError::Status(400)));
        assert!(store.all().is_empty());
    }

    #[tokio::test]
    async fn http_sender_reports_unreachable_collector() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender = HttpSender::new(format!("http://{addr}/api/data")).unwrap();
        let err = sender.send(&record("1A2B3C4D5E")).await.unwrap_err();
        assert!(matches!(err, SendError::Transport(_)));
    }
}

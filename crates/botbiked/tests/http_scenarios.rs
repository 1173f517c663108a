//! End-to-end scenarios against the local metrics source over real HTTP.

use axum::http::StatusCode;
use botbike_common::{TelemetryStats, BOT_BIKE_ADDRESS};
use botbiked::metrics_source::{Fault, MetricsSource};
use botbiked::{BotBikeClient, ClientOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL_SECS: f64 = 0.05;

fn client_for(port: u16) -> BotBikeClient {
    let options = ClientOptions::new(150.0, 80.0, "127.0.0.1", port).with_interval(INTERVAL_SECS);
    BotBikeClient::with_http(options, Duration::from_secs(1)).unwrap()
}

fn count_errors(client: &BotBikeClient) -> Arc<AtomicUsize> {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    client.on_error(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    errors
}

#[tokio::test]
async fn test_stats_event_from_live_source() {
    let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(200.0, 90.0))
        .await
        .unwrap();
    let client = client_for(source.local_addr().port());
    let mut events = client.stats_channel();

    client.connect().unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no stats event within 5s")
        .unwrap();

    assert_eq!(event, TelemetryStats::new(200.0, 90.0));
    assert_eq!(client.address(), BOT_BIKE_ADDRESS);

    client.disconnect();
    source.shutdown();
}

#[tokio::test]
async fn test_server_error_with_empty_body() {
    let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(200.0, 90.0))
        .await
        .unwrap();
    source
        .set_fault(Some(Fault::EmptyBody(StatusCode::INTERNAL_SERVER_ERROR)))
        .await;
    let client = client_for(source.local_addr().port());
    let mut events = client.stats_channel();
    let errors = count_errors(&client);

    client.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    client.disconnect();

    assert!(events.try_recv().is_err());
    assert_eq!(client.stats(), TelemetryStats::new(150.0, 80.0));
    assert!(errors.load(Ordering::SeqCst) >= 1);
    source.shutdown();
}

#[tokio::test]
async fn test_server_error_with_valid_body_is_applied() {
    let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(200.0, 90.0))
        .await
        .unwrap();
    source
        .set_fault(Some(Fault::Status(StatusCode::INTERNAL_SERVER_ERROR)))
        .await;
    let client = client_for(source.local_addr().port());
    let mut events = client.stats_channel();
    let errors = count_errors(&client);

    client.connect().unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("no stats event within 5s")
        .unwrap();
    client.disconnect();

    assert_eq!(event, TelemetryStats::new(200.0, 90.0));
    assert_eq!(client.stats(), TelemetryStats::new(200.0, 90.0));
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    source.shutdown();
}

#[tokio::test]
async fn test_unreachable_source_keeps_polling() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(port);
    let errors = count_errors(&client);

    client.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(client.is_polling());
    assert!(errors.load(Ordering::SeqCst) >= 2);
    assert_eq!(client.refresh_counts().succeeded, 0);
    assert_eq!(client.stats(), TelemetryStats::new(150.0, 80.0));
    client.disconnect();
}

#[tokio::test]
async fn test_values_changed_on_the_fly() {
    let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(100.0, 70.0))
        .await
        .unwrap();
    let client = client_for(source.local_addr().port());
    let mut events = client.stats_channel();
    client.connect().unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, TelemetryStats::new(100.0, 70.0));

    source.set(TelemetryStats::new(250.0, 95.0)).await;
    let changed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if event.power == 250.0 {
                return Some(event);
            }
        }
        None
    })
    .await
    .unwrap();

    assert_eq!(changed, Some(TelemetryStats::new(250.0, 95.0)));
    client.disconnect();
    source.shutdown();
}

//! Nominatim, OSRM and Valhalla adapters against a loopback stub server.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use delivery_planner::error::{GeocodeError, RouteError};
use delivery_planner::nominatim::{NominatimClient, NominatimConfig};
use delivery_planner::osrm::{OsrmClient, OsrmConfig, OsrmEstimator};
use delivery_planner::retry::RetryPolicy;
use delivery_planner::test_support::ManualClock;
use delivery_planner::traits::{DistanceEstimator, Geocoder};
use delivery_planner::valhalla::{ValhallaClient, ValhallaConfig, ValhallaEstimator};

use fixtures::{CannedResponse, DEPOT, NEARBY, StubServer};

const TWO_ROUTES: &str = r#"{
    "code": "Ok",
    "routes": [
        {"distance": 21000.0, "legs": [{"steps": [{"distance": 12000.0}, {"distance": 9000.0}]}]},
        {"distance": 18000.0, "legs": [{"steps": [{"distance": 10000.0}, {"distance": 8200.0}]}]}
    ]
}"#;

fn nominatim(server: &StubServer) -> NominatimClient {
    NominatimClient::new(NominatimConfig {
        base_url: server.base_url(),
        ..NominatimConfig::default()
    })
    .unwrap()
}

fn osrm(server: &StubServer) -> OsrmClient {
    OsrmClient::new(OsrmConfig {
        base_url: server.base_url(),
        ..OsrmConfig::default()
    })
    .unwrap()
}

// ============================================================================
// Nominatim
// ============================================================================

#[test]
fn nominatim_parses_first_result() {
    let server = StubServer::replay(vec![CannedResponse::ok(
        r#"[{"lat": "-22.2333", "lon": "-48.7189", "display_name": "Itapuí"},
            {"lat": "0.0", "lon": "0.0"}]"#,
    )]);

    let coord = nominatim(&server).geocode(DEPOT.address).unwrap();
    assert_eq!(coord, DEPOT.coordinate());

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert!(request.target.starts_with("/search?"));
    assert!(request.target.contains("Itapui"));
    assert!(request.target.contains("Brasil"));
    assert!(request.target.contains("format=json"));
    assert!(request.target.contains("limit=1"));
    assert!(request.header("user-agent").unwrap().starts_with("delivery-planner"));
}

#[test]
fn nominatim_empty_result_is_no_result() {
    let server = StubServer::replay(vec![CannedResponse::ok("[]")]);
    let err = nominatim(&server).geocode("Rua Que Nao Existe, 0").unwrap_err();
    assert!(matches!(err, GeocodeError::NoResult));
}

#[test]
fn nominatim_forbidden_is_rate_limited() {
    let server = StubServer::replay(vec![CannedResponse::status(403, "")]);
    let err = nominatim(&server).geocode(DEPOT.address).unwrap_err();
    assert!(matches!(err, GeocodeError::RateLimited));
}

#[test]
fn nominatim_server_error_keeps_status() {
    let server = StubServer::replay(vec![CannedResponse::status(503, "")]);
    let err = nominatim(&server).geocode(DEPOT.address).unwrap_err();
    assert!(matches!(err, GeocodeError::Status(503)));
}

#[test]
fn nominatim_garbage_coordinates_are_decode_errors() {
    let server = StubServer::replay(vec![CannedResponse::ok(r#"[{"lat": "north", "lon": "-48.7"}]"#)]);
    let err = nominatim(&server).geocode(DEPOT.address).unwrap_err();
    assert!(matches!(err, GeocodeError::Decode(_)));
}

// ============================================================================
// OSRM
// ============================================================================

#[test]
fn osrm_uses_shortest_alternative_step_sum() {
    let server = StubServer::replay(vec![CannedResponse::ok(TWO_ROUTES)]);
    let km = osrm(&server)
        .route_km(DEPOT.coordinate(), NEARBY[1].coordinate())
        .unwrap();
    assert_eq!(km, 18.2);

    let target = &server.requests()[0].target;
    assert_eq!(
        target,
        "/route/v1/driving/-48.7189,-22.2333;-48.5582,-22.2963?overview=false&alternatives=true&steps=true&annotations=distance"
    );
}

#[test]
fn osrm_error_codes_are_reported() {
    let server = StubServer::replay(vec![
        CannedResponse::ok(r#"{"code": "NoRoute", "message": "Impossible route", "routes": []}"#),
        CannedResponse::status(429, ""),
    ]);
    let client = osrm(&server);

    let err = client
        .route_km(DEPOT.coordinate(), NEARBY[1].coordinate())
        .unwrap_err();
    assert!(matches!(err, RouteError::Service { ref code, .. } if code == "NoRoute"));

    let err = client
        .route_km(DEPOT.coordinate(), NEARBY[1].coordinate())
        .unwrap_err();
    assert!(matches!(err, RouteError::RateLimited));
}

#[test]
fn osrm_estimator_waits_out_rate_limit_and_applies_margin() {
    let server = StubServer::replay(vec![
        CannedResponse::status(429, ""),
        CannedResponse::ok(TWO_ROUTES),
    ]);
    let clock = Arc::new(ManualClock::default());
    let estimator = OsrmEstimator::new(osrm(&server), clock.clone());

    let km = estimator.estimate_km(DEPOT.coordinate(), NEARBY[1].coordinate());
    // 18.2 km * 1.10 = 20.02, rounded to 20.0.
    assert_eq!(km, Some(20.0));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    assert_eq!(server.requests().len(), 2);
}

#[test]
fn osrm_estimator_declines_after_retries() {
    let server = StubServer::replay(vec![
        CannedResponse::status(500, ""),
        CannedResponse::status(502, ""),
        CannedResponse::status(503, ""),
    ]);
    let clock = Arc::new(ManualClock::default());
    let estimator = OsrmEstimator::new(osrm(&server), clock.clone());

    assert_eq!(estimator.estimate_km(DEPOT.coordinate(), NEARBY[1].coordinate()), None);
    assert_eq!(server.requests().len(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
}

#[test]
fn osrm_unreachable_server_declines() {
    let server = StubServer::replay(Vec::new());
    let base_url = server.base_url();
    drop(server);

    let client = OsrmClient::new(OsrmConfig {
        base_url,
        timeout_secs: 2,
        retry: RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        },
        ..OsrmConfig::default()
    })
    .unwrap();
    let estimator = OsrmEstimator::new(client, Arc::new(ManualClock::default()));
    assert_eq!(estimator.estimate_km(DEPOT.coordinate(), NEARBY[1].coordinate()), None);
}

// ============================================================================
// Valhalla
// ============================================================================

#[test]
fn valhalla_posts_locations_and_reads_length() {
    let server = StubServer::replay(vec![CannedResponse::ok(
        r#"{"trip": {"status": 0, "status_message": "Found route", "summary": {"length": 12.3, "time": 900}}}"#,
    )]);
    let client = ValhallaClient::new(ValhallaConfig {
        base_url: server.base_url(),
        ..ValhallaConfig::default()
    })
    .unwrap();
    let estimator = ValhallaEstimator::new(client, Arc::new(ManualClock::default()));

    // 12.3 km * 1.10 = 13.53, rounded to 13.5.
    assert_eq!(
        estimator.estimate_km(DEPOT.coordinate(), NEARBY[3].coordinate()),
        Some(13.5)
    );

    let request = &server.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/route");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["costing"], "auto");
    assert_eq!(body["locations"][0]["lat"], DEPOT.lat);
    assert_eq!(body["locations"][1]["lon"], NEARBY[3].lon);
}

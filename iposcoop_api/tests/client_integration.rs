use iposcoop_api::{Client, Error, Listing};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

#[tokio::test]
async fn get_upcoming_success() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("ipo_calendar.html");

    Mock::given(method("GET"))
        .and(path("/ipo-calendar/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let table = client.get_upcoming().await.unwrap();

    assert_eq!(table.headers.len(), 10);
    assert_eq!(table.headers[1], "Symbol proposed");
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.rows[0][0], "Northwind Robotics Inc.");
    assert_eq!(table.rows[1][2], "Keefe, Bruyette & Woods");
    assert_eq!(table.rows[1][7], "Week of 10/26/2026");
}

#[tokio::test]
async fn get_last_hundred_success() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("last_100_ipos.html");

    Mock::given(method("GET"))
        .and(path("/last-100-ipos/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let table = client.get_listing(Listing::LastHundred).await.unwrap();

    assert_eq!(table.headers[4], "Shares(millions)");
    assert_eq!(table.rows.len(), 3);
    assert_eq!(
        &table.rows[0][..7],
        ["ABCD", "Acme Co", "Tech", "01/02/2023", "5.0", "$10.00", "$12.50"]
    );
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ipo-calendar/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let result = client.get_upcoming().await;

    match result {
        Err(Error::HttpStatus { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "Service Unavailable");
        }
        other => panic!("expected HttpStatus error, got {:?}", other),
    }
}

#[tokio::test]
async fn page_without_table_is_missing_table() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/last-100-ipos/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Down for maintenance</body></html>"),
        )
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let result = client.get_last_hundred().await;

    assert!(matches!(result, Err(Error::MissingTable { .. })));
}

use std::time::Duration;

use appraise::adapters::erp::HttpErpConnector;
use appraise::domain::errors::DomainError;
use appraise::domain::ports::ErpConnector;

#[tokio::test]
async fn authenticates_and_pages_through_the_roster() {
    let mut server = mockito::Server::new_async().await;

    let login = server
        .mock("POST", "/auth/login")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"token": "t-123"}"#)
        .create_async()
        .await;

    let page1 = server
        .mock("GET", "/employees")
        .match_query(mockito::Matcher::UrlEncoded("page".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"employees": [{"id": "e-1", "first_name": "Ada", "last_name": "Lovelace",
                "email": "ada@x.com"}], "next_page": 2}"#,
        )
        .create_async()
        .await;

    let page2 = server
        .mock("GET", "/employees")
        .match_query(mockito::Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"employees": [{"id": "e-2", "email": "bob@x.com"}]}"#)
        .create_async()
        .await;

    let connector = HttpErpConnector::new(server.url(), Duration::from_secs(5));
    connector.authenticate("svc", "secret").await.unwrap();

    let roster = connector.list_employees().await.unwrap();
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].external_id, "e-1");
    assert_eq!(roster[0].first_name, "Ada");
    assert_eq!(roster[1].external_id, "e-2");
    // Absent optional fields deserialize to their defaults.
    assert_eq!(roster[1].first_name, "");

    login.assert_async().await;
    page1.assert_async().await;
    page2.assert_async().await;
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_failure() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .create_async()
        .await;

    let connector = HttpErpConnector::new(server.url(), Duration::from_secs(5));
    let err = connector.authenticate("svc", "wrong").await;
    assert!(matches!(err, Err(DomainError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn roster_fetch_requires_prior_authentication() {
    let server = mockito::Server::new_async().await;

    let connector = HttpErpConnector::new(server.url(), Duration::from_secs(5));
    let err = connector.list_employees().await;
    assert!(matches!(err, Err(DomainError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn server_errors_are_transient_connector_failures() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("POST", "/auth/login")
        .with_status(503)
        .create_async()
        .await;

    let connector = HttpErpConnector::new(server.url(), Duration::from_secs(5));
    let err = connector.authenticate("svc", "secret").await.unwrap_err();
    assert!(matches!(err, DomainError::ConnectorUnavailable(_)));
    assert!(err.is_transient());
}

use cryptosma::api::{CoinGeckoClient, CoinGeckoConfig, PriceSource};
use cryptosma::{FailureKind, FetchError};
use mockito::{Matcher, Server, ServerGuard};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn client_for(server: &ServerGuard) -> CoinGeckoClient {
    CoinGeckoClient::new(CoinGeckoConfig {
        base_url: server.url(),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap()
}

fn price_query(coin: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("ids".into(), coin.into()),
        Matcher::UrlEncoded("vs_currencies".into(), "usd".into()),
        Matcher::UrlEncoded("include_last_updated_at".into(), "true".into()),
    ])
}

#[tokio::test]
async fn test_get_price() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/simple/price")
        .match_query(price_query("bitcoin"))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"bitcoin":{"usd":43210.55,"last_updated_at":1700000000}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let quote = assert_ok!(client.fetch_price("bitcoin").await);

    assert_eq!(quote.price, 43210.55);
    assert_eq!(quote.last_updated.timestamp(), 1_700_000_000);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_key_sent_as_query_param() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/simple/price")
        .match_query(Matcher::UrlEncoded(
            "x_cg_demo_api_key".into(),
            "demo-key".into(),
        ))
        .with_status(200)
        .with_body(r#"{"bitcoin":{"usd":1.0,"last_updated_at":1700000000}}"#)
        .create_async()
        .await;

    let client = CoinGeckoClient::new(CoinGeckoConfig {
        base_url: server.url(),
        api_key: Some("demo-key".to_string()),
        ..Default::default()
    })
    .unwrap();

    assert_ok!(client.get_price("bitcoin").await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(
            r#"{"status":{"error_code":429,"error_message":"You've exceeded the Rate Limit."}}"#,
        )
        .create_async()
        .await;

    let err = client_for(&server).get_price("bitcoin").await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert!(err.to_string().contains("exceeded the Rate Limit"));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = client_for(&server).get_price("bitcoin").await.unwrap_err();

    match err {
        FetchError::Http { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("expected Http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payload() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"bitcoin":{"usd":"not a number","last_updated_at":1700000000}}"#)
        .create_async()
        .await;

    let err = client_for(&server).get_price("bitcoin").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Malformed);
}

#[tokio::test]
async fn test_unknown_coin_price_is_malformed() {
    // /simple/price answers 200 with an empty object for unknown ids
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/simple/price")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let err = assert_err!(client_for(&server).get_price("nocoin").await);
    assert_eq!(err.kind(), FailureKind::Malformed);
}

#[tokio::test]
async fn test_network_error() {
    // Nothing listens on port 9 (discard) on a test host
    let client = CoinGeckoClient::new(CoinGeckoConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();

    let err = client.get_price("bitcoin").await.unwrap_err();
    assert_eq!(err.kind(), FailureKind::Transient);
}

#[tokio::test]
async fn test_get_symbol() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/coins/solana")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"id":"solana","symbol":"sol","name":"Solana"}"#)
        .create_async()
        .await;

    let symbol = client_for(&server).fetch_symbol("solana").await.unwrap();

    assert_eq!(symbol, "SOL");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_symbol_not_found_is_fatal() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/coins/nocoin")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":"coin not found"}"#)
        .create_async()
        .await;

    let err = client_for(&server).get_symbol("nocoin").await.unwrap_err();

    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "Coin not found: coin not found");
}

//! Serving over a real socket, including graceful shutdown.

use futures_util::future::join_all;
use tokio::net::TcpListener;

use web_guard::{AppConfig, HttpServer, Services, Shutdown};

#[tokio::test]
async fn test_serves_until_shutdown() {
    let mut config = AppConfig::default();
    config.app.key = "test-signing-key".to_string();
    let server = HttpServer::new(config, Services::in_memory()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::new();
    let responses = join_all((0..4).map(|_| client.get(format!("http://{}/up", addr)).send())).await;
    for response in responses {
        let response = response.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers().get("server").unwrap(), "");
        assert!(response.headers().get("content-security-policy").is_some());
        assert!(response.headers().get("x-request-id").is_some());
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "up");
    }

    let response = client
        .post(format!("http://{}/register", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 419);

    drop(client);
    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

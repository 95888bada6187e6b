//! GrepAppClient against a local HTTP stub

use config::SearchConfig;
use error::ScoutError;
use observability::{Event, MemoryObserver};
use search::{GrepAppClient, SearchClient, SearchOptions};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Answers every request with one canned response and keeps the request lines
struct StubServer {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        let body = body.to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let seen = seen.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    seen.lock().unwrap().push(request_line);

                    let response = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self {
            base: format!("http://{}", addr),
            requests,
        }
    }

    fn client(&self, observer: Arc<MemoryObserver>) -> GrepAppClient {
        let config = SearchConfig {
            api_base: format!("{}/api/search", self.base),
            ..Default::default()
        };
        GrepAppClient::new(&config, observer).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

const PAGE: &str = r#"{
  "hits": {"hits": [
    {"repo": {"raw": "acme/repoA"}, "path": {"raw": "main.go"}, "content": {"snippet": "<table></table>"}}
  ]},
  "facets": {"count": 12, "pages": 2}
}"#;

fn api_statuses(observer: &MemoryObserver) -> Vec<Option<u16>> {
    observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            Event::ApiRequest(r) => Some(r.status),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_page_is_decoded_and_filters_are_sent() {
    let server = StubServer::start(200, PAGE).await;
    let observer = Arc::new(MemoryObserver::new());
    let options = SearchOptions {
        case_sensitive: true,
        lang_filter: Some("Go".to_string()),
        ..Default::default()
    };

    let page = server
        .client(observer.clone())
        .fetch_page("func main", 2, &options)
        .await
        .unwrap();

    assert_eq!(page.facets.count, 12);
    assert_eq!(page.facets.pages, 2);
    assert_eq!(page.hits.hits[0].repo.raw, "acme/repoA");

    let request = &server.requests()[0];
    assert!(request.starts_with("GET /api/search?"), "{}", request);
    assert!(request.contains("q=func+main"), "{}", request);
    assert!(request.contains("page=2"), "{}", request);
    assert!(request.contains("case=1"), "{}", request);
    assert!(request.contains("lang=Go"), "{}", request);
    assert!(!request.contains("regexp="), "{}", request);

    assert_eq!(api_statuses(&observer), vec![Some(200)]);
}

#[tokio::test]
async fn test_error_status_carries_status_and_body() {
    let server = StubServer::start(502, "bad gateway").await;
    let observer = Arc::new(MemoryObserver::new());

    let err = server
        .client(observer.clone())
        .fetch_page("func main", 1, &SearchOptions::default())
        .await
        .unwrap_err();

    match err {
        ScoutError::Upstream { message } => {
            assert!(message.contains("502"), "{}", message);
            assert!(message.contains("bad gateway"), "{}", message);
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert_eq!(api_statuses(&observer), vec![Some(502)]);
}

#[tokio::test]
async fn test_undecodable_body_is_an_upstream_error() {
    let server = StubServer::start(200, "<html>maintenance</html>").await;
    let observer = Arc::new(MemoryObserver::new());

    let err = server
        .client(observer)
        .fetch_page("func main", 1, &SearchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ScoutError::Upstream { .. }), "{:?}", err);
    assert!(err.to_string().contains("decode"), "{}", err);
}

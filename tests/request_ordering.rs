//! Lane, nonce, timeout and cancellation behaviour, observed through a
//! recording transport instead of a server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use solidi_sdk::prelude::*;
use tokio::task::JoinSet;

const API_KEY: &str = "lane-key";
const API_SECRET: &str = "lane-secret";

// =============================================================================
// Test double
// =============================================================================

#[derive(Debug, Clone)]
struct Exchange {
    request: HttpRequest,
    started: Instant,
    finished: Option<Instant>,
}

struct RecordingTransport {
    delay: Duration,
    reply: Result<HttpResponse, TransportError>,
    exchanges: Mutex<Vec<Exchange>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransport {
    fn replying(status: u16, body: &str) -> Self {
        Self {
            delay: Duration::from_millis(5),
            reply: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            exchanges: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn failing(error: TransportError) -> Self {
        Self {
            reply: Err(error),
            ..Self::replying(200, "")
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.lock().unwrap().clone()
    }

    fn nonces(&self) -> Vec<u64> {
        self.exchanges()
            .iter()
            .map(|exchange| {
                let body: Value =
                    serde_json::from_str(exchange.request.body.as_deref().unwrap()).unwrap();
                body["nonce"].as_u64().unwrap()
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let index = {
            let mut exchanges = self.exchanges.lock().unwrap();
            exchanges.push(Exchange {
                request,
                started: Instant::now(),
                finished: None,
            });
            exchanges.len() - 1
        };
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.exchanges.lock().unwrap()[index].finished = Some(Instant::now());
        self.reply.clone()
    }
}

/// `RUST_LOG=solidi_sdk=trace cargo test` shows lane contention.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_with(transport: Arc<RecordingTransport>, timeout: Duration) -> SolidiClient {
    init_tracing();
    let config = ClientConfig::builder()
        .for_tier(Tier::Stag)
        .signing_domain("www.solidi.co")
        .timeout(timeout)
        .build()
        .unwrap();
    SolidiClient::builder()
        .config(config)
        .credentials(Credentials::new(API_KEY, API_SECRET))
        .transport(transport)
        .build()
        .unwrap()
}

fn client(transport: Arc<RecordingTransport>) -> SolidiClient {
    client_with(transport, Duration::from_secs(5))
}

const USER_BODY: &str = r#"{"error":null,"data":{"email":"a@b.com"}}"#;

// =============================================================================
// Lane
// =============================================================================

mod lane {
    use super::*;

    #[tokio::test]
    async fn test_back_to_back_calls_never_overlap() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_millis(30)),
        );
        let client = client(transport.clone());

        let (first, second) = tokio::join!(
            client.private_method(MethodCall::post("user")),
            client.private_method(MethodCall::post("user")),
        );
        assert!(!first.unwrap().is_error());
        assert!(!second.unwrap().is_error());

        let mut exchanges = transport.exchanges();
        assert_eq!(exchanges.len(), 2);
        exchanges.sort_by_key(|exchange| exchange.started);
        assert!(exchanges[1].started >= exchanges[0].finished.unwrap());
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!client.lane().is_busy());
    }

    #[tokio::test]
    async fn test_clones_share_one_lane() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_millis(10)),
        );
        let client = client(transport.clone());

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let client = client.clone();
            tasks.spawn(async move { client.private_method(MethodCall::post("user")).await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(!result.unwrap().unwrap().is_error());
        }

        assert_eq!(transport.exchanges().len(), 8);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(client.lane().contended_waits() > 0);
    }

    #[tokio::test]
    async fn test_nonces_strictly_increase_under_contention() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_millis(2)),
        );
        let client = client(transport.clone());

        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let client = client.clone();
            tasks.spawn(async move {
                client
                    .private_method(MethodCall::post("buy").with_param("index", i))
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let nonces = transport.nonces();
        assert_eq!(nonces.len(), 20);
        assert!(
            nonces.windows(2).all(|pair| pair[0] < pair[1]),
            "nonces out of order: {nonces:?}"
        );
    }

    #[tokio::test]
    async fn test_lane_released_after_failure() {
        let transport = Arc::new(RecordingTransport::failing(TransportError::Network(
            "connection reset".to_string(),
        )));
        let client = client(transport.clone());

        let response = client.public_method(MethodCall::get("ticker")).await.unwrap();
        assert_eq!(response, ApiResponse::Error(ApiError::RequestFailed));
        assert!(!client.lane().is_busy());

        let response = client.public_method(MethodCall::get("ticker")).await.unwrap();
        assert_eq!(response.to_json(), json!({"error": "request_failed"}));
        assert_eq!(transport.exchanges().len(), 2);
    }
}

// =============================================================================
// Request construction
// =============================================================================

mod requests {
    use super::*;

    #[tokio::test]
    async fn test_signature_covers_signing_domain_path_and_body() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        client
            .private_method(MethodCall::post("withdraw/BTC").with_param("volume", "0.1"))
            .await
            .unwrap();

        let exchange = &transport.exchanges()[0];
        let request = &exchange.request;
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://t10.solidi.co/api2/v1/withdraw/BTC");
        assert_eq!(request.header("API-Key"), Some(API_KEY));

        let body = request.body.as_deref().unwrap();
        let expected = Credentials::new(API_KEY, API_SECRET).signer().sign(
            "www.solidi.co",
            "/api2/v1/withdraw/BTC",
            Some(body),
        );
        assert_eq!(request.header("API-Sign"), Some(expected.as_str()));

        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["volume"], json!("0.1"));
        assert!(parsed["nonce"].is_u64());
    }

    #[tokio::test]
    async fn test_staging_sends_legacy_basic_auth() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        client.public_method(MethodCall::get("ticker")).await.unwrap();

        let request = &transport.exchanges()[0].request;
        assert_eq!(request.header("Authorization"), Some("Basic ZGV2OiA="));
        assert_eq!(request.header("Accept"), Some("application/json"));
        assert_eq!(request.header("API-Sign"), None);
        assert_eq!(request.body, None);
    }
}

// =============================================================================
// Timeout and cancellation
// =============================================================================

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_secs(2)),
        );
        let client = client_with(transport.clone(), Duration::from_millis(50));
        let token = CancellationToken::new();

        let started = Instant::now();
        let response = client
            .private_method(MethodCall::post("user").with_cancel_token(token.clone()))
            .await
            .unwrap();

        assert_eq!(response.to_json(), json!({"error": "timeout"}));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!token.is_cancelled());
        assert!(!client.lane().is_busy());
    }

    #[tokio::test]
    async fn test_abort_after_timeout_stays_timeout() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_secs(2)),
        );
        let client = client_with(transport, Duration::from_millis(30));
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                token.cancel();
            })
        };

        let response = client
            .private_method(MethodCall::post("user").with_cancel_token(token))
            .await
            .unwrap();
        canceller.await.unwrap();
        assert_eq!(response, ApiResponse::Error(ApiError::Timeout));
    }

    #[tokio::test]
    async fn test_abort_before_timeout() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_secs(2)),
        );
        let client = client(transport.clone());
        let token = CancellationToken::new();

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel();
            })
        };

        let response = client
            .private_method(MethodCall::post("user").with_cancel_token(token))
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(response.to_json(), json!({"error": "aborted"}));
        assert_eq!(transport.exchanges().len(), 1);
        assert!(!client.lane().is_busy());
    }

    #[tokio::test]
    async fn test_already_cancelled_call_never_sends() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());
        let token = CancellationToken::new();
        token.cancel();

        let response = client
            .public_method(MethodCall::get("ticker").with_cancel_token(token))
            .await
            .unwrap();

        assert_eq!(response, ApiResponse::Error(ApiError::Aborted));
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_abort_while_waiting_for_lane() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_millis(200)),
        );
        let client = client(transport.clone());
        let waiting = CancellationToken::new();

        let holder = {
            let client = client.clone();
            tokio::spawn(async move { client.private_method(MethodCall::post("user")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let canceller = {
            let token = waiting.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                token.cancel();
            })
        };
        let response = client
            .private_method(MethodCall::post("user").with_cancel_token(waiting))
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(response, ApiResponse::Error(ApiError::Aborted));
        assert!(!holder.await.unwrap().unwrap().is_error());
        assert_eq!(transport.exchanges().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_aborts_tagged_calls() {
        let transport = Arc::new(
            RecordingTransport::replying(200, USER_BODY).with_delay(Duration::from_secs(2)),
        );
        let client = client(transport);
        let registry = CancellationRegistry::new();

        let call = MethodCall::post("address_book/add")
            .with_cancel_token(registry.create_token_for_route("address_book/add"));
        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.private_method(call).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.abort_all(Some("address_book")), 1);

        let response = pending.await.unwrap().unwrap();
        assert_eq!(response, ApiResponse::Error(ApiError::Aborted));
    }
}

// =============================================================================
// Programmer errors
// =============================================================================

mod programmer_errors {
    use super::*;

    #[tokio::test]
    async fn test_get_with_params_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        let err = client
            .public_method(MethodCall::get("ticker").with_param("foo", 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SdkError::Config(ConfigError::ParamsNotAllowed { .. })
        ));
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_params_on_non_post_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        let err = client
            .public_method_value(
                json!({
                    "httpMethod": "DELETE",
                    "apiRoute": "address_book/7",
                    "params": {"confirm": true},
                }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SdkError::Config(ConfigError::ParamsNotAllowed { ref method }) if method == "DELETE"
        ));
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_private_call_must_be_post() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        let err = client
            .private_method(MethodCall::put("user"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SdkError::Config(ConfigError::PrivateRequiresPost { .. })
        ));
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_argument_rejected() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport.clone());

        let err = client
            .private_method_value(
                json!({"httpMethod": "POST", "apiRoute": "user", "parms": {}}),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            SdkError::Config(ConfigError::UnexpectedArgument { method, key, .. }) => {
                assert_eq!(method, "privateMethod");
                assert_eq!(key, "parms");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_rejected_before_lane() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = SolidiClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();
        let _held = client.lane().try_acquire().unwrap();

        let err = client
            .private_method(MethodCall::post("balance"))
            .await
            .unwrap_err();

        assert!(matches!(err, SdkError::Config(ConfigError::MissingApiSecret)));
        assert!(transport.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_request_is_an_error() {
        let transport = Arc::new(RecordingTransport::failing(TransportError::InvalidRequest(
            "bad header".to_string(),
        )));
        let client = client(transport);

        let err = client
            .public_method(MethodCall::get("ticker"))
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::Transport(_)));
        assert!(!client.lane().is_busy());
    }
}

// =============================================================================
// Example scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_user_returns_unwrapped_data() {
        let transport = Arc::new(RecordingTransport::replying(200, USER_BODY));
        let client = client(transport);

        let response = client
            .private_method_value(
                json!({"httpMethod": "POST", "apiRoute": "user", "params": {}}),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.to_json(), json!({"email": "a@b.com"}));
    }

    #[tokio::test]
    async fn test_insufficient_funds_passthrough() {
        let transport = Arc::new(RecordingTransport::replying(
            200,
            r#"{"error":"Insufficient Funds"}"#,
        ));
        let client = client(transport);

        let response = client.private_method(MethodCall::post("user")).await.unwrap();
        assert_eq!(response.to_json(), json!({"error": "Insufficient Funds"}));
    }
}

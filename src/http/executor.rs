//! Turns a validated [`MethodCall`] into an HTTP exchange and a classified
//! [`ApiResponse`].

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{Credentials, NonceState, SessionObserver};
use crate::client::{HttpMethod, MethodCall};
use crate::config::ClientConfig;
use crate::error::{ConfigError, SdkError, SdkResult};
use crate::http::classify::classify_response;
use crate::http::queue::LaneGuard;
use crate::http::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::response::{ApiError, ApiResponse};

/// Executes one request. Nonce issuance and delivery order depend on the
/// request lane, so [`execute`](Self::execute) takes the caller's
/// [`LaneGuard`].
pub struct TransportExecutor {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    nonces: Arc<NonceState>,
    session_observer: Option<Arc<dyn SessionObserver>>,
}

impl TransportExecutor {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        nonces: Arc<NonceState>,
        session_observer: Option<Arc<dyn SessionObserver>>,
    ) -> Self {
        Self {
            config,
            transport,
            nonces,
            session_observer,
        }
    }

    /// Run `call` while holding the lane. `credentials` must be present for
    /// private calls.
    pub(crate) async fn execute(
        &self,
        _lane: &LaneGuard,
        call: MethodCall,
        private: bool,
        credentials: Option<&Credentials>,
    ) -> SdkResult<ApiResponse> {
        validate_call(&call, private)?;
        let credentials = match (private, credentials) {
            (true, Some(creds)) if creds.has_secret() => Some(creds),
            (true, _) => return Err(ConfigError::MissingApiSecret.into()),
            (false, _) => None,
        };

        let request = self.build_request(&call, credentials)?;
        let url = request.url.clone();
        debug!(
            method = %call.http_method,
            route = %call.api_route,
            private,
            "Calling {}",
            url
        );

        // Timing out cancels only this child, never the caller's token.
        let in_flight = call.cancel.child_token();
        let outcome = tokio::select! {
            biased;
            _ = in_flight.cancelled() => Outcome::Aborted,
            _ = tokio::time::sleep(self.config.timeout()) => {
                in_flight.cancel();
                Outcome::TimedOut
            }
            result = self.transport.send(request) => Outcome::Completed(result),
        };

        let response = match outcome {
            Outcome::TimedOut => {
                warn!(
                    route = %call.api_route,
                    timeout_ms = self.config.timeout().as_millis() as u64,
                    "Request timed out: {}",
                    url
                );
                ApiResponse::Error(ApiError::Timeout)
            }
            Outcome::Aborted => {
                info!(route = %call.api_route, "Aborted: {}", url);
                ApiResponse::Error(ApiError::Aborted)
            }
            Outcome::Completed(Err(TransportError::Network(reason))) => {
                warn!(route = %call.api_route, error = %reason, "Request failed: {}", url);
                ApiResponse::Error(ApiError::RequestFailed)
            }
            Outcome::Completed(Err(TransportError::InvalidRequest(reason))) => {
                return Err(SdkError::Transport(reason));
            }
            Outcome::Completed(Ok(http)) => {
                let response = classify_response(http.status, &http.body);
                if let ApiResponse::Error(ApiError::CannotParseData { response_data }) = &response {
                    debug!(
                        route = %call.api_route,
                        body = %response_data,
                        "Cannot parse response as JSON"
                    );
                }
                if matches!(http.status, 401 | 403) {
                    self.notify_authentication_failure(&call.api_route, &response);
                }
                response
            }
        };

        Ok(response)
    }

    fn build_request(
        &self,
        call: &MethodCall,
        credentials: Option<&Credentials>,
    ) -> SdkResult<HttpRequest> {
        let path = self.config.path_for(&call.api_version, &call.api_route);
        let url = self.config.url_for(&path);

        let body = if call.http_method.carries_body() {
            let mut params = call.params.clone();
            params.insert("nonce".to_string(), Value::from(self.nonces.next()));
            Some(serde_json::to_string(&params)?)
        } else {
            None
        };

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.config.user_agent().to_string()),
        ];

        if let Some(creds) = credentials {
            let signature = creds
                .signer()
                .sign(self.config.signing_domain(), &path, body.as_deref());
            headers.push(("API-Key".to_string(), creds.api_key().to_string()));
            headers.push(("API-Sign".to_string(), signature));
        }

        if self.config.include_legacy_basic_auth_header() {
            let encoded = STANDARD.encode(self.config.legacy_basic_auth_credential());
            headers.push(("Authorization".to_string(), format!("Basic {encoded}")));
        }

        Ok(HttpRequest {
            method: call.http_method.as_str().to_string(),
            url,
            headers,
            body,
        })
    }

    fn notify_authentication_failure(&self, api_route: &str, response: &ApiResponse) {
        let Some(observer) = &self.session_observer else {
            return;
        };
        let error = match response {
            ApiResponse::Error(error) => error.clone(),
            other => ApiError::Server(other.to_json()),
        };
        warn!(route = %api_route, "Authentication rejected by server");
        observer.on_authentication_failure(api_route, &error);
    }
}

enum Outcome {
    TimedOut,
    Aborted,
    Completed(Result<HttpResponse, TransportError>),
}

/// Shape rules shared by the facade and the executor.
pub(crate) fn validate_call(call: &MethodCall, private: bool) -> Result<(), ConfigError> {
    // Only POST has a body, so params on any other method would be lost.
    if !call.params.is_empty() && !call.http_method.carries_body() {
        return Err(ConfigError::ParamsNotAllowed {
            method: call.http_method.to_string(),
        });
    }
    if private && call.http_method != HttpMethod::Post {
        return Err(ConfigError::PrivateRequiresPost {
            method: call.http_method.to_string(),
        });
    }
    Ok(())
}

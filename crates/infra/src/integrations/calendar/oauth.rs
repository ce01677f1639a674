//! OAuth2 credential lifecycle for the calendar provider
//!
//! One manager behind two acquisition flows:
//!
//! - **Implicit** (local/dev): the access token comes straight back in the
//!   redirect fragment. No refresh token; when it expires the user signs in
//!   again. Avoids needing a backend during local development.
//! - **Authorization-code + PKCE** (production): a hashed verifier binds the
//!   authorization code, and the code is exchanged for tokens by the trusted
//!   backend - long-lived credentials never travel through a redirect URL,
//!   and the refresh token enables silent renewal.
//!
//! Renewal: one task is armed to fire at `expires_at - threshold`; if that
//! instant is already past the task fires immediately. Arming cancels any
//! previous task. A failed refresh means the grant was revoked: the
//! credential and every sync cursor are cleared and the manager returns to
//! signed-out. There is no silent retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::{Duration, Instant};

use axum::extract::Query;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use homeboard_core::{CredentialStore, SyncCursorStore};
use homeboard_domain::{
    CalendarSyncConfig, Credential, DeploymentMode, HomeboardError, Result,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::auth::pkce::{generate_state, PkceChallenge};

/// Which acquisition flow a login session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFlow {
    Implicit,
    Pkce,
}

impl AuthFlow {
    const fn for_mode(mode: DeploymentMode) -> Self {
        match mode {
            DeploymentMode::Local => Self::Implicit,
            DeploymentMode::Production => Self::Pkce,
        }
    }
}

/// Token response from the trusted backend exchange endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Credential lifecycle manager.
///
/// Owns the in-memory credential, persists it through the credential store,
/// and keeps at most one pending renewal task.
pub struct CredentialManager {
    config: CalendarSyncConfig,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    cursors: Arc<dyn SyncCursorStore>,
    current: RwLock<Option<Credential>>,
    renewal: StdMutex<Option<JoinHandle<()>>>,
    // Back-reference handed to the renewal task so it can call refresh.
    weak_self: Weak<Self>,
}

impl CredentialManager {
    /// Create a manager over the given stores.
    #[must_use]
    pub fn new(
        config: CalendarSyncConfig,
        credentials: Arc<dyn CredentialStore>,
        cursors: Arc<dyn SyncCursorStore>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            config,
            http: reqwest::Client::new(),
            credentials,
            cursors,
            current: RwLock::new(None),
            renewal: StdMutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Load any persisted credential into memory and arm renewal for it.
    ///
    /// Should be called once on startup. Returns whether a credential was
    /// found.
    ///
    /// # Errors
    /// Returns an error if the credential store cannot be read.
    pub async fn initialize(&self) -> Result<bool> {
        match self.credentials.load().await? {
            Some(credential) => {
                *self.current.write().await = Some(credential.clone());
                if credential.can_renew() {
                    self.arm_renewal(&credential);
                }
                info!("credential manager initialized with existing credential");
                Ok(true)
            }
            None => {
                debug!("no persisted credential found");
                Ok(false)
            }
        }
    }

    /// The active credential, or `None` when absent or already expired.
    pub async fn current(&self) -> Option<Credential> {
        let guard = self.current.read().await;
        guard.as_ref().filter(|c| !c.is_expired(0)).cloned()
    }

    /// A valid access token for provider calls, refreshing first when the
    /// credential is inside the renewal threshold.
    ///
    /// # Errors
    /// Returns `HomeboardError::Auth` when signed out, when the credential
    /// is expired and cannot renew, or when refresh fails.
    pub async fn access_token(&self) -> Result<String> {
        let credential = {
            let guard = self.current.read().await;
            guard.clone().ok_or_else(|| HomeboardError::Auth("not authenticated".to_string()))?
        };

        if credential.is_expired(self.config.refresh_threshold_secs) {
            if credential.can_renew() {
                return Ok(self.refresh().await?.access_token);
            }
            if credential.is_expired(0) {
                return Err(HomeboardError::Auth(
                    "credential expired and cannot renew".to_string(),
                ));
            }
        }

        Ok(credential.access_token)
    }

    /// Begin a login using the flow selected by deployment mode.
    ///
    /// Starts the loopback callback server and returns a session holding the
    /// authorization URL to open in the browser. `LoginSession::finish`
    /// completes the flow.
    ///
    /// # Errors
    /// Returns an error if the loopback server cannot be started.
    pub async fn start_login(&self) -> Result<LoginSession> {
        let flow = AuthFlow::for_mode(self.config.mode);
        let server = CallbackServer::start().await?;
        let redirect_uri = server.redirect_uri();

        let state = generate_state();
        let challenge = match flow {
            AuthFlow::Pkce => Some(PkceChallenge::generate()),
            AuthFlow::Implicit => None,
        };

        let authorization_url =
            self.authorization_url(&redirect_uri, &state, challenge.as_ref());

        let manager = self.weak_self.upgrade().ok_or_else(|| {
            HomeboardError::Internal("credential manager dropped mid-login".to_string())
        })?;

        Ok(LoginSession {
            manager,
            server,
            flow,
            state,
            challenge,
            redirect_uri,
            authorization_url,
        })
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// On failure the session is terminated: credential and cursors cleared,
    /// renewal cancelled.
    ///
    /// # Errors
    /// Returns `HomeboardError::Auth` when no refresh token exists or the
    /// backend rejects the refresh.
    pub async fn refresh(&self) -> Result<Credential> {
        let refresh_token = {
            let guard = self.current.read().await;
            match guard.as_ref() {
                Some(credential) => credential
                    .refresh_token
                    .clone()
                    .ok_or_else(|| HomeboardError::Auth("no refresh token".to_string()))?,
                None => return Err(HomeboardError::Auth("not authenticated".to_string())),
            }
        };

        let params = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("refresh_token", refresh_token.clone()),
        ];

        match self.request_tokens(&params).await {
            Ok(response) => {
                // Providers typically omit the refresh token on refresh.
                let refresh_token = response.refresh_token.or(Some(refresh_token));
                let credential = Credential::new(
                    response.access_token,
                    refresh_token,
                    response.expires_in,
                );
                info!("access credential refreshed");
                self.install(credential).await
            }
            Err(err) => {
                // A failed refresh means the grant was revoked; the session
                // ends rather than retrying.
                warn!(error = %err, "credential refresh failed, terminating session");
                self.terminate_session().await;
                Err(HomeboardError::Auth(format!("refresh failed: {err}")))
            }
        }
    }

    /// Destroy the credential, clear all sync cursors, and cancel any
    /// pending renewal.
    ///
    /// # Errors
    /// Returns an error if either store cannot be cleared; in-memory state
    /// is cleared regardless.
    pub async fn sign_out(&self) -> Result<()> {
        self.cancel_renewal();
        *self.current.write().await = None;
        self.credentials.clear().await?;
        self.cursors.clear_all().await?;
        info!("signed out");
        Ok(())
    }

    /// Seconds-until-fire for the renewal task: `expires_at - threshold`,
    /// clamped at zero so an already-due renewal fires immediately.
    pub(crate) fn renewal_delay(credential: &Credential, threshold_secs: i64) -> Duration {
        let seconds = credential.seconds_until_expiry() - threshold_secs;
        if seconds <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(seconds.unsigned_abs())
        }
    }

    async fn install(&self, credential: Credential) -> Result<Credential> {
        self.credentials.save(&credential).await?;
        *self.current.write().await = Some(credential.clone());
        if credential.can_renew() {
            self.arm_renewal(&credential);
        }
        Ok(credential)
    }

    /// Arm the single renewal task, cancelling any previous one.
    fn arm_renewal(&self, credential: &Credential) {
        let delay = Self::renewal_delay(credential, self.config.refresh_threshold_secs);
        let weak = self.weak_self.clone();

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                debug!(delay_secs = delay.as_secs(), "renewal armed");
                sleep(delay).await;
            }

            let Some(manager) = weak.upgrade() else {
                return;
            };

            // A successful refresh installs the new credential, which
            // re-arms the next renewal.
            if let Err(err) = manager.refresh().await {
                error!(error = %err, "silent renewal failed");
            }
        });

        let mut guard = self.renewal.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_renewal(&self) {
        let mut guard = self.renewal.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    async fn terminate_session(&self) {
        self.cancel_renewal();
        *self.current.write().await = None;
        if let Err(err) = self.credentials.clear().await {
            error!(error = %err, "failed to clear credential store");
        }
        if let Err(err) = self.cursors.clear_all().await {
            error!(error = %err, "failed to clear cursor store");
        }
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        challenge: Option<&PkceChallenge>,
    ) -> String {
        let response_type = if challenge.is_some() { "code" } else { "token" };

        let mut params = vec![
            ("response_type".to_string(), response_type.to_string()),
            ("client_id".to_string(), self.config.client_id.clone()),
            ("redirect_uri".to_string(), redirect_uri.to_string()),
            ("scope".to_string(), self.config.scopes.join(" ")),
            ("state".to_string(), state.to_string()),
        ];

        if let Some(challenge) = challenge {
            params.push(("code_challenge".to_string(), challenge.code_challenge.clone()));
            params
                .push(("code_challenge_method".to_string(), challenge.challenge_method().into()));
            // Request a refresh token for silent renewal.
            params.push(("access_type".to_string(), "offline".to_string()));
            params.push(("prompt".to_string(), "consent".to_string()));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.config.authorization_endpoint, query_string)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<Credential> {
        let params = [
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code_verifier", verifier.to_string()),
        ];

        let response = self.request_tokens(&params).await?;
        Ok(Credential::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        ))
    }

    async fn request_tokens(&self, params: &[(&str, String)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_exchange_endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| HomeboardError::Network(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(HomeboardError::Auth(format!("token endpoint error ({status}): {body}")));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| HomeboardError::Auth(format!("malformed token response: {e}")))
    }
}

/// Represents an in-flight login.
pub struct LoginSession {
    manager: Arc<CredentialManager>,
    server: CallbackServer,
    flow: AuthFlow,
    state: String,
    challenge: Option<PkceChallenge>,
    redirect_uri: String,
    authorization_url: String,
}

impl LoginSession {
    /// Authorization URL to open in the user's browser.
    #[must_use]
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    /// Redirect URI supplied to the provider.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the redirect, complete the flow, and persist the credential.
    ///
    /// # Errors
    /// Returns `HomeboardError::Auth` on state mismatch, a provider-reported
    /// error, or a callback that does not match the session's flow, and
    /// `HomeboardError::Network` on callback timeout.
    pub async fn finish(self, timeout: Duration) -> Result<Credential> {
        let callback = self.server.wait_for_callback(timeout).await?;

        let credential = match (self.flow, callback) {
            (_, CallbackData::Failed(reason)) => {
                return Err(HomeboardError::Auth(format!("authorization failed: {reason}")));
            }
            (AuthFlow::Pkce, CallbackData::Code { code, state }) => {
                validate_state(&self.state, state.as_deref())?;
                let challenge = self.challenge.as_ref().ok_or_else(|| {
                    HomeboardError::Internal("login session lost its verifier".to_string())
                })?;
                self.manager
                    .exchange_code(&code, &challenge.code_verifier, &self.redirect_uri)
                    .await?
            }
            (AuthFlow::Implicit, CallbackData::Token { access_token, expires_in, state }) => {
                validate_state(&self.state, state.as_deref())?;
                // The implicit grant never issues a refresh token.
                Credential::new(access_token, None, expires_in)
            }
            (flow, _) => {
                return Err(HomeboardError::Auth(format!(
                    "callback does not match {flow:?} flow"
                )));
            }
        };

        let credential = self.manager.install(credential).await?;
        self.server.shutdown().await?;
        Ok(credential)
    }
}

fn validate_state(expected: &str, received: Option<&str>) -> Result<()> {
    match received {
        Some(received) if received == expected => Ok(()),
        _ => Err(HomeboardError::Auth("state mismatch in authorization callback".to_string())),
    }
}

/// Data captured from the authorization redirect.
#[derive(Debug, Clone)]
enum CallbackData {
    /// Authorization code (PKCE flow).
    Code { code: String, state: Option<String> },
    /// Access token relayed from the redirect fragment (implicit flow).
    Token { access_token: String, expires_in: i64, state: Option<String> },
    /// Provider-reported error.
    Failed(String),
}

/// Loopback HTTP server that receives OAuth redirect callbacks.
///
/// The implicit grant returns the token in the URL fragment, which browsers
/// never send to servers; the callback page relays the fragment back as
/// query parameters before the server captures it.
pub struct CallbackServer {
    port: u16,
    callback_data: Arc<StdMutex<Option<CallbackData>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Start the loopback server on an ephemeral port.
    ///
    /// # Errors
    /// Returns `HomeboardError::Network` if the listener cannot be bound.
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| {
            HomeboardError::Network(format!("failed to bind OAuth loopback server: {err}"))
        })?;

        let port = listener
            .local_addr()
            .map_err(|err| HomeboardError::Network(format!("failed to determine port: {err}")))?
            .port();

        let callback_data: Arc<StdMutex<Option<CallbackData>>> = Arc::new(StdMutex::new(None));
        let callback_data_clone = Arc::clone(&callback_data);

        let app = Router::new().route(
            "/callback",
            get(move |query: Query<HashMap<String, String>>| {
                handle_callback(query, Arc::clone(&callback_data_clone))
            }),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("OAuth callback server error: {}", err);
            }
        });

        Ok(Self { port, callback_data, shutdown_tx: Some(shutdown_tx), handle: Some(handle) })
    }

    /// Redirect URI used in the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Await the redirect callback with a timeout.
    async fn wait_for_callback(&self, timeout: Duration) -> Result<CallbackData> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let guard = self
                    .callback_data
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if let Some(data) = guard.clone() {
                    return Ok(data);
                }
            }

            if Instant::now() > deadline {
                return Err(HomeboardError::Network(
                    "timed out waiting for authorization callback".into(),
                ));
            }

            sleep(Duration::from_millis(100)).await;
        }
    }

    /// Shut down the loopback server gracefully.
    async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    return Err(HomeboardError::Internal(format!(
                        "OAuth callback server panicked: {err}"
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_callback(
    Query(params): Query<HashMap<String, String>>,
    callback_data: Arc<StdMutex<Option<CallbackData>>>,
) -> Html<&'static str> {
    let captured = if let Some(access_token) = params.get("access_token") {
        Some(CallbackData::Token {
            access_token: access_token.clone(),
            expires_in: params
                .get("expires_in")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            state: params.get("state").cloned(),
        })
    } else if let Some(code) = params.get("code") {
        Some(CallbackData::Code { code: code.clone(), state: params.get("state").cloned() })
    } else if let Some(error) = params.get("error") {
        Some(CallbackData::Failed(error.clone()))
    } else {
        None
    };

    match captured {
        Some(data) => {
            let failed = matches!(data, CallbackData::Failed(_));
            let mut guard =
                callback_data.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = Some(data);

            if failed {
                Html(
                    r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>You can close this window.</p></body>
</html>"#,
                )
            } else {
                Html(
                    r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#,
                )
            }
        }
        // No query parameters: the implicit grant put everything in the URL
        // fragment. Relay it back as a query string.
        None => Html(
            r#"<!DOCTYPE html>
<html>
<head><title>Completing Authorization</title></head>
<body>
<p>Completing authorization&hellip;</p>
<script>
  if (window.location.hash.length > 1) {
    window.location.replace(
      window.location.pathname + "?" + window.location.hash.substring(1)
    );
  } else {
    document.body.textContent = "Authorization failed: no credentials in redirect.";
  }
</script>
</body>
</html>"#,
        ),
    }
}

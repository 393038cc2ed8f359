//! Credential-prompt login.
//!
//! [`PromptLoginHandler`] asks a [`CredentialPrompt`] for a user name and
//! password and posts them to a fixed login endpoint. A prompt that returns
//! no credentials cancels the chain.

use async_trait::async_trait;
use ssochain_core::{ChainRequest, ChainResponse, Transport};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use url::Url;

use crate::error::InteractionError;
use crate::interaction::{InteractionHandler, InteractionReply};

// ============================================================================
// Credentials
// ============================================================================

/// User name and password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user_name: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Credential Prompt
// ============================================================================

/// Source of login credentials, typically a user.
#[async_trait]
pub trait CredentialPrompt: Send + Sync {
    /// Asks for credentials to log in at `login_url`.
    ///
    /// `Ok(None)` means the user declined.
    async fn credentials(&self, login_url: &Url) -> Result<Option<Credentials>, InteractionError>;
}

/// Prompt answering with fixed credentials, or always declining.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Option<Credentials>,
}

impl StaticCredentials {
    /// Always answers with these credentials.
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Some(Credentials::new(user_name, password)),
        }
    }

    /// Always declines.
    pub fn declined() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialPrompt for StaticCredentials {
    async fn credentials(&self, _login_url: &Url) -> Result<Option<Credentials>, InteractionError> {
        Ok(self.credentials.clone())
    }
}

// ============================================================================
// Prompt Login Handler
// ============================================================================

/// Interaction handler that submits prompted credentials to a login endpoint.
///
/// The submission carries `userName`, `password`, `continueTo` and
/// `authorized=true` as form fields.
pub struct PromptLoginHandler {
    transport: Arc<dyn Transport>,
    prompt: Arc<dyn CredentialPrompt>,
    submit_url: Url,
    continue_to: String,
}

impl PromptLoginHandler {
    /// Creates a handler posting to `submit_url`.
    ///
    /// `continue_to` tells the login endpoint where to send the user after a
    /// successful login.
    pub fn new(
        transport: Arc<dyn Transport>,
        prompt: Arc<dyn CredentialPrompt>,
        submit_url: Url,
        continue_to: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            prompt,
            submit_url,
            continue_to: continue_to.into(),
        }
    }

    /// Creates a handler that continues to the path and query of `request`.
    pub fn for_request(
        transport: Arc<dyn Transport>,
        prompt: Arc<dyn CredentialPrompt>,
        submit_url: Url,
        request: &ChainRequest,
    ) -> Self {
        Self::new(transport, prompt, submit_url, request.path_and_query())
    }

    /// Where the login endpoint is told to continue to.
    pub fn continue_to(&self) -> &str {
        &self.continue_to
    }
}

#[async_trait]
impl InteractionHandler for PromptLoginHandler {
    fn name(&self) -> &str {
        "prompt-login"
    }

    async fn interact(
        &self,
        response: &mut ChainResponse,
        reply: InteractionReply,
    ) -> Result<(), InteractionError> {
        let login_url = response.resolved_url().clone();
        let Some(credentials) = self.prompt.credentials(&login_url).await? else {
            info!("Login declined");
            reply.cancel();
            return Ok(());
        };

        info!(user = %credentials.user_name, submit_url = %self.submit_url, "Submitting credentials");
        let request = ChainRequest::post_form(
            self.submit_url.clone(),
            Arc::clone(response.cookie_store()),
            [
                ("userName", credentials.user_name.as_str()),
                ("password", credentials.password.as_str()),
                ("continueTo", self.continue_to.as_str()),
                ("authorized", "true"),
            ],
        );
        let next = self.transport.send(request).await?;
        reply.continue_with(next);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ssochain_core::{ContinuationDecision, CookieStore, DecisionKind, TransportError};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: ChainRequest) -> Result<ChainResponse, TransportError> {
            let body = request.body.clone().unwrap_or_default();
            self.bodies
                .lock()
                .unwrap()
                .push(String::from_utf8(body.to_vec()).unwrap());
            Ok(ChainResponse::new(200, request.url, request.cookie_store))
        }
    }

    fn login_page() -> ChainResponse {
        ChainResponse::new(
            200,
            Url::parse("http://sso.test/login").unwrap(),
            Arc::new(CookieStore::new()),
        )
    }

    fn handler(transport: Arc<RecordingTransport>, prompt: StaticCredentials) -> PromptLoginHandler {
        let original = ChainRequest::parse_get(
            "http://app.test/resource?id=7",
            Arc::new(CookieStore::new()),
        )
        .unwrap();
        PromptLoginHandler::for_request(
            transport,
            Arc::new(prompt),
            Url::parse("http://sso.test/submitLogin").unwrap(),
            &original,
        )
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("test", "hunter2"));
        assert!(debug.contains("test"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_submits_credentials() {
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(transport.clone(), StaticCredentials::new("test", "secret"));
        assert_eq!(handler.continue_to(), "/resource?id=7");

        let (reply, decision) = InteractionReply::channel();
        handler.interact(&mut login_page(), reply).await.unwrap();

        let ContinuationDecision::Continue(next) = decision.await.unwrap() else {
            panic!("expected a continuation");
        };
        assert_eq!(next.resolved_url().path(), "/submitLogin");
        assert_eq!(
            transport.bodies.lock().unwrap().as_slice(),
            ["userName=test&password=secret&continueTo=%2Fresource%3Fid%3D7&authorized=true"]
        );
    }

    #[tokio::test]
    async fn test_declined_prompt_cancels() {
        let transport = Arc::new(RecordingTransport::default());
        let handler = handler(transport.clone(), StaticCredentials::declined());

        let (reply, decision) = InteractionReply::channel();
        handler.interact(&mut login_page(), reply).await.unwrap();

        assert_eq!(decision.await.unwrap().kind(), DecisionKind::Cancel);
        assert!(transport.bodies.lock().unwrap().is_empty());
    }
}

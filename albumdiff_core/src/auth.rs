use crate::credentials::{CredentialManager, GoogleToken};
use albumdiff_common::AlbumDiffError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

pub const PHOTOS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/photoslibrary.readonly";

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_PORT: u16 = 8080;
const CONSENT_TIMEOUT_SECS: u64 = 300;
const MAX_REQUEST_HEAD_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this window and return to albumdiff.</p></body></html>";

/// OAuth client registration from a Google Cloud Console `client_secret.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn from_file(path: &Path) -> Result<Self, AlbumDiffError> {
        let data = fs::read_to_string(path).map_err(|e| {
            AlbumDiffError::Auth(format!("Cannot read client secret {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    /// Accepts both the "installed" and "web" application layouts
    pub fn from_json(data: &str) -> Result<Self, AlbumDiffError> {
        let file: ClientSecretFile = serde_json::from_str(data)
            .map_err(|e| AlbumDiffError::Auth(format!("Invalid client secret file: {}", e)))?;
        file.installed.or(file.web).ok_or_else(|| {
            AlbumDiffError::Auth("Client secret file has no \"installed\" or \"web\" section".to_string())
        })
    }

    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AlbumDiffError> {
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", PHOTOS_READONLY_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AlbumDiffError::Auth(format!("Invalid auth URI: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Google omits the refresh token on refresh responses; keep the old one
    fn into_token(
        self,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        previous_refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<GoogleToken, AlbumDiffError> {
        let expiry = match self.expires_in {
            Some(secs) => Some(
                Duration::try_seconds(secs)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AlbumDiffError::Auth(format!("Token lifetime out of range: {}s", secs))
                    })?,
            ),
            None => None,
        };

        Ok(GoogleToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expiry,
            token_uri: token_uri.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| vec![PHOTOS_READONLY_SCOPE.to_string()]),
        })
    }
}

/// Result of the browser redirect back to the loopback listener
#[derive(Debug, PartialEq, Eq)]
struct Redirect {
    code: String,
    state: String,
}

fn parse_redirect(request_line: &str) -> Result<Redirect, AlbumDiffError> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AlbumDiffError::Auth("Malformed OAuth redirect".to_string()))?;
    let url = Url::parse("http://localhost")
        .and_then(|base| base.join(target))
        .map_err(|e| AlbumDiffError::Auth(format!("Malformed OAuth redirect: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(AlbumDiffError::Auth(format!("Authorization denied: {}", value)));
            }
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok(Redirect { code, state }),
        _ => Err(AlbumDiffError::Auth(
            "OAuth redirect is missing the code or state parameter".to_string(),
        )),
    }
}

type Prompt = Box<dyn Fn(&Url) + Send + Sync>;

/// Google Photos OAuth 2.0 for installed applications.
///
/// Reuses the token cached in the [`CredentialManager`] while it is valid,
/// refreshes it when possible and otherwise walks the user through the
/// browser consent flow.
pub struct GooglePhotosAuth {
    client_secret_path: Option<PathBuf>,
    credentials: CredentialManager,
    redirect_port: u16,
    prompt: Prompt,
    client: Arc<Client>,
    runtime: Arc<Runtime>,
}

impl GooglePhotosAuth {
    pub fn new(
        client_secret_path: Option<PathBuf>,
        credentials: CredentialManager,
    ) -> Result<Self, AlbumDiffError> {
        let runtime = Runtime::new()
            .map_err(|e| AlbumDiffError::Auth(format!("Failed to create async runtime: {}", e)))?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AlbumDiffError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client_secret_path,
            credentials,
            redirect_port: DEFAULT_REDIRECT_PORT,
            prompt: Box::new(|url| {
                eprintln!("Open this URL in your browser to authorize albumdiff:\n\n    {}\n", url);
            }),
            client: Arc::new(client),
            runtime: Arc::new(runtime),
        })
    }

    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = port;
        self
    }

    /// Replace how the consent URL is shown to the user
    pub fn with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&Url) + Send + Sync + 'static,
    {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn authenticate(&self) -> Result<GoogleToken, AlbumDiffError> {
        if let Some(token) = self.credentials.load_google_token()? {
            if token.is_valid() {
                debug!("Using cached Google Photos token");
                return Ok(token);
            }

            if token.can_refresh() {
                match self.refresh(&token) {
                    Ok(refreshed) => {
                        self.credentials.save_google_token(&refreshed)?;
                        info!("Refreshed Google Photos token");
                        return Ok(refreshed);
                    }
                    Err(e) => warn!("Token refresh failed, falling back to consent flow: {}", e),
                }
            }
        }

        let secret_path = self.client_secret_path.as_ref().ok_or_else(|| {
            AlbumDiffError::Auth(
                "Google credentials file not found. Download client_secret.json from \
                 Google Cloud Console and pass its path."
                    .to_string(),
            )
        })?;
        let secret = ClientSecret::from_file(secret_path)?;

        let token = self.run_consent_flow(&secret)?;
        self.credentials.save_google_token(&token)?;
        info!("Google Photos authorization complete");
        Ok(token)
    }

    /// Exchange the refresh token for a new access token
    pub fn refresh(&self, token: &GoogleToken) -> Result<GoogleToken, AlbumDiffError> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| AlbumDiffError::Auth("Token has no refresh token".to_string()))?;

        let form = [
            ("client_id", token.client_id.as_str()),
            ("client_secret", token.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.request_token(&token.token_uri, &form)?;

        response.into_token(
            &token.token_uri,
            &token.client_id,
            &token.client_secret,
            Some(refresh_token),
            Utc::now(),
        )
    }

    fn request_token(&self, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse, AlbumDiffError> {
        self.runtime.block_on(async {
            let response = self
                .client
                .post(token_uri)
                .form(form)
                .send()
                .await
                .map_err(|e| AlbumDiffError::Auth(format!("Token request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AlbumDiffError::Auth(format!(
                    "Token endpoint returned {}: {}",
                    status,
                    body.trim()
                )));
            }

            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AlbumDiffError::Auth(format!("Invalid token response: {}", e)))
        })
    }

    fn run_consent_flow(&self, secret: &ClientSecret) -> Result<GoogleToken, AlbumDiffError> {
        // Port 0 picks a free port; the redirect URI uses whatever was bound
        let listener = self
            .runtime
            .block_on(TcpListener::bind(("127.0.0.1", self.redirect_port)))?;
        let redirect_uri = format!("http://127.0.0.1:{}/", listener.local_addr()?.port());

        let state = Uuid::new_v4().simple().to_string();
        let auth_url = secret.authorization_url(&redirect_uri, &state)?;
        (self.prompt)(&auth_url);

        let redirect = self.runtime.block_on(async {
            tokio::time::timeout(
                std::time::Duration::from_secs(CONSENT_TIMEOUT_SECS),
                accept_redirect(&listener),
            )
            .await
            .map_err(|_| AlbumDiffError::Auth("Timed out waiting for authorization".to_string()))?
        })?;

        if redirect.state != state {
            return Err(AlbumDiffError::Auth(
                "OAuth state mismatch; ignoring redirect".to_string(),
            ));
        }

        let form = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", redirect.code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self.request_token(&secret.token_uri, &form)?;

        response.into_token(
            &secret.token_uri,
            &secret.client_id,
            &secret.client_secret,
            None,
            Utc::now(),
        )
    }
}

/// Read up to the blank line ending the request head
async fn read_request_head<R>(reader: &mut R) -> Result<Vec<u8>, AlbumDiffError>
where
    R: AsyncRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        if head.len() > MAX_REQUEST_HEAD_BYTES {
            return Err(AlbumDiffError::Auth(format!(
                "OAuth redirect request exceeds {} bytes",
                MAX_REQUEST_HEAD_BYTES
            )));
        }

        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
    }
    Ok(head)
}

async fn accept_redirect(listener: &TcpListener) -> Result<Redirect, AlbumDiffError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        debug!("OAuth redirect connection from {}", peer);

        let head = match read_request_head(&mut stream).await {
            Ok(head) => head,
            Err(e) => {
                warn!("Dropping OAuth redirect connection from {}: {}", peer, e);
                let _ = stream
                    .write_all(b"HTTP/1.1 431 Request Header Fields Too Large\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                    .await;
                continue;
            }
        };

        let request = String::from_utf8_lossy(&head);
        let request_line = request.lines().next().unwrap_or_default();

        // Browsers also ask for /favicon.ico; only the redirect carries a query
        if !request_line.contains('?') {
            let _ = stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await;
            continue;
        }

        let result = parse_redirect(request_line);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            SUCCESS_PAGE.len(),
            SUCCESS_PAGE
        );
        let _ = stream.write_all(response.as_bytes()).await;
        return result;
    }
}

use std::time::Duration;

use ashpd::desktop::open_uri::OpenFileRequest;
use gdrive_core::{DRIVE_SCOPE, OAuthClient, OAuthToken};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

/// Redirect target for manual entry; the browser fails to load it, but the
/// address bar still carries the code.
const MANUAL_REDIRECT_URI: &str = "http://127.0.0.1";
const DEFAULT_OAUTH_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("oauth error: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization code missing in redirect")]
    MissingCode,
    #[error("authorization denied: {0}")]
    Denied(String),
    #[error("authorization timed out")]
    Timeout,
}

/// Interactive consent for the Drive scope, ending in a token exchange.
pub struct OAuthFlow {
    client: OAuthClient,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    pub async fn authenticate(&self) -> Result<OAuthToken, OAuthFlowError> {
        if env_flag("GDRIVE_OAUTH_FORCE_MANUAL") {
            return self.authenticate_manual().await;
        }
        match self.authenticate_via_loopback().await {
            Ok(token) => Ok(token),
            Err(OAuthFlowError::Io(err)) => {
                tracing::warn!(
                    error = %err,
                    "loopback authorization unavailable, falling back to manual code entry"
                );
                self.authenticate_manual().await
            }
            Err(err) => Err(err),
        }
    }

    async fn authenticate_via_loopback(&self) -> Result<OAuthToken, OAuthFlowError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", addr.port());
        let url = self.client.authorize_url(&redirect_uri, DRIVE_SCOPE, None);

        if let Err(err) = OpenFileRequest::default().ask(true).send_uri(&url).await {
            tracing::debug!(error = %err, "desktop portal could not open the browser");
            eprintln!("Open this URL in your browser to authorize Google Drive access:\n{url}");
        }

        let (mut stream, _) = tokio::time::timeout(oauth_timeout(), listener.accept())
            .await
            .map_err(|_| OAuthFlowError::Timeout)??;

        let mut request = vec![0u8; 8192];
        let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut request))
            .await
            .map_err(|_| OAuthFlowError::Timeout)??;
        let request_text = String::from_utf8_lossy(&request[..read]);
        let callback = parse_callback_request(&request_text);

        let _ = stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
                <html><body><h2>Google Drive connected</h2><p>You can close this tab.</p></body></html>",
            )
            .await;
        let _ = stream.shutdown().await;

        let code = callback?;
        Ok(self.client.exchange_code(&code, &redirect_uri).await?)
    }

    async fn authenticate_manual(&self) -> Result<OAuthToken, OAuthFlowError> {
        let url = self
            .client
            .authorize_url(MANUAL_REDIRECT_URI, DRIVE_SCOPE, None);
        println!("Open this URL in your browser:\n{url}");
        println!("After approving, paste the address the browser was sent to (or just the code).");
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"Authorization code: ").await?;
        stdout.flush().await?;
        let code = read_code(BufReader::new(tokio::io::stdin())).await?;
        Ok(self.client.exchange_code(&code, MANUAL_REDIRECT_URI).await?)
    }
}

fn parse_callback_request(request: &str) -> Result<String, OAuthFlowError> {
    let request_line = request.lines().next().ok_or(OAuthFlowError::MissingCode)?;
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or(OAuthFlowError::MissingCode)?;
    let request_url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target)
    } else {
        Url::parse(&format!("http://127.0.0.1{target}"))
    }
    .map_err(|_| OAuthFlowError::MissingCode)?;

    if let Some(reason) = query_value(&request_url, "error") {
        return Err(OAuthFlowError::Denied(reason));
    }
    query_value(&request_url, "code").ok_or(OAuthFlowError::MissingCode)
}

async fn read_code<R: AsyncBufRead + Unpin>(mut reader: R) -> Result<String, OAuthFlowError> {
    let mut input = String::new();
    reader.read_line(&mut input).await?;
    extract_code_from_input(&input).ok_or(OAuthFlowError::MissingCode)
}

fn extract_code_from_input(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => query_value(&url, "code"),
        Err(_) => Some(input.to_string()),
    }
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find_map(|(name, value)| (name == key && !value.is_empty()).then(|| value.into_owned()))
}

fn oauth_timeout() -> Duration {
    let secs = std::env::var("GDRIVE_OAUTH_TIMEOUT_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_OAUTH_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

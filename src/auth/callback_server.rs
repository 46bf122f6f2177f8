//! Loopback redirect listener
//!
//! Accepts the single browser redirect that ends the authorization step and
//! extracts the authorization code from it.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use crate::Result;
use crate::error::Error;

const DONE_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Konsol</title></head>\
<body style=\"font-family:sans-serif;text-align:center;margin-top:20vh\">\
<h1>Signed in</h1><p>You can close this tab and return to the terminal.</p></body></html>";

const FAILED_PAGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Konsol</title></head>\
<body style=\"font-family:sans-serif;text-align:center;margin-top:20vh\">\
<h1>Sign-in failed</h1><p>Check the terminal for details.</p></body></html>";

/// Authorization code delivered by the redirect
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub state: Option<String>,
}

/// Redirect URI registered for the loopback listener
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/callback", port)
}

/// Bind the loopback listener before the browser is sent off, so the
/// redirect cannot race the bind.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await
        .map_err(|e| Error::Identity(format!("Cannot listen on {}: {}", addr, e)))?;
    tracing::info!("Redirect listener on http://{}", addr);
    Ok(listener)
}

/// Serve one redirect and return the code it carried
pub async fn receive_code(listener: TcpListener, expected_state: &str) -> Result<AuthorizationCode> {
    let (mut socket, peer) = listener.accept().await
        .map_err(|e| Error::Identity(format!("Redirect listener failed: {}", e)))?;
    tracing::debug!("Redirect received from {}", peer);

    let mut buffer = vec![0u8; 8192];
    let n = socket.read(&mut buffer).await
        .map_err(|e| Error::Identity(format!("Cannot read redirect: {}", e)))?;

    let request = String::from_utf8_lossy(&buffer[..n]);
    let result = parse_redirect(&request, expected_state);

    let (status, body) = match &result {
        Ok(_) => ("200 OK", DONE_PAGE),
        Err(_) => ("400 Bad Request", FAILED_PAGE),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    // The browser page is cosmetic; the code is what matters.
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    result
}

fn parse_redirect(request: &str, expected_state: &str) -> Result<AuthorizationCode> {
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| Error::Identity("Malformed redirect request".to_string()))?;

    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(target))
        .map_err(|e| Error::Identity(format!("Malformed redirect target: {}", e)))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    if let Some(error) = param("error") {
        let description = param("error_description").unwrap_or_default();
        return Err(Error::Identity(format!("Authorization denied: {} {}", error, description).trim_end().to_string()));
    }

    let state = param("state");
    if state.as_deref() != Some(expected_state) {
        return Err(Error::Identity("Redirect state does not match this login attempt".to_string()));
    }

    let code = param("code")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Identity("Redirect carried no authorization code".to_string()))?;

    Ok(AuthorizationCode { code, state })
}

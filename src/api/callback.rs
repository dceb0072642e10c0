//! A one-shot HTTP server on the loopback interface that receives the OAuth redirect.

use crate::error::{Error, ErrorType, Res};
use anyhow::{anyhow, Context};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, trace};

const SUCCESS_PAGE: &str = "Authentication complete. You can close this window and return to the \
terminal.";
const FAILURE_PAGE: &str = "Authentication failed. Return to the terminal for details.";

/// Listens on `127.0.0.1` on a port chosen by the operating system.
pub(super) struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    pub(super) async fn bind() -> Res<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .context("Unable to start the local OAuth callback server")?;
        let addr = listener
            .local_addr()
            .context("Unable to get the address of the OAuth callback server")?;
        debug!("OAuth callback server listening on {addr}");
        Ok(Self { listener, addr })
    }

    /// The redirect URI to register with the authorization request.
    pub(super) fn redirect_uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Serves requests until one carries an authorization response, then returns the code. The
    /// `state` parameter must equal `expected_state`.
    pub(super) async fn wait_for_code(self, expected_state: &str, timeout: Duration) -> Res<String> {
        let (tx, mut rx) = mpsc::channel::<Res<String>>(1);
        let expected_state = expected_state.to_string();
        let listener = self.listener;

        let server = tokio::spawn(async move {
            loop {
                let stream = match listener.accept().await {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        debug!("Failed to accept a connection on the callback server: {e}");
                        continue;
                    }
                };
                let tx = tx.clone();
                let expected_state = expected_state.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let tx = tx.clone();
                        let outcome = parse_callback(req.uri().query(), &expected_state);
                        async move { Ok::<_, Infallible>(respond(outcome, &tx).await) }
                    });
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        trace!("Callback connection closed with an error: {e}");
                    }
                });
            }
        });

        let received = tokio::time::timeout(timeout, rx.recv()).await;
        server.abort();
        match received {
            Ok(Some(outcome)) => outcome,
            Ok(None) => Err(anyhow!("The OAuth callback server stopped unexpectedly")),
            Err(_) => Err(Error::msg(
                ErrorType::Auth,
                format!(
                    "Timed out after {} seconds waiting for the browser to complete sign in",
                    timeout.as_secs()
                ),
            )
            .into()),
        }
    }
}

async fn respond(outcome: Option<Res<String>>, tx: &mpsc::Sender<Res<String>>) -> Response<String> {
    let (status, page) = match &outcome {
        None => (StatusCode::NOT_FOUND, String::from("Not found")),
        Some(Ok(_)) => (StatusCode::OK, SUCCESS_PAGE.to_string()),
        Some(Err(_)) => (StatusCode::BAD_REQUEST, FAILURE_PAGE.to_string()),
    };
    if let Some(outcome) = outcome {
        // Only the first response is read; later sends fail harmlessly.
        let _ = tx.send(outcome).await;
    }
    let mut response = Response::new(page);
    *response.status_mut() = status;
    response
}

/// Interprets the query string of a request to the redirect URI. `None` means the request is not an
/// authorization response at all (e.g. the browser asking for a favicon).
fn parse_callback(query: Option<&str>, expected_state: &str) -> Option<Res<String>> {
    let query = query?;
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(Error::msg(
            ErrorType::Auth,
            format!("Google declined the authorization request: {error}"),
        )
        .into()));
    }
    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(Error::msg(
            ErrorType::Auth,
            "The state parameter of the OAuth callback did not match, the request was rejected",
        )
        .into()));
    }
    Some(Ok(code))
}

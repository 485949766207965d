// SPDX-FileCopyrightText: 2026 Civica Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport built on tokio-tungstenite.

use async_trait::async_trait;
use civica_core::{CivicaError, EventConnection, EventConnector};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Opens WebSocket connections, sending the credential as a bearer token
/// on the upgrade request.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl EventConnector for WsConnector {
    async fn open(
        &self,
        url: &str,
        credential: &str,
    ) -> Result<Box<dyn EventConnection>, CivicaError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| CivicaError::Config(format!("invalid realtime url '{url}': {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|_| CivicaError::Config("credential is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, response) = connect_async(request).await.map_err(handshake_error)?;
        debug!(status = %response.status(), "websocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

fn handshake_error(err: tungstenite::Error) -> CivicaError {
    match err {
        tungstenite::Error::Http(response)
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            CivicaError::Rejected {
                status: response.status().as_u16(),
                message: "credential refused".into(),
            }
        }
        other => CivicaError::Channel {
            message: format!("websocket handshake failed: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<String, CivicaError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(CivicaError::Channel {
                        message: format!("websocket read failed: {e}"),
                        source: Some(Box::new(e)),
                    }));
                }
            }
        }
    }

    async fn send_frame(&mut self, text: String) -> Result<(), CivicaError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| CivicaError::Channel {
                message: format!("websocket write failed: {e}"),
                source: Some(Box::new(e)),
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "error while closing websocket");
        }
    }
}

//! WebSocket connector (tokio-tungstenite)

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{Connector, Link, TransportEvent};
use crate::error::{Result, SyncError};

/// Real network transport
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &Url) -> Result<Link> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SyncError::WebSocket(e.to_string()))?;
        info!("🔌 WebSocket open: {}", url);

        let (mut sink, mut stream) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        // Writer: forwards outbound frames until the sender side is dropped
        let pong_tx = {
            let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<Vec<u8>>();
            tokio::spawn(async move {
                loop {
                    let msg = tokio::select! {
                        frame = out_rx.recv() => match frame {
                            Some(text) => Message::Text(text),
                            None => break,
                        },
                        Some(payload) = pong_rx.recv() => Message::Pong(payload),
                    };
                    if let Err(e) = sink.send(msg).await {
                        warn!("WebSocket send failed: {}", e);
                        break;
                    }
                }
                let _ = sink.close().await;
                debug!("WebSocket writer stopped");
            });
            pong_tx
        };

        // Reader: maps the stream onto transport events
        tokio::spawn(async move {
            loop {
                let event = match stream.next().await {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = pong_tx.send(payload);
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server closed the socket: {:?}", frame);
                        TransportEvent::Closed
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    None => TransportEvent::Closed,
                };
                let terminal = !matches!(event, TransportEvent::Frame(_));
                if in_tx.send(event).is_err() || terminal {
                    break;
                }
            }
            debug!("WebSocket reader stopped");
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

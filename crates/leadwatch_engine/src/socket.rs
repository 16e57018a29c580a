//! Progress push channel.
//!
//! The socket is a latency optimization only: polling keeps running beside
//! it, so connection failures and unreadable frames are logged and dropped.

use futures_util::StreamExt;
use leadwatch_core::{JobProgressSnapshot, SocketMessage};
use leadwatch_logging::{leadwatch_debug, leadwatch_warn};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

const SUBSCRIPTION_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Envelope {
    Connected {
        #[serde(default)]
        progress: Option<JobProgressSnapshot>,
    },
    Progress {
        #[serde(default)]
        data: Option<JobProgressSnapshot>,
    },
    Completion,
}

/// Decodes one text frame. Never fails; anything unreadable becomes
/// [`SocketMessage::Malformed`].
pub fn parse_socket_message(text: &str) -> SocketMessage {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope::Connected { progress }) => SocketMessage::Connected(progress),
        Ok(Envelope::Progress { data: Some(data) }) => SocketMessage::Progress(data),
        Ok(Envelope::Progress { data: None }) => {
            SocketMessage::Malformed("progress message without data".to_string())
        }
        Ok(Envelope::Completion) => SocketMessage::Completion,
        Err(err) => SocketMessage::Malformed(err.to_string()),
    }
}

/// Cancellable subscription to a job's progress socket.
///
/// Yields typed messages until the socket closes, fails, or the subscription
/// is cancelled. Dropping the subscription cancels it.
#[derive(Debug)]
pub struct ProgressSubscription {
    rx: mpsc::Receiver<SocketMessage>,
    cancel: CancellationToken,
}

impl ProgressSubscription {
    /// Starts connecting in the background. Must be called inside a tokio runtime.
    pub fn connect(url: Url) -> Self {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let cancel = CancellationToken::new();
        tokio::spawn(run_socket(url, tx, cancel.clone()));
        Self { rx, cancel }
    }

    /// Next message, or `None` once the socket is gone.
    pub async fn next(&mut self) -> Option<SocketMessage> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_socket(url: Url, tx: mpsc::Sender<SocketMessage>, cancel: CancellationToken) {
    let connect = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        connect = connect_async(url.as_str()) => connect,
    };
    let mut ws = match connect {
        Ok((ws, _response)) => ws,
        Err(err) => {
            leadwatch_debug!("progress socket {} unavailable: {}", url, err);
            return;
        }
    };
    leadwatch_debug!("progress socket {} connected", url);

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = ws.close(None).await;
                return;
            }
            frame = ws.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                let message = parse_socket_message(text.as_str());
                if let SocketMessage::Malformed(reason) = &message {
                    leadwatch_warn!("dropping malformed progress message: {}", reason);
                }
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                leadwatch_debug!("progress socket {} failed: {}", url, err);
                break;
            }
        }
    }
    leadwatch_debug!("progress socket {} closed", url);
}

//! Message sources: the seam between the pipeline and the messaging
//! network client.
//!
//! Session management against the real network lives outside this
//! repository; anything that can produce [`InboundMessage`] values can
//! drive the pipeline. Two sources ship here: an in-process channel for
//! embedding and tests, and an NDJSON reader over stdin for bridging an
//! external client process.

use async_trait::async_trait;
use ordersieve_protocol::InboundMessage;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;

/// An async stream of inbound messages.
#[async_trait]
pub trait MessageSource: Send {
    /// The next admissible message, or `None` when the source is done.
    async fn next_message(&mut self) -> Option<InboundMessage>;
}

/// Messages from self or from bots never enter the pipeline, and neither
/// do updates with no body at all.
pub(crate) fn admissible(message: &InboundMessage) -> bool {
    if message
        .author
        .as_ref()
        .is_some_and(|a| a.is_bot || a.is_self)
    {
        return false;
    }
    message.body().is_some()
}

/// In-process source backed by an mpsc channel.
pub struct ChannelSource {
    receiver: mpsc::Receiver<InboundMessage>,
}

impl ChannelSource {
    /// Create a source and the sender side that feeds it.
    pub fn new(buffer: usize) -> (mpsc::Sender<InboundMessage>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Option<InboundMessage> {
        loop {
            let message = self.receiver.recv().await?;
            if admissible(&message) {
                return Some(message);
            }
            tracing::debug!("update filtered at the source");
        }
    }
}

/// NDJSON source over stdin: one [`InboundMessage`] per line.
///
/// Lines that do not parse are logged and skipped so one malformed
/// update cannot stall the bridge.
pub struct StdinSource {
    lines: tokio::io::Lines<BufReader<Stdin>>,
}

impl StdinSource {
    /// Attach to the process stdin.
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSource for StdinSource {
    async fn next_message(&mut self) -> Option<InboundMessage> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(err) => {
                    tracing::warn!(%err, "stdin read failed, source closed");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InboundMessage>(&line) {
                Ok(message) if admissible(&message) => return Some(message),
                Ok(_) => tracing::debug!("update filtered at the source"),
                Err(err) => tracing::warn!(%err, "skipping malformed update line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ordersieve_protocol::{Author, ChatKind, ChatRef};

    fn message(text: Option<&str>, author: Option<Author>) -> InboundMessage {
        InboundMessage {
            id: "1".into(),
            chat: ChatRef {
                id: "-1".into(),
                name: "c".into(),
                kind: ChatKind::Group,
                username: None,
            },
            author,
            text: text.map(Into::into),
            caption: None,
            has_media: false,
            forwarded: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn channel_source_filters_bots_and_self() {
        let (sender, mut source) = ChannelSource::new(8);

        let bot = Author {
            id: "b".into(),
            name: None,
            is_bot: true,
            is_self: false,
        };
        let own = Author {
            id: "s".into(),
            name: None,
            is_bot: false,
            is_self: true,
        };
        let human = Author {
            id: "h".into(),
            name: None,
            is_bot: false,
            is_self: false,
        };

        sender.send(message(Some("from bot"), Some(bot))).await.unwrap();
        sender.send(message(Some("from self"), Some(own))).await.unwrap();
        sender.send(message(None, Some(human.clone()))).await.unwrap();
        sender.send(message(Some("real"), Some(human))).await.unwrap();
        drop(sender);

        let next = source.next_message().await.unwrap();
        assert_eq!(next.text.as_deref(), Some("real"));
        assert!(source.next_message().await.is_none());
    }
}

// ── Outbound dispatch ──
//
// Encodes commands and hands them to the group-chat session queue.
// Sends are fire-and-forget: a full or closed queue drops the command.

use esmart_api::GroupChatMessage;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::codec::OperationCodec;
use crate::command::OutboundCommand;
use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    codec: OperationCodec,
    tx: mpsc::Sender<GroupChatMessage>,
}

impl Dispatcher {
    pub fn new(codec: OperationCodec, tx: mpsc::Sender<GroupChatMessage>) -> Self {
        Self { codec, tx }
    }

    pub fn codec(&self) -> &OperationCodec {
        &self.codec
    }

    /// Encode `command` and enqueue exactly one envelope. Never waits.
    pub fn dispatch(&self, command: &OutboundCommand) -> Result<(), CoreError> {
        let message = self.codec.message(command)?;
        match self.tx.try_send(message) {
            Ok(()) => {
                tracing::debug!(node_id = %command.id, "Operation queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(CoreError::QueueFull {
                node_id: command.id.clone(),
            }),
            Err(TrySendError::Closed(_)) => Err(CoreError::Disconnected),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::CommandFields;
    use serde_json::{Value, json};

    fn dispatcher(capacity: usize) -> (Dispatcher, mpsc::Receiver<GroupChatMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let codec = OperationCodec::new("alice@myesmart.net", "home@conference.myesmart.net");
        (Dispatcher::new(codec, tx), rx)
    }

    #[test]
    fn dispatch_enqueues_one_message() {
        let (dispatcher, mut rx) = dispatcher(4);
        dispatcher
            .dispatch(&OutboundCommand::new(9, CommandFields::power(true)))
            .unwrap();

        let message = rx.try_recv().unwrap();
        let body: Value = serde_json::from_str(&message.body).unwrap();
        assert_eq!(body["body"], json!([{"id": 9, "onoff": "on"}]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn full_queue_drops_command() {
        let (dispatcher, _rx) = dispatcher(1);
        let command = OutboundCommand::new(1, CommandFields::power(true));
        dispatcher.dispatch(&command).unwrap();
        assert!(matches!(
            dispatcher.dispatch(&command),
            Err(CoreError::QueueFull { .. })
        ));
    }

    #[test]
    fn closed_queue_reports_disconnected() {
        let (dispatcher, rx) = dispatcher(1);
        drop(rx);
        assert!(matches!(
            dispatcher.dispatch(&OutboundCommand::new(1, CommandFields::power(false))),
            Err(CoreError::Disconnected)
        ));
    }
}

//! Does all communication related stuff with the web socket, using ewebsock.

use crate::traits::Link;
use bytes::Bytes;
use ewebsock::WsEvent::{Closed, Error, Message};
use ewebsock::{WsMessage, WsReceiver, WsSender};
use protocol::{ClientEvent, ServerEvent};

/// The websocket to the relay server.
pub struct Connection {
    sender: WsSender,
    receiver: WsReceiver,
}

impl Connection {
    /// Initiates the connection. Frames sent before the socket is open get queued by ewebsock.
    pub fn open(url: &str) -> Result<Connection, String> {
        let options = ewebsock::Options::default();
        let (sender, receiver) = ewebsock::connect(url, options)
            .map_err(|_| "Could not reach websocket api".to_string())?;
        tracing::info!(url, "Connecting to relay.");
        Ok(Connection { sender, receiver })
    }

    fn try_recv_binary(&mut self) -> Result<Option<Vec<u8>>, String> {
        loop {
            match self.receiver.try_recv() {
                Some(Message(WsMessage::Binary(msg))) => return Ok(Some(msg)),
                Some(Closed) => return Err("Connection closed by server".to_string()),
                Some(Error(context)) => return Err(context),
                Some(_) => continue, // Ignore other message types, keep checking
                None => return Ok(None),
            }
        }
    }
}

impl Link for Connection {
    fn send(&mut self, event: ClientEvent) {
        match event.encode() {
            Ok(frame) => self.sender.send(WsMessage::Binary(frame.to_vec())),
            Err(error) => tracing::error!(?error, "Could not encode client event."),
        }
    }

    fn poll(&mut self) -> Result<Vec<ServerEvent>, String> {
        let mut result = Vec::new();
        while let Some(data) = self.try_recv_binary()? {
            let bytes = Bytes::from(data);
            match ServerEvent::decode(&bytes) {
                Ok(ServerEvent::ServerError(text)) => return Err(text),
                Ok(event) => result.push(event),
                // A broken gameplay frame of the peer is dropped, the next one replaces it anyway.
                Err(error) => tracing::warn!(?error, "Dropping undecodable frame."),
            }
        }
        Ok(result)
    }
}

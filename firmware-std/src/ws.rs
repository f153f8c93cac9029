//! WebSocket transport.
//!
//! The HTTP server task receives text frames and offers them to the
//! command queue without blocking. Outbound messages fan out to every open
//! session through detached senders held by the control thread.

use std::sync::{Arc, Mutex};

use esp_idf_svc::http::server::ws::{EspHttpWsConnection, EspHttpWsDetachedSender};
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::sys::EspError;
use esp_idf_svc::ws::FrameType;

use fmradio::comm::Outbox;
use fmradio::inbox::CommandSender;
use fmradio::protocol::MAX_INBOUND_LEN;

/// URI the remote UI connects to
pub const WS_PATH: &str = "/";

type Sessions = Arc<Mutex<Vec<(i32, EspHttpWsDetachedSender)>>>;

/// Broadcast side of the transport. Clones share the session list.
#[derive(Clone)]
pub struct WsBroadcast {
    sessions: Sessions,
}

impl WsBroadcast {
    pub fn peers(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Outbox for WsBroadcast {
    fn broadcast(&mut self, msg: &str) {
        let Ok(mut sessions) = self.sessions.lock() else {
            log::error!("session list poisoned, broadcast skipped");
            return;
        };
        sessions.retain_mut(|(session, sender)| {
            match sender.send(FrameType::Text(false), msg.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("peer {} send failed, dropping session: {}", session, e);
                    false
                }
            }
        });
    }
}

/// Start the HTTP server and register the WebSocket handler.
pub fn start(commands: CommandSender) -> Result<(EspHttpServer<'static>, WsBroadcast), EspError> {
    let mut server = EspHttpServer::new(&Configuration::default())?;
    let sessions: Sessions = Arc::new(Mutex::new(Vec::new()));
    let handler_sessions = sessions.clone();

    server.ws_handler(WS_PATH, move |ws: &mut EspHttpWsConnection| -> Result<(), EspError> {
        let session = ws.session();

        if ws.is_new() {
            let sender = ws.create_detached_sender()?;
            if let Ok(mut list) = handler_sessions.lock() {
                list.push((session, sender));
                log::info!("peer {} connected ({} open)", session, list.len());
            }
            return Ok(());
        }

        if ws.is_closed() {
            if let Ok(mut list) = handler_sessions.lock() {
                list.retain(|(id, _)| *id != session);
                log::info!("peer {} disconnected ({} open)", session, list.len());
            }
            return Ok(());
        }

        let (frame_type, len) = ws.recv(&mut [])?;
        if len > MAX_INBOUND_LEN {
            // Drain it; the queue counts the drop
            let mut oversized = vec![0u8; len];
            ws.recv(&mut oversized)?;
            commands.offer(&oversized);
            return Ok(());
        }

        let mut buf = [0u8; MAX_INBOUND_LEN];
        ws.recv(&mut buf[..len])?;
        match frame_type {
            FrameType::Text(_) | FrameType::Binary(_) => {
                commands.offer(&buf[..len]);
            }
            other => log::debug!("peer {} sent {:?} frame, ignored", session, other),
        }
        Ok(())
    })?;

    log::info!("WebSocket endpoint listening on {}", WS_PATH);
    Ok((server, WsBroadcast { sessions }))
}

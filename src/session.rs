//! One live connection to one chat room.
//!
//! A [`RoomSession`] is bound to a single (room, identity) pair at a time.
//! Binding to another room tears the old connection down and clears the log
//! before anything from the new room can show up.
use std::sync::{Arc, Once};

use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::{handshake::client::Request, Message}};
use tracing::{debug, info, warn};

use crate::{
    config::ChatConfig,
    error::ChatResult,
    models::{ChatMessage, Frame, Identity, OutgoingMessage},
    state::RoomView,
};

type View = Arc<watch::Sender<RoomView>>;

static TLS_PROVIDER: Once = Once::new();

/// rustls needs a process-wide crypto provider before the first `wss` dial.
fn install_tls_provider() {
    TLS_PROVIDER.call_once(|| {
        // Err only means someone else installed one first
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/* ------------ one binding ------------ */
struct Link {
    room:       String,
    generation: u64,
    outbox:     mpsc::UnboundedSender<Message>,
    task:       JoinHandle<()>,
}

pub struct RoomSession {
    config: ChatConfig,
    me:     Identity,
    view:   View,
    link:   Option<Link>,
}

impl RoomSession {
    pub fn new(config: ChatConfig, me: Identity) -> Self {
        install_tls_provider();
        let (tx, _) = watch::channel(RoomView::default());
        Self { config, me, view: Arc::new(tx), link: None }
    }

    /// Bind to `room_id` and start connecting in the background.
    ///
    /// Calling again for the room that is still live (or still connecting)
    /// does nothing. Any other
    /// call closes the current connection and clears the log first. Must run
    /// inside a tokio runtime.
    pub fn connect(&mut self, room_id: &str) -> ChatResult<()> {
        if let Some(link) = &self.link {
            if link.room == room_id && !link.outbox.is_closed() {
                debug!(room = room_id, "already bound");
                return Ok(());
            }
        }
        let req = self.config.request(room_id)?;
        self.close();

        let mut generation = 0;
        self.view.send_modify(|v| generation = v.rebind(Some(room_id.to_string())));

        let (outbox, rx) = mpsc::unbounded_channel();
        info!(room = room_id, url = %req.uri(), "connecting");
        let task = tokio::spawn(drive(req, room_id.to_string(), generation, self.view.clone(), rx));
        self.link = Some(Link { room: room_id.to_string(), generation, outbox, task });
        Ok(())
    }

    /// Send `content` to the bound room.
    ///
    /// Returns false, and sends nothing, when there is no open connection.
    /// Nothing is queued. The log is not touched here: the message shows up
    /// once the server echoes it back.
    pub fn send(&self, content: &str) -> bool {
        let Some(link) = &self.link else { return false };
        if !self.is_connected() {
            debug!(room = %link.room, "send suppressed, not connected");
            return false;
        }
        let out = OutgoingMessage::now(&self.me, &link.room, content);
        let json = match serde_json::to_string(&out) {
            Ok(j) => j,
            Err(e) => { warn!("encode outgoing: {e}"); return false; }
        };
        link.outbox.send(Message::Text(json.into())).is_ok()
    }

    /// Drop the connection and clear the log. Safe to call repeatedly.
    pub fn close(&mut self) { self.unbind(); }

    /// [`close`](Self::close), then wait for the connection task so the
    /// close frame is actually on the wire before returning.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.unbind() {
            let _ = task.await;
        }
    }

    fn unbind(&mut self) -> Option<JoinHandle<()>> {
        let task = self.link.take().map(|link| {
            info!(room = %link.room, generation = link.generation, "closing");
            // dropping the outbox cancels a pending handshake, or makes a live
            // task send a close frame and exit
            drop(link.outbox);
            link.task
        });
        self.view.send_modify(|v| { v.rebind(None); });
        task
    }

    pub fn is_connected(&self) -> bool { self.view.borrow().connected }

    pub fn messages(&self) -> Vec<ChatMessage> { self.view.borrow().messages.clone() }

    pub fn room(&self) -> Option<String> { self.link.as_ref().map(|l| l.room.clone()) }

    pub fn identity(&self) -> &Identity { &self.me }

    pub fn view(&self) -> RoomView { self.view.borrow().clone() }

    /// Change feed for renderers.
    pub fn subscribe(&self) -> watch::Receiver<RoomView> { self.view.subscribe() }
}

impl Drop for RoomSession {
    fn drop(&mut self) { self.close(); }
}

/// Apply `f` only while `generation` is still the bound one.
/// Returns false once the binding is stale.
fn update(view: &View, generation: u64, f: impl FnOnce(&mut RoomView) -> bool) -> bool {
    let mut live = true;
    view.send_if_modified(|v| {
        if v.generation != generation {
            live = false;
            return false;
        }
        f(v)
    });
    live
}

/* ---------------- per connection ---------------- */
async fn drive(
    req: Request,
    room: String,
    generation: u64,
    view: View,
    mut outbox: mpsc::UnboundedReceiver<Message>,
) {
    let handshake = tokio::select! {
        res = connect_async(req) => res,
        _ = unbound(&mut outbox) => {
            debug!(%room, "closed while connecting");
            return;
        }
    };
    let ws = match handshake {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(%room, "connect failed: {e}");
            return;
        }
    };
    if !update(&view, generation, |v| { v.connected = true; true }) {
        debug!(%room, "binding went stale while connecting");
        return;
    }
    info!(%room, "connected");

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            out = outbox.recv() => match out {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        warn!(%room, "send failed: {e}");
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(raw))) => match Frame::decode(&raw) {
                    Ok(frame) => {
                        if !update(&view, generation, |v| v.apply(frame)) { break; }
                    }
                    Err(e) => warn!(%room, "dropped malformed frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!(%room, "server closed the connection");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(%room, "transport error: {e}");
                    break;
                }
            },
        }
    }
    // receiver goes first so an observer of connected=false sees a dead link
    drop(outbox);
    update(&view, generation, |v| std::mem::replace(&mut v.connected, false));
}

/// Resolves once the session has dropped its end of the outbox.
async fn unbound(outbox: &mut mpsc::UnboundedReceiver<Message>) {
    // sends are refused until connected, so nothing real is discarded here
    while outbox.recv().await.is_some() {}
}

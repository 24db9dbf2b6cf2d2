use tracing::{debug, warn};

use crate::models::{ChatMessage, Frame, Identity};

/* ------------ the room as the UI sees it ------------ */
/// Snapshot published by a session on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomView {
    pub room:      Option<String>,
    pub connected: bool,
    pub messages:  Vec<ChatMessage>,   // display order == receipt order
    pub(crate) generation: u64,
}

impl RoomView {
    /// Messages paired with whether `me` sent them.
    pub fn entries<'a>(&'a self, me: &'a Identity) -> impl Iterator<Item = (&'a ChatMessage, bool)> + 'a {
        self.messages.iter().map(move |m| (m, m.is_mine(me)))
    }

    /// Start a fresh binding: empty log, disconnected.
    pub(crate) fn rebind(&mut self, room: Option<String>) -> u64 {
        self.generation += 1;
        self.room = room;
        self.connected = false;
        self.messages.clear();
        self.generation
    }

    /// Reconcile one inbound frame. Returns false if nothing changed.
    ///
    /// Entries stamped with some other room are dropped so the log only ever
    /// holds the bound room.
    pub(crate) fn apply(&mut self, frame: Frame) -> bool {
        let Some(room) = self.room.as_deref() else { return false };
        match frame {
            Frame::History(list) => {
                let total = list.len();
                let kept: Vec<_> = list.into_iter().filter(|m| m.room_id == room).collect();
                if kept.len() != total {
                    warn!(room, dropped = total - kept.len(), "history carried foreign-room entries");
                }
                debug!(room, len = kept.len(), "history replaced");
                self.messages = kept;
                true
            }
            Frame::Live(msg) if msg.room_id == room => {
                self.messages.push(msg);
                true
            }
            Frame::Live(msg) => {
                warn!(room, other = %msg.room_id, "dropped live frame for another room");
                false
            }
        }
    }
}

// Copyright (c) 2026 Scarcity
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Transport seam: channel-backed peer handles.
//!
//! A transport (WebSocket, WebRTC, whatever) creates a [`PeerHandle`] /
//! [`PeerMailbox`] pair at discovery, hands the handle to the gossip
//! engine, and drains the mailbox onto the wire. Sends are best-effort:
//! a full or closed mailbox drops the message.

use crate::gossip::messages::GossipMessage;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Connection direction hint, when the transport knows it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerDirection {
    /// The peer dialed us.
    Inbound,
    /// We dialed the peer.
    Outbound,
}

/// Engine-side handle to a connected peer.
#[derive(Clone)]
pub struct PeerHandle {
    id: String,
    direction: Option<PeerDirection>,
    remote_addr: Option<String>,
    tx: mpsc::Sender<GossipMessage>,
    closed: Arc<watch::Sender<bool>>,
}

/// Transport-side end of a peer: outgoing messages plus the close signal.
pub struct PeerMailbox {
    /// Messages the engine wants on the wire.
    pub messages: mpsc::Receiver<GossipMessage>,
    closed: watch::Receiver<bool>,
}

impl PeerHandle {
    /// Create a connected handle/mailbox pair with a bounded send queue.
    pub fn channel(
        id: impl Into<String>,
        direction: Option<PeerDirection>,
        remote_addr: Option<String>,
        capacity: usize,
    ) -> (PeerHandle, PeerMailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);
        (
            PeerHandle {
                id: id.into(),
                direction,
                remote_addr,
                tx,
                closed: Arc::new(closed_tx),
            },
            PeerMailbox {
                messages: rx,
                closed: closed_rx,
            },
        )
    }

    /// Peer identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direction hint.
    pub fn direction(&self) -> Option<PeerDirection> {
        self.direction
    }

    /// Remote address hint (used for subnet diversity accounting).
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// Best-effort send. Returns false when the mailbox is full or gone.
    pub fn send(&self, msg: GossipMessage) -> bool {
        self.tx.try_send(msg).is_ok()
    }

    /// Signal the transport to tear the connection down.
    pub fn disconnect(&self) {
        let _ = self.closed.send(true);
    }
}

impl PeerMailbox {
    /// Resolve when the engine disconnects this peer.
    pub async fn closed(&mut self) {
        // Already-closed handles resolve immediately.
        if *self.closed.borrow() {
            return;
        }
        while self.closed.changed().await.is_ok() {
            if *self.closed.borrow() {
                return;
            }
        }
    }

    /// Whether the engine has disconnected this peer.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

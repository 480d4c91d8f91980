//! In-process cluster channel
//!
//! Nodes join a shared `ClusterChannel` under a unique address and receive
//! envelopes on their own mpsc receiver. Master claims are published per
//! index so slaves know where to forward.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use dashmap::DashMap;

use crate::features::backend::ports::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Ok` once the receiving node applied the message, `Err` with its failure
pub type Ack = Result<(), String>;

#[derive(Debug)]
pub struct Envelope {
    pub from: NodeAddress,
    pub index_name: String,
    pub payload: Vec<u8>,
    /// Present when the sender blocks waiting for acknowledgement
    pub reply_to: Option<Sender<Ack>>,
}

#[derive(Debug, Default)]
pub struct ClusterChannel {
    members: DashMap<NodeAddress, Sender<Envelope>>,
    masters: DashMap<String, NodeAddress>,
}

impl ClusterChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join under `address`; rejoining replaces the previous inbox
    pub fn join(self: &Arc<Self>, address: impl Into<String>) -> (Arc<ClusterNode>, Receiver<Envelope>) {
        let address = NodeAddress::new(address);
        let (tx, rx) = mpsc::channel();
        self.members.insert(address.clone(), tx);
        tracing::info!(node = %address, members = self.members.len(), "node joined cluster");

        let node = Arc::new(ClusterNode {
            address,
            channel: Arc::clone(self),
        });
        (node, rx)
    }

    /// Remove the node and its master claims; its receiver drains and ends
    pub fn leave(&self, address: &NodeAddress) {
        self.members.remove(address);
        self.masters.retain(|_, master| master != address);
        tracing::info!(node = %address, "node left cluster");
    }

    /// Current members, sorted by address
    pub fn members(&self) -> Vec<NodeAddress> {
        let mut members: Vec<_> = self.members.iter().map(|e| e.key().clone()).collect();
        members.sort();
        members
    }

    pub fn claim_master(&self, index_name: &str, address: &NodeAddress) {
        if let Some(previous) = self.masters.insert(index_name.to_string(), address.clone()) {
            if &previous != address {
                tracing::warn!(index = index_name, %previous, new = %address, "master claim replaced");
            }
        }
    }

    pub fn master_of(&self, index_name: &str) -> Option<NodeAddress> {
        self.masters.get(index_name).map(|m| m.value().clone())
    }

    fn deliver(&self, to: &NodeAddress, envelope: Envelope) -> Result<(), TransportError> {
        let inbox = self
            .members
            .get(to)
            .map(|e| e.value().clone())
            .ok_or_else(|| TransportError::DestinationUnavailable(to.to_string()))?;
        inbox
            .send(envelope)
            .map_err(|_| TransportError::Disconnected(to.to_string()))
    }
}

/// This process's membership handle
#[derive(Debug)]
pub struct ClusterNode {
    address: NodeAddress,
    channel: Arc<ClusterChannel>,
}

impl ClusterNode {
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn channel(&self) -> &Arc<ClusterChannel> {
        &self.channel
    }

    pub fn send(
        &self,
        to: &NodeAddress,
        index_name: &str,
        payload: Vec<u8>,
        reply_to: Option<Sender<Ack>>,
    ) -> Result<(), TransportError> {
        self.channel.deliver(
            to,
            Envelope {
                from: self.address.clone(),
                index_name: index_name.to_string(),
                payload,
                reply_to,
            },
        )
    }

    /// Send to every other member; returns how many were reached
    pub fn broadcast(
        &self,
        index_name: &str,
        payload: &[u8],
        reply_to: Option<Sender<Ack>>,
    ) -> Result<usize, TransportError> {
        let mut reached = 0;
        for member in self.channel.members() {
            if member == self.address {
                continue;
            }
            match self.send(&member, index_name, payload.to_vec(), reply_to.clone()) {
                Ok(()) => reached += 1,
                Err(e) => tracing::warn!(to = %member, error = %e, "broadcast delivery failed"),
            }
        }
        Ok(reached)
    }

    pub fn leave(&self) {
        self.channel.leave(&self.address);
    }
}

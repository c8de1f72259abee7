//! The request server actor.
//!
//! Owns the `RequestManager`, reacts to request updates and alive-set
//! changes, drives the button lamps and forwards every resolved request to
//! the replication layer and the orders consumer.

use lift_protocol::{AliveSetUpdate, ButtonKind, Floor, PeerId, Request, RequestUpdate, Status};
use tokio::sync::mpsc;

use crate::manager::RequestManager;
use crate::ConsensusError;

/// Physical button lamp panel of the local controller.
pub trait ButtonLamp: Send {
    fn set(&mut self, button: ButtonKind, floor: Floor, lit: bool);
}

/// Queues connecting the request server to the rest of the node.
pub struct RequestServerLinks {
    /// Raw signals from button detection and diffs from the replication layer.
    pub updates: mpsc::Receiver<RequestUpdate>,
    /// Alive-set changes from the liveness monitor.
    pub alive: mpsc::Receiver<AliveSetUpdate>,
    /// Resolved requests for the outgoing registry.
    pub to_replication: mpsc::Sender<RequestUpdate>,
    /// Resolved requests for order assignment.
    pub to_orders: mpsc::Sender<RequestUpdate>,
}

pub struct RequestServer<L> {
    manager: RequestManager,
    lamp: L,
}

impl<L: ButtonLamp> RequestServer<L> {
    pub fn new(local: PeerId, lamp: L) -> Self {
        Self {
            manager: RequestManager::new(local),
            lamp,
        }
    }

    /// Run until both input queues are closed.
    pub async fn run(mut self, mut links: RequestServerLinks) -> Result<(), ConsensusError> {
        tracing::info!(local = %self.manager.local(), "Request server started");

        loop {
            tokio::select! {
                Some(update) = links.updates.recv() => {
                    let resolved = self.manager.process(&update);
                    self.publish(resolved, &links).await?;
                }
                Some(alive) = links.alive.recv() => {
                    for resolved in self.manager.update_alive(alive.peers) {
                        self.publish(resolved, &links).await?;
                    }
                }
                else => break,
            }
        }

        tracing::info!(local = %self.manager.local(), "Request server stopped");
        Ok(())
    }

    async fn publish(
        &mut self,
        request: Request,
        links: &RequestServerLinks,
    ) -> Result<(), ConsensusError> {
        let local = self.manager.local();
        if request.origin.concerns(local) {
            self.lamp.set(
                request.origin.button(),
                request.origin.floor(),
                request.status == Status::Confirmed,
            );
        }

        let update = RequestUpdate {
            source: local,
            request,
        };
        links
            .to_replication
            .send(update)
            .await
            .map_err(|_| ConsensusError::ChannelClosed("replication"))?;
        links
            .to_orders
            .send(update)
            .await
            .map_err(|_| ConsensusError::ChannelClosed("orders"))?;
        Ok(())
    }
}

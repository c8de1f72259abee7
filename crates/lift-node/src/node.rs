//! Process wiring.
//!
//! Spawns one task per actor and connects them with bounded queues:
//!
//! ```text
//! console ──► request server ──► replication ──► transport ──► (fleet)
//!                 ▲      │           │    ▲          │
//!                 │      ▼           ▼    │          ▼
//!                 │    orders     liveness └──── inbound snapshots
//!                 └────────────── diffs
//! ```

use std::path::PathBuf;

use anyhow::Context;
use lift_consensus::{RequestServer, RequestServerLinks};
use lift_network::{
    LivenessLinks, LivenessMonitor, ReplicationLinks, ReplicationServer, UdpBroadcast,
};
use lift_protocol::{order_to_string, ServiceOrder};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::LiftConfig;
use crate::console::{run_console, ConsoleLinks};
use crate::lamp::TracingLamp;
use crate::orders::{ExternalAssigner, OrderLinks, OrderServer};

pub struct Node {
    config: LiftConfig,
}

impl Node {
    pub fn new(config: LiftConfig) -> Self {
        Self { config }
    }

    /// Run with stdin as the driver console until an actor fails or the
    /// process is interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_with_input(BufReader::new(tokio::io::stdin())).await
    }

    pub async fn run_with_input<R>(self, input: R) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let config = self.config;
        let local = config.peer_id();
        let num_floors = config.node.num_floors;
        let cap = config.node.channel_capacity;

        let transport = UdpBroadcast::bind(config.transport_config()?)
            .await
            .context("failed to bind UDP transport")?;

        let (updates_tx, updates_rx) = mpsc::channel(cap);
        let (signals_tx, signals_rx) = mpsc::channel(cap);
        let (local_state_tx, local_state_rx) = mpsc::channel(cap);
        let (resolved_repl_tx, resolved_repl_rx) = mpsc::channel(cap);
        let (resolved_orders_tx, resolved_orders_rx) = mpsc::channel(cap);
        let (alive_requests_tx, alive_requests_rx) = mpsc::channel(cap);
        let (alive_repl_tx, alive_repl_rx) = mpsc::channel(cap);
        let (alive_orders_tx, alive_orders_rx) = mpsc::channel(cap);
        let (states_tx, states_rx) = mpsc::channel(cap);
        let (outbound_tx, outbound_rx) = mpsc::channel(cap);
        let (inbound_tx, inbound_rx) = mpsc::channel(cap);
        let (service_tx, service_rx) = mpsc::channel(cap);

        let mut tasks: JoinSet<(&'static str, anyhow::Result<()>)> = JoinSet::new();

        tasks.spawn(async move {
            let result = transport.run(outbound_rx, inbound_tx).await;
            ("transport", result.map_err(anyhow::Error::from))
        });

        let liveness = LivenessMonitor::new(local, config.poll_interval(), config.peer_timeout());
        let liveness_links = LivenessLinks {
            signals: signals_rx,
            subscribers: vec![
                ("requests", alive_requests_tx),
                ("replication", alive_repl_tx),
                ("orders", alive_orders_tx),
            ],
        };
        tasks.spawn(async move {
            let result = liveness.run(liveness_links).await;
            ("liveness", result.map_err(anyhow::Error::from))
        });

        let requests = RequestServer::new(local, TracingLamp::new());
        let request_links = RequestServerLinks {
            updates: updates_rx,
            alive: alive_requests_rx,
            to_replication: resolved_repl_tx,
            to_orders: resolved_orders_tx,
        };
        tasks.spawn(async move {
            let result = requests.run(request_links).await;
            ("requests", result.map_err(anyhow::Error::from))
        });

        let replication = ReplicationServer::new(local, num_floors, config.broadcast_interval());
        let replication_links = ReplicationLinks {
            resolved: resolved_repl_rx,
            local_state: local_state_rx,
            alive: alive_repl_rx,
            inbound: inbound_rx,
            outbound: outbound_tx,
            to_requests: updates_tx.clone(),
            to_liveness: signals_tx.clone(),
            to_orders: states_tx,
        };
        tasks.spawn(async move {
            let result = replication.run(replication_links).await;
            ("replication", result.map_err(anyhow::Error::from))
        });

        let assigner = config.orders.assigner_path.clone().map(ExternalAssigner::new);
        let orders = OrderServer::new(local, num_floors, config.refresh_interval(), assigner);
        let order_links = OrderLinks {
            requests: resolved_orders_rx,
            states: states_rx,
            alive: alive_orders_rx,
            orders: service_tx,
        };
        tasks.spawn(async move { ("orders", orders.run(order_links).await) });

        tasks.spawn(async move { ("driver", log_service_orders(service_rx).await) });

        // The console ending (stdin closed) is not a reason to stop the node.
        let console_links = ConsoleLinks {
            requests: updates_tx,
            local_state: local_state_tx,
            health: signals_tx,
        };
        tokio::spawn(async move {
            if let Err(e) = run_console(input, local, num_floors, console_links).await {
                tracing::error!(error = %e, "Console failed");
            }
        });

        tracing::info!(peer = %local, floors = num_floors, "Node running");

        let outcome = tokio::select! {
            joined = tasks.join_next() => match joined {
                Some(Ok((name, Ok(())))) => Err(anyhow::anyhow!("{name} stopped unexpectedly")),
                Some(Ok((name, Err(e)))) => Err(e.context(format!("{name} failed"))),
                Some(Err(e)) => Err(anyhow::Error::new(e).context("actor task panicked")),
                None => Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                Ok(())
            }
        };

        if let Err(e) = &outcome {
            tracing::error!("Node stopping: {e:#}");
        }
        tasks.shutdown().await;
        outcome
    }
}

/// Stand-in for the elevator driver's order input.
async fn log_service_orders(mut orders: mpsc::Receiver<ServiceOrder>) -> anyhow::Result<()> {
    while let Some(ServiceOrder { order }) = orders.recv().await {
        tracing::info!(order = %order_to_string(&order), "New service order for local car");
    }
    Ok(())
}

/// Resolve the config file from the command line or the default location.
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<LiftConfig> {
    LiftConfig::load(path.as_deref()).context("failed to load configuration")
}

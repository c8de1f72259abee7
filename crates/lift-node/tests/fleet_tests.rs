//! Several controllers wired exactly like `liftd`, with an in-memory lossy
//! hub in place of UDP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lift_consensus::{ButtonLamp, RequestServer, RequestServerLinks};
use lift_network::{
    LivenessLinks, LivenessMonitor, ReplicationLinks, ReplicationServer, WireMessage,
};
use lift_protocol::{
    Behavior, ButtonKind, Direction, Floor, MotorDirection, Origin, PeerId, PeerSignal,
    PhysicalState, RequestUpdate, Status,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

const FLOORS: u8 = 4;

#[derive(Clone, Default)]
struct Panel(Arc<Mutex<HashMap<(ButtonKind, Floor), bool>>>);

impl Panel {
    fn lit(&self, button: ButtonKind, floor: Floor) -> bool {
        self.0.lock().unwrap().get(&(button, floor)).copied().unwrap_or(false)
    }
}

impl ButtonLamp for Panel {
    fn set(&mut self, button: ButtonKind, floor: Floor, lit: bool) {
        self.0.lock().unwrap().insert((button, floor), lit);
    }
}

struct Controller {
    buttons: mpsc::Sender<RequestUpdate>,
    health: mpsc::Sender<PeerSignal>,
    panel: Panel,
}

fn spawn_controller(
    id: u8,
    outbound: mpsc::Sender<WireMessage>,
    inbound: mpsc::Receiver<WireMessage>,
) -> Controller {
    let local = PeerId(id);
    let (updates_tx, updates_rx) = mpsc::channel(64);
    let (signals_tx, signals_rx) = mpsc::channel(64);
    let (state_tx, state_rx) = mpsc::channel(64);
    let (resolved_tx, resolved_rx) = mpsc::channel(64);
    let (orders_tx, mut orders_rx) = mpsc::channel::<RequestUpdate>(64);
    let (alive_req_tx, alive_req_rx) = mpsc::channel(64);
    let (alive_repl_tx, alive_repl_rx) = mpsc::channel(64);
    let (states_tx, mut states_rx) = mpsc::channel(64);
    let panel = Panel::default();

    tokio::spawn(
        LivenessMonitor::new(local, Duration::from_secs(1), Duration::from_secs(10)).run(
            LivenessLinks {
                signals: signals_rx,
                subscribers: vec![("requests", alive_req_tx), ("replication", alive_repl_tx)],
            },
        ),
    );
    tokio::spawn(RequestServer::new(local, panel.clone()).run(RequestServerLinks {
        updates: updates_rx,
        alive: alive_req_rx,
        to_replication: resolved_tx,
        to_orders: orders_tx,
    }));
    tokio::spawn(
        ReplicationServer::new(local, FLOORS, Duration::from_millis(100)).run(ReplicationLinks {
            resolved: resolved_rx,
            local_state: state_rx,
            alive: alive_repl_rx,
            inbound,
            outbound,
            to_requests: updates_tx.clone(),
            to_liveness: signals_tx.clone(),
            to_orders: states_tx,
        }),
    );
    // Nobody assigns orders here.
    tokio::spawn(async move { while orders_rx.recv().await.is_some() {} });
    tokio::spawn(async move { while states_rx.recv().await.is_some() {} });

    let idle = PhysicalState {
        floor: 0,
        behavior: Behavior::Idle,
        direction: MotorDirection::Stop,
    };
    tokio::spawn(async move {
        let _ = state_tx.send(idle).await;
        // Keep the driver queue open for the controller's lifetime.
        std::future::pending::<()>().await;
    });

    Controller {
        buttons: updates_tx,
        health: signals_tx,
        panel,
    }
}

/// Start `n` controllers behind a hub that drops each delivery with
/// probability `loss`. Controllers listed in `cut` receive nothing.
fn spawn_fleet(n: u8, loss: f64, seed: u64, cut: Arc<Mutex<Vec<u8>>>) -> Vec<Controller> {
    let (hub_tx, mut hub_rx) = mpsc::channel::<WireMessage>(256);
    let mut inboxes = Vec::new();
    let mut controllers = Vec::new();

    for id in 1..=n {
        let (inbox_tx, inbox_rx) = mpsc::channel(256);
        inboxes.push((id, inbox_tx));
        controllers.push(spawn_controller(id, hub_tx.clone(), inbox_rx));
    }

    tokio::spawn(async move {
        let mut rng = StdRng::seed_from_u64(seed);
        while let Some(msg) = hub_rx.recv().await {
            let cut = cut.lock().unwrap().clone();
            for (id, inbox) in &inboxes {
                let isolated = cut.contains(id) || cut.contains(&msg.source.get());
                if isolated || rng.gen_bool(loss) {
                    continue;
                }
                let _ = inbox.try_send(msg.clone());
            }
        }
    });

    controllers
}

async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..600 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

async fn press(controller: &Controller, id: u8, origin: Origin, status: Status) {
    controller
        .buttons
        .send(RequestUpdate::new(PeerId(id), origin, status))
        .await
        .unwrap();
}

// ─── Fleet ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_hall_call_lights_every_panel() {
    let fleet = spawn_fleet(3, 0.3, 1, Arc::default());
    // Let the controllers discover each other.
    tokio::time::sleep(Duration::from_secs(3)).await;

    press(&fleet[1], 2, Origin::hall(2, Direction::Up), Status::Unconfirmed).await;
    let lit = wait_until(|| fleet.iter().all(|c| c.panel.lit(ButtonKind::HallUp, 2))).await;
    assert!(lit, "hall lamp never lit on every panel");

    press(&fleet[0], 1, Origin::hall(2, Direction::Up), Status::Absent).await;
    let cleared = wait_until(|| fleet.iter().all(|c| !c.panel.lit(ButtonKind::HallUp, 2))).await;
    assert!(cleared, "hall lamp never cleared");
}

#[tokio::test(start_paused = true)]
async fn test_cab_call_lights_only_owner_panel() {
    let fleet = spawn_fleet(2, 0.2, 2, Arc::default());
    tokio::time::sleep(Duration::from_secs(3)).await;

    press(&fleet[0], 1, Origin::cab(3, PeerId(1)), Status::Unconfirmed).await;
    assert!(wait_until(|| fleet[0].panel.lit(ButtonKind::Cab, 3)).await);
    assert!(!fleet[1].panel.lit(ButtonKind::Cab, 3));
}

#[tokio::test(start_paused = true)]
async fn test_isolated_peer_stops_blocking_confirmation() {
    let cut = Arc::new(Mutex::new(Vec::new()));
    let fleet = spawn_fleet(3, 0.0, 3, cut.clone());
    tokio::time::sleep(Duration::from_secs(3)).await;

    cut.lock().unwrap().push(3);
    press(&fleet[0], 1, Origin::hall(1, Direction::Down), Status::Unconfirmed).await;

    // Peer 3 must first time out of the quorum.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!fleet[0].panel.lit(ButtonKind::HallDown, 1));

    assert!(wait_until(|| fleet[0].panel.lit(ButtonKind::HallDown, 1)).await);
    assert!(wait_until(|| fleet[1].panel.lit(ButtonKind::HallDown, 1)).await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_controller_drops_out_of_quorum() {
    let fleet = spawn_fleet(2, 0.0, 4, Arc::default());
    tokio::time::sleep(Duration::from_secs(3)).await;

    fleet[1].health.send(PeerSignal::dead(PeerId(2))).await.unwrap();
    // Peer 2 went silent, so peer 1 needs a timeout before confirming alone.
    press(&fleet[0], 1, Origin::cab(0, PeerId(1)), Status::Unconfirmed).await;
    assert!(wait_until(|| fleet[0].panel.lit(ButtonKind::Cab, 0)).await);
}

use std::time::Duration;

/// Number of floors served when the configuration does not say otherwise.
pub const DEFAULT_NUM_FLOORS: u8 = 4;

/// How often the full registry snapshot is broadcast.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_millis(100);

/// How often the liveness monitor recomputes the alive set.
pub const DEFAULT_LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Silence after which a peer is considered dead.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the orders consumer re-runs the assigner.
pub const DEFAULT_ORDER_REFRESH_INTERVAL: Duration = Duration::from_millis(2000);

/// Bounded capacity of every inter-actor queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// UDP port shared by the fleet for registry broadcasts.
pub const DEFAULT_BROADCAST_PORT: u16 = 20048;

/// Distinct acknowledgers a hall call needs before it may be confirmed.
pub const HALL_MIN_WITNESSES: usize = 2;

/// Distinct acknowledgers a cab call needs before it may be confirmed.
pub const CAB_MIN_WITNESSES: usize = 1;

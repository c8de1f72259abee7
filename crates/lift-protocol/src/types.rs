use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A floor index, counted from the ground floor at 0.
pub type Floor = u8;

/// Identity of one elevator controller, stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u8);

impl PeerId {
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for PeerId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Travel direction requested by a hall call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Self::Up),
            "down" | "d" => Ok(Self::Down),
            other => Err(ProtocolError::Parse(format!("unknown direction '{other}'"))),
        }
    }
}

/// The physical button a request originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonKind {
    HallUp,
    HallDown,
    Cab,
}

impl ButtonKind {
    /// Column of this button in a per-floor `[hall up, hall down, cab]` row.
    pub fn index(&self) -> usize {
        match self {
            Self::HallUp => 0,
            Self::HallDown => 1,
            Self::Cab => 2,
        }
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::HallUp => "hall-up",
            Self::HallDown => "hall-down",
            Self::Cab => "cab",
        };
        write!(f, "{s}")
    }
}

/// Identifies a physical request source; the key of every per-request map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// A hall call button on a floor, shared by the whole fleet.
    Hall { floor: Floor, direction: Direction },
    /// A cab button inside the elevator owned by `owner`.
    Cab { floor: Floor, owner: PeerId },
}

impl Origin {
    pub fn hall(floor: Floor, direction: Direction) -> Self {
        Self::Hall { floor, direction }
    }

    pub fn cab(floor: Floor, owner: PeerId) -> Self {
        Self::Cab { floor, owner }
    }

    pub fn floor(&self) -> Floor {
        match self {
            Self::Hall { floor, .. } | Self::Cab { floor, .. } => *floor,
        }
    }

    pub fn button(&self) -> ButtonKind {
        match self {
            Self::Hall { direction: Direction::Up, .. } => ButtonKind::HallUp,
            Self::Hall { direction: Direction::Down, .. } => ButtonKind::HallDown,
            Self::Cab { .. } => ButtonKind::Cab,
        }
    }

    /// Whether the lamp for this origin is mounted on `local`'s panel.
    ///
    /// Hall lamps are lit on every controller; cab lamps only in their own cab.
    pub fn concerns(&self, local: PeerId) -> bool {
        match self {
            Self::Hall { .. } => true,
            Self::Cab { owner, .. } => *owner == local,
        }
    }

    pub fn is_hall(&self) -> bool {
        matches!(self, Self::Hall { .. })
    }

    /// Reject origins outside the served floor range.
    pub fn validate(&self, num_floors: u8) -> Result<(), ProtocolError> {
        let floor = self.floor();
        if floor >= num_floors {
            return Err(ProtocolError::InvalidFloor { floor, num_floors });
        }
        Ok(())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hall { floor, direction } => write!(f, "hall({floor},{direction})"),
            Self::Cab { floor, owner } => write!(f, "cab({floor},#{owner})"),
        }
    }
}

/// Lifecycle tag of a request.
///
/// Transitions cycle `Absent -> Unconfirmed -> Confirmed -> Absent`.
/// `Unknown` is the zero value and carries no information.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Status {
    #[default]
    Unknown,
    Absent,
    Unconfirmed,
    Confirmed,
}

impl Status {
    /// Only settled statuses mean anything to the order assigner.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Absent | Self::Confirmed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Absent => "absent",
            Self::Unconfirmed => "unconfirmed",
            Self::Confirmed => "confirmed",
        };
        write!(f, "{s}")
    }
}

/// A request origin together with its current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub origin: Origin,
    pub status: Status,
}

impl Request {
    pub fn new(origin: Origin, status: Status) -> Self {
        Self { origin, status }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.origin, self.status)
    }
}

/// What the elevator car is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Behavior {
    #[default]
    Idle,
    Moving,
    DoorOpen,
}

impl Behavior {
    /// Name used by the hall request assigner's JSON input.
    pub fn as_assigner_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::DoorOpen => "doorOpen",
        }
    }
}

impl FromStr for Behavior {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "moving" => Ok(Self::Moving),
            "dooropen" | "door_open" | "door-open" => Ok(Self::DoorOpen),
            other => Err(ProtocolError::Parse(format!("unknown behavior '{other}'"))),
        }
    }
}

/// Direction the motor is driving the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MotorDirection {
    Up,
    Down,
    #[default]
    Stop,
}

impl MotorDirection {
    pub fn as_assigner_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stop => "stop",
        }
    }
}

impl FromStr for MotorDirection {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "stop" => Ok(Self::Stop),
            other => Err(ProtocolError::Parse(format!("unknown motor direction '{other}'"))),
        }
    }
}

/// Latest physical state of one elevator, gossiped alongside the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct PhysicalState {
    pub floor: Floor,
    pub behavior: Behavior,
    pub direction: MotorDirection,
}

impl fmt::Display for PhysicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "floor {} {:?} {:?}",
            self.floor, self.behavior, self.direction
        )
    }
}

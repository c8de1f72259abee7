//! Line-oriented stand-in for the elevator driver.
//!
//! Each stdin line injects one signal that button detection, the floor
//! sensor or the health detectors would produce on real hardware:
//!
//! ```text
//! hall <floor> up|down          press a hall button
//! cab <floor>                   press a cab button
//! clear hall <floor> up|down    a hall call was served
//! clear cab <floor>             a cab call was served
//! state <floor> idle|moving|dooropen up|down|stop
//! fail | recover                local health
//! ```

use lift_protocol::{
    Behavior, Direction, Floor, MotorDirection, Origin, PeerId, PeerSignal, PhysicalState,
    ProtocolError, RequestUpdate, Status,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Press(Origin),
    Clear(Origin),
    State(PhysicalState),
    Fail,
    Recover,
}

/// Parse one console line for controller `local`.
pub fn parse_command(line: &str, local: PeerId, num_floors: u8) -> Result<Command, ProtocolError> {
    let words: Vec<&str> = line.split_whitespace().collect();

    let command = match words.as_slice() {
        ["hall", floor, direction] => Command::Press(Origin::hall(
            parse_floor(floor)?,
            direction.parse::<Direction>()?,
        )),
        ["cab", floor] => Command::Press(Origin::cab(parse_floor(floor)?, local)),
        ["clear", "hall", floor, direction] => Command::Clear(Origin::hall(
            parse_floor(floor)?,
            direction.parse::<Direction>()?,
        )),
        ["clear", "cab", floor] => Command::Clear(Origin::cab(parse_floor(floor)?, local)),
        ["state", floor, behavior, direction] => Command::State(PhysicalState {
            floor: parse_floor(floor)?,
            behavior: behavior.parse::<Behavior>()?,
            direction: direction.parse::<MotorDirection>()?,
        }),
        ["fail"] => Command::Fail,
        ["recover"] => Command::Recover,
        _ => return Err(ProtocolError::Parse(format!("unrecognized command '{}'", line.trim()))),
    };

    let floor = match command {
        Command::Press(origin) | Command::Clear(origin) => Some(origin.floor()),
        Command::State(state) => Some(state.floor),
        Command::Fail | Command::Recover => None,
    };
    if let Some(floor) = floor {
        if floor >= num_floors {
            return Err(ProtocolError::InvalidFloor { floor, num_floors });
        }
    }

    Ok(command)
}

fn parse_floor(word: &str) -> Result<Floor, ProtocolError> {
    word.parse()
        .map_err(|_| ProtocolError::Parse(format!("'{word}' is not a floor")))
}

/// Queues the console feeds.
pub struct ConsoleLinks {
    pub requests: mpsc::Sender<RequestUpdate>,
    pub local_state: mpsc::Sender<PhysicalState>,
    pub health: mpsc::Sender<PeerSignal>,
}

/// Read commands until end of input.
pub async fn run_console<R>(
    reader: R,
    local: PeerId,
    num_floors: u8,
    links: ConsoleLinks,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line, local, num_floors) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(input = %line.trim(), error = %e, "Ignoring console command");
                continue;
            }
        };

        match command {
            Command::Press(origin) => {
                links
                    .requests
                    .send(RequestUpdate::new(local, origin, Status::Unconfirmed))
                    .await?
            }
            Command::Clear(origin) => {
                links
                    .requests
                    .send(RequestUpdate::new(local, origin, Status::Absent))
                    .await?
            }
            Command::State(state) => links.local_state.send(state).await?,
            Command::Fail => links.health.send(PeerSignal::dead(local)).await?,
            Command::Recover => links.health.send(PeerSignal::alive(local)).await?,
        }
    }

    tracing::info!("Console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, ProtocolError> {
        parse_command(line, PeerId(2), 4)
    }

    #[test]
    fn parses_button_presses() {
        assert_eq!(
            parse("hall 3 down").unwrap(),
            Command::Press(Origin::hall(3, Direction::Down))
        );
        assert_eq!(parse("cab 0").unwrap(), Command::Press(Origin::cab(0, PeerId(2))));
    }

    #[test]
    fn parses_clears() {
        assert_eq!(
            parse("clear hall 1 up").unwrap(),
            Command::Clear(Origin::hall(1, Direction::Up))
        );
        assert_eq!(
            parse("  clear   cab 2 ").unwrap(),
            Command::Clear(Origin::cab(2, PeerId(2)))
        );
    }

    #[test]
    fn parses_state_and_health() {
        assert_eq!(
            parse("state 2 dooropen stop").unwrap(),
            Command::State(PhysicalState {
                floor: 2,
                behavior: Behavior::DoorOpen,
                direction: MotorDirection::Stop,
            })
        );
        assert_eq!(parse("fail").unwrap(), Command::Fail);
        assert_eq!(parse("recover").unwrap(), Command::Recover);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse("hall 9 up"), Err(ProtocolError::InvalidFloor { floor: 9, .. })));
        assert!(matches!(parse("hall x up"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse("hall 1 sideways"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse("jump"), Err(ProtocolError::Parse(_))));
        assert!(matches!(parse("cab"), Err(ProtocolError::Parse(_))));
    }
}

use lift_consensus::RequestManager;
use lift_protocol::{AliveSet, Direction, Origin, PeerId, Request, RequestUpdate, Status};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn alive(ids: &[u8]) -> AliveSet {
    ids.iter().copied().map(PeerId).collect()
}

fn manager(local: u8, peers: &[u8]) -> RequestManager {
    let mut m = RequestManager::new(PeerId(local));
    m.update_alive(alive(peers));
    m
}

fn send(m: &mut RequestManager, source: u8, origin: Origin, status: Status) -> Status {
    m.process(&RequestUpdate::new(PeerId(source), origin, status)).status
}

// ─── Full cycles ─────────────────────────────────────────────────────────────

#[test]
fn test_one_peer_hall_cycle_never_confirms() {
    let mut m = manager(1, &[1]);
    let hall = Origin::hall(1, Direction::Up);
    assert_eq!(send(&mut m, 1, hall, Status::Unknown), Status::Unknown);
    assert_eq!(send(&mut m, 1, hall, Status::Absent), Status::Absent);
    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    // A clear cannot erase an unconfirmed request.
    assert_eq!(send(&mut m, 1, hall, Status::Absent), Status::Unconfirmed);
}

#[test]
fn test_one_peer_cab_cycle() {
    let mut m = manager(1, &[1]);
    let cab = Origin::cab(1, PeerId(1));
    assert_eq!(send(&mut m, 1, cab, Status::Unknown), Status::Unknown);
    assert_eq!(send(&mut m, 1, cab, Status::Absent), Status::Absent);
    assert_eq!(send(&mut m, 1, cab, Status::Unconfirmed), Status::Confirmed);
    assert_eq!(send(&mut m, 1, cab, Status::Absent), Status::Absent);
}

#[test]
fn test_two_peer_hall_cycle() {
    let mut m = manager(1, &[1, 2]);
    let hall = Origin::hall(1, Direction::Up);
    assert_eq!(send(&mut m, 1, hall, Status::Unknown), Status::Unknown);
    assert_eq!(send(&mut m, 2, hall, Status::Unknown), Status::Unknown);
    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 2, hall, Status::Unconfirmed), Status::Confirmed);
    assert_eq!(send(&mut m, 1, hall, Status::Absent), Status::Absent);
}

#[test]
fn test_confirmed_is_not_regressed_by_unconfirmed() {
    let mut m = manager(1, &[1, 2]);
    let hall = Origin::hall(1, Direction::Up);
    send(&mut m, 1, hall, Status::Unconfirmed);
    send(&mut m, 2, hall, Status::Unconfirmed);
    assert_eq!(send(&mut m, 2, hall, Status::Unconfirmed), Status::Confirmed);
}

#[test]
fn test_remote_confirmation_trusted_for_unconfirmed() {
    let mut m = manager(1, &[1, 2]);
    let hall = Origin::hall(1, Direction::Up);
    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 2, hall, Status::Confirmed), Status::Confirmed);
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_single_peer_hall_needs_second_witness() {
    let mut m = manager(1, &[1]);
    let hall = Origin::hall(2, Direction::Up);

    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(m.ledger().witness_count(&hall), 1);

    // A second distinct acknowledger satisfies the witness minimum.
    assert_eq!(send(&mut m, 2, hall, Status::Unconfirmed), Status::Confirmed);
}

#[test]
fn test_two_peer_cab_confirms_when_both_acknowledge() {
    let mut m = manager(1, &[1, 2]);
    let cab = Origin::cab(0, PeerId(1));

    assert_eq!(send(&mut m, 1, cab, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(m.ledger().witness_count(&cab), 1);

    assert_eq!(send(&mut m, 2, cab, Status::Unconfirmed), Status::Confirmed);
    assert_eq!(m.ledger().witness_count(&cab), 0, "ledger rearmed on confirmation");
}

#[test]
fn test_three_peer_hall_confirms_on_third_ack() {
    // The local controller is peer 1 but the acknowledgments arrive from
    // elsewhere; peer 1 witnesses every update it processes.
    let mut m = manager(1, &[1, 2, 3]);
    let hall = Origin::hall(1, Direction::Down);

    assert_eq!(send(&mut m, 2, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(m.ledger().witness_count(&hall), 2);
    assert_eq!(send(&mut m, 3, hall, Status::Unconfirmed), Status::Confirmed);
}

#[test]
fn test_three_peer_hall_from_remote_manager_view() {
    let mut m = manager(4, &[1, 2, 3]);
    let hall = Origin::hall(1, Direction::Down);

    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 2, hall, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 3, hall, Status::Unconfirmed), Status::Confirmed);
}

#[test]
fn test_dead_peer_drops_out_of_quorum() {
    let mut m = manager(1, &[1, 2, 3]);
    let hall = Origin::hall(0, Direction::Up);
    assert_eq!(send(&mut m, 3, hall, Status::Unconfirmed), Status::Unconfirmed);

    // Peer 2 times out; the shrunken quorum is already covered, so the
    // membership change itself confirms the request.
    let released = m.update_alive(alive(&[1, 3]));
    assert_eq!(released, vec![Request::new(hall, Status::Confirmed)]);
    assert_eq!(m.status(&hall), Status::Confirmed);
}

#[test]
fn test_failed_controller_confirms_own_cab_calls_only() {
    let mut m = manager(1, &[1, 2]);
    let cab = Origin::cab(2, PeerId(1));
    let hall = Origin::hall(2, Direction::Down);
    assert_eq!(send(&mut m, 1, cab, Status::Unconfirmed), Status::Unconfirmed);
    assert_eq!(send(&mut m, 1, hall, Status::Unconfirmed), Status::Unconfirmed);

    // Local failure with every peer timed out leaves nobody alive.
    let released = m.update_alive(alive(&[]));
    assert_eq!(released, vec![Request::new(cab, Status::Confirmed)]);
    assert_eq!(m.status(&hall), Status::Unconfirmed);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[test]
fn test_duplicate_update_is_idempotent() {
    let statuses = [Status::Unknown, Status::Absent, Status::Unconfirmed, Status::Confirmed];
    for first in statuses {
        for second in statuses {
            let mut m = manager(1, &[1, 2, 3]);
            let hall = Origin::hall(2, Direction::Up);
            send(&mut m, 2, hall, first);
            let once = send(&mut m, 3, hall, second);
            let witnesses = m.ledger().witness_count(&hall);
            let twice = send(&mut m, 3, hall, second);
            assert_eq!(once, twice, "{first:?} then {second:?} twice");
            assert_eq!(witnesses, m.ledger().witness_count(&hall));
        }
    }
}

#[test]
fn test_absent_is_never_resurrected_by_confirmed() {
    let mut m = manager(1, &[1, 2]);
    let cab = Origin::cab(3, PeerId(2));
    send(&mut m, 1, cab, Status::Unconfirmed);
    send(&mut m, 2, cab, Status::Unconfirmed);
    assert_eq!(send(&mut m, 2, cab, Status::Absent), Status::Absent);

    for _ in 0..3 {
        assert_eq!(send(&mut m, 2, cab, Status::Confirmed), Status::Absent);
    }
}

#[test]
fn test_confirmation_only_with_covering_ledger() {
    let mut rng = StdRng::seed_from_u64(4145);
    let statuses = [Status::Unknown, Status::Absent, Status::Unconfirmed];
    let origins = [
        Origin::hall(0, Direction::Up),
        Origin::hall(2, Direction::Down),
        Origin::cab(1, PeerId(1)),
        Origin::cab(1, PeerId(3)),
    ];

    for _ in 0..200 {
        let peers: Vec<u8> = (1..=4).filter(|_| rng.gen_bool(0.7)).chain([1]).collect();
        let mut m = manager(1, &peers);

        for _ in 0..30 {
            let origin = origins[rng.gen_range(0..origins.len())];
            let status = statuses[rng.gen_range(0..statuses.len())];
            let source = rng.gen_range(1..=4);

            let before = m.status(&origin);
            let mut witnesses = m.ledger().witnesses(&origin).cloned().unwrap_or_default();
            if status == Status::Unconfirmed {
                witnesses.insert(PeerId(source));
                witnesses.insert(PeerId(1));
            }

            let after = send(&mut m, source, origin, status);
            if after == Status::Confirmed && before != Status::Confirmed {
                assert!(m.alive().is_subset(&witnesses));
                if origin.is_hall() {
                    assert!(witnesses.len() >= 2);
                }
            }
        }
    }
}

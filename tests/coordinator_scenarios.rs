//! End-to-end scenarios driven purely through the public `Coordinator` API
//! and the wire codec, with no network I/O (§8 scenarios 3 and 5).

use open_station::codec::{encode_outbound_datagram, AllianceColor, InboundDatagram, StatusFlags};
use open_station::config::StationConfig;
use open_station::connection::EngineHandle;
use open_station::Coordinator;

fn config() -> StationConfig {
    StationConfig { team_number: 100, ..StationConfig::default() }
}

fn inbound(request_date: bool) -> InboundDatagram {
    InboundDatagram {
        sequence: 1,
        status: StatusFlags::default(),
        trace: 0,
        battery_voltage: 12.34,
        request_date,
        telemetry: Default::default(),
        joystick_outputs: Vec::new(),
    }
}

/// Scenario 3: EStop during autonomous — pressing the EStop hotkey mid-run
/// latches immediately, and every subsequent outbound datagram keeps the
/// estop bit set and the enabled bit clear even as Practice keeps advancing.
#[test]
fn estop_during_autonomous_latches_and_survives_further_ticks() {
    let coordinator = Coordinator::new(&config());
    coordinator.set_alliance(AllianceColor::Red, 1).unwrap();
    coordinator.start_practice();

    // Advance 250 ticks of 20ms = 5.0s, landing inside Autonomous (starts at t=3s).
    for _ in 0..250 {
        coordinator.tick();
    }

    coordinator.estop();

    let snapshot = coordinator.take_outbound_snapshot();
    let datagram = encode_outbound_datagram(0, snapshot.control, snapshot.request, snapshot.alliance, &[]);
    assert_eq!(datagram[3] & 0b1000_0000, 0b1000_0000, "estop bit must be set");
    assert_eq!(datagram[3] & 0b0000_0100, 0, "enabled bit must be clear");

    // Practice continues advancing (another 5s into Teleop); estop still wins.
    for _ in 0..250 {
        coordinator.tick();
    }
    let snapshot = coordinator.take_outbound_snapshot();
    let datagram = encode_outbound_datagram(1, snapshot.control, snapshot.request, snapshot.alliance, &[]);
    assert_eq!(datagram[3] & 0b1000_0000, 0b1000_0000);
    assert_eq!(datagram[3] & 0b0000_0100, 0);
}

/// Scenario 5: an inbound datagram with the request-date flag set causes
/// exactly the next outbound snapshot to carry `send_date_tag = true`;
/// subsequent snapshots do not repeat it.
#[test]
fn request_date_flag_is_consumed_exactly_once() {
    let coordinator = Coordinator::new(&config());
    coordinator.apply_inbound(inbound(true));

    let first = coordinator.take_outbound_snapshot();
    assert!(first.send_date_tag);

    let second = coordinator.take_outbound_snapshot();
    assert!(!second.send_date_tag);
}

/// Scenario 1 (voltage half): the decoded battery voltage reaches the
/// published snapshot, within the spec's |error| < 0.01 bound, on the next
/// publish tick after the inbound datagram was applied.
#[test]
fn battery_voltage_reaches_the_published_state_within_tolerance() {
    let coordinator = Coordinator::new(&config());
    let mut states = coordinator.subscribe();
    assert_eq!(states.borrow().battery_voltage, 0.0);

    coordinator.apply_inbound(inbound(false));
    coordinator.tick();

    let state = states.borrow_and_update().clone();
    assert!((state.battery_voltage - 12.34).abs() < 0.01);
}

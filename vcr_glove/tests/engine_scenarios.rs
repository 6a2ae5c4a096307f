//! End-to-end engine scenarios on a manual clock.

mod common;

use common::{Rig, TWO_GLOVES, ms, secs};
use vcr::pattern::{ALL_OFF, MotorSet, PatternKind, PatternSpec, VcrParams, uniform_frame};
use vcr_glove::audit::AuditTag;

fn default_vcr() -> VcrParams {
    VcrParams {
        amplitude: 70.0,
        cycle_hz: 1.5,
        burst_ms: 100.0,
        motor_count: 4.0,
    }
}

fn one_hz(kind: PatternKind, amplitude: u8, total: Option<u64>) -> PatternSpec {
    PatternSpec {
        kind,
        amplitude,
        cycle_hz: 1.0,
        burst_ms: 100,
        motors: MotorSet::first(4),
        total_seconds: total,
    }
}

// ─── Stimulation ────────────────────────────────────────────────────

#[test]
fn vcr_cycle_staggers_single_motor_bursts() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    rig.run_until(ms(1300));

    let frames = rig.driver.frames_for("GloveL");
    assert_eq!(frames.len(), 8, "four bursts, each followed by an all-off");

    let ons: Vec<_> = frames.iter().filter(|f| !f.is_all_off()).collect();
    let offs: Vec<_> = frames.iter().filter(|f| f.is_all_off()).collect();
    assert_eq!(ons.len(), 4);
    assert_eq!(offs.len(), 4);

    let start = ons[0].at;
    assert!(start >= ms(666) && start <= ms(667), "first cycle at {start:?}");

    let mut motors = Vec::new();
    for (i, on) in (0u32..).zip(&ons) {
        assert_eq!(on.at, start + ms(100) * i);
        let active = on.active_motors();
        assert_eq!(active.len(), 1, "exactly one motor per burst");
        assert_eq!(on.frame[active[0]], 70);
        motors.push(active[0]);
    }
    motors.sort_unstable();
    assert_eq!(motors, vec![0, 1, 2, 3]);

    for (i, off) in (1u32..).zip(&offs) {
        assert_eq!(off.at, start + ms(100) * i);
    }

    // Each all-off lands before the next motor's activation at the same instant.
    for pair in frames.windows(2) {
        if pair[0].at == pair[1].at {
            assert!(pair[0].is_all_off());
            assert!(!pair[1].is_all_off());
        }
    }
}

#[test]
fn vcr_cycles_repeat_at_cycle_interval() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    rig.run_until(ms(2100));

    let cycle_starts: Vec<_> = rig
        .driver
        .frames_for("GloveL")
        .chunks(8)
        .map(|cycle| cycle[0].at)
        .collect();
    assert_eq!(cycle_starts.len(), 3);
    for pair in cycle_starts.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= ms(666) && gap <= ms(667), "cycle gap {gap:?}");
    }
}

#[test]
fn vcr_with_no_motors_still_counts_down() {
    let mut rig = Rig::new();
    let spec = PatternSpec::vcr(70, 1.0, 100, MotorSet::empty()).with_total_seconds(Some(3));
    rig.engine.start_pattern("GloveR", spec);
    rig.run_until(secs(2));
    assert!(rig.driver.frames().is_empty());
    assert_eq!(rig.engine.remaining("GloveR"), Some(1));

    rig.run_until(secs(3));
    assert!(!rig.engine.is_active("GloveR"));
    assert_eq!(rig.driver.frames_for("GloveR").len(), 1);
}

#[test]
fn countdown_tracks_clock() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), Some(10));
    assert_eq!(rig.engine.remaining("GloveL"), Some(10));

    rig.run_until(secs(4));
    assert_eq!(rig.engine.remaining("GloveL"), Some(6));
    assert!(rig.engine.is_active("GloveL"));

    rig.run_until(secs(11));
    assert!(!rig.engine.is_active("GloveL"));
    assert_eq!(rig.engine.remaining("GloveL"), Some(0));
    assert_eq!(rig.driver.frames_for("GloveL").last().map(|f| f.frame), Some(ALL_OFF));
}

#[test]
fn countdown_ends_on_the_tick_that_reaches_zero() {
    let mut rig = Rig::new();
    rig.engine
        .start_pattern("GloveL", one_hz(PatternKind::Constant, 100, Some(10)));

    rig.run_until(ms(9999));
    assert_eq!(rig.engine.remaining("GloveL"), Some(1));

    rig.run_until(secs(10));
    assert!(!rig.engine.is_active("GloveL"));
    assert_eq!(rig.engine.remaining("GloveL"), Some(0));
    assert_eq!(rig.engine.next_deadline(), None);

    let stops: Vec<_> = rig.engine.audit().with_tag(AuditTag::Stop).collect();
    assert_eq!(stops.len(), 1);
    assert!(stops[0].message.ends_with("after 0m 10s"), "{}", stops[0].message);
}

#[test]
fn timed_vcr_goes_idle_exactly_at_expiry() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), Some(10));

    rig.run_until(ms(9999));
    assert!(rig.engine.is_active("GloveL"));
    assert_eq!(rig.engine.remaining("GloveL"), Some(1));

    rig.run_until(secs(10));
    assert!(!rig.engine.is_active("GloveL"));
    assert_eq!(rig.engine.remaining("GloveL"), Some(0));
    let stops: Vec<_> = rig.engine.audit().with_tag(AuditTag::Stop).collect();
    assert_eq!(stops.len(), 1);
    assert!(stops[0].message.ends_with("after 0m 10s"), "{}", stops[0].message);

    // Bursts of the last cycle are cut short; only their all-offs remain.
    rig.run_until(secs(12));
    let after: Vec<_> = rig
        .driver
        .frames_for("GloveL")
        .into_iter()
        .filter(|f| f.at >= secs(10))
        .collect();
    assert!(after.iter().all(|f| f.is_all_off()));
}

#[test]
fn starting_twice_keeps_only_the_second_task() {
    let mut rig = Rig::new();
    let first = rig.engine.start_pattern("GloveL", one_hz(PatternKind::Constant, 30, None));
    let second = rig
        .engine
        .start_pattern("GloveL", one_hz(PatternKind::Constant, 90, Some(60)));
    assert_ne!(first, second);

    rig.run_until(secs(3));
    let on_frames: Vec<_> = rig
        .driver
        .frames_for("GloveL")
        .into_iter()
        .filter(|f| !f.is_all_off())
        .collect();
    assert_eq!(on_frames.len(), 3);
    assert!(on_frames.iter().all(|f| f.frame == uniform_frame(90)));
    assert_eq!(rig.engine.remaining("GloveL"), Some(57));
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Start).count(), 2);
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Stop).count(), 1);
}

#[test]
fn stopping_twice_emits_one_all_off() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveR", &default_vcr(), None);
    rig.run_until(ms(500));

    assert!(rig.engine.stop_pattern("GloveR"));
    assert!(!rig.engine.stop_pattern("GloveR"));
    let frames = rig.driver.frames_for("GloveR");
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_all_off());
    assert_eq!(rig.engine.remaining("GloveR"), Some(0));

    // Nothing left to fire for a stopped task that never reached a cycle.
    rig.run_until(secs(5));
    assert_eq!(rig.driver.frames_for("GloveR").len(), 1);
}

#[test]
fn stop_mid_cycle_drops_pending_bursts() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    // First cycle starts at ~666ms; stop after the second burst has fired.
    rig.run_until(ms(800));
    let before = rig.driver.frames_for("GloveL").len();
    assert_eq!(before, 3);

    rig.engine.stop_pattern("GloveL");
    rig.run_until(secs(3));

    let after: Vec<_> = rig.driver.frames_for("GloveL").into_iter().skip(before).collect();
    assert!(after.iter().all(|f| f.is_all_off()), "no burst-on after stop");
    // Explicit stop plus the three outstanding burst-offs.
    assert_eq!(after.len(), 4);
}

#[test]
fn pulse_alternates_by_elapsed_second() {
    let mut rig = Rig::new();
    rig.engine
        .start_pattern("GloveR", PatternSpec::long_buzz(PatternKind::Pulse));
    rig.run_until(secs(4));

    let frames: Vec<_> = rig.driver.frames_for("GloveR").into_iter().map(|f| f.frame).collect();
    assert_eq!(
        frames,
        vec![ALL_OFF, uniform_frame(80), ALL_OFF, uniform_frame(80)]
    );
    assert_eq!(rig.engine.remaining("GloveR"), Some(3596));
}

#[test]
fn intermittent_fires_every_fifth_second() {
    let mut rig = Rig::new();
    rig.engine
        .start_pattern("GloveL", PatternSpec::long_buzz(PatternKind::Intermittent));
    rig.run_until(secs(10));

    let frames = rig.driver.frames_for("GloveL");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].at, secs(5));
    assert_eq!(frames[1].at, secs(10));
    assert!(frames.iter().all(|f| f.frame == uniform_frame(70)));
}

#[test]
fn constant_repeats_full_amplitude() {
    let mut rig = Rig::new();
    rig.engine
        .start_pattern("GloveL", PatternSpec::long_buzz(PatternKind::Constant));
    rig.run_until(secs(1));

    let frames = rig.driver.frames_for("GloveL");
    assert!((4..=5).contains(&frames.len()), "{} frames", frames.len());
    assert!(frames.iter().all(|f| f.frame == uniform_frame(100)));
}

#[test]
fn positions_run_independently() {
    let mut rig = Rig::new();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    rig.engine
        .start_pattern("GloveR", one_hz(PatternKind::Constant, 50, None));
    rig.run_until(secs(2));
    rig.engine.stop_pattern("GloveR");
    rig.driver.clear_frames();

    rig.run_until(secs(4));
    assert!(rig.driver.frames_for("GloveR").is_empty());
    assert!(!rig.driver.frames_for("GloveL").is_empty());
}

#[test]
fn audit_entries_follow_task_lifecycle() {
    let mut rig = Rig::new();
    rig.engine
        .start_pattern("GloveL", one_hz(PatternKind::Constant, 40, Some(3)));
    rig.run_until(secs(5));

    let tags: Vec<_> = rig
        .engine
        .audit()
        .entries()
        .filter(|e| e.position.as_deref() == Some("GloveL"))
        .map(|e| e.tag)
        .collect();
    assert_eq!(
        tags,
        vec![AuditTag::Start, AuditTag::Cycle, AuditTag::Cycle, AuditTag::Stop]
    );
}

// ─── Discovery and pairing ──────────────────────────────────────────

#[test]
fn scan_polls_until_stopped() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(TWO_GLOVES);
    rig.engine.start_scan();
    assert!(rig.engine.is_scanning());
    assert!(rig.engine.devices().is_empty());

    rig.advance(ms(800));
    let ids: Vec<_> = rig.engine.devices().iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["left-1", "right-1"]);
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Devices).count(), 1);

    rig.advance(ms(1600));
    // Unchanged lists are not re-audited.
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Devices).count(), 1);

    rig.engine.stop_scan();
    assert!(!rig.engine.is_scanning());
    assert_eq!(*rig.driver.stop_scans.lock(), 1);

    // The poll already queued is discarded and nothing re-arms.
    rig.advance(secs(2));
    assert_eq!(rig.engine.next_deadline(), None);
    assert_eq!(*rig.driver.scans.lock(), 1);
}

#[test]
fn pair_shows_connected_before_transport_confirms() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(TWO_GLOVES);
    rig.engine.refresh_devices();
    assert!(!rig.engine.device("left-1").unwrap().is_connected());

    rig.engine.pair("left-1");
    assert_eq!(rig.driver.pairs.lock().as_slice(), ["left-1".to_string()]);
    assert!(rig.engine.device("left-1").unwrap().is_connected());
    assert!(rig.engine.device("left-1").unwrap().is_paired());

    // The follow-up refresh still sees isConnected:false; the overlay wins.
    rig.advance(ms(800));
    assert!(rig.engine.device("left-1").unwrap().is_connected());

    let buzz = rig.driver.frames_for("GloveL");
    assert_eq!(buzz.len(), 1);
    assert_eq!(buzz[0].at, ms(800));
    assert_eq!(buzz[0].frame, uniform_frame(70));
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Pair).count(), 1);
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Buzz).count(), 1);
}

#[test]
fn paired_device_missing_from_snapshot_disappears() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(TWO_GLOVES);
    rig.engine.refresh_devices();
    rig.engine.pair("left-1");

    rig.driver.push_snapshot(r#"[{"id":"right-1","position":"GloveR"}]"#);
    rig.advance(ms(800));
    assert!(rig.engine.device("left-1").is_none());
    // The confirmation buzz still goes to the position known at pair time.
    assert_eq!(rig.driver.frames_for("GloveL").len(), 1);
}

#[test]
fn disconnect_stops_stimulation_and_unpairs() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(
        r#"{"devices":[{"id":"left-1","position":"GloveL","isConnected":true,"isPaired":true}]}"#,
    );
    rig.engine.refresh_devices();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    rig.run_until(secs(1));

    rig.engine.disconnect("left-1");
    assert!(!rig.engine.is_active("GloveL"));
    assert_eq!(rig.driver.unpairs.lock().as_slice(), ["left-1".to_string()]);
    // Transport still reports connected; the overlay never downgrades a true.
    assert!(rig.engine.device("left-1").unwrap().is_connected());

    rig.driver
        .push_snapshot(r#"[{"id":"left-1","position":"GloveL","connected":false}]"#);
    rig.advance(ms(600));
    let device = rig.engine.device("left-1").unwrap();
    assert_eq!(device.connected, Some(false));
    assert_eq!(device.paired, Some(false));

    rig.driver.clear_frames();
    rig.advance(secs(3));
    assert!(
        rig.driver.frames().iter().all(|f| f.is_all_off()),
        "no stimulation after disconnect"
    );
    assert_eq!(rig.engine.audit().with_tag(AuditTag::Disconnect).count(), 1);
}

#[test]
fn disconnect_all_silences_everything() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(TWO_GLOVES);
    rig.engine.refresh_devices();
    rig.engine.start_vcr("GloveL", &default_vcr(), None);
    rig.engine
        .start_pattern("GloveR", one_hz(PatternKind::Constant, 50, Some(30)));

    rig.engine.disconnect_all();
    assert_eq!(
        rig.driver.unpairs.lock().as_slice(),
        ["left-1".to_string(), "right-1".to_string()]
    );
    assert!(!rig.engine.is_active("GloveL"));
    assert!(!rig.engine.is_active("GloveR"));
    assert_eq!(rig.driver.stop_all_at.lock().len(), 1);
    assert_eq!(rig.engine.countdowns(), vec![
        ("GloveL".to_string(), 0),
        ("GloveR".to_string(), 0),
    ]);
}

#[test]
fn malformed_snapshot_keeps_displayed_list() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(TWO_GLOVES);
    assert!(rig.engine.refresh_devices());
    assert_eq!(rig.engine.devices().len(), 2);

    rig.driver.push_snapshot("{not json");
    assert!(!rig.engine.refresh_devices());
    assert_eq!(rig.engine.devices().len(), 2);

    rig.driver.push_no_snapshot();
    assert!(!rig.engine.refresh_devices());
    assert_eq!(rig.engine.devices().len(), 2);

    rig.driver.push_snapshot(r#"{"devices":[]}"#);
    assert!(rig.engine.refresh_devices());
    assert!(rig.engine.devices().is_empty());
}

#[test]
fn duplicate_ids_collapse_to_last_record() {
    let mut rig = Rig::new();
    rig.driver.push_snapshot(
        r#"[
            {"id":"g","position":"GloveR","isConnected":false},
            {"id":"g","position":"GloveR","is_connected":true}
        ]"#,
    );
    rig.engine.refresh_devices();
    assert_eq!(rig.engine.devices().len(), 1);
    assert!(rig.engine.devices()[0].is_connected());
}

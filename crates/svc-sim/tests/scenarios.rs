//! End-to-end driver flows against a fresh simulator.

use svc_sim::{FcState, RcState, SimError, Simulator};

fn run(sim: &mut Simulator, tokens: &[&str]) -> String {
    sim.execute(tokens, true)
        .unwrap_or_else(|err| panic!("{tokens:?} failed: {err}"))
        .stdout
}

fn fail(sim: &mut Simulator, tokens: &[&str]) -> String {
    match sim.execute(tokens, true) {
        Err(err @ SimError::ProcessExecution { .. }) => err.error_code().unwrap_or("").to_string(),
        other => panic!("{tokens:?} should fail, got {other:?}"),
    }
}

fn mkvdisk(sim: &mut Simulator, name: &str, gb: &str) {
    run(
        sim,
        &["svctask", "mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", gb, "-unit", "gb"],
    );
}

#[test]
fn create_map_and_list() {
    let mut sim = Simulator::default();
    let out = run(
        &mut sim,
        &[
            "svctask", "mkvdisk", "-name", "volA", "-mdiskgrp", "\"openstack\"", "-size", "1",
            "-unit", "gb", "-iogrp", "0",
        ],
    );
    assert!(out.starts_with("Virtual Disk, id ["));
    assert!(run(&mut sim, &["svctask", "mkhost", "-name", "h1", "-iscsiname", "iqn.example:1"])
        .starts_with("Host, id ["));
    assert!(run(&mut sim, &["svctask", "mkvdiskhostmap", "-host", "h1", "volA"])
        .starts_with("Virtual Disk to Host map, id ["));

    let uid = sim.volumes().by_name("volA").unwrap().uid.clone();
    let listing = run(&mut sim, &["svcinfo", "lshostvdiskmap", "-delim", "!", "h1"]);
    let row = listing.lines().nth(1).unwrap();
    assert!(row.ends_with(&format!("!volA!{uid}")), "{row}");
}

#[test]
fn capacity_round_trips_in_bytes() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "v", "3");
    let view = run(&mut sim, &["lsvdisk", "-bytes", "-delim", "!", "v"]);
    assert!(view.lines().any(|l| l == "capacity!3221225472"), "{view}");
    let human = run(&mut sim, &["lsvdisk", "-delim", "!", "v"]);
    assert!(human.lines().any(|l| l == "capacity!3.00GB"), "{human}");
}

#[test]
fn host_ports_round_trip() {
    let mut sim = Simulator::default();
    run(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.example:1"]);
    run(&mut sim, &["addhostport", "-iscsiname", "iqn.example:2", "h1"]);
    let view = run(&mut sim, &["lshost", "-delim", "!", "h1"]);
    let iqns: Vec<&str> = view
        .lines()
        .filter_map(|l| l.strip_prefix("iscsi_name!"))
        .collect();
    assert_eq!(iqns, ["iqn.example:1", "iqn.example:2"]);
}

#[test]
fn snapshot_via_fcmap() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "volA", "1");
    mkvdisk(&mut sim, "volB", "1");
    let out = run(&mut sim, &["mkfcmap", "-source", "volA", "-target", "volB", "-copyrate", "50"]);
    assert_eq!(out, "FlashCopy Mapping, id [0], successfully created");

    assert_eq!(run(&mut sim, &["prestartfcmap", "0"]), "");
    assert_eq!(run(&mut sim, &["startfcmap", "0"]), "");
    run(&mut sim, &["lsfcmap", "-filtervalue", "id=0"]);
    let listing = run(&mut sim, &["lsfcmap", "-delim", "!", "-filtervalue", "id=0"]);

    let map = sim.fcmaps().get(0).unwrap();
    assert_eq!(map.status, FcState::IdleOrCopied);
    assert_eq!(map.progress, 100);
    assert_eq!(map.copy_rate, 50);
    let row: Vec<&str> = listing.lines().nth(1).unwrap().split('!').collect();
    assert_eq!(row[8], "idle_or_copied");
    assert_eq!(row[10], "50");
}

#[test]
fn remote_copy_establishment() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "volM", "1");
    mkvdisk(&mut sim, "volA", "1");
    let aux_id = sim.config().aux_system.id.clone();
    let out = run(
        &mut sim,
        &["mkrcrelationship", "-master", "volM", "-aux", "volA", "-cluster", &aux_id],
    );
    assert_eq!(out, "RC Relationship, id [0], successfully created");
    assert_eq!(sim.rc_relationships().get(0).unwrap().name, "rcrel0");
    assert_eq!(sim.volumes().by_name("volM").unwrap().rc_name.as_deref(), Some("rcrel0"));

    assert_eq!(run(&mut sim, &["startrcrelationship", "rcrel0"]), "");
    assert_eq!(sim.rc_relationships().get(0).unwrap().state, RcState::InconsistentCopying);
    run(&mut sim, &["lsrcrelationship", "rcrel0"]);
    let view = run(&mut sim, &["lsrcrelationship", "-delim", "!", "rcrel0"]);
    assert!(view.lines().any(|l| l == "state!consistent_synchronized"), "{view}");
    assert_eq!(sim.rc_relationships().get(0).unwrap().progress, 100);
}

#[test]
fn multi_cycling_global_ends_consistent_copying() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "volM", "1");
    mkvdisk(&mut sim, "volA", "1");
    run(
        &mut sim,
        &[
            "mkrcrelationship", "-master", "volM", "-aux", "volA", "-cluster", "aux-svc-sim",
            "-global", "-cyclingmode", "multi",
        ],
    );
    run(&mut sim, &["startrcrelationship", "rcrel0"]);
    run(&mut sim, &["lsrcrelationship", "rcrel0"]);
    run(&mut sim, &["lsrcrelationship", "rcrel0"]);
    assert_eq!(sim.rc_relationships().get(0).unwrap().state, RcState::ConsistentCopying);
}

#[test]
fn illegal_fcmap_transition_leaves_state() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "volA", "1");
    mkvdisk(&mut sim, "volB", "1");
    run(&mut sim, &["mkfcmap", "-source", "volA", "-target", "volB"]);
    assert_eq!(fail(&mut sim, &["stopfcmap", "0"]), "CMMVC5903E");
    assert_eq!(sim.fcmaps().get(0).unwrap().status, FcState::IdleOrCopied);
}

#[test]
fn autodelete_on_list() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "volA", "1");
    mkvdisk(&mut sim, "volB", "1");
    run(&mut sim, &["mkfcmap", "-source", "volA", "-target", "volB", "-autodelete"]);
    assert!(sim.fcmaps().get(0).unwrap().autodelete);
    run(&mut sim, &["startfcmap", "-prep", "0"]);
    run(&mut sim, &["lsfcmap"]);
    assert_eq!(sim.fcmaps().len(), 1);
    let listing = run(&mut sim, &["lsfcmap", "-nohdr"]);
    assert!(sim.fcmaps().is_empty());
    assert_eq!(listing, "");
}

#[test]
fn header_mismatch_is_one_shot() {
    let mut sim = Simulator::default();
    sim.error_injection("lsnodecanister", "header_mismatch").unwrap();
    let broken = run(&mut sim, &["lsnodecanister", "-delim", "!"]);
    let lines: Vec<&str> = broken.lines().collect();
    assert_eq!(lines[0].split('!').count() + 1, lines[1].split('!').count());

    let normal = run(&mut sim, &["lsnodecanister", "-delim", "!"]);
    let lines: Vec<&str> = normal.lines().collect();
    assert_eq!(lines[0].split('!').count(), lines[1].split('!').count());
}

#[test]
fn lsnode_alias_and_node_id() {
    let mut sim = Simulator::default();
    let canisters = run(&mut sim, &["svcinfo", "lsnodecanister", "-delim", "!"]);
    assert_eq!(run(&mut sim, &["svcinfo", "lsnode", "-delim", "!"]), canisters);
}

//! Remote-copy consistency groups and HyperSwap volumes.

use svc_sim::{CopyType, Primary, RcState, Simulator};

fn run(sim: &mut Simulator, tokens: &[&str]) -> String {
    sim.execute(tokens, true)
        .unwrap_or_else(|err| panic!("{tokens:?} failed: {err}"))
        .stdout
}

fn code(sim: &mut Simulator, tokens: &[&str]) -> String {
    let out = sim.execute(tokens, false).unwrap();
    out.error_code().unwrap_or("").to_string()
}

fn pair(sim: &mut Simulator, master: &str, aux: &str, extra: &[&str]) {
    for name in [master, aux] {
        run(
            sim,
            &["mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb"],
        );
    }
    let mut tokens = vec!["mkrcrelationship", "-master", master, "-aux", aux, "-cluster", "aux-svc-sim"];
    tokens.extend_from_slice(extra);
    run(sim, &tokens);
}

fn group_row(sim: &mut Simulator) -> Vec<String> {
    run(sim, &["lsrcconsistgrp", "-delim", "!", "-nohdr"])
        .lines()
        .next()
        .unwrap()
        .split('!')
        .map(str::to_string)
        .collect()
}

#[test]
fn consistency_group_lifecycle() {
    let mut sim = Simulator::default();
    pair(&mut sim, "m0", "a0", &[]);
    pair(&mut sim, "m1", "a1", &[]);
    pair(&mut sim, "m2", "a2", &["-global"]);
    run(&mut sim, &["mkrcconsistgrp", "-name", "g", "-cluster", "aux-svc-sim"]);
    assert_eq!(group_row(&mut sim)[9], "empty_group");

    run(&mut sim, &["chrcrelationship", "-consistgrp", "g", "rcrel0"]);
    run(&mut sim, &["chrcrelationship", "-consistgrp", "g", "rcrel1"]);
    assert_eq!(code(&mut sim, &["chrcrelationship", "-consistgrp", "g", "rcrel2"]), "CMMVC9012E");
    let row = group_row(&mut sim);
    assert_eq!(row[8], "2");
    assert_eq!(row[9], "metro");

    run(&mut sim, &["startrcconsistgrp", "g"]);
    run(&mut sim, &["lsrcconsistgrp", "g"]);
    assert_eq!(sim.rc_groups().by_name("g").unwrap().state, RcState::ConsistentSynchronized);
    for name in ["rcrel0", "rcrel1"] {
        assert_eq!(
            sim.rc_relationships().by_name(name).unwrap().state,
            RcState::ConsistentSynchronized
        );
    }

    run(&mut sim, &["switchrcconsistgrp", "-primary", "aux", "g"]);
    assert_eq!(sim.rc_relationships().get(1).unwrap().primary, Some(Primary::Aux));

    run(&mut sim, &["stoprcconsistgrp", "-access", "g"]);
    assert_eq!(sim.rc_groups().by_name("g").unwrap().state, RcState::Idling);
    assert_eq!(code(&mut sim, &["startrcconsistgrp", "g"]), "CMMVC5963E");
    run(&mut sim, &["startrcconsistgrp", "-primary", "master", "g"]);
    assert_eq!(sim.rc_groups().by_name("g").unwrap().state, RcState::InconsistentCopying);
}

#[test]
fn group_attributes_are_exclusive_and_propagate() {
    let mut sim = Simulator::default();
    pair(&mut sim, "m0", "a0", &["-global"]);
    run(&mut sim, &["mkrcconsistgrp", "-name", "g"]);
    run(&mut sim, &["chrcrelationship", "-consistgrp", "g", "rcrel0"]);
    assert_eq!(
        code(&mut sim, &["chrcconsistgrp", "-name", "g2", "-cyclingmode", "multi", "g"]),
        "CMMVC5713E"
    );
    run(&mut sim, &["chrcconsistgrp", "-cycleperiodseconds", "60", "g"]);
    assert_eq!(sim.rc_relationships().get(0).unwrap().cycle_period_seconds, 60);
    run(&mut sim, &["chrcconsistgrp", "-name", "g2", "g"]);
    assert_eq!(
        sim.rc_relationships().get(0).unwrap().consistency_group.as_deref(),
        Some("g2")
    );
    assert_eq!(code(&mut sim, &["startrcconsistgrp", "g"]), "CMMVC5804E");

    run(&mut sim, &["chrcrelationship", "-noconsistgrp", "rcrel0"]);
    assert_eq!(sim.rc_groups().by_name("g2").unwrap().state, RcState::Empty);
    assert_eq!(code(&mut sim, &["chrcrelationship", "-noconsistgrp", "rcrel0"]), "CMMVC6065E");
}

#[test]
fn relationship_guards() {
    let mut sim = Simulator::default();
    pair(&mut sim, "m0", "a0", &[]);
    assert_eq!(code(&mut sim, &["switchrcrelationship", "-primary", "aux", "rcrel0"]), "CMMVC5982E");
    assert_eq!(code(&mut sim, &["rmvdisk", "-force", "m0"]), "CMMVC5840E");
    assert_eq!(
        code(
            &mut sim,
            &["chrcrelationship", "-cyclingmode", "multi", "-cycleperiodseconds", "30", "rcrel0"]
        ),
        "CMMVC5713E"
    );
    run(&mut sim, &["rmrcrelationship", "rcrel0"]);
    assert!(sim.volumes().by_name("m0").unwrap().rc_name.is_none());
    run(&mut sim, &["rmvdisk", "m0"]);

    assert_eq!(
        code(&mut sim, &["mkrcrelationship", "-master", "a0", "-aux", "a0", "-cluster", "aux-svc-sim"]),
        "CMMVC6303E"
    );
    assert!(sim.rc_relationships().is_empty());
    assert!(sim.volumes().by_name("a0").unwrap().rc_name.is_none());
}

#[test]
fn hyperswap_volume_set() {
    let mut sim = Simulator::default();
    let out = run(
        &mut sim,
        &["mkvolume", "-name", "hs", "-pool", "\"hyperswap1:hyperswap2\"", "-size", "2", "-unit", "gb"],
    );
    assert_eq!(out, "Volume, id [0], successfully created");
    let rel = sim.rc_relationships().values().next().unwrap().clone();
    assert_eq!(rel.copy_type, CopyType::ActiveActive);
    assert_eq!(rel.master_vdisk, "hs");
    assert_eq!(rel.aux_vdisk, "site2hs");
    assert_eq!(rel.master_change.as_deref(), Some("fcsite1hs"));

    // Active-active relationships switch from any state.
    run(&mut sim, &["switchrcrelationship", "-primary", "aux", rel.name.as_str()]);
    assert_eq!(code(&mut sim, &["rmvdisk", "hs"]), "CMMVC5840E");

    run(&mut sim, &["rmvolume", "hs"]);
    assert!(sim.volumes().is_empty());
    assert!(sim.fcmaps().is_empty());
    assert!(sim.rc_relationships().is_empty());
}

#[test]
fn expand_during_fast_format() {
    let mut sim = Simulator::default();
    pair(&mut sim, "m0", "a0", &[]);
    sim.error_injection("expandvdisksize", "fast_formatting").unwrap();
    assert_eq!(
        code(&mut sim, &["expandvdisksize", "-size", "1", "-unit", "gb", "m0"]),
        "CMMVC8587E"
    );
}

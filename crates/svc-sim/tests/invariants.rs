//! Boundary behaviour, fault injection and store invariants under random
//! command sequences.

use proptest::prelude::*;
use svc_sim::{SimError, Simulator};

fn run(sim: &mut Simulator, tokens: &[&str]) -> String {
    sim.execute(tokens, true)
        .unwrap_or_else(|err| panic!("{tokens:?} failed: {err}"))
        .stdout
}

fn code(sim: &mut Simulator, tokens: &[&str]) -> String {
    let out = sim.execute(tokens, false).unwrap();
    out.error_code().unwrap_or("").to_string()
}

fn mkvdisk(sim: &mut Simulator, name: &str, gb: &str) {
    run(
        sim,
        &["mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", gb, "-unit", "gb"],
    );
}

#[test]
fn fcmap_boundaries() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "a", "1");
    mkvdisk(&mut sim, "b", "2");
    assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a", "-target", "a"]), "CMMVC6303E");
    assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a", "-target", "b"]), "CMMVC5754E");
    assert!(sim.fcmaps().is_empty());
}

#[test]
fn rmvdisk_mapped_needs_force() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "v", "1");
    run(&mut sim, &["mkhost", "-name", "h", "-iscsiname", "iqn.x:1"]);
    run(&mut sim, &["mkvdiskhostmap", "-host", "h", "v"]);
    assert_eq!(code(&mut sim, &["rmvdisk", "v"]), "CMMVC5840E");
    run(&mut sim, &["rmvdisk", "-force", "v"]);
    assert!(sim.volumes().is_empty());
    assert!(sim.mappings().is_empty());
}

#[test]
fn mapping_collisions() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "v1", "1");
    mkvdisk(&mut sim, "v2", "1");
    run(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.x:1"]);
    run(&mut sim, &["mkhost", "-name", "h2", "-iscsiname", "iqn.x:2"]);
    run(&mut sim, &["mkvdiskhostmap", "-host", "h1", "-scsi", "0", "v1"]);
    assert_eq!(
        code(&mut sim, &["mkvdiskhostmap", "-host", "h1", "-scsi", "0", "v2"]),
        "CMMVC5879E"
    );
    assert_eq!(code(&mut sim, &["mkvdiskhostmap", "-host", "h2", "v1"]), "CMMVC6071E");
    run(&mut sim, &["mkvdiskhostmap", "-host", "h2", "-force", "v1"]);
    assert_eq!(sim.mappings().len(), 2);
}

#[test]
fn duplicate_ports_and_bad_names() {
    let mut sim = Simulator::default();
    run(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.x:1"]);
    assert_eq!(code(&mut sim, &["mkhost", "-name", "h2", "-iscsiname", "iqn.x:1"]), "CMMVC6581E");
    assert_eq!(code(&mut sim, &["mkhost", "-name", "9bad", "-iscsiname", "iqn.x:9"]), "CMMVC6527E");
    assert_eq!(code(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.x:3"]), "CMMVC6035E");
}

#[test]
fn unknown_flag_and_verb_are_raised() {
    let mut sim = Simulator::default();
    assert!(matches!(
        sim.execute(&["mkvdisk", "-colour", "red"], false),
        Err(SimError::InvalidInput { .. })
    ));
    assert!(matches!(
        sim.execute(&["mkdisk"], false),
        Err(SimError::UnknownCommand { .. })
    ));
}

#[test]
fn bad_id_fault_hides_the_id() {
    let mut sim = Simulator::default();
    sim.error_injection("mkvdisk", "bad_id").unwrap();
    let out = run(
        &mut sim,
        &["mkvdisk", "-name", "v", "-mdiskgrp", "\"openstack\"", "-size", "1"],
    );
    assert_eq!(out, "Virtual Disk, id [x], successfully created");
    assert!(sim.volumes().by_name("v").is_some());
}

#[test]
fn code_fault_runs_before_handler() {
    let mut sim = Simulator::default();
    sim.error_injection("mkvdisk", "CMMVC6035E").unwrap();
    assert_eq!(
        code(&mut sim, &["mkvdisk", "-name", "v", "-mdiskgrp", "\"openstack\"", "-size", "1"]),
        "CMMVC6035E"
    );
    assert!(sim.volumes().is_empty());
    assert!(sim.error_injection("mkvdisk", "no_such_marker").is_err());
}

#[test]
fn remove_field_fault_shortens_rows() {
    let mut sim = Simulator::default();
    let normal = run(&mut sim, &["lsnodecanister", "-delim", "!", "-nohdr"]);
    sim.error_injection("lsnodecanister", "remove_field").unwrap();
    let short = run(&mut sim, &["lsnodecanister", "-delim", "!", "-nohdr"]);
    let first = |s: &str| s.lines().next().unwrap().split('!').count();
    assert_eq!(first(&short) + 1, first(&normal));
}

#[test]
fn speed_up_finishes_fcmap_in_one_listing() {
    let mut sim = Simulator::default();
    mkvdisk(&mut sim, "a", "1");
    mkvdisk(&mut sim, "b", "1");
    run(&mut sim, &["mkfcmap", "-source", "a", "-target", "b"]);
    run(&mut sim, &["startfcmap", "-prep", "0"]);
    sim.error_injection("lsfcmap", "speed_up").unwrap();
    run(&mut sim, &["lsfcmap", "0"]);
    assert_eq!(sim.fcmaps().get(0).unwrap().progress, 100);
}

#[derive(Debug, Clone)]
enum Op {
    MkVdisk(u8, u8),
    RmVdisk(u8, bool),
    ExpandVdisk(u8),
    MkHost(u8),
    RmHost(u8),
    Map(u8, u8, bool),
    Unmap(u8, u8),
    MkFcmap(u8, u8),
    RmFcmap(u8),
    ListFcmaps,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, 1u8..3).prop_map(|(v, size)| Op::MkVdisk(v, size)),
        (0u8..6, any::<bool>()).prop_map(|(v, force)| Op::RmVdisk(v, force)),
        (0u8..6).prop_map(Op::ExpandVdisk),
        (0u8..3).prop_map(Op::MkHost),
        (0u8..3).prop_map(Op::RmHost),
        (0u8..3, 0u8..6, any::<bool>()).prop_map(|(h, v, force)| Op::Map(h, v, force)),
        (0u8..3, 0u8..6).prop_map(|(h, v)| Op::Unmap(h, v)),
        (0u8..6, 0u8..6).prop_map(|(s, t)| Op::MkFcmap(s, t)),
        (0u8..4).prop_map(Op::RmFcmap),
        Just(Op::ListFcmaps),
    ]
}

fn apply(sim: &mut Simulator, op: &Op) {
    let line: Vec<String> = match op {
        Op::MkVdisk(v, size) => format!("mkvdisk -name v{v} -mdiskgrp \"openstack\" -size {size} -unit gb")
            .split(' ')
            .map(str::to_string)
            .collect(),
        Op::RmVdisk(v, true) => vec!["rmvdisk".into(), "-force".into(), format!("v{v}")],
        Op::RmVdisk(v, false) => vec!["rmvdisk".into(), format!("v{v}")],
        Op::ExpandVdisk(v) => vec![
            "expandvdisksize".into(),
            "-size".into(),
            "1".into(),
            "-unit".into(),
            "gb".into(),
            format!("v{v}"),
        ],
        Op::MkHost(h) => vec![
            "mkhost".into(),
            "-name".into(),
            format!("h{h}"),
            "-iscsiname".into(),
            format!("iqn.x:{h}"),
        ],
        Op::RmHost(h) => vec!["rmhost".into(), format!("h{h}")],
        Op::Map(h, v, force) => {
            let mut line = vec!["mkvdiskhostmap".into(), "-host".into(), format!("h{h}")];
            if *force {
                line.push("-force".into());
            }
            line.push(format!("v{v}"));
            line
        }
        Op::Unmap(h, v) => vec!["rmvdiskhostmap".into(), "-host".into(), format!("h{h}"), format!("v{v}")],
        Op::MkFcmap(s, t) => vec![
            "mkfcmap".into(),
            "-source".into(),
            format!("v{s}"),
            "-target".into(),
            format!("v{t}"),
        ],
        Op::RmFcmap(id) => vec!["rmfcmap".into(), "-force".into(), id.to_string()],
        Op::ListFcmaps => vec!["lsfcmap".into()],
    };
    let _ = sim.execute(&line, false);
}

proptest! {
    #[test]
    fn prop_references_stay_valid(ops in proptest::collection::vec(op(), 1..40)) {
        let mut sim = Simulator::default();
        for op in &ops {
            apply(&mut sim, op);

            for mapping in sim.mappings().values() {
                prop_assert!(sim.hosts().by_name(&mapping.host).is_some());
                prop_assert!(sim.volumes().by_name(&mapping.vdisk).is_some());
            }
            for map in sim.fcmaps().values() {
                let source = sim.volumes().by_name(&map.source);
                let target = sim.volumes().by_name(&map.target);
                prop_assert!(source.is_some() && target.is_some());
                prop_assert_eq!(source.map(|v| v.capacity), target.map(|v| v.capacity));
            }
            let mut luns = std::collections::BTreeSet::new();
            for mapping in sim.mappings().values() {
                prop_assert!(luns.insert((mapping.host.clone(), mapping.lun)));
            }
        }
    }

    #[test]
    fn prop_ids_are_dense_without_deletes(count in 1usize..12) {
        let mut sim = Simulator::default();
        for n in 0..count {
            let name = format!("v{n}");
            let tokens = ["mkvdisk", "-name", name.as_str(), "-mdiskgrp", "\"openstack\"", "-size", "1"];
            sim.execute(&tokens, true).unwrap();
        }
        let ids = sim.volumes().ids();
        prop_assert_eq!(ids, (0..count as u32).collect::<Vec<_>>());
    }
}

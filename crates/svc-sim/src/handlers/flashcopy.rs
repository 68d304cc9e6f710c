//! FlashCopy mappings and FlashCopy consistency groups.

use std::collections::BTreeMap;

use common::unquote;
use svc_cli::{ObjectView, Table};
use tracing::{debug, info};

use super::{check_name, created, filter_table, new_name, on_off, yes_no, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::fault::Fault;
use crate::model::{FcConsistGrp, FcMap};
use crate::simulator::Simulator;
use crate::state::{advance_fcmap, fc_group_next, fcmap_next, FcState, FcTrigger};

const FCMAP_COLUMNS: &[&str] = &[
    "id",
    "name",
    "source_vdisk_id",
    "source_vdisk_name",
    "target_vdisk_id",
    "target_vdisk_name",
    "group_id",
    "group_name",
    "status",
    "progress",
    "copy_rate",
    "clean_progress",
    "incremental",
    "partner_FC_id",
    "partner_FC_name",
    "restoring",
    "start_time",
    "rc_controlled",
];

const FCMAP_FILTERS: &[&str] = &[
    "id",
    "name",
    "source_vdisk_name",
    "target_vdisk_name",
    "source_vdisk_id",
    "target_vdisk_id",
    "status",
    "group_id",
];

impl Simulator {
    fn fcmap_id_or(&self, key: &str, code: ErrorCode) -> Result<u32, CliError> {
        let key = unquote(key);
        self.fcmaps
            .resolve_id(key)
            .ok_or_else(|| CliError::with_detail(code, format!("fcmap {}", key)))
    }

    fn fc_group_id_or(&self, key: &str, code: ErrorCode) -> Result<u32, CliError> {
        let key = unquote(key);
        self.fc_groups
            .resolve_id(key)
            .ok_or_else(|| CliError::with_detail(code, format!("fc consistency group {}", key)))
    }

    /// Remove an fcmap and detach it from its group. A group left empty
    /// goes back to `empty`, or is removed when it has autodelete set.
    pub(crate) fn remove_fcmap(&mut self, id: u32) {
        let Some(map) = self.fcmaps.remove(id) else {
            return;
        };
        info!(fcmap = %map.name, id, "removed fcmap");
        let Some(gid) = map.group_id else {
            return;
        };
        let Some(group) = self.fc_groups.get_mut(gid) else {
            return;
        };
        group.fcmaps.remove(&id);
        if group.fcmaps.is_empty() {
            if group.autodelete {
                self.fc_groups.remove(gid);
                info!(group = gid, "removed empty fc consistency group");
            } else {
                group.status = FcState::Empty;
            }
        }
    }

    /// Create an fcmap between two existing volumes, already in
    /// `idle_or_copied`.
    pub(crate) fn create_fcmap(
        &mut self,
        name: &str,
        source: &str,
        target: &str,
        copy_rate: u32,
    ) -> Result<u32, CliError> {
        let id = self.fcmaps.next_id();
        let mut map = FcMap::new(id, name, source, target);
        map.copy_rate = copy_rate;
        advance_fcmap(&mut map, FcTrigger::Make)?;
        self.fcmaps.insert(map);
        info!(fcmap = name, id, source, target, "created fcmap");
        Ok(id)
    }

    fn trigger_fcmap(&mut self, id: u32, trigger: FcTrigger) -> Result<(), CliError> {
        let map = self.fcmaps.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        let from = map.status;
        advance_fcmap(map, trigger).map_err(|code| {
            CliError::with_detail(code, format!("fcmap {} is {}", map.name, from))
        })?;
        debug!(fcmap = %map.name, from = %from, to = %map.status, "fcmap transition");
        Ok(())
    }

    /// One `wait`, or under `speed_up` as many as change anything.
    fn wait_fcmap(&mut self, id: u32, speed_up: bool) {
        loop {
            let Some(map) = self.fcmaps.get_mut(id) else {
                return;
            };
            let before = (map.status, map.progress);
            if advance_fcmap(map, FcTrigger::Wait).is_err() {
                return;
            }
            if !speed_up || (map.status, map.progress) == before {
                return;
            }
        }
    }

    /// Apply `trigger` to a group and every member, or to nothing if any
    /// of them refuses it.
    fn trigger_fc_group(&mut self, gid: u32, trigger: FcTrigger) -> Result<(), CliError> {
        let group = self.fc_groups.get(gid).ok_or(ErrorCode::NotSuitable)?;
        let next = fc_group_next(group.status, trigger).map_err(|code| {
            CliError::with_detail(code, format!("group {} is {}", group.name, group.status))
        })?;
        let members: Vec<u32> = group.fcmaps.keys().copied().collect();
        for id in &members {
            if let Some(map) = self.fcmaps.get(*id) {
                fcmap_next(map.status, trigger)?;
            }
        }
        for id in members {
            self.trigger_fcmap(id, trigger)?;
        }
        if let (Some(next), Some(group)) = (next, self.fc_groups.get_mut(gid)) {
            group.status = next;
        }
        Ok(())
    }

    fn wait_fc_group(&mut self, gid: u32) {
        let Some(group) = self.fc_groups.get(gid) else {
            return;
        };
        let status = group.status;
        let members: Vec<u32> = group.fcmaps.keys().copied().collect();
        for id in &members {
            self.wait_fcmap(*id, false);
        }
        let next = match status {
            FcState::Copying => {
                let done = members.iter().all(|id| {
                    self.fcmaps
                        .get(*id)
                        .map_or(true, |m| m.status == FcState::IdleOrCopied)
                });
                done.then_some(FcState::IdleOrCopied)
            }
            other => fc_group_next(other, FcTrigger::Wait).ok().flatten(),
        };
        if let (Some(next), Some(group)) = (next, self.fc_groups.get_mut(gid)) {
            group.status = next;
        }
    }

    fn fcmap_fields(&self, map: &FcMap) -> Vec<(&'static str, String)> {
        let volume_id = |name: &str| {
            self.volumes
                .by_name(name)
                .map(|v| v.id.to_string())
                .unwrap_or_default()
        };
        let group = map.group_id.and_then(|gid| self.fc_groups.get(gid));
        vec![
            ("id", map.id.to_string()),
            ("name", map.name.clone()),
            ("source_vdisk_id", volume_id(&map.source)),
            ("source_vdisk_name", map.source.clone()),
            ("target_vdisk_id", volume_id(&map.target)),
            ("target_vdisk_name", map.target.clone()),
            ("group_id", group.map(|g| g.id.to_string()).unwrap_or_default()),
            ("group_name", group.map(|g| g.name.clone()).unwrap_or_default()),
            ("status", map.status.to_string()),
            ("progress", map.progress.to_string()),
            ("copy_rate", map.copy_rate.to_string()),
            ("clean_progress", "100".to_string()),
            ("incremental", "off".to_string()),
            ("partner_FC_id", String::new()),
            ("partner_FC_name", String::new()),
            ("restoring", "no".to_string()),
            ("start_time", String::new()),
            ("rc_controlled", yes_no(map.rc_controlled).to_string()),
        ]
    }

    pub(crate) fn mkfcmap(&mut self, req: &Request) -> HandlerResult {
        let source = self.volume_or(req.require("source")?, ErrorCode::DoesNotExist)?;
        let target = self.volume_or(req.require("target")?, ErrorCode::DoesNotExist)?;
        if source.id == target.id {
            return Err(CliError::with_detail(ErrorCode::SameSourceTarget, source.name.clone()).into());
        }
        if source.capacity != target.capacity {
            return Err(CliError::with_detail(
                ErrorCode::DoesNotExist,
                format!("{} and {} differ in size", source.name, target.name),
            )
            .into());
        }
        let (source, target) = (source.name.clone(), target.name.clone());

        let copy_rate = req.parse::<u32>("copyrate")?.unwrap_or(50);
        let clean_rate = req.parse::<u32>("cleanrate")?.unwrap_or(50);
        let group_id = match req.flag("consistgrp") {
            Some(key) => {
                let gid = self.fc_group_id_or(key, ErrorCode::DoesNotExist)?;
                let status = self.fc_groups.get(gid).map(|g| g.status);
                if !matches!(status, Some(FcState::Empty) | Some(FcState::IdleOrCopied)) {
                    return Err(ErrorCode::FcInvalidState.into());
                }
                Some(gid)
            }
            None => None,
        };
        let id = self.fcmaps.next_id();
        let name = new_name(req, &self.fcmaps, "fcmap", id)?;

        self.create_fcmap(&name, &source, &target, copy_rate)?;
        if let Some(map) = self.fcmaps.get_mut(id) {
            map.clean_rate = clean_rate;
            map.autodelete = req.switch("autodelete").unwrap_or(false);
            map.group_id = group_id;
        }
        if let Some(group) = group_id.and_then(|gid| self.fc_groups.get_mut(gid)) {
            group.fcmaps.insert(id, name);
            if group.status == FcState::Empty {
                if let Some(next) = fc_group_next(group.status, FcTrigger::Add)? {
                    group.status = next;
                }
            }
        }
        Ok(created(req, "FlashCopy Mapping", id))
    }

    pub(crate) fn prestartfcmap(&mut self, req: &Request) -> HandlerResult {
        let id = self.fcmap_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        self.trigger_fcmap(id, FcTrigger::Prepare)?;
        Ok(String::new())
    }

    pub(crate) fn startfcmap(&mut self, req: &Request) -> HandlerResult {
        let id = self.fcmap_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        if req.has("prep") {
            self.trigger_fcmap(id, FcTrigger::Prepare)?;
            self.trigger_fcmap(id, FcTrigger::Wait)?;
        } else if self.fcmaps.get(id).is_some_and(|m| m.status == FcState::Preparing) {
            self.trigger_fcmap(id, FcTrigger::Wait)?;
        }
        self.trigger_fcmap(id, FcTrigger::Start)?;
        Ok(String::new())
    }

    pub(crate) fn stopfcmap(&mut self, req: &Request) -> HandlerResult {
        let id = self.fcmap_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        self.trigger_fcmap(id, FcTrigger::Stop)?;
        Ok(String::new())
    }

    pub(crate) fn rmfcmap(&mut self, req: &Request) -> HandlerResult {
        let id = self.fcmap_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let trigger = if req.has("force") {
            FcTrigger::DeleteForce
        } else {
            FcTrigger::Delete
        };
        self.trigger_fcmap(id, trigger)?;
        if self.fcmaps.get(id).is_some_and(|m| m.status == FcState::End) {
            self.remove_fcmap(id);
        }
        Ok(String::new())
    }

    pub(crate) fn chfcmap(&mut self, req: &Request) -> HandlerResult {
        let id = self.fcmap_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let new_name = match req.flag("name") {
            Some(raw) => {
                let name = unquote(raw).to_string();
                check_name(&self.fcmaps, &name)?;
                Some(name)
            }
            None => None,
        };
        let copy_rate = req.parse::<u32>("copyrate")?;
        let clean_rate = req.parse::<u32>("cleanrate")?;
        let autodelete = req.switch("autodelete");
        if new_name.is_none() && copy_rate.is_none() && clean_rate.is_none() && autodelete.is_none() {
            return Err(ErrorCode::MissingParameters.into());
        }

        let map = self.fcmaps.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        if let Some(rate) = copy_rate {
            map.copy_rate = rate;
        }
        if let Some(rate) = clean_rate {
            map.clean_rate = rate;
        }
        if let Some(autodelete) = autodelete {
            map.autodelete = autodelete;
        }
        if let Some(name) = new_name {
            map.name = name.clone();
            if let Some(group) = map.group_id.and_then(|gid| self.fc_groups.get_mut(gid)) {
                group.fcmaps.insert(id, name);
            }
        }
        Ok(String::new())
    }

    pub(crate) fn lsfcmap(&mut self, req: &Request) -> HandlerResult {
        let speed_up = req.fault_is(Fault::SpeedUp);

        if let Some(key) = req.obj() {
            let id = self.fcmap_id_or(key, ErrorCode::DoesNotExist)?;
            self.wait_fcmap(id, speed_up);
            let map = self.fcmaps.get(id).ok_or(ErrorCode::DoesNotExist)?;
            let mut view = ObjectView::new();
            for (label, value) in self.fcmap_fields(map) {
                view.push(label, value);
            }
            view.push("autodelete", on_off(map.autodelete));
            view.push("clean_rate", map.clean_rate.to_string());
            return Ok(view.render(&req.opts));
        }

        let mut selection = self.fcmap_table(self.fcmaps.ids());
        filter_table(req, &mut selection, FCMAP_FILTERS)?;
        let ids: Vec<u32> = selection
            .rows()
            .iter()
            .filter_map(|row| row.first()?.parse().ok())
            .collect();

        let mut remaining = Vec::with_capacity(ids.len());
        for id in ids {
            self.wait_fcmap(id, speed_up);
            match self.fcmaps.get(id) {
                Some(map) if map.autodelete && map.progress == 100 => self.remove_fcmap(id),
                Some(_) => remaining.push(id),
                None => {}
            }
        }
        // A wait can move a map out of a status filter.
        let mut table = self.fcmap_table(remaining);
        filter_table(req, &mut table, FCMAP_FILTERS)?;
        Ok(table.render(&req.opts))
    }

    fn fcmap_table(&self, ids: Vec<u32>) -> Table {
        let mut table = Table::new(FCMAP_COLUMNS);
        for map in ids.into_iter().filter_map(|id| self.fcmaps.get(id)) {
            table.push(self.fcmap_fields(map).into_iter().map(|(_, value)| value));
        }
        table
    }

    pub(crate) fn mkfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let id = self.fc_groups.next_id();
        let name = new_name(req, &self.fc_groups, "fccstgrp", id)?;
        let status = fc_group_next(FcState::Begin, FcTrigger::Make)?.unwrap_or(FcState::Empty);
        self.fc_groups.insert(FcConsistGrp {
            id,
            name: name.clone(),
            status,
            autodelete: req.switch("autodelete").unwrap_or(false),
            fcmaps: BTreeMap::new(),
        });
        info!(group = %name, id, "created fc consistency group");
        Ok(created(req, "FlashCopy Consistency Group", id))
    }

    pub(crate) fn prestartfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.fc_group_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        self.trigger_fc_group(gid, FcTrigger::Prepare)?;
        Ok(String::new())
    }

    pub(crate) fn startfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.fc_group_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        if req.has("prep") {
            self.trigger_fc_group(gid, FcTrigger::Prepare)?;
            self.wait_fc_group(gid);
        } else if self.fc_groups.get(gid).is_some_and(|g| g.status == FcState::Preparing) {
            self.wait_fc_group(gid);
        }
        self.trigger_fc_group(gid, FcTrigger::Start)?;
        Ok(String::new())
    }

    pub(crate) fn stopfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.fc_group_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        self.trigger_fc_group(gid, FcTrigger::Stop)?;
        Ok(String::new())
    }

    pub(crate) fn rmfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.fc_group_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let trigger = if req.has("force") {
            FcTrigger::DeleteForce
        } else {
            FcTrigger::Delete
        };
        let group = self.fc_groups.get(gid).ok_or(ErrorCode::NotSuitable)?;
        fc_group_next(group.status, trigger)?;
        if let Some(group) = self.fc_groups.remove(gid) {
            for id in group.fcmaps.keys() {
                if let Some(map) = self.fcmaps.get_mut(*id) {
                    map.group_id = None;
                }
            }
            info!(group = %group.name, id = gid, "removed fc consistency group");
        }
        Ok(String::new())
    }

    pub(crate) fn lsfcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let Some(key) = req.obj() else {
            let mut table = Table::new(&["id", "name", "status", "start_time"]);
            for group in self.fc_groups.values() {
                table.push([
                    group.id.to_string(),
                    group.name.clone(),
                    group.status.to_string(),
                    String::new(),
                ]);
            }
            return Ok(table.render(&req.opts));
        };

        let gid = self.fc_group_id_or(key, ErrorCode::DoesNotExist)?;
        loop {
            let before = self.fc_groups.get(gid).map(|g| g.status);
            self.wait_fc_group(gid);
            let after = self.fc_groups.get(gid).map(|g| g.status);
            if !req.fault_is(Fault::SpeedUp) || before == after {
                break;
            }
        }
        let group = self.fc_groups.get(gid).ok_or(ErrorCode::DoesNotExist)?;
        let mut view = ObjectView::new()
            .with("id", group.id.to_string())
            .with("name", group.name.as_str())
            .with("status", group.status.as_str())
            .with("autodelete", on_off(group.autodelete))
            .with("start_time", "");
        for (id, name) in &group.fcmaps {
            view.push("FC_mapping_id", id.to_string());
            view.push("FC_mapping_name", name.as_str());
        }
        Ok(view.render(&req.opts))
    }
}

#[cfg(test)]
mod tests {
    use crate::simulator::Simulator;
    use crate::state::FcState;

    fn ok(sim: &mut Simulator, tokens: &[&str]) -> String {
        sim.execute(tokens, true).unwrap().stdout
    }

    fn code(sim: &mut Simulator, tokens: &[&str]) -> String {
        let out = sim.execute(tokens, false).unwrap();
        out.error_code().unwrap_or("").to_string()
    }

    fn with_volumes(names: &[&str]) -> Simulator {
        let mut sim = Simulator::default();
        for name in names {
            ok(
                &mut sim,
                &["mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb"],
            );
        }
        sim
    }

    fn status(sim: &Simulator, id: u32) -> FcState {
        sim.fcmaps().get(id).unwrap().status
    }

    #[test]
    fn test_fcmap_lifecycle_via_listing() {
        let mut sim = with_volumes(&["a", "b"]);
        let out = ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b", "-copyrate", "50"]);
        assert_eq!(out, "FlashCopy Mapping, id [0], successfully created");
        assert_eq!(status(&sim, 0), FcState::IdleOrCopied);
        assert_eq!(code(&mut sim, &["stopfcmap", "0"]), "CMMVC5903E");

        ok(&mut sim, &["prestartfcmap", "0"]);
        ok(&mut sim, &["startfcmap", "0"]);
        let first = ok(&mut sim, &["lsfcmap", "-delim", "!", "-filtervalue", "id=0"]);
        assert!(first.contains("!copying!50!"));
        ok(&mut sim, &["lsfcmap", "-filtervalue", "id=0"]);
        let map = sim.fcmaps().get(0).unwrap();
        assert_eq!((map.status, map.progress, map.copy_rate), (FcState::IdleOrCopied, 100, 50));
        ok(&mut sim, &["rmfcmap", "0"]);
        assert!(sim.fcmaps().is_empty());
    }

    #[test]
    fn test_mkfcmap_guards() {
        let mut sim = with_volumes(&["a", "b"]);
        ok(
            &mut sim,
            &["mkvdisk", "-name", "big", "-mdiskgrp", "\"openstack\"", "-size", "2", "-unit", "gb"],
        );
        assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a", "-target", "a"]), "CMMVC6303E");
        assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a", "-target", "big"]), "CMMVC5754E");
        assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a", "-target", "nope"]), "CMMVC5754E");
        assert_eq!(code(&mut sim, &["mkfcmap", "-source", "a"]), "CMMVC5707E");
        assert!(sim.fcmaps().is_empty());
    }

    #[test]
    fn test_autodelete_removed_on_listing() {
        let mut sim = with_volumes(&["a", "b"]);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b", "-autodelete"]);
        ok(&mut sim, &["startfcmap", "-prep", "0"]);
        ok(&mut sim, &["lsfcmap"]);
        let out = ok(&mut sim, &["lsfcmap", "-nohdr"]);
        assert!(out.is_empty());
        assert!(sim.fcmaps().is_empty());
        // volume is free again
        ok(&mut sim, &["rmvdisk", "b"]);
    }

    #[test]
    fn test_status_filter_applies_after_wait() {
        let mut sim = with_volumes(&["a", "b"]);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b", "-copyrate", "50"]);
        ok(&mut sim, &["startfcmap", "-prep", "0"]);

        let first = ok(&mut sim, &["lsfcmap", "-nohdr", "-filtervalue", "status=copying"]);
        assert_eq!(first.lines().count(), 1);
        let second = ok(&mut sim, &["lsfcmap", "-nohdr", "-filtervalue", "status=copying"]);
        assert!(second.is_empty());
        assert_eq!(status(&sim, 0), FcState::IdleOrCopied);
    }

    #[test]
    fn test_speed_up_and_stop() {
        let mut sim = with_volumes(&["a", "b"]);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b"]);
        ok(&mut sim, &["startfcmap", "-prep", "0"]);
        ok(&mut sim, &["stopfcmap", "0"]);
        assert_eq!(status(&sim, 0), FcState::Stopping);
        sim.error_injection("lsfcmap", "speed_up").unwrap();
        ok(&mut sim, &["lsfcmap", "0"]);
        assert_eq!(status(&sim, 0), FcState::Stopped);
        assert_eq!(code(&mut sim, &["rmfcmap", "0"]), "CMMVC5903E");
        ok(&mut sim, &["rmfcmap", "-force", "0"]);
        assert!(sim.fcmaps().is_empty());
    }

    #[test]
    fn test_consistency_group_follows_members() {
        let mut sim = with_volumes(&["a", "b", "c", "d"]);
        let out = ok(&mut sim, &["mkfcconsistgrp", "-name", "cg", "-autodelete"]);
        assert_eq!(out, "FlashCopy Consistency Group, id [0], successfully created");
        assert_eq!(sim.fc_groups().get(0).unwrap().status, FcState::Empty);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b", "-consistgrp", "cg"]);
        ok(&mut sim, &["mkfcmap", "-source", "c", "-target", "d", "-consistgrp", "0"]);
        assert_eq!(sim.fc_groups().get(0).unwrap().status, FcState::IdleOrCopied);

        ok(&mut sim, &["prestartfcconsistgrp", "cg"]);
        ok(&mut sim, &["startfcconsistgrp", "cg"]);
        assert_eq!(status(&sim, 1), FcState::Copying);
        ok(&mut sim, &["lsfcconsistgrp", "cg"]);
        let view = ok(&mut sim, &["lsfcconsistgrp", "-delim", "!", "cg"]);
        assert!(view.contains("status!idle_or_copied"));
        assert!(view.contains("FC_mapping_name!fcmap1"));

        ok(&mut sim, &["rmfcmap", "0"]);
        ok(&mut sim, &["rmfcmap", "1"]);
        assert!(sim.fc_groups().is_empty());
    }

    #[test]
    fn test_chfcmap() {
        let mut sim = with_volumes(&["a", "b"]);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b"]);
        ok(&mut sim, &["chfcmap", "-copyrate", "80", "-autodelete", "on", "0"]);
        let map = sim.fcmaps().get(0).unwrap();
        assert_eq!((map.copy_rate, map.autodelete), (80, true));
        ok(&mut sim, &["chfcmap", "-name", "snap", "0"]);
        assert_eq!(sim.fcmaps().get(0).unwrap().name, "snap");
        assert_eq!(code(&mut sim, &["chfcmap", "0"]), "CMMVC5707E");
    }
}

//! Remote-copy relationships and remote-copy consistency groups.

use common::{unquote, SystemSpec};
use svc_cli::{ObjectView, Table};
use tracing::{debug, info};

use super::{check_name, created, filter_table, new_name, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::fault::Fault;
use crate::model::{ClusterRef, CopyType, CyclingMode, Primary, RcConsistGrp, RcRelationship};
use crate::simulator::Simulator;
use crate::state::{advance_rcrel, rc_group_next, rc_rel_next, synchronized_state, RcState, RcTrigger};

const RCREL_COLUMNS: &[&str] = &[
    "id",
    "name",
    "master_cluster_id",
    "master_cluster_name",
    "master_vdisk_id",
    "master_vdisk_name",
    "aux_cluster_id",
    "aux_cluster_name",
    "aux_vdisk_id",
    "aux_vdisk_name",
    "consistency_group_id",
    "consistency_group_name",
    "primary",
    "state",
    "bg_copy_priority",
    "progress",
    "freeze_time",
    "status",
    "sync",
    "copy_type",
    "cycling_mode",
    "cycle_period_seconds",
    "master_change_vdisk_id",
    "master_change_vdisk_name",
    "aux_change_vdisk_id",
    "aux_change_vdisk_name",
];

const RCCG_COLUMNS: &[&str] = &[
    "id",
    "name",
    "master_cluster_id",
    "master_cluster_name",
    "aux_cluster_id",
    "aux_cluster_name",
    "primary",
    "state",
    "relationship_count",
    "copy_type",
    "cycling_mode",
    "freeze_time",
];

/// Flags `chrcrelationship` accepts one at a time.
const CHRCREL_ATTRIBUTES: &[&str] = &[
    "consistgrp",
    "noconsistgrp",
    "masterchange",
    "auxchange",
    "nomasterchange",
    "noauxchange",
    "cycleperiodseconds",
    "cyclingmode",
];

fn cluster(system: &SystemSpec) -> ClusterRef {
    ClusterRef {
        id: system.id.clone(),
        name: system.name.clone(),
    }
}

fn parse_primary(req: &Request) -> Result<Option<Primary>, CliError> {
    req.flag("primary")
        .map(|raw| {
            Primary::parse(unquote(raw)).ok_or_else(|| {
                CliError::with_detail(ErrorCode::UnsupportedParameter, format!("-primary {}", raw))
            })
        })
        .transpose()
}

fn parse_cycling(req: &Request) -> Result<Option<CyclingMode>, CliError> {
    req.flag("cyclingmode")
        .map(|raw| {
            CyclingMode::parse(unquote(raw)).ok_or_else(|| {
                CliError::with_detail(ErrorCode::UnsupportedParameter, format!("-cyclingmode {}", raw))
            })
        })
        .transpose()
}

fn primary_str(primary: Option<Primary>) -> String {
    primary.map(Primary::as_str).unwrap_or_default().to_string()
}

impl Simulator {
    pub(crate) fn local_cluster(&self) -> ClusterRef {
        cluster(&self.config.local_system)
    }

    /// The local or the aux system, by id or name.
    fn cluster_or(&self, key: &str) -> Result<ClusterRef, CliError> {
        let key = unquote(key);
        [&self.config.local_system, &self.config.aux_system]
            .into_iter()
            .find(|system| system.id == key || system.name == key)
            .map(cluster)
            .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("cluster {}", key)))
    }

    fn rcrel_id_or(&self, key: &str, code: ErrorCode) -> Result<u32, CliError> {
        let key = unquote(key);
        self.rc_relationships
            .resolve_id(key)
            .ok_or_else(|| CliError::with_detail(code, format!("relationship {}", key)))
    }

    fn rc_group_id_or(&self, key: &str, code: ErrorCode) -> Result<u32, CliError> {
        let key = unquote(key);
        self.rc_groups
            .resolve_id(key)
            .ok_or_else(|| CliError::with_detail(code, format!("rc consistency group {}", key)))
    }

    fn rc_group_members(&self, group: &str) -> Vec<u32> {
        self.rc_relationships
            .ids_where(|rel| rel.consistency_group.as_deref() == Some(group))
    }

    /// Insert a relationship and link both volumes to it.
    pub(crate) fn insert_rcrel(&mut self, rel: RcRelationship) {
        for vdisk in [&rel.master_vdisk, &rel.aux_vdisk] {
            if let Some(id) = self.volumes.resolve_id(vdisk) {
                if let Some(vol) = self.volumes.get_mut(id) {
                    vol.rc_id = Some(rel.id);
                    vol.rc_name = Some(rel.name.clone());
                }
            }
        }
        info!(relationship = %rel.name, id = rel.id, copy_type = %rel.copy_type, "created relationship");
        self.rc_relationships.insert(rel);
    }

    /// Remove a relationship, unlink its volumes and fix up its group.
    pub(crate) fn remove_rcrel(&mut self, id: u32) {
        let Some(rel) = self.rc_relationships.remove(id) else {
            return;
        };
        for vol in self.volumes.values_mut() {
            if vol.rc_id == Some(id) {
                vol.rc_id = None;
                vol.rc_name = None;
            }
        }
        if let Some(group) = &rel.consistency_group {
            self.reset_if_empty(group);
        }
        info!(relationship = %rel.name, id, "removed relationship");
    }

    fn reset_if_empty(&mut self, group: &str) {
        if !self.rc_group_members(group).is_empty() {
            return;
        }
        if let Some(gid) = self.rc_groups.resolve_id(group) {
            if let Some(group) = self.rc_groups.get_mut(gid) {
                group.state = RcState::Empty;
                group.copy_type = None;
            }
        }
    }

    fn join_rc_group(&mut self, rel_id: u32, gid: u32) -> Result<(), CliError> {
        let rel = self
            .rc_relationships
            .get(rel_id)
            .ok_or(ErrorCode::NotSuitable)?;
        let group = self.rc_groups.get(gid).ok_or(ErrorCode::DoesNotExist)?;
        if rel.consistency_group.is_some() {
            return Err(CliError::with_detail(ErrorCode::AlreadyExists, rel.name.clone()));
        }
        if group.copy_type.is_some_and(|ct| ct != rel.copy_type) {
            return Err(ErrorCode::CopyTypeMismatch.into());
        }

        let group_name = group.name.clone();
        if self.rc_group_members(&group_name).is_empty() {
            let adopted = rc_group_next(group.state, RcTrigger::Add)?.map(|_| rel.state);
            let (primary, copy_type, cycling, period) =
                (rel.primary, rel.copy_type, rel.cycling_mode, rel.cycle_period_seconds);
            if let Some(group) = self.rc_groups.get_mut(gid) {
                if let Some(state) = adopted {
                    group.state = state;
                }
                group.primary = primary;
                group.copy_type = Some(copy_type);
                group.cycling_mode = cycling;
                group.cycle_period_seconds = period;
            }
        } else {
            let (state, primary, cycling, period) = (
                group.state,
                group.primary,
                group.cycling_mode,
                group.cycle_period_seconds,
            );
            if let Some(rel) = self.rc_relationships.get_mut(rel_id) {
                rel.state = state;
                rel.primary = primary;
                rel.cycling_mode = cycling;
                rel.cycle_period_seconds = period;
            }
        }
        if let Some(rel) = self.rc_relationships.get_mut(rel_id) {
            rel.consistency_group = Some(group_name);
        }
        Ok(())
    }

    /// One `wait`, or under `speed_up` as many as change anything.
    fn wait_rcrel(&mut self, id: u32, speed_up: bool) {
        loop {
            let Some(rel) = self.rc_relationships.get_mut(id) else {
                return;
            };
            let before = (rel.state, rel.progress);
            if advance_rcrel(rel, RcTrigger::Wait).is_err() {
                return;
            }
            if !speed_up || (rel.state, rel.progress) == before {
                return;
            }
        }
    }

    fn trigger_rcrel(&mut self, id: u32, trigger: RcTrigger) -> Result<(), CliError> {
        let rel = self
            .rc_relationships
            .get_mut(id)
            .ok_or(ErrorCode::NotSuitable)?;
        let from = rel.state;
        advance_rcrel(rel, trigger).map_err(|code| {
            CliError::with_detail(code, format!("relationship {} is {}", rel.name, from))
        })?;
        debug!(relationship = %rel.name, from = %from, to = %rel.state, "relationship transition");
        Ok(())
    }

    /// Apply `trigger` to a group and every member, or to nothing if any
    /// of them refuses it.
    fn trigger_rc_group(&mut self, gid: u32, trigger: RcTrigger) -> Result<Vec<u32>, CliError> {
        let group = self.rc_groups.get(gid).ok_or(ErrorCode::ObjectMissing)?;
        let next = rc_group_next(group.state, trigger).map_err(|code| {
            CliError::with_detail(code, format!("group {} is {}", group.name, group.state))
        })?;
        let members = self.rc_group_members(&group.name);
        for id in &members {
            if let Some(rel) = self.rc_relationships.get(*id) {
                rc_rel_next(rel.state, trigger)?;
            }
        }
        for id in &members {
            self.trigger_rcrel(*id, trigger)?;
        }
        if let (Some(next), Some(group)) = (next, self.rc_groups.get_mut(gid)) {
            group.state = next;
        }
        Ok(members)
    }

    fn set_group_primary(&mut self, gid: u32, members: &[u32], primary: Option<Primary>) {
        if let Some(group) = self.rc_groups.get_mut(gid) {
            group.primary = primary;
        }
        for id in members {
            if let Some(rel) = self.rc_relationships.get_mut(*id) {
                rel.primary = primary;
            }
        }
    }

    /// A group `wait` completes the initial copy of every member at once.
    fn wait_rc_group(&mut self, gid: u32) {
        let Some(group) = self.rc_groups.get(gid) else {
            return;
        };
        if group.state != RcState::InconsistentCopying {
            return;
        }
        let state = synchronized_state(group.cycling_mode, group.copy_type);
        for id in self.rc_group_members(&group.name) {
            if let Some(rel) = self.rc_relationships.get_mut(id) {
                rel.state = state;
                rel.progress = 100;
            }
        }
        if let Some(group) = self.rc_groups.get_mut(gid) {
            group.state = state;
        }
    }

    fn rcrel_fields(&self, rel: &RcRelationship) -> Vec<String> {
        let volume_id = |name: Option<&str>| {
            name.and_then(|name| self.volumes.by_name(name))
                .map(|v| v.id.to_string())
                .unwrap_or_default()
        };
        let group_id = rel
            .consistency_group
            .as_deref()
            .and_then(|name| self.rc_groups.by_name(name))
            .map(|g| g.id.to_string())
            .unwrap_or_default();
        vec![
            rel.id.to_string(),
            rel.name.clone(),
            rel.master_cluster.id.clone(),
            rel.master_cluster.name.clone(),
            volume_id(Some(rel.master_vdisk.as_str())),
            rel.master_vdisk.clone(),
            rel.aux_cluster.id.clone(),
            rel.aux_cluster.name.clone(),
            volume_id(Some(rel.aux_vdisk.as_str())),
            rel.aux_vdisk.clone(),
            group_id,
            rel.consistency_group.clone().unwrap_or_default(),
            primary_str(rel.primary),
            rel.state.to_string(),
            rel.bg_copy_priority.to_string(),
            rel.progress.to_string(),
            String::new(),
            rel.status.clone(),
            String::new(),
            rel.copy_type.to_string(),
            rel.cycling_mode.as_str().to_string(),
            rel.cycle_period_seconds.to_string(),
            volume_id(rel.master_change.as_deref()),
            rel.master_change.clone().unwrap_or_default(),
            volume_id(rel.aux_change.as_deref()),
            rel.aux_change.clone().unwrap_or_default(),
        ]
    }

    fn rccg_fields(&self, group: &RcConsistGrp) -> Vec<String> {
        vec![
            group.id.to_string(),
            group.name.clone(),
            group.master_cluster.id.clone(),
            group.master_cluster.name.clone(),
            group.aux_cluster.id.clone(),
            group.aux_cluster.name.clone(),
            primary_str(group.primary),
            group.state.to_string(),
            self.rc_group_members(&group.name).len().to_string(),
            group.copy_type_display().to_string(),
            group.cycling_mode.as_str().to_string(),
            String::new(),
        ]
    }

    pub(crate) fn mkrcrelationship(&mut self, req: &Request) -> HandlerResult {
        let master = self.volume_or(req.require("master")?, ErrorCode::DoesNotExist)?;
        let aux = self.volume_or(req.require("aux")?, ErrorCode::DoesNotExist)?;
        let aux_cluster = self.cluster_or(req.require("cluster")?)?;
        if master.id == aux.id {
            return Err(CliError::with_detail(ErrorCode::SameSourceTarget, master.name.clone()).into());
        }
        if master.capacity != aux.capacity {
            return Err(CliError::with_detail(
                ErrorCode::DoesNotExist,
                format!("{} and {} differ in size", master.name, aux.name),
            )
            .into());
        }
        if let Some(busy) = [master, aux].into_iter().find(|v| v.rc_name.is_some()) {
            return Err(CliError::with_detail(ErrorCode::AlreadyExists, busy.name.clone()).into());
        }
        let (master, aux) = (master.name.clone(), aux.name.clone());

        let copy_type = if req.has("activeactive") {
            CopyType::ActiveActive
        } else if req.has("global") {
            CopyType::Global
        } else {
            CopyType::Metro
        };
        let cycling = parse_cycling(req)?;
        let group_id = match req.flag("consistgrp") {
            Some(key) => Some(self.rc_group_id_or(key, ErrorCode::DoesNotExist)?),
            None => None,
        };
        let id = self.rc_relationships.next_id();
        let name = new_name(req, &self.rc_relationships, "rcrel", id)?;

        let mut rel = RcRelationship::new(id, &name, &master, &aux, copy_type);
        rel.master_cluster = self.local_cluster();
        rel.aux_cluster = aux_cluster;
        rel.cycling_mode = cycling.unwrap_or(CyclingMode::None);
        self.insert_rcrel(rel);
        if let Some(gid) = group_id {
            if let Err(err) = self.join_rc_group(id, gid) {
                self.remove_rcrel(id);
                return Err(err.into());
            }
        }
        Ok(created(req, "RC Relationship", id))
    }

    pub(crate) fn startrcrelationship(&mut self, req: &Request) -> HandlerResult {
        let id = self.rcrel_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let primary = parse_primary(req)?;
        let state = self.rc_relationships.get(id).map(|rel| rel.state);
        if state == Some(RcState::Idling) && primary.is_none() {
            return Err(ErrorCode::NoDirection.into());
        }
        self.trigger_rcrel(id, RcTrigger::Start)?;
        if let (Some(primary), Some(rel)) = (primary, self.rc_relationships.get_mut(id)) {
            rel.primary = Some(primary);
        }
        Ok(String::new())
    }

    pub(crate) fn stoprcrelationship(&mut self, req: &Request) -> HandlerResult {
        let id = self.rcrel_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        if req.has("access") {
            self.trigger_rcrel(id, RcTrigger::StopAccess)?;
            if let Some(rel) = self.rc_relationships.get_mut(id) {
                rel.primary = None;
            }
        } else {
            self.trigger_rcrel(id, RcTrigger::Stop)?;
        }
        Ok(String::new())
    }

    pub(crate) fn switchrcrelationship(&mut self, req: &Request) -> HandlerResult {
        let id = self.rcrel_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let primary = parse_primary(req)?.ok_or(ErrorCode::MissingParameters)?;
        let rel = self
            .rc_relationships
            .get_mut(id)
            .ok_or(ErrorCode::NotSuitable)?;
        if rel.state != RcState::ConsistentSynchronized && rel.copy_type != CopyType::ActiveActive {
            return Err(CliError::with_detail(ErrorCode::RcInvalidState, rel.state.to_string()).into());
        }
        rel.primary = Some(primary);
        info!(relationship = %rel.name, primary = primary.as_str(), "switched relationship");
        Ok(String::new())
    }

    pub(crate) fn chrcrelationship(&mut self, req: &Request) -> HandlerResult {
        let id = self.rcrel_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let given: Vec<&str> = CHRCREL_ATTRIBUTES
            .iter()
            .copied()
            .filter(|flag| req.has(flag))
            .collect();
        let attribute = match given.as_slice() {
            [] => return Err(ErrorCode::MissingParameters.into()),
            [one] => *one,
            _ => return Err(ErrorCode::MutuallyExclusive.into()),
        };

        match attribute {
            "consistgrp" => {
                let gid = self.rc_group_id_or(req.require("consistgrp")?, ErrorCode::DoesNotExist)?;
                self.join_rc_group(id, gid)?;
            }
            "noconsistgrp" => {
                let group = self
                    .rc_relationships
                    .get_mut(id)
                    .and_then(|rel| rel.consistency_group.take())
                    .ok_or(ErrorCode::NotInGroup)?;
                self.reset_if_empty(&group);
            }
            "masterchange" | "auxchange" => {
                let vdisk = self
                    .volume_or(req.require(attribute)?, ErrorCode::DoesNotExist)?
                    .name
                    .clone();
                let rel = self
                    .rc_relationships
                    .get_mut(id)
                    .ok_or(ErrorCode::NotSuitable)?;
                if attribute == "masterchange" {
                    rel.master_change = Some(vdisk);
                } else {
                    rel.aux_change = Some(vdisk);
                }
            }
            "nomasterchange" | "noauxchange" => {
                let rel = self
                    .rc_relationships
                    .get_mut(id)
                    .ok_or(ErrorCode::NotSuitable)?;
                if attribute == "nomasterchange" {
                    rel.master_change = None;
                } else {
                    rel.aux_change = None;
                }
            }
            "cycleperiodseconds" => {
                let period = req
                    .parse::<u32>("cycleperiodseconds")?
                    .ok_or(ErrorCode::MissingParameters)?;
                if let Some(rel) = self.rc_relationships.get_mut(id) {
                    rel.cycle_period_seconds = period;
                }
            }
            _ => {
                let cycling = parse_cycling(req)?.ok_or(ErrorCode::MissingParameters)?;
                if let Some(rel) = self.rc_relationships.get_mut(id) {
                    rel.cycling_mode = cycling;
                }
            }
        }
        Ok(String::new())
    }

    pub(crate) fn rmrcrelationship(&mut self, req: &Request) -> HandlerResult {
        let id = self.rcrel_id_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        let trigger = if req.has("force") {
            RcTrigger::DeleteForce
        } else {
            RcTrigger::Delete
        };
        self.trigger_rcrel(id, trigger)?;
        self.remove_rcrel(id);
        Ok(String::new())
    }

    pub(crate) fn lsrcrelationship(&mut self, req: &Request) -> HandlerResult {
        if let Some(key) = req.obj() {
            let id = self.rcrel_id_or(key, ErrorCode::DoesNotExist)?;
            self.wait_rcrel(id, req.fault_is(Fault::SpeedUp));
            let rel = self
                .rc_relationships
                .get(id)
                .ok_or(ErrorCode::DoesNotExist)?;
            let mut view = ObjectView::new();
            for (label, value) in RCREL_COLUMNS.iter().zip(self.rcrel_fields(rel)) {
                view.push(*label, value);
            }
            return Ok(view.render(&req.opts));
        }

        let mut table = Table::new(RCREL_COLUMNS);
        for rel in self.rc_relationships.values() {
            table.push(self.rcrel_fields(rel));
        }
        filter_table(
            req,
            &mut table,
            &[
                "name",
                "consistency_group_name",
                "master_vdisk_name",
                "aux_vdisk_name",
            ],
        )?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn mkrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let aux_cluster = match req.flag("cluster") {
            Some(key) => self.cluster_or(key)?,
            None => self.local_cluster(),
        };
        let id = self.rc_groups.next_id();
        let name = new_name(req, &self.rc_groups, "rccg", id)?;
        self.rc_groups.insert(RcConsistGrp {
            id,
            name: name.clone(),
            master_cluster: self.local_cluster(),
            aux_cluster,
            primary: None,
            state: RcState::Empty,
            copy_type: None,
            cycling_mode: CyclingMode::None,
            cycle_period_seconds: 300,
        });
        info!(group = %name, id, "created rc consistency group");
        Ok(created(req, "RC Consistency Group", id))
    }

    pub(crate) fn startrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.rc_group_id_or(req.require_obj()?, ErrorCode::ObjectMissing)?;
        let primary = parse_primary(req)?;
        let state = self.rc_groups.get(gid).map(|g| g.state);
        if state == Some(RcState::Idling) && primary.is_none() {
            return Err(ErrorCode::NoDirection.into());
        }
        let members = self.trigger_rc_group(gid, RcTrigger::Start)?;
        if primary.is_some() {
            self.set_group_primary(gid, &members, primary);
        }
        Ok(String::new())
    }

    pub(crate) fn stoprcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.rc_group_id_or(req.require_obj()?, ErrorCode::ObjectMissing)?;
        if req.has("access") {
            let members = self.trigger_rc_group(gid, RcTrigger::StopAccess)?;
            self.set_group_primary(gid, &members, None);
        } else {
            self.trigger_rc_group(gid, RcTrigger::Stop)?;
        }
        Ok(String::new())
    }

    pub(crate) fn switchrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.rc_group_id_or(req.require_obj()?, ErrorCode::ObjectMissing)?;
        let primary = parse_primary(req)?.ok_or(ErrorCode::MissingParameters)?;
        let group = self.rc_groups.get(gid).ok_or(ErrorCode::ObjectMissing)?;
        if group.state != RcState::ConsistentSynchronized
            && group.copy_type != Some(CopyType::ActiveActive)
        {
            return Err(CliError::with_detail(ErrorCode::RcInvalidState, group.state.to_string()).into());
        }
        let members = self.rc_group_members(&group.name);
        self.set_group_primary(gid, &members, Some(primary));
        Ok(String::new())
    }

    pub(crate) fn chrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.rc_group_id_or(req.require_obj()?, ErrorCode::ObjectMissing)?;
        let given = ["name", "cyclingmode", "cycleperiodseconds"]
            .into_iter()
            .filter(|flag| req.has(flag))
            .count();
        match given {
            0 => return Err(ErrorCode::MissingParameters.into()),
            1 => {}
            _ => return Err(ErrorCode::MutuallyExclusive.into()),
        }
        let old = self
            .rc_groups
            .get(gid)
            .map(|g| g.name.clone())
            .ok_or(ErrorCode::ObjectMissing)?;
        let members = self.rc_group_members(&old);

        if let Some(raw) = req.flag("name") {
            let new = unquote(raw).to_string();
            check_name(&self.rc_groups, &new)?;
            for id in &members {
                if let Some(rel) = self.rc_relationships.get_mut(*id) {
                    rel.consistency_group = Some(new.clone());
                }
            }
            if let Some(group) = self.rc_groups.get_mut(gid) {
                group.name = new;
            }
        } else if let Some(cycling) = parse_cycling(req)? {
            if let Some(group) = self.rc_groups.get_mut(gid) {
                group.cycling_mode = cycling;
            }
            for id in &members {
                if let Some(rel) = self.rc_relationships.get_mut(*id) {
                    rel.cycling_mode = cycling;
                }
            }
        } else {
            let period = req
                .parse::<u32>("cycleperiodseconds")?
                .ok_or(ErrorCode::MissingParameters)?;
            if let Some(group) = self.rc_groups.get_mut(gid) {
                group.cycle_period_seconds = period;
            }
            for id in &members {
                if let Some(rel) = self.rc_relationships.get_mut(*id) {
                    rel.cycle_period_seconds = period;
                }
            }
        }
        Ok(String::new())
    }

    pub(crate) fn rmrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let gid = self.rc_group_id_or(req.require_obj()?, ErrorCode::ObjectMissing)?;
        let trigger = if req.has("force") {
            RcTrigger::DeleteForce
        } else {
            RcTrigger::Delete
        };
        let group = self.rc_groups.get(gid).ok_or(ErrorCode::ObjectMissing)?;
        rc_group_next(group.state, trigger)?;
        let name = group.name.clone();
        for id in self.rc_group_members(&name) {
            if let Some(rel) = self.rc_relationships.get_mut(id) {
                rel.consistency_group = None;
            }
        }
        self.rc_groups.remove(gid);
        info!(group = %name, id = gid, "removed rc consistency group");
        Ok(String::new())
    }

    pub(crate) fn lsrcconsistgrp(&mut self, req: &Request) -> HandlerResult {
        let Some(key) = req.obj() else {
            let mut table = Table::new(RCCG_COLUMNS);
            for group in self.rc_groups.values() {
                table.push(self.rccg_fields(group));
            }
            return Ok(table.render(&req.opts));
        };

        let gid = self.rc_group_id_or(key, ErrorCode::ObjectMissing)?;
        self.wait_rc_group(gid);
        let group = self.rc_groups.get(gid).ok_or(ErrorCode::ObjectMissing)?;
        let mut view = ObjectView::new();
        for (label, value) in RCCG_COLUMNS.iter().zip(self.rccg_fields(group)) {
            view.push(*label, value);
        }
        view.push("cycle_period_seconds", group.cycle_period_seconds.to_string());
        for id in self.rc_group_members(&group.name) {
            if let Some(rel) = self.rc_relationships.get(id) {
                view.push("RC_rel_id", rel.id.to_string());
                view.push("RC_rel_name", rel.name.as_str());
            }
        }
        Ok(view.render(&req.opts))
    }
}

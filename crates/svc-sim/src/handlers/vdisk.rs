//! Volume (vdisk) verbs and volume copy management.

use common::{is_quoted, to_bytes, unquote};
use svc_cli::{ObjectView, Table};
use tracing::info;

use super::{
    created, filter_table, new_name, on_off, parse_io_group, yes_no, HandlerResult, Request,
};
use crate::error::{CliError, ErrorCode, SimError};
use crate::fault::Fault;
use crate::model::{CyclingMode, ThinProvisioning, VdiskCopy, Volume};
use crate::simulator::Simulator;

const VDISK_COLUMNS: &[&str] = &[
    "id",
    "name",
    "IO_group_id",
    "IO_group_name",
    "status",
    "mdisk_grp_id",
    "mdisk_grp_name",
    "capacity",
    "type",
    "FC_id",
    "FC_name",
    "RC_id",
    "RC_name",
    "vdisk_UID",
    "fc_map_count",
    "copy_count",
    "fast_write_state",
    "se_copy_count",
    "RC_change",
];

/// Flags `chvdisk` accepts one at a time.
const CHVDISK_ATTRIBUTES: &[&str] = &[
    "name",
    "warning",
    "udid",
    "autoexpand",
    "easytier",
    "primary",
    "volumegroup",
    "novolumegroup",
];

/// `-size`/`-unit` to bytes; the unit defaults to `default_unit`.
pub(crate) fn parse_capacity(req: &Request, default_unit: &str) -> Result<u64, CliError> {
    let size = req.require("size")?;
    let unit = req.flag("unit").unwrap_or(default_unit);
    to_bytes(size, unit)
        .map_err(|err| CliError::with_detail(ErrorCode::UnsupportedParameter, err.to_string()))
}

/// Thin-provisioning request carried by `-rsize`, `-thin` or `-compressed`.
pub(crate) fn thin_provisioning(req: &Request, capacity: u64) -> Result<Option<ThinProvisioning>, CliError> {
    let rsize = match req.parse::<u64>("rsize")? {
        Some(pct) => pct,
        None if req.has("thin") || req.has("compressed") => 2,
        None => return Ok(None),
    };
    let warning = req.parse::<u32>("warning")?.unwrap_or(80);
    let autoexpand = req.switch("autoexpand").unwrap_or(false);
    let grainsize = req.parse::<u32>("grainsize")?.unwrap_or(256);
    Ok(Some(ThinProvisioning::new(
        capacity, rsize, warning, autoexpand, grainsize,
    )))
}

impl Simulator {
    pub(crate) fn volume_or(&self, key: &str, code: ErrorCode) -> Result<&Volume, CliError> {
        let key = unquote(key);
        self.volumes
            .resolve(key)
            .ok_or_else(|| CliError::with_detail(code, format!("volume {}", key)))
    }

    pub(crate) fn volume_id_or(&self, key: &str, code: ErrorCode) -> Result<u32, CliError> {
        self.volume_or(key, code).map(|vol| vol.id)
    }

    /// `(pool id, pool name)` for each entry of `a[:b]`.
    pub(crate) fn resolve_pools(&self, list: &str) -> Result<Vec<(usize, String)>, CliError> {
        unquote(list)
            .split(':')
            .map(unquote)
            .map(|name| {
                self.config
                    .pool(name)
                    .map(|(id, pool)| (id, pool.name.clone()))
                    .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("pool {}", name)))
            })
            .collect()
    }

    pub(crate) fn fcmap_ids_of(&self, vdisk: &str) -> Vec<u32> {
        self.fcmaps.ids_where(|map| map.involves(vdisk))
    }

    pub(crate) fn insert_volume(&mut self, volume: Volume) {
        info!(volume = %volume.name, id = volume.id, "created volume");
        self.volumes.insert(volume);
    }

    /// Remove every host mapping of `vdisk`.
    pub(crate) fn unmap_volume(&mut self, vdisk: &str) {
        for id in self.mappings.ids_where(|m| m.vdisk == vdisk) {
            self.mappings.remove(id);
        }
    }

    /// Remove the volume itself and any change-volume references to it.
    pub(crate) fn drop_volume(&mut self, id: u32) {
        let Some(volume) = self.volumes.remove(id) else {
            return;
        };
        for rel in self.rc_relationships.values_mut() {
            if rel.master_change.as_deref() == Some(volume.name.as_str()) {
                rel.master_change = None;
            }
            if rel.aux_change.as_deref() == Some(volume.name.as_str()) {
                rel.aux_change = None;
            }
        }
        info!(volume = %volume.name, id, "removed volume");
    }

    pub(crate) fn rename_volume(&mut self, id: u32, new: &str) {
        let Some(volume) = self.volumes.get_mut(id) else {
            return;
        };
        let old = std::mem::replace(&mut volume.name, new.to_string());
        let rename = |field: &mut String| {
            if *field == old {
                *field = new.to_string();
            }
        };
        self.mappings.values_mut().for_each(|m| rename(&mut m.vdisk));
        for map in self.fcmaps.values_mut() {
            rename(&mut map.source);
            rename(&mut map.target);
        }
        for rel in self.rc_relationships.values_mut() {
            rename(&mut rel.master_vdisk);
            rename(&mut rel.aux_vdisk);
            if let Some(change) = rel.master_change.as_mut() {
                rename(change);
            }
            if let Some(change) = rel.aux_change.as_mut() {
                rename(change);
            }
        }
        info!(from = %old, to = new, "renamed volume");
    }

    fn fc_summary(&self, vdisk: &str) -> (String, String, usize) {
        let maps: Vec<_> = self.fcmaps.values().filter(|m| m.involves(vdisk)).collect();
        match maps.as_slice() {
            [] => (String::new(), String::new(), 0),
            [only] => (only.id.to_string(), only.name.clone(), 1),
            many => ("many".to_string(), "many".to_string(), many.len()),
        }
    }

    fn is_change_volume(&self, vdisk: &str) -> bool {
        self.rc_relationships
            .values()
            .any(|rel| rel.uses_change_volume(vdisk))
    }

    fn vdisk_row(&self, req: &Request, vol: &Volume) -> Vec<String> {
        let (fc_id, fc_name, fc_count) = self.fc_summary(&vol.name);
        vec![
            vol.id.to_string(),
            vol.name.clone(),
            vol.io_group_id.to_string(),
            format!("io_grp{}", vol.io_group_id),
            vol.status.clone(),
            vol.pool_id_display(),
            vol.pool_name_display(),
            req.capacity(vol.capacity),
            if vol.copies.len() > 1 { "many" } else { "striped" }.to_string(),
            fc_id,
            fc_name,
            vol.rc_id.map(|id| id.to_string()).unwrap_or_default(),
            vol.rc_name.clone().unwrap_or_default(),
            vol.uid.clone(),
            fc_count.to_string(),
            vol.copies.len().to_string(),
            "empty".to_string(),
            vol.se_copy_count().to_string(),
            yes_no(self.is_change_volume(&vol.name)).to_string(),
        ]
    }

    fn vdisk_view(&self, req: &Request, vol: &Volume) -> ObjectView {
        let row = self.vdisk_row(req, vol);
        let field = |label: &str| {
            VDISK_COLUMNS
                .iter()
                .position(|c| *c == label)
                .map(|idx| row[idx].clone())
                .unwrap_or_default()
        };

        let mut view = ObjectView::new();
        for label in [
            "id",
            "name",
            "IO_group_id",
            "IO_group_name",
            "status",
            "mdisk_grp_id",
            "mdisk_grp_name",
            "capacity",
            "type",
        ] {
            view.push(label, field(label));
        }
        view.push("formatted", yes_no(vol.formatted));
        view.push("mdisk_id", "");
        view.push("mdisk_name", "");
        for label in ["FC_id", "FC_name", "RC_id", "RC_name", "vdisk_UID"] {
            view.push(label, field(label));
        }
        view.push("throttling", "0");
        match req.fault {
            Some(Fault::NoPrefNode) => {}
            Some(Fault::BlankPrefNode) => view.push("preferred_node_id", ""),
            _ => view.push("preferred_node_id", vol.preferred_node_id.to_string()),
        }
        view.push("fast_write_state", "empty");
        view.push("cache", "readwrite");
        view.push("udid", vol.udid.as_str());
        view.push("fc_map_count", field("fc_map_count"));
        view.push("sync_rate", "50");
        view.push("copy_count", field("copy_count"));
        view.push("se_copy_count", field("se_copy_count"));
        view.push("mirror_write_priority", "latency");
        view.push("RC_change", field("RC_change"));
        let group = vol
            .volume_group
            .as_deref()
            .and_then(|name| self.volume_groups.by_name(name));
        view.push(
            "volume_group_id",
            group.map(|g| g.id.to_string()).unwrap_or_default(),
        );
        view.push(
            "volume_group_name",
            group.map(|g| g.name.clone()).unwrap_or_default(),
        );

        for copy in vol.copies.values() {
            view.push("copy_id", copy.id.to_string());
            view.push("status", copy.status.as_str());
            view.push("sync", yes_no(copy.sync));
            view.push("primary", yes_no(copy.primary));
            view.push("mdisk_grp_id", copy.mdisk_grp_id.to_string());
            view.push("mdisk_grp_name", copy.mdisk_grp_name.as_str());
            view.push("type", "striped");
            view.push("used_capacity", req.capacity(copy.used_capacity(vol.capacity)));
            view.push("real_capacity", req.capacity(copy.real_capacity(vol.capacity)));
            view.push("free_capacity", req.capacity(copy.free_capacity()));
            view.push("overallocation", "100");
            match &copy.thin {
                Some(thin) => {
                    view.push("autoexpand", on_off(thin.autoexpand));
                    view.push("warning", thin.warning.to_string());
                    view.push("grainsize", thin.grainsize.to_string());
                }
                None => {
                    view.push("autoexpand", "");
                    view.push("warning", "");
                    view.push("grainsize", "");
                }
            }
            view.push("se_copy", yes_no(copy.is_thin()));
            view.push("easy_tier", copy.easy_tier.as_str());
            view.push("compressed_copy", yes_no(copy.compressed));
        }
        view
    }

    pub(crate) fn mkvdisk(&mut self, req: &Request) -> HandlerResult {
        let pool_arg = req.require("mdiskgrp")?;
        if !is_quoted(pool_arg) {
            return Err(SimError::invalid_input(format!(
                "-mdiskgrp {} must be quoted",
                pool_arg
            ))
            .into());
        }
        let pools = self.resolve_pools(pool_arg)?;
        if let Some(copies) = req.parse::<usize>("copies")? {
            if copies != pools.len() {
                return Err(CliError::with_detail(
                    ErrorCode::MissingParameters,
                    format!("-copies {} needs {} pools", copies, copies),
                )
                .into());
            }
        }

        let capacity = parse_capacity(req, "mb")?;
        let id = self.volumes.next_id();
        let name = new_name(req, &self.volumes, "vdisk", id)?;
        let io_group_id = match req.flag("iogrp") {
            Some(value) => parse_io_group(value, self.config.io_groups)?,
            None => 0,
        };
        let thin = thin_provisioning(req, capacity)?;
        let volume_group = match req.flag("volumegroup") {
            Some(key) => Some(self.volume_group_name(key)?),
            None => None,
        };

        let mut volume = Volume::new(id, &name, capacity);
        volume.io_group_id = io_group_id;
        volume.formatted = thin.is_none() && !req.has("nofmtdisk");
        volume.udid = req.flag("udid").unwrap_or_default().to_string();
        volume.volume_group = volume_group;
        for (idx, (pool_id, pool_name)) in pools.iter().enumerate() {
            let mut copy = VdiskCopy::new(idx as u32, *pool_id, pool_name);
            copy.sync = idx == 0;
            copy.thin = thin.clone();
            copy.compressed = req.has("compressed");
            if let Some(tier) = req.flag("easytier") {
                copy.easy_tier = tier.to_string();
            }
            volume.copies.insert(copy.id, copy);
        }
        self.insert_volume(volume);
        Ok(created(req, "Virtual Disk", id))
    }

    pub(crate) fn rmvdisk(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        let (id, name) = (vol.id, vol.name.clone());
        let in_rc = vol.rc_name.is_some();
        let mapped = self.mappings.values().any(|m| m.vdisk == name);
        let in_fc = !self.fcmap_ids_of(&name).is_empty();
        let force = req.has("force") || req.has("force_unmap");

        if in_rc || (!force && (mapped || in_fc)) {
            return Err(CliError::with_detail(ErrorCode::VdiskInUse, name).into());
        }
        self.unmap_volume(&name);
        for fc_id in self.fcmap_ids_of(&name) {
            self.remove_fcmap(fc_id);
        }
        self.drop_volume(id);
        Ok(String::new())
    }

    pub(crate) fn expandvdisksize(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let added = parse_capacity(req, "gb")?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        if vol.rc_name.is_some() {
            let code = if req.fault_is(Fault::FastFormatting) {
                ErrorCode::FastFormatting
            } else {
                ErrorCode::VdiskInUse
            };
            return Err(CliError::with_detail(code, vol.name.clone()).into());
        }
        // Copy partners must keep equal capacities.
        if !self.fcmap_ids_of(&vol.name).is_empty() {
            return Err(CliError::with_detail(ErrorCode::VdiskInUse, vol.name.clone()).into());
        }
        let id = vol.id;
        let capacity = vol
            .capacity
            .checked_add(added)
            .ok_or_else(|| CliError::with_detail(ErrorCode::UnsupportedParameter, "capacity overflow"))?;
        if let Some(vol) = self.volumes.get_mut(id) {
            vol.capacity = capacity;
        }
        Ok(String::new())
    }

    pub(crate) fn lsvdisk(&mut self, req: &Request) -> HandlerResult {
        if let Some(key) = req.obj() {
            let vol = self.volume_or(key, ErrorCode::DoesNotExist)?;
            return Ok(self.vdisk_view(req, vol).render(&req.opts));
        }
        let mut table = Table::new(VDISK_COLUMNS);
        for vol in self.volumes.values() {
            table.push(self.vdisk_row(req, vol));
        }
        filter_table(
            req,
            &mut table,
            &["id", "name", "vdisk_UID", "IO_group_id", "mdisk_grp_name"],
        )?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn chvdisk(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let given: Vec<&str> = CHVDISK_ATTRIBUTES
            .iter()
            .copied()
            .filter(|flag| req.has(flag))
            .collect();
        let attribute = match given.as_slice() {
            [] => return Err(ErrorCode::MissingParameters.into()),
            [one] => *one,
            _ => return Err(ErrorCode::MutuallyExclusive.into()),
        };
        let id = self.volume_id_or(key, ErrorCode::NotSuitable)?;
        let copy_filter = req.parse::<u32>("copy")?;

        match attribute {
            "name" => {
                let new = unquote(req.require("name")?).to_string();
                super::check_name(&self.volumes, &new)?;
                let old = self.volumes.get(id).map(|v| v.name.clone()).unwrap_or_default();
                match self.hyperswap_of(&old) {
                    Some(rel_id) => self.rename_hyperswap(rel_id, &old, &new)?,
                    None => self.rename_volume(id, &new),
                }
            }
            "udid" => {
                let udid = req.require("udid")?.to_string();
                if let Some(vol) = self.volumes.get_mut(id) {
                    vol.udid = udid;
                }
            }
            "primary" => {
                let primary = req
                    .parse::<u32>("primary")?
                    .ok_or(ErrorCode::MissingParameters)?;
                let vol = self.volumes.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
                if !vol.copies.contains_key(&primary) {
                    return Err(ErrorCode::CopyNotFound.into());
                }
                for copy in vol.copies.values_mut() {
                    copy.primary = copy.id == primary;
                }
            }
            "volumegroup" => {
                let group = self.volume_group_name(req.require("volumegroup")?)?;
                if let Some(vol) = self.volumes.get_mut(id) {
                    vol.volume_group = Some(group);
                }
            }
            "novolumegroup" => {
                if let Some(vol) = self.volumes.get_mut(id) {
                    vol.volume_group = None;
                }
            }
            copy_attribute => {
                let warning = req.parse::<u32>("warning")?;
                let autoexpand = req.switch("autoexpand");
                let easytier = req.flag("easytier").map(str::to_string);
                let vol = self.volumes.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
                if copy_filter.is_some_and(|c| !vol.copies.contains_key(&c)) {
                    return Err(ErrorCode::CopyNotFound.into());
                }
                let copies = vol
                    .copies
                    .values_mut()
                    .filter(|copy| copy_filter.map_or(true, |c| c == copy.id));
                for copy in copies {
                    match copy_attribute {
                        "easytier" => {
                            if let Some(tier) = &easytier {
                                copy.easy_tier = tier.clone();
                            }
                        }
                        _ => {
                            if let Some(thin) = copy.thin.as_mut() {
                                if let Some(warning) = warning {
                                    thin.warning = warning;
                                }
                                if let Some(autoexpand) = autoexpand {
                                    thin.autoexpand = autoexpand;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(String::new())
    }

    pub(crate) fn movevdisk(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let io_group = parse_io_group(req.require("iogrp")?, self.config.io_groups)?;
        let id = self.volume_id_or(key, ErrorCode::NotSuitable)?;
        if let Some(vol) = self.volumes.get_mut(id) {
            vol.io_group_id = io_group;
        }
        Ok(String::new())
    }

    pub(crate) fn migratevdisk(&mut self, req: &Request) -> HandlerResult {
        let pool_arg = req.require("mdiskgrp")?;
        let key = req.require("vdisk")?;
        let id = self.volume_id_or(key, ErrorCode::NotSuitable)?;
        let (pool_id, pool_name) = self
            .resolve_pools(pool_arg)?
            .into_iter()
            .next()
            .ok_or(ErrorCode::DoesNotExist)?;
        let requested = req.parse::<u32>("copy")?;
        let vol = self.volumes.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        let copy_id = match requested {
            Some(copy) => copy,
            None => vol.primary_copy().map(|c| c.id).ok_or(ErrorCode::CopyNotFound)?,
        };
        let copy = vol
            .copies
            .get_mut(&copy_id)
            .ok_or(ErrorCode::CopyNotFound)?;
        copy.mdisk_grp_id = pool_id;
        copy.mdisk_grp_name = pool_name;
        Ok(String::new())
    }

    pub(crate) fn addvdiskcopy(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let pool_arg = req.require("mdiskgrp")?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        let (id, capacity) = (vol.id, vol.capacity);
        if vol.copies.len() >= 2 {
            return Err(CliError::with_detail(ErrorCode::NotSuitable, "volume already mirrored").into());
        }
        let (pool_id, pool_name) = self
            .resolve_pools(pool_arg)?
            .into_iter()
            .next()
            .ok_or(ErrorCode::DoesNotExist)?;
        let thin = thin_provisioning(req, capacity)?;
        if thin.is_none() {
            let multi_cycling = vol
                .rc_name
                .as_deref()
                .and_then(|rel| self.rc_relationships.by_name(rel))
                .is_some_and(|rel| rel.cycling_mode == CyclingMode::Multi);
            if multi_cycling {
                return Err(ErrorCode::FullyAllocatedInRelation.into());
            }
        }

        let vol = self.volumes.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        let copy_id = vol.next_copy_id();
        let mut copy = VdiskCopy::new(copy_id, pool_id, &pool_name);
        copy.thin = thin;
        copy.compressed = req.has("compressed");
        if let Some(tier) = req.flag("easytier") {
            copy.easy_tier = tier.to_string();
        }
        if req.switch("autodelete").unwrap_or(false) {
            vol.copies.clear();
            copy.primary = true;
            copy.sync = true;
        } else {
            copy.primary = false;
            copy.sync = false;
        }
        vol.copies.insert(copy_id, copy);
        info!(volume = %vol.name, copy = copy_id, "added volume copy");
        Ok(format!(
            "Vdisk [{}] copy [{}] successfully created",
            id, copy_id
        ))
    }

    pub(crate) fn lsvdiskcopy(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        let row = |copy: &VdiskCopy| -> Vec<(&'static str, String)> {
            vec![
                ("vdisk_id", vol.id.to_string()),
                ("vdisk_name", vol.name.clone()),
                ("copy_id", copy.id.to_string()),
                ("status", copy.status.clone()),
                ("sync", yes_no(copy.sync).to_string()),
                ("primary", yes_no(copy.primary).to_string()),
                ("mdisk_grp_id", copy.mdisk_grp_id.to_string()),
                ("mdisk_grp_name", copy.mdisk_grp_name.clone()),
                ("capacity", req.capacity(vol.capacity)),
                ("type", "striped".to_string()),
                ("se_copy", yes_no(copy.is_thin()).to_string()),
                ("easy_tier", copy.easy_tier.clone()),
                ("easy_tier_status", "balanced".to_string()),
                ("compressed_copy", yes_no(copy.compressed).to_string()),
            ]
        };

        if let Some(copy_id) = req.parse::<u32>("copy")? {
            let copy = vol.copies.get(&copy_id).ok_or(ErrorCode::CopyNotFound)?;
            let mut view = ObjectView::new();
            for (label, value) in row(copy) {
                view.push(label, value);
            }
            return Ok(view.render(&req.opts));
        }

        let mut table: Option<Table> = None;
        for copy in vol.copies.values() {
            let fields = row(copy);
            table
                .get_or_insert_with(|| {
                    Table::new(&fields.iter().map(|(label, _)| *label).collect::<Vec<_>>())
                })
                .push(fields.into_iter().map(|(_, value)| value));
        }
        Ok(table.unwrap_or_default().render(&req.opts))
    }

    pub(crate) fn rmvdiskcopy(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let copy_id = req
            .parse::<u32>("copy")?
            .ok_or(ErrorCode::MissingParameters)?;
        let id = self.volume_id_or(key, ErrorCode::NotSuitable)?;
        let vol = self.volumes.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        if !vol.copies.contains_key(&copy_id) {
            return Err(ErrorCode::CopyNotFound.into());
        }
        if vol.copies.len() == 1 {
            return Err(ErrorCode::LastCopy.into());
        }
        vol.copies.remove(&copy_id);
        if !vol.copies.values().any(|c| c.primary) {
            if let Some(first) = vol.copies.values_mut().next() {
                first.primary = true;
                first.sync = true;
            }
        }
        info!(volume = %vol.name, copy = copy_id, "removed volume copy");
        Ok(String::new())
    }

    pub(crate) fn lsvdisksyncprogress(&mut self, req: &Request) -> HandlerResult {
        let ids = match req.obj() {
            Some(key) => vec![self.volume_id_or(key, ErrorCode::NotSuitable)?],
            None => self.volumes.ids(),
        };
        let copy_filter = req.parse::<u32>("copy")?;

        let mut table = Table::new(&[
            "vdisk_id",
            "vdisk_name",
            "copy_id",
            "progress",
            "estimated_completion_time",
        ]);
        for id in ids {
            let Some(vol) = self.volumes.get_mut(id) else {
                continue;
            };
            for copy in vol.copies.values_mut() {
                if copy_filter.is_some_and(|c| c != copy.id) {
                    continue;
                }
                let progress = if copy.sync { 100 } else { 50 };
                copy.sync = true;
                table.push([
                    vol.id.to_string(),
                    vol.name.clone(),
                    copy.id.to_string(),
                    progress.to_string(),
                    String::new(),
                ]);
            }
        }
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsvdiskfcmappings(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        let mut table = Table::new(&["id", "name"]);
        for map in self.fcmaps.values().filter(|m| m.involves(&vol.name)) {
            table.push([map.id.to_string(), map.name.clone()]);
        }
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsvdiskhostmap(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let vol = self.volume_or(key, ErrorCode::NotSuitable)?;
        let mut table = Table::new(&[
            "id",
            "name",
            "SCSI_id",
            "host_id",
            "host_name",
            "vdisk_UID",
            "IO_group_id",
            "IO_group_name",
        ]);
        for mapping in self.mappings.values().filter(|m| m.vdisk == vol.name) {
            let host_id = self
                .hosts
                .by_name(&mapping.host)
                .map(|h| h.id.to_string())
                .unwrap_or_default();
            table.push([
                vol.id.to_string(),
                vol.name.clone(),
                mapping.lun.to_string(),
                host_id,
                mapping.host.clone(),
                vol.uid.clone(),
                vol.io_group_id.to_string(),
                format!("io_grp{}", vol.io_group_id),
            ]);
        }
        Ok(table.render(&req.opts))
    }
}

#[cfg(test)]
mod tests {
    use crate::simulator::Simulator;

    fn ok(sim: &mut Simulator, tokens: &[&str]) -> String {
        sim.execute(tokens, true).unwrap().stdout
    }

    fn code(sim: &mut Simulator, tokens: &[&str]) -> String {
        let out = sim.execute(tokens, false).unwrap();
        out.error_code().unwrap_or("").to_string()
    }

    fn mkvdisk(sim: &mut Simulator, name: &str, extra: &[&str]) {
        let mut tokens = vec![
            "mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb",
        ];
        tokens.extend_from_slice(extra);
        ok(sim, &tokens);
    }

    #[test]
    fn test_mkvdisk_then_lsvdisk_bytes() {
        let mut sim = Simulator::default();
        let out = ok(
            &mut sim,
            &["mkvdisk", "-name", "v1", "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb"],
        );
        assert_eq!(out, "Virtual Disk, id [0], successfully created");
        let view = ok(&mut sim, &["lsvdisk", "-bytes", "-delim", "!", "v1"]);
        assert!(view.contains("capacity!1073741824"));
        assert!(view.contains("formatted!yes"));
        assert!(view.contains("vdisk_UID!ABCDEFABCDEFABCDEF00000000000000"));
    }

    #[test]
    fn test_mkvdisk_rejects_unquoted_pool_and_duplicates() {
        let mut sim = Simulator::default();
        let err = sim
            .execute(&["mkvdisk", "-name", "v1", "-mdiskgrp", "openstack", "-size", "1"], true)
            .unwrap_err();
        assert!(matches!(err, crate::error::SimError::InvalidInput { .. }));

        mkvdisk(&mut sim, "v1", &[]);
        assert_eq!(
            code(&mut sim, &["mkvdisk", "-name", "v1", "-mdiskgrp", "\"openstack\"", "-size", "1"]),
            "CMMVC6035E"
        );
        assert_eq!(
            code(&mut sim, &["mkvdisk", "-name", "v2", "-mdiskgrp", "\"nopool\"", "-size", "1"]),
            "CMMVC5754E"
        );
        assert_eq!(
            code(&mut sim, &["mkvdisk", "-name", "1bad", "-mdiskgrp", "\"openstack\"", "-size", "1"]),
            "CMMVC6527E"
        );
    }

    #[test]
    fn test_thin_and_mirrored_volume() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "thin", &["-rsize", "2%", "-autoexpand", "-warning", "70%"]);
        let view = ok(&mut sim, &["lsvdisk", "-delim", "!", "thin"]);
        assert!(view.contains("se_copy!yes"));
        assert!(view.contains("autoexpand!on"));
        assert!(view.contains("warning!70"));
        assert!(view.contains("formatted!no"));

        ok(
            &mut sim,
            &[
                "mkvdisk", "-name", "m", "-mdiskgrp", "\"openstack:openstack1\"", "-size", "1",
                "-copies", "2",
            ],
        );
        let view = ok(&mut sim, &["lsvdisk", "-delim", "!", "m"]);
        assert!(view.contains("mdisk_grp_name!many"));
        assert!(view.contains("copy_count!2"));
        let progress = ok(&mut sim, &["lsvdisksyncprogress", "-nohdr", "m"]);
        assert!(progress.lines().any(|l| l.ends_with(" 1 50 ")));
        let progress = ok(&mut sim, &["lsvdisksyncprogress", "-nohdr", "m"]);
        assert!(progress.lines().all(|l| l.contains(" 100 ")));
    }

    #[test]
    fn test_copy_management() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "v", &[]);
        let out = ok(&mut sim, &["addvdiskcopy", "-mdiskgrp", "\"openstack1\"", "v"]);
        assert_eq!(out, "Vdisk [0] copy [1] successfully created");
        ok(&mut sim, &["chvdisk", "-primary", "1", "v"]);
        ok(&mut sim, &["rmvdiskcopy", "-copy", "1", "v"]);
        let vol = sim.volumes().by_name("v").unwrap();
        assert_eq!(vol.copies.len(), 1);
        assert!(vol.copies[&0].primary);
        assert_eq!(code(&mut sim, &["rmvdiskcopy", "-copy", "0", "v"]), "CMMVC6351E");
        assert_eq!(code(&mut sim, &["rmvdiskcopy", "-copy", "5", "v"]), "CMMVC6353E");

        ok(
            &mut sim,
            &["addvdiskcopy", "-mdiskgrp", "\"openstack2\"", "-autodelete", "v"],
        );
        let vol = sim.volumes().by_name("v").unwrap();
        assert_eq!(vol.copies.len(), 1);
        assert_eq!(vol.pool_name_display(), "openstack2");
    }

    #[test]
    fn test_chvdisk_rename_cascades_and_exclusivity() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "v", &[]);
        ok(&mut sim, &["mkhost", "-name", "h", "-iscsiname", "iqn.x:1"]);
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h", "v"]);
        ok(&mut sim, &["chvdisk", "-name", "renamed", "v"]);
        assert_eq!(sim.mappings().values().next().unwrap().vdisk, "renamed");
        assert_eq!(
            code(&mut sim, &["chvdisk", "-name", "x", "-udid", "3", "renamed"]),
            "CMMVC5713E"
        );
        assert_eq!(code(&mut sim, &["chvdisk", "renamed"]), "CMMVC5707E");
    }

    #[test]
    fn test_rmvdisk_guards() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "v", &[]);
        ok(&mut sim, &["mkhost", "-name", "h", "-iscsiname", "iqn.x:1"]);
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h", "v"]);
        assert_eq!(code(&mut sim, &["rmvdisk", "v"]), "CMMVC5840E");
        ok(&mut sim, &["rmvdisk", "-force", "v"]);
        assert!(sim.volumes().is_empty());
        assert!(sim.mappings().is_empty());
        assert_eq!(code(&mut sim, &["rmvdisk"]), "CMMVC5701E");
        assert_eq!(code(&mut sim, &["rmvdisk", "v"]), "CMMVC5753E");
    }

    #[test]
    fn test_expand_and_preferred_node_faults() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "v", &[]);
        ok(&mut sim, &["expandvdisksize", "-size", "2", "v"]);
        assert_eq!(sim.volumes().by_name("v").unwrap().capacity, 3 << 30);

        sim.error_injection("lsvdisk", "no_pref_node").unwrap();
        assert!(!ok(&mut sim, &["lsvdisk", "v"]).contains("preferred_node_id"));
        sim.error_injection("lsvdisk", "blank_pref_node").unwrap();
        assert!(ok(&mut sim, &["lsvdisk", "-delim", "!", "v"]).contains("preferred_node_id!\n"));
        assert!(ok(&mut sim, &["lsvdisk", "-delim", "!", "v"]).contains("preferred_node_id!1"));
    }

    #[test]
    fn test_expand_refuses_copy_partners() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "a", &[]);
        mkvdisk(&mut sim, "b", &[]);
        mkvdisk(&mut sim, "c", &[]);
        mkvdisk(&mut sim, "d", &[]);
        ok(&mut sim, &["mkfcmap", "-source", "a", "-target", "b"]);
        ok(&mut sim, &["mkrcrelationship", "-master", "c", "-aux", "d", "-cluster", "aux-svc-sim"]);

        for vdisk in ["a", "b", "c", "d"] {
            assert_eq!(
                code(&mut sim, &["expandvdisksize", "-size", "1", "-unit", "gb", vdisk]),
                "CMMVC5840E"
            );
            assert_eq!(sim.volumes().by_name(vdisk).unwrap().capacity, 1 << 30);
        }

        ok(&mut sim, &["rmfcmap", "-force", "0"]);
        ok(&mut sim, &["expandvdisksize", "-size", "1", "-unit", "gb", "a"]);
        assert_eq!(sim.volumes().by_name("a").unwrap().capacity, 2 << 30);
    }

    #[test]
    fn test_lsvdisk_filter() {
        let mut sim = Simulator::default();
        mkvdisk(&mut sim, "a", &[]);
        mkvdisk(&mut sim, "b", &[]);
        let out = ok(&mut sim, &["lsvdisk", "-nohdr", "-filtervalue", "name=b"]);
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("1 b "));
        assert_eq!(
            code(&mut sim, &["lsvdisk", "-filtervalue", "colour=red"]),
            "CMMVC5709E"
        );
    }
}

//! Volume groups and their snapshots.

use common::unquote;
use svc_cli::{ObjectView, Table};
use tracing::info;

use super::{created, filter_table, new_name, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::model::{Snapshot, VolumeGroup};
use crate::simulator::Simulator;

const VOLUME_GROUP_COLUMNS: &[&str] = &["id", "name", "volume_count", "uid", "snapshot_count"];

const SNAPSHOT_COLUMNS: &[&str] = &["id", "name", "volume_group_id", "volume_group_name", "state"];

fn volume_group_uid(id: u32) -> String {
    format!("600507680C8{:021X}", id)
}

impl Simulator {
    /// Name of the volume group called or numbered `key`.
    pub(crate) fn volume_group_name(&self, key: &str) -> Result<String, CliError> {
        let key = unquote(key);
        self.volume_groups
            .resolve(key)
            .map(|group| group.name.clone())
            .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("volume group {}", key)))
    }

    fn volume_group_fields(&self, group: &VolumeGroup) -> [String; 5] {
        let members = self
            .volumes
            .values()
            .filter(|vol| vol.volume_group.as_deref() == Some(group.name.as_str()))
            .count();
        let snapshots = self
            .snapshots
            .values()
            .filter(|snap| snap.volume_group == group.name)
            .count();
        [
            group.id.to_string(),
            group.name.clone(),
            members.to_string(),
            group.uid.clone(),
            snapshots.to_string(),
        ]
    }

    fn snapshot_fields(&self, snap: &Snapshot) -> [String; 5] {
        let group_id = self
            .volume_groups
            .by_name(&snap.volume_group)
            .map(|group| group.id.to_string())
            .unwrap_or_default();
        [
            snap.id.to_string(),
            snap.name.clone(),
            group_id,
            snap.volume_group.clone(),
            snap.state.clone(),
        ]
    }

    pub(crate) fn mkvolumegroup(&mut self, req: &Request) -> HandlerResult {
        let id = self.volume_groups.next_id();
        let name = new_name(req, &self.volume_groups, "volumegroup", id)?;
        self.volume_groups.insert(VolumeGroup {
            id,
            name: name.clone(),
            uid: volume_group_uid(id),
        });
        info!(volume_group = %name, id, "created volume group");
        Ok(created(req, "Volume Group", id))
    }

    pub(crate) fn lsvolumegroup(&mut self, req: &Request) -> HandlerResult {
        if let Some(key) = req.obj() {
            let name = self.volume_group_name(key)?;
            let group = self
                .volume_groups
                .by_name(&name)
                .ok_or(ErrorCode::DoesNotExist)?;
            let mut view = ObjectView::new();
            for (label, value) in VOLUME_GROUP_COLUMNS.iter().zip(self.volume_group_fields(group)) {
                view.push(*label, value);
            }
            return Ok(view.render(&req.opts));
        }

        let mut table = Table::new(VOLUME_GROUP_COLUMNS);
        for group in self.volume_groups.values() {
            table.push(self.volume_group_fields(group));
        }
        filter_table(req, &mut table, &["id", "name"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn rmvolumegroup(&mut self, req: &Request) -> HandlerResult {
        let key = unquote(req.require_obj()?);
        let id = self
            .volume_groups
            .resolve_id(key)
            .ok_or_else(|| CliError::with_detail(ErrorCode::NotSuitable, format!("volume group {}", key)))?;
        let Some(group) = self.volume_groups.remove(id) else {
            return Ok(String::new());
        };
        for vol in self.volumes.values_mut() {
            if vol.volume_group.as_deref() == Some(group.name.as_str()) {
                vol.volume_group = None;
            }
        }
        for snap_id in self.snapshots.ids_where(|snap| snap.volume_group == group.name) {
            self.snapshots.remove(snap_id);
        }
        info!(volume_group = %group.name, id, "removed volume group");
        Ok(String::new())
    }

    pub(crate) fn addsnapshot(&mut self, req: &Request) -> HandlerResult {
        let group = self.volume_group_name(req.require("volumegroup")?)?;
        let id = self.snapshots.next_id();
        let name = new_name(req, &self.snapshots, "snapshot", id)?;
        self.snapshots.insert(Snapshot {
            id,
            name: name.clone(),
            volume_group: group.clone(),
            state: "active".to_string(),
        });
        info!(snapshot = %name, volume_group = %group, "created snapshot");
        Ok(format!("{} or triggered", created(req, "Snapshot", id)))
    }

    pub(crate) fn lsvolumegroupsnapshot(&mut self, req: &Request) -> HandlerResult {
        if let Some(key) = req.obj() {
            let key = unquote(key);
            let snap = self
                .snapshots
                .resolve(key)
                .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("snapshot {}", key)))?;
            let mut view = ObjectView::new();
            for (label, value) in SNAPSHOT_COLUMNS.iter().zip(self.snapshot_fields(snap)) {
                view.push(*label, value);
            }
            return Ok(view.render(&req.opts));
        }

        let mut table = Table::new(SNAPSHOT_COLUMNS);
        for snap in self.snapshots.values() {
            table.push(self.snapshot_fields(snap));
        }
        filter_table(req, &mut table, &["name", "volume_group_name", "state"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn rmsnapshot(&mut self, req: &Request) -> HandlerResult {
        let snapshot = unquote(req.require("snapshot")?).to_string();
        let group = self.volume_group_name(req.require("volumegroup")?)?;
        let id = self
            .snapshots
            .ids_where(|snap| snap.name == snapshot && snap.volume_group == group)
            .into_iter()
            .next()
            .ok_or_else(|| {
                CliError::with_detail(ErrorCode::DoesNotExist, format!("snapshot {} in {}", snapshot, group))
            })?;
        self.snapshots.remove(id);
        info!(snapshot = %snapshot, volume_group = %group, "removed snapshot");
        Ok(String::new())
    }
}

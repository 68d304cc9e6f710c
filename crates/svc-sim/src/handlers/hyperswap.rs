//! HyperSwap volumes: one logical volume backed by a volume per site,
//! a FlashCopy change volume per site and an active-active relationship.

use common::is_quoted;
use tracing::info;

use super::vdisk::{parse_capacity, thin_provisioning};
use super::{check_name, created, new_name, HandlerResult, Request};
use crate::error::{CliError, ErrorCode, SimError};
use crate::model::{CopyType, RcRelationship, ThinProvisioning, VdiskCopy, Volume};
use crate::simulator::Simulator;
use crate::state::RcState;

/// Per-copy provisioning shared by every volume of a set.
#[derive(Debug, Clone)]
struct Provisioning {
    thin: Option<ThinProvisioning>,
    compressed: bool,
}

impl Provisioning {
    fn from_request(req: &Request, capacity: u64) -> Result<Self, CliError> {
        let thin = match req.parse::<u64>("buffersize")? {
            Some(pct) => Some(ThinProvisioning::new(
                capacity,
                pct,
                req.parse::<u32>("warning")?.unwrap_or(80),
                true,
                req.parse::<u32>("grainsize")?.unwrap_or(256),
            )),
            None => thin_provisioning(req, capacity)?,
        };
        Ok(Self {
            thin,
            compressed: req.has("compressed"),
        })
    }
}

impl Simulator {
    fn add_volume(&mut self, name: &str, capacity: u64, pool: &(usize, String), prov: &Provisioning) -> u32 {
        let id = self.volumes.next_id();
        let mut volume = Volume::new(id, name, capacity);
        volume.formatted = prov.thin.is_none();
        let mut copy = VdiskCopy::new(0, pool.0, &pool.1);
        copy.thin = prov.thin.clone();
        copy.compressed = prov.compressed;
        volume.copies.insert(0, copy);
        self.insert_volume(volume);
        id
    }

    /// Relationship id of the HyperSwap set that `vdisk` belongs to, as
    /// either site volume or either change volume.
    pub(crate) fn hyperswap_of(&self, vdisk: &str) -> Option<u32> {
        self.rc_relationships
            .values()
            .find(|rel| {
                rel.copy_type == CopyType::ActiveActive
                    && (rel.involves(vdisk) || rel.uses_change_volume(vdisk))
            })
            .map(|rel| rel.id)
    }

    /// Site-1 volume of a HyperSwap set.
    fn hyperswap_master(&self, rel_id: u32) -> Result<String, CliError> {
        self.rc_relationships
            .get(rel_id)
            .map(|rel| rel.master_vdisk.clone())
            .ok_or_else(|| ErrorCode::NotSuitable.into())
    }

    /// Rename a HyperSwap set through its site-1 volume `member`; the other
    /// volumes keep their derived names.
    pub(crate) fn rename_hyperswap(&mut self, rel_id: u32, member: &str, new: &str) -> Result<(), CliError> {
        let rel = self.rc_relationships.get(rel_id).ok_or(ErrorCode::NotSuitable)?;
        if rel.master_vdisk != member {
            return Err(CliError::with_detail(
                ErrorCode::NotSuitable,
                format!("{} is managed by hyperswap volume {}", member, rel.master_vdisk),
            ));
        }
        let mut renames = vec![(rel.master_vdisk.clone(), new.to_string())];
        renames.push((rel.aux_vdisk.clone(), format!("site2{}", new)));
        renames.extend(rel.master_change.clone().map(|old| (old, format!("fcsite1{}", new))));
        renames.extend(rel.aux_change.clone().map(|old| (old, format!("fcsite2{}", new))));
        for (_, derived) in &renames {
            check_name(&self.volumes, derived)?;
        }
        for (old, derived) in renames {
            if let Some(id) = self.volumes.resolve_id(&old) {
                self.rename_volume(id, &derived);
            }
        }
        Ok(())
    }

    /// Turn the existing volume `site1` into a HyperSwap set.
    fn attach_hyperswap(
        &mut self,
        site1: &str,
        pools: &[(usize, String); 2],
        prov: &Provisioning,
    ) -> Result<(), CliError> {
        let capacity = self
            .volumes
            .by_name(site1)
            .map(|v| v.capacity)
            .ok_or(ErrorCode::NotSuitable)?;
        let site2 = format!("site2{}", site1);
        let change1 = format!("fcsite1{}", site1);
        let change2 = format!("fcsite2{}", site1);
        for name in [&site2, &change1, &change2] {
            if self.volumes.contains_name(name) {
                return Err(CliError::with_detail(ErrorCode::AlreadyExists, name.clone()));
            }
        }

        self.add_volume(&change1, capacity, &pools[0], prov);
        self.add_volume(&site2, capacity, &pools[1], prov);
        self.add_volume(&change2, capacity, &pools[1], prov);

        for (source, target) in [(site1, change1.as_str()), (site2.as_str(), change2.as_str())] {
            let name = format!("fcmap{}", self.fcmaps.next_id());
            let id = self.create_fcmap(&name, source, target, 0)?;
            if let Some(map) = self.fcmaps.get_mut(id) {
                map.rc_controlled = true;
            }
        }

        let id = self.rc_relationships.next_id();
        let mut rel = RcRelationship::new(id, &format!("rcrel{}", id), site1, &site2, CopyType::ActiveActive);
        rel.master_cluster = self.local_cluster();
        rel.aux_cluster = self.local_cluster();
        rel.state = RcState::ConsistentSynchronized;
        rel.progress = 100;
        rel.master_change = Some(change1);
        rel.aux_change = Some(change2);
        self.insert_rcrel(rel);
        info!(volume = site1, "created hyperswap volume");
        Ok(())
    }

    /// Remove everything a HyperSwap set added on top of its site-1 volume.
    fn detach_hyperswap(&mut self, rel_id: u32) {
        let Some(rel) = self.rc_relationships.get(rel_id) else {
            return;
        };
        let mut extra = vec![rel.aux_vdisk.clone()];
        extra.extend(rel.master_change.clone());
        extra.extend(rel.aux_change.clone());
        self.remove_rcrel(rel_id);
        for name in &extra {
            for fc_id in self.fcmap_ids_of(name) {
                self.remove_fcmap(fc_id);
            }
            self.unmap_volume(name);
            if let Some(id) = self.volumes.resolve_id(name) {
                self.drop_volume(id);
            }
        }
    }

    fn hyperswap_pools(&self, req: &Request, flag: &str) -> Result<Vec<(usize, String)>, super::HandlerError> {
        let raw = req.require(flag)?;
        if !is_quoted(raw) {
            return Err(SimError::invalid_input(format!("-{} {} must be quoted", flag, raw)).into());
        }
        Ok(self.resolve_pools(raw)?)
    }

    pub(crate) fn mkvolume(&mut self, req: &Request) -> HandlerResult {
        let pools = self.hyperswap_pools(req, "pool")?;
        let capacity = parse_capacity(req, "mb")?;
        let prov = Provisioning::from_request(req, capacity)?;
        let id = self.volumes.next_id();
        let name = new_name(req, &self.volumes, "volume", id)?;

        match pools.as_slice() {
            [single] => {
                self.add_volume(&name, capacity, single, &prov);
            }
            [site1, site2] => {
                for prefix in ["site2", "fcsite1", "fcsite2"] {
                    let derived = format!("{}{}", prefix, name);
                    if self.volumes.contains_name(&derived) {
                        return Err(CliError::with_detail(ErrorCode::AlreadyExists, derived).into());
                    }
                }
                self.add_volume(&name, capacity, site1, &prov);
                self.attach_hyperswap(&name, &[site1.clone(), site2.clone()], &prov)?;
            }
            _ => {
                return Err(CliError::with_detail(ErrorCode::UnsupportedParameter, "at most two pools").into())
            }
        }
        Ok(created(req, "Volume", id))
    }

    pub(crate) fn addvolumecopy(&mut self, req: &Request) -> HandlerResult {
        let vol = self.volume_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        if vol.rc_name.is_some() || self.hyperswap_of(&vol.name).is_some() {
            return Err(CliError::with_detail(ErrorCode::AlreadyExists, vol.name.clone()).into());
        }
        let site1_pool = vol
            .primary_copy()
            .map(|c| (c.mdisk_grp_id, c.mdisk_grp_name.clone()))
            .ok_or(ErrorCode::NotSuitable)?;
        let (name, capacity) = (vol.name.clone(), vol.capacity);
        let site2_pool = self
            .resolve_pools(req.require("pool")?)?
            .into_iter()
            .next()
            .ok_or(ErrorCode::DoesNotExist)?;
        let prov = Provisioning::from_request(req, capacity)?;
        self.attach_hyperswap(&name, &[site1_pool, site2_pool], &prov)?;
        Ok(String::new())
    }

    pub(crate) fn rmvolumecopy(&mut self, req: &Request) -> HandlerResult {
        let name = self
            .volume_or(req.require_obj()?, ErrorCode::NotSuitable)?
            .name
            .clone();
        let rel_id = self
            .hyperswap_of(&name)
            .ok_or_else(|| CliError::with_detail(ErrorCode::NotSuitable, format!("{} is not a hyperswap volume", name)))?;
        self.detach_hyperswap(rel_id);
        Ok(String::new())
    }

    pub(crate) fn rmvolume(&mut self, req: &Request) -> HandlerResult {
        let mut vol = self.volume_or(req.require_obj()?, ErrorCode::NotSuitable)?;
        // Any member of a HyperSwap set removes the set through its site-1 volume.
        if let Some(rel_id) = self.hyperswap_of(&vol.name) {
            let master = self.hyperswap_master(rel_id)?;
            vol = self.volume_or(&master, ErrorCode::NotSuitable)?;
        }
        let (id, name) = (vol.id, vol.name.clone());
        let in_rc = vol.rc_name.is_some();
        let mapped = self.mappings.values().any(|m| m.vdisk == name);
        let in_fc = !self.fcmap_ids_of(&name).is_empty();
        let hyperswap = self.hyperswap_of(&name);

        if mapped && !req.has("removehostmappings") {
            return Err(CliError::with_detail(ErrorCode::VdiskInUse, format!("{} is mapped", name)).into());
        }
        if let Some(rel_id) = hyperswap {
            self.detach_hyperswap(rel_id);
        } else {
            if in_fc && !req.has("removefcmaps") {
                return Err(CliError::with_detail(ErrorCode::VdiskInUse, format!("{} has fcmaps", name)).into());
            }
            if in_rc && !req.has("removercrelationships") {
                return Err(CliError::with_detail(ErrorCode::VdiskInUse, format!("{} is replicated", name)).into());
            }
            let rels = self.rc_relationships.ids_where(|rel| rel.involves(&name));
            for rel_id in rels {
                self.remove_rcrel(rel_id);
            }
        }
        for fc_id in self.fcmap_ids_of(&name) {
            self.remove_fcmap(fc_id);
        }
        self.unmap_volume(&name);
        self.drop_volume(id);
        Ok(String::new())
    }
}

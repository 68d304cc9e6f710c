//! Simulated storage objects.
//!
//! Cross-object references are names (or ids for group membership); they
//! are weak and every lookup through them may fail.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::state::{FcState, RcState};
use crate::store::Record;

/// Thin-provisioning attributes of one volume copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThinProvisioning {
    pub used_capacity: u64,
    pub real_capacity: u64,
    pub free_capacity: u64,
    /// Warning threshold, percent of virtual capacity.
    pub warning: u32,
    pub autoexpand: bool,
    pub grainsize: u32,
}

impl ThinProvisioning {
    /// Allocate `rsize_pct` percent of `capacity` up front.
    pub fn new(capacity: u64, rsize_pct: u64, warning: u32, autoexpand: bool, grainsize: u32) -> Self {
        let real_capacity = capacity / 100 * rsize_pct.min(100);
        let used_capacity = real_capacity.min(786_432);
        Self {
            used_capacity,
            real_capacity,
            free_capacity: real_capacity - used_capacity,
            warning,
            autoexpand,
            grainsize,
        }
    }
}

/// One mirror copy of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VdiskCopy {
    pub id: u32,
    pub status: String,
    pub sync: bool,
    pub primary: bool,
    pub mdisk_grp_id: usize,
    pub mdisk_grp_name: String,
    pub easy_tier: String,
    pub compressed: bool,
    /// `None` for a fully allocated copy.
    pub thin: Option<ThinProvisioning>,
}

impl VdiskCopy {
    pub fn new(id: u32, pool_id: usize, pool_name: &str) -> Self {
        Self {
            id,
            status: "online".to_string(),
            sync: true,
            primary: id == 0,
            mdisk_grp_id: pool_id,
            mdisk_grp_name: pool_name.to_string(),
            easy_tier: "on".to_string(),
            compressed: false,
            thin: None,
        }
    }

    pub fn is_thin(&self) -> bool {
        self.thin.is_some()
    }

    pub fn used_capacity(&self, capacity: u64) -> u64 {
        self.thin.as_ref().map_or(capacity, |t| t.used_capacity)
    }

    pub fn real_capacity(&self, capacity: u64) -> u64 {
        self.thin.as_ref().map_or(capacity, |t| t.real_capacity)
    }

    pub fn free_capacity(&self) -> u64 {
        self.thin.as_ref().map_or(0, |t| t.free_capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub id: u32,
    pub name: String,
    pub uid: String,
    pub io_group_id: u32,
    pub status: String,
    pub capacity: u64,
    pub formatted: bool,
    pub preferred_node_id: u32,
    pub udid: String,
    pub rc_id: Option<u32>,
    pub rc_name: Option<String>,
    pub volume_group: Option<String>,
    pub copies: BTreeMap<u32, VdiskCopy>,
}

impl Volume {
    pub fn new(id: u32, name: &str, capacity: u64) -> Self {
        Self {
            id,
            name: name.to_string(),
            uid: volume_uid(id),
            io_group_id: 0,
            status: "online".to_string(),
            capacity,
            formatted: true,
            preferred_node_id: 1 + id % 2,
            udid: String::new(),
            rc_id: None,
            rc_name: None,
            volume_group: None,
            copies: BTreeMap::new(),
        }
    }

    pub fn primary_copy(&self) -> Option<&VdiskCopy> {
        self.copies
            .values()
            .find(|copy| copy.primary)
            .or_else(|| self.copies.values().next())
    }

    /// Pool id shown for the volume; `many` for a mirrored volume.
    pub fn pool_id_display(&self) -> String {
        match (self.copies.len(), self.primary_copy()) {
            (1, Some(copy)) => copy.mdisk_grp_id.to_string(),
            (0, _) => String::new(),
            _ => "many".to_string(),
        }
    }

    pub fn pool_name_display(&self) -> String {
        match (self.copies.len(), self.primary_copy()) {
            (1, Some(copy)) => copy.mdisk_grp_name.clone(),
            (0, _) => String::new(),
            _ => "many".to_string(),
        }
    }

    pub fn se_copy_count(&self) -> usize {
        self.copies.values().filter(|copy| copy.is_thin()).count()
    }

    /// Smallest copy id not yet in use.
    pub fn next_copy_id(&self) -> u32 {
        (0..).find(|id| !self.copies.contains_key(id)).unwrap_or(0)
    }
}

impl Record for Volume {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 32 hex characters: a fixed prefix followed by the zero-padded id.
pub fn volume_uid(id: u32) -> String {
    format!("ABCDEFABCDEFABCDEF{:014}", id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub id: u32,
    pub name: String,
    pub host_type: String,
    pub iscsi_names: Vec<String>,
    pub wwpns: Vec<String>,
    pub chap_secret: Option<String>,
    pub site_name: Option<String>,
    pub portset: Option<String>,
}

impl Host {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            host_type: "generic".to_string(),
            iscsi_names: Vec::new(),
            wwpns: Vec::new(),
            chap_secret: None,
            site_name: None,
            portset: None,
        }
    }

    pub fn port_count(&self) -> usize {
        self.iscsi_names.len() + self.wwpns.len()
    }
}

impl Record for Host {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Volume-to-host mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostMapping {
    pub id: u32,
    pub host: String,
    pub vdisk: String,
    pub lun: u32,
}

impl Record for HostMapping {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        ""
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FcMap {
    pub id: u32,
    pub name: String,
    pub source: String,
    pub target: String,
    pub copy_rate: u32,
    pub clean_rate: u32,
    pub progress: u32,
    pub status: FcState,
    pub autodelete: bool,
    pub group_id: Option<u32>,
    pub rc_controlled: bool,
}

impl FcMap {
    pub fn new(id: u32, name: &str, source: &str, target: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            copy_rate: 50,
            clean_rate: 50,
            progress: 0,
            status: FcState::Begin,
            autodelete: false,
            group_id: None,
            rc_controlled: false,
        }
    }

    pub fn involves(&self, vdisk: &str) -> bool {
        self.source == vdisk || self.target == vdisk
    }
}

impl Record for FcMap {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FcConsistGrp {
    pub id: u32,
    pub name: String,
    pub status: FcState,
    pub autodelete: bool,
    /// Member fcmap id to fcmap name.
    pub fcmaps: BTreeMap<u32, String>,
}

impl Record for FcConsistGrp {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyType {
    Metro,
    Global,
    ActiveActive,
}

impl CopyType {
    pub fn as_str(self) -> &'static str {
        match self {
            CopyType::Metro => "metro",
            CopyType::Global => "global",
            CopyType::ActiveActive => "activeactive",
        }
    }
}

impl fmt::Display for CopyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclingMode {
    None,
    Multi,
}

impl CyclingMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(CyclingMode::None),
            "multi" => Some(CyclingMode::Multi),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CyclingMode::None => "none",
            CyclingMode::Multi => "multi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primary {
    Master,
    Aux,
}

impl Primary {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "master" => Some(Primary::Master),
            "aux" => Some(Primary::Aux),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Primary::Master => "master",
            Primary::Aux => "aux",
        }
    }
}

/// One end of a replication pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RcRelationship {
    pub id: u32,
    pub name: String,
    pub master_cluster: ClusterRef,
    pub aux_cluster: ClusterRef,
    pub master_vdisk: String,
    pub aux_vdisk: String,
    pub primary: Option<Primary>,
    pub consistency_group: Option<String>,
    pub state: RcState,
    pub progress: u32,
    pub copy_type: CopyType,
    pub cycling_mode: CyclingMode,
    pub cycle_period_seconds: u32,
    pub bg_copy_priority: u32,
    pub status: String,
    pub master_change: Option<String>,
    pub aux_change: Option<String>,
}

impl RcRelationship {
    pub fn new(id: u32, name: &str, master: &str, aux: &str, copy_type: CopyType) -> Self {
        let unset = ClusterRef {
            id: String::new(),
            name: String::new(),
        };
        Self {
            id,
            name: name.to_string(),
            master_cluster: unset.clone(),
            aux_cluster: unset,
            master_vdisk: master.to_string(),
            aux_vdisk: aux.to_string(),
            primary: Some(Primary::Master),
            consistency_group: None,
            state: RcState::InconsistentStopped,
            progress: 0,
            copy_type,
            cycling_mode: CyclingMode::None,
            cycle_period_seconds: 300,
            bg_copy_priority: 50,
            status: "online".to_string(),
            master_change: None,
            aux_change: None,
        }
    }

    pub fn involves(&self, vdisk: &str) -> bool {
        self.master_vdisk == vdisk || self.aux_vdisk == vdisk
    }

    pub fn uses_change_volume(&self, vdisk: &str) -> bool {
        self.master_change.as_deref() == Some(vdisk) || self.aux_change.as_deref() == Some(vdisk)
    }
}

impl Record for RcRelationship {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RcConsistGrp {
    pub id: u32,
    pub name: String,
    pub master_cluster: ClusterRef,
    pub aux_cluster: ClusterRef,
    pub primary: Option<Primary>,
    pub state: RcState,
    /// `None` until the first relationship joins (`empty_group`).
    pub copy_type: Option<CopyType>,
    pub cycling_mode: CyclingMode,
    pub cycle_period_seconds: u32,
}

impl RcConsistGrp {
    pub fn copy_type_display(&self) -> &'static str {
        self.copy_type.map_or("empty_group", CopyType::as_str)
    }
}

impl Record for RcConsistGrp {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partnership {
    pub id: u32,
    pub system_id: String,
    pub name: String,
    pub location: String,
    pub state: String,
    pub transport: String,
    pub cluster_ip: String,
    pub link_bandwidth_mbits: u32,
    pub background_copy_rate: u32,
}

impl Record for Partnership {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeGroup {
    pub id: u32,
    pub name: String,
    pub uid: String,
}

impl Record for VolumeGroup {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub id: u32,
    pub name: String,
    pub volume_group: String,
    pub state: String,
}

impl Record for Snapshot {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

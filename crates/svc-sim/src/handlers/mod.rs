//! Per-verb command handlers.
//!
//! Every handler has the shape [`Handler`]: it reads its flags from a
//! [`Request`], mutates the simulator's stores and returns stdout. Device
//! errors travel as [`HandlerError::Cli`] and end up on stderr; caller
//! mistakes travel as [`HandlerError::Client`] and are raised.

use std::str::FromStr;

use common::{bytes_to_human, unquote};
use svc_cli::{ParsedCommand, RenderOptions, Table};

use crate::error::{CliError, ErrorCode, SimError};
use crate::fault::Fault;
use crate::simulator::Simulator;
use crate::store::{Record, Store};

mod flashcopy;
mod host;
mod hyperswap;
mod partnership;
mod remote_copy;
mod system;
mod vdisk;
mod volume_group;

/// One decoded invocation plus the fault it consumed.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub args: ParsedCommand,
    pub fault: Option<Fault>,
    pub opts: RenderOptions,
}

impl Request {
    pub fn new(args: ParsedCommand, fault: Option<Fault>) -> Self {
        let opts = RenderOptions::from_command(&args);
        Self { args, fault, opts }
    }

    pub fn flag(&self, name: &str) -> Option<&str> {
        self.args.value(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.args.has(name)
    }

    pub fn obj(&self) -> Option<&str> {
        self.args.obj()
    }

    pub fn require_obj(&self) -> Result<&str, CliError> {
        self.obj().ok_or_else(|| {
            CliError::with_detail(
                ErrorCode::NoObjectId,
                format!("{} needs an object", self.args.cmd),
            )
        })
    }

    pub fn require(&self, flag: &str) -> Result<&str, CliError> {
        self.flag(flag).ok_or_else(|| {
            CliError::with_detail(ErrorCode::MissingParameters, format!("-{} is required", flag))
        })
    }

    /// Parse an optional flag value; a malformed value is an unsupported
    /// parameter.
    pub fn parse<T: FromStr>(&self, flag: &str) -> Result<Option<T>, CliError> {
        self.flag(flag)
            .map(|raw| {
                unquote(raw).trim_end_matches('%').parse::<T>().map_err(|_| {
                    CliError::with_detail(
                        ErrorCode::UnsupportedParameter,
                        format!("-{} {}", flag, raw),
                    )
                })
            })
            .transpose()
    }

    /// On/off switch that may be given bare (`-autodelete`) or with a
    /// value (`-autodelete off`).
    pub fn switch(&self, flag: &str) -> Option<bool> {
        if !self.has(flag) {
            return None;
        }
        Some(!matches!(self.flag(flag), Some("off") | Some("no")))
    }

    pub fn fault_is(&self, fault: Fault) -> bool {
        self.fault == Some(fault)
    }

    /// Capacity as raw bytes under `-bytes`, human form otherwise.
    pub fn capacity(&self, bytes: u64) -> String {
        if self.has("bytes") {
            bytes.to_string()
        } else {
            bytes_to_human(bytes)
        }
    }
}

#[derive(Debug)]
pub(crate) enum HandlerError {
    Cli(CliError),
    Client(SimError),
}

impl From<CliError> for HandlerError {
    fn from(err: CliError) -> Self {
        HandlerError::Cli(err)
    }
}

impl From<ErrorCode> for HandlerError {
    fn from(code: ErrorCode) -> Self {
        HandlerError::Cli(CliError::new(code))
    }
}

impl From<SimError> for HandlerError {
    fn from(err: SimError) -> Self {
        HandlerError::Client(err)
    }
}

pub(crate) type HandlerResult = Result<String, HandlerError>;

pub(crate) type Handler = fn(&mut Simulator, &Request) -> HandlerResult;

/// Resolve a verb to its handler.
pub(crate) fn lookup(verb: &str) -> Option<Handler> {
    let handler: Handler = match verb {
        // system
        "lslicense" => Simulator::lslicense,
        "lsguicapabilities" => Simulator::lsguicapabilities,
        "lssystem" => Simulator::lssystem,
        "lsmdiskgrp" => Simulator::lsmdiskgrp,
        "lsiogrp" => Simulator::lsiogrp,
        "lsnodecanister" => Simulator::lsnodecanister,
        "lsnode" => Simulator::lsnode,
        "lsportfc" => Simulator::lsportfc,
        "lstargetportfc" => Simulator::lstargetportfc,
        "lsportip" => Simulator::lsportip,
        "lsip" => Simulator::lsip,
        "lsfabric" => Simulator::lsfabric,
        // volumes
        "mkvdisk" => Simulator::mkvdisk,
        "rmvdisk" => Simulator::rmvdisk,
        "expandvdisksize" => Simulator::expandvdisksize,
        "lsvdisk" => Simulator::lsvdisk,
        "chvdisk" => Simulator::chvdisk,
        "movevdisk" => Simulator::movevdisk,
        "migratevdisk" => Simulator::migratevdisk,
        "addvdiskcopy" => Simulator::addvdiskcopy,
        "lsvdiskcopy" => Simulator::lsvdiskcopy,
        "rmvdiskcopy" => Simulator::rmvdiskcopy,
        "lsvdisksyncprogress" => Simulator::lsvdisksyncprogress,
        "lsvdiskfcmappings" => Simulator::lsvdiskfcmappings,
        // hosts
        "mkhost" => Simulator::mkhost,
        "addhostport" => Simulator::addhostport,
        "chhost" => Simulator::chhost,
        "rmhost" => Simulator::rmhost,
        "lshost" => Simulator::lshost,
        "lsiscsiauth" => Simulator::lsiscsiauth,
        "mkvdiskhostmap" => Simulator::mkvdiskhostmap,
        "rmvdiskhostmap" => Simulator::rmvdiskhostmap,
        "lshostvdiskmap" => Simulator::lshostvdiskmap,
        "lsvdiskhostmap" => Simulator::lsvdiskhostmap,
        // flashcopy
        "mkfcmap" => Simulator::mkfcmap,
        "prestartfcmap" => Simulator::prestartfcmap,
        "startfcmap" => Simulator::startfcmap,
        "stopfcmap" => Simulator::stopfcmap,
        "rmfcmap" => Simulator::rmfcmap,
        "chfcmap" => Simulator::chfcmap,
        "lsfcmap" => Simulator::lsfcmap,
        "mkfcconsistgrp" => Simulator::mkfcconsistgrp,
        "prestartfcconsistgrp" => Simulator::prestartfcconsistgrp,
        "startfcconsistgrp" => Simulator::startfcconsistgrp,
        "stopfcconsistgrp" => Simulator::stopfcconsistgrp,
        "rmfcconsistgrp" => Simulator::rmfcconsistgrp,
        "lsfcconsistgrp" => Simulator::lsfcconsistgrp,
        // remote copy
        "mkrcrelationship" => Simulator::mkrcrelationship,
        "lsrcrelationship" => Simulator::lsrcrelationship,
        "startrcrelationship" => Simulator::startrcrelationship,
        "stoprcrelationship" => Simulator::stoprcrelationship,
        "switchrcrelationship" => Simulator::switchrcrelationship,
        "chrcrelationship" => Simulator::chrcrelationship,
        "rmrcrelationship" => Simulator::rmrcrelationship,
        "mkrcconsistgrp" => Simulator::mkrcconsistgrp,
        "lsrcconsistgrp" => Simulator::lsrcconsistgrp,
        "startrcconsistgrp" => Simulator::startrcconsistgrp,
        "stoprcconsistgrp" => Simulator::stoprcconsistgrp,
        "switchrcconsistgrp" => Simulator::switchrcconsistgrp,
        "chrcconsistgrp" => Simulator::chrcconsistgrp,
        "rmrcconsistgrp" => Simulator::rmrcconsistgrp,
        // partnerships
        "lspartnershipcandidate" => Simulator::lspartnershipcandidate,
        "lspartnership" => Simulator::lspartnership,
        "mkippartnership" => Simulator::mkippartnership,
        "mkfcpartnership" => Simulator::mkfcpartnership,
        "chpartnership" => Simulator::chpartnership,
        "rmpartnership" => Simulator::rmpartnership,
        // hyperswap
        "mkvolume" => Simulator::mkvolume,
        "addvolumecopy" => Simulator::addvolumecopy,
        "rmvolumecopy" => Simulator::rmvolumecopy,
        "rmvolume" => Simulator::rmvolume,
        // volume groups
        "mkvolumegroup" => Simulator::mkvolumegroup,
        "lsvolumegroup" => Simulator::lsvolumegroup,
        "rmvolumegroup" => Simulator::rmvolumegroup,
        "addsnapshot" => Simulator::addsnapshot,
        "lsvolumegroupsnapshot" => Simulator::lsvolumegroupsnapshot,
        "rmsnapshot" => Simulator::rmsnapshot,
        _ => return None,
    };
    Some(handler)
}

/// Success line of a create verb. Under `bad_id` the id is not numeric.
pub(crate) fn created(req: &Request, kind: &str, id: u32) -> String {
    if req.fault_is(Fault::BadId) {
        format!("{}, id [x], successfully created", kind)
    } else {
        format!("{}, id [{}], successfully created", kind, id)
    }
}

pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub(crate) fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Name for a new object: the `-name` flag, validated and checked for
/// collisions, or `<prefix><id>`.
pub(crate) fn new_name<T: Record>(
    req: &Request,
    store: &Store<T>,
    prefix: &str,
    id: u32,
) -> Result<String, CliError> {
    let name = match req.flag("name") {
        Some(raw) => unquote(raw).to_string(),
        None => format!("{}{}", prefix, id),
    };
    check_name(store, &name)?;
    Ok(name)
}

pub(crate) fn check_name<T: Record>(store: &Store<T>, name: &str) -> Result<(), CliError> {
    if !common::is_valid_object_name(name) {
        return Err(CliError::with_detail(ErrorCode::InvalidName, name));
    }
    if store.contains_name(name) {
        return Err(CliError::with_detail(ErrorCode::AlreadyExists, name));
    }
    Ok(())
}

/// Honour `-filtervalue key=value` for the keys a verb supports.
pub(crate) fn filter_table(req: &Request, table: &mut Table, keys: &[&str]) -> Result<(), CliError> {
    let Some(raw) = req.flag("filtervalue") else {
        return Ok(());
    };
    let (key, value) = parse_filter(raw)?;
    if !keys.contains(&key) {
        return Err(CliError::with_detail(
            ErrorCode::UnsupportedParameter,
            format!("filter key {}", key),
        ));
    }
    table.retain_matching(key, value);
    Ok(())
}

pub(crate) fn parse_filter(raw: &str) -> Result<(&str, &str), CliError> {
    let raw = unquote(raw);
    raw.split_once('=')
        .map(|(key, value)| (key, unquote(value)))
        .ok_or_else(|| CliError::with_detail(ErrorCode::UnsupportedParameter, raw.to_string()))
}

/// Apply the listing-shape faults: `header_mismatch` drops header column
/// `header_idx`, `remove_field` drops the first field of every row.
pub(crate) fn shape_table(req: &Request, table: &mut Table, header_idx: usize) {
    match req.fault {
        Some(Fault::HeaderMismatch) if header_idx < table.header().len() => {
            table.header_mut().remove(header_idx);
        }
        Some(Fault::RemoveField) => {
            for row in table.rows_mut() {
                if !row.is_empty() {
                    row.remove(0);
                }
            }
        }
        _ => {}
    }
}

/// Accept `io_grpN` or `N`.
pub(crate) fn parse_io_group(value: &str, count: u32) -> Result<u32, CliError> {
    let value = unquote(value);
    value
        .strip_prefix("io_grp")
        .unwrap_or(value)
        .parse::<u32>()
        .ok()
        .filter(|id| *id < count)
        .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("I/O group {}", value)))
}

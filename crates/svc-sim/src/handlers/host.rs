//! Hosts, host ports and volume-to-host mappings.

use common::unquote;
use svc_cli::{ObjectView, Table};
use tracing::info;

use super::{created, filter_table, new_name, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::fault::Fault;
use crate::model::{Host, HostMapping};
use crate::simulator::Simulator;

/// Ports named by `-iscsiname` or `-hbawwpn`; exactly one of the two.
fn requested_ports(req: &Request) -> Result<(Vec<String>, Vec<String>), CliError> {
    match (req.flag("iscsiname"), req.flag("hbawwpn")) {
        (Some(_), Some(_)) => Err(ErrorCode::MutuallyExclusive.into()),
        (None, None) => Err(CliError::with_detail(
            ErrorCode::MissingParameters,
            "-iscsiname or -hbawwpn is required",
        )),
        (Some(iqn), None) => Ok((vec![unquote(iqn).to_string()], Vec::new())),
        (None, Some(wwpns)) => Ok((
            Vec::new(),
            unquote(wwpns)
                .split(':')
                .filter(|w| !w.is_empty())
                .map(str::to_uppercase)
                .collect(),
        )),
    }
}

impl Simulator {
    pub(crate) fn host_or(&self, key: &str, code: ErrorCode) -> Result<&Host, CliError> {
        let key = unquote(key);
        self.hosts
            .resolve(key)
            .ok_or_else(|| CliError::with_detail(code, format!("host {}", key)))
    }

    /// A port may belong to one host only.
    fn check_ports_free(&self, iqns: &[String], wwpns: &[String]) -> Result<(), CliError> {
        for host in self.hosts.values() {
            let taken = iqns.iter().any(|iqn| host.iscsi_names.contains(iqn))
                || wwpns
                    .iter()
                    .any(|w| host.wwpns.iter().any(|h| h.eq_ignore_ascii_case(w)));
            if taken {
                return Err(CliError::with_detail(
                    ErrorCode::PortInUse,
                    format!("port owned by host {}", host.name),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn mkhost(&mut self, req: &Request) -> HandlerResult {
        let (iqns, wwpns) = requested_ports(req)?;
        let id = self.hosts.next_id();
        let name = new_name(req, &self.hosts, "host", id)?;
        self.check_ports_free(&iqns, &wwpns)?;

        let mut host = Host::new(id, &name);
        host.iscsi_names = iqns;
        host.wwpns = wwpns;
        host.site_name = req.flag("site").map(|s| unquote(s).to_string());
        host.portset = req.flag("portset").map(|s| unquote(s).to_string());
        if let Some(kind) = req.flag("type") {
            host.host_type = kind.to_string();
        }
        info!(host = %name, id, "created host");
        self.hosts.insert(host);
        Ok(created(req, "Host", id))
    }

    pub(crate) fn addhostport(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let id = self.host_or(key, ErrorCode::NotSuitable)?.id;
        let (iqns, wwpns) = requested_ports(req)?;
        self.check_ports_free(&iqns, &wwpns)?;
        if let Some(host) = self.hosts.get_mut(id) {
            host.iscsi_names.extend(iqns);
            host.wwpns.extend(wwpns);
        }
        Ok(String::new())
    }

    pub(crate) fn chhost(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let id = self.host_or(key, ErrorCode::NotSuitable)?.id;
        let mut changed = false;

        if let Some(raw) = req.flag("name") {
            let new = unquote(raw).to_string();
            super::check_name(&self.hosts, &new)?;
            if let Some(host) = self.hosts.get_mut(id) {
                let old = std::mem::replace(&mut host.name, new.clone());
                for mapping in self.mappings.values_mut().filter(|m| m.host == old) {
                    mapping.host = new.clone();
                }
            }
            changed = true;
        }

        let host = self.hosts.get_mut(id).ok_or(ErrorCode::NotSuitable)?;
        if let Some(secret) = req.flag("chapsecret") {
            host.chap_secret = Some(unquote(secret).to_string());
            changed = true;
        }
        if req.has("nochapsecret") {
            host.chap_secret = None;
            changed = true;
        }
        if let Some(site) = req.flag("site") {
            host.site_name = Some(unquote(site).to_string());
            changed = true;
        }
        if let Some(portset) = req.flag("portset") {
            host.portset = Some(unquote(portset).to_string());
            changed = true;
        }
        if let Some(kind) = req.flag("type") {
            host.host_type = kind.to_string();
            changed = true;
        }

        if !changed {
            return Err(ErrorCode::MissingParameters.into());
        }
        Ok(String::new())
    }

    pub(crate) fn rmhost(&mut self, req: &Request) -> HandlerResult {
        let key = req.require_obj()?;
        let host = self.host_or(key, ErrorCode::NotSuitable)?;
        let (id, name) = (host.id, host.name.clone());
        if self.mappings.values().any(|m| m.host == name) {
            return Err(CliError::with_detail(ErrorCode::HostHasMappings, name).into());
        }
        self.hosts.remove(id);
        info!(host = %name, id, "removed host");
        Ok(String::new())
    }

    pub(crate) fn lshost(&mut self, req: &Request) -> HandlerResult {
        let Some(key) = req.obj() else {
            let mut hosts: Vec<&Host> = self.hosts.values().collect();
            hosts.sort_by(|a, b| a.name.cmp(&b.name));
            let mut table = Table::new(&[
                "id",
                "name",
                "port_count",
                "iogrp_count",
                "status",
                "site_name",
            ]);
            for host in hosts {
                table.push([
                    host.id.to_string(),
                    host.name.clone(),
                    host.port_count().to_string(),
                    self.config.io_groups.to_string(),
                    "online".to_string(),
                    host.site_name.clone().unwrap_or_default(),
                ]);
            }
            filter_table(req, &mut table, &["name"])?;
            return Ok(table.render(&req.opts));
        };

        match req.fault {
            Some(Fault::MissingHost) => {
                return Err(CliError::with_detail(ErrorCode::DoesNotExist, "host went away").into())
            }
            Some(Fault::BiggerTroubles) => return Err(ErrorCode::InvalidName.into()),
            _ => {}
        }
        let host = self.host_or(key, ErrorCode::DoesNotExist)?;
        let mut view = ObjectView::new()
            .with("id", host.id.to_string())
            .with("name", host.name.as_str())
            .with("port_count", host.port_count().to_string())
            .with("type", host.host_type.as_str())
            .with("mask", "1111")
            .with("iogrp_count", self.config.io_groups.to_string())
            .with("status", "online")
            .with("site_name", host.site_name.clone().unwrap_or_default())
            .with("portset_name", host.portset.clone().unwrap_or_default());
        for iqn in &host.iscsi_names {
            view.push("iscsi_name", iqn.as_str());
            view.push("node_logged_in_count", "0");
            view.push("state", "offline");
        }
        for wwpn in &host.wwpns {
            view.push("WWPN", wwpn.as_str());
            view.push("node_logged_in_count", "0");
            view.push("state", "active");
        }
        Ok(view.render(&req.opts))
    }

    pub(crate) fn lsiscsiauth(&mut self, req: &Request) -> HandlerResult {
        let mut table = Table::new(&[
            "type",
            "id",
            "name",
            "iscsi_auth_method",
            "iscsi_chap_secret",
        ]);
        for host in self.hosts.values() {
            let (method, secret) = match &host.chap_secret {
                Some(secret) => ("chap", secret.clone()),
                None => ("none", String::new()),
            };
            table.push([
                "host".to_string(),
                host.id.to_string(),
                host.name.clone(),
                method.to_string(),
                secret,
            ]);
        }
        Ok(table.render(&req.opts))
    }

    pub(crate) fn mkvdiskhostmap(&mut self, req: &Request) -> HandlerResult {
        let host_key = req.require("host")?;
        let vdisk_key = req.obj().ok_or_else(|| {
            CliError::with_detail(ErrorCode::MissingParameters, "volume is required")
        })?;
        let vdisk = self.volume_or(vdisk_key, ErrorCode::NotSuitable)?.name.clone();
        let host = self.host_or(host_key, ErrorCode::DoesNotExist)?.name.clone();

        if self
            .mappings
            .values()
            .any(|m| m.host == host && m.vdisk == vdisk)
        {
            return Err(CliError::with_detail(ErrorCode::AlreadyMappedToHost, vdisk).into());
        }
        let used: Vec<u32> = self
            .mappings
            .values()
            .filter(|m| m.host == host)
            .map(|m| m.lun)
            .collect();
        let lun = match req.parse::<u32>("scsi")? {
            Some(lun) if used.contains(&lun) => {
                return Err(CliError::with_detail(ErrorCode::LunInUse, format!("SCSI id {}", lun)).into())
            }
            Some(lun) => lun,
            None => (0..).find(|lun| !used.contains(lun)).unwrap_or(0),
        };
        if !req.has("force") && self.mappings.values().any(|m| m.vdisk == vdisk) {
            return Err(CliError::with_detail(ErrorCode::VdiskAlreadyMapped, vdisk).into());
        }

        let id = self.mappings.next_id();
        info!(host = %host, volume = %vdisk, lun, "mapped volume");
        self.mappings.insert(HostMapping {
            id,
            host,
            vdisk,
            lun,
        });
        Ok(created(req, "Virtual Disk to Host map", id))
    }

    pub(crate) fn rmvdiskhostmap(&mut self, req: &Request) -> HandlerResult {
        let host_key = req.require("host")?;
        let vdisk_key = req.require_obj()?;
        let (host_key, vdisk_key) = (unquote(host_key), unquote(vdisk_key));
        let host = self
            .hosts
            .resolve(host_key)
            .map_or(host_key, |h| h.name.as_str());
        let vdisk = self
            .volumes
            .resolve(vdisk_key)
            .map_or(vdisk_key, |v| v.name.as_str());
        let id = self
            .mappings
            .values()
            .find(|m| m.host == host && m.vdisk == vdisk)
            .map(|m| m.id)
            .ok_or_else(|| {
                CliError::with_detail(ErrorCode::NotSuitable, format!("{} is not mapped to {}", vdisk, host))
            })?;
        self.mappings.remove(id);
        Ok(String::new())
    }

    pub(crate) fn lshostvdiskmap(&mut self, req: &Request) -> HandlerResult {
        let host_filter = match req.obj() {
            Some(key) => Some(self.host_or(key, ErrorCode::DoesNotExist)?.name.clone()),
            None => None,
        };
        let mut table = Table::new(&[
            "id",
            "name",
            "SCSI_id",
            "vdisk_id",
            "vdisk_name",
            "vdisk_UID",
        ]);
        let mappings = self
            .mappings
            .values()
            .filter(|m| host_filter.as_deref().map_or(true, |h| m.host == h));
        for mapping in mappings {
            let host_id = self.hosts.by_name(&mapping.host).map(|h| h.id);
            let volume = self.volumes.by_name(&mapping.vdisk);
            table.push([
                host_id.map(|id| id.to_string()).unwrap_or_default(),
                mapping.host.clone(),
                mapping.lun.to_string(),
                volume.map(|v| v.id.to_string()).unwrap_or_default(),
                mapping.vdisk.clone(),
                volume.map(|v| v.uid.clone()).unwrap_or_default(),
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

    fn setup() -> Simulator {
        let mut sim = Simulator::default();
        for name in ["v1", "v2"] {
            ok(
                &mut sim,
                &["mkvdisk", "-name", name, "-mdiskgrp", "\"openstack\"", "-size", "1", "-unit", "gb"],
            );
        }
        ok(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.1993-08.org.debian:01:1"]);
        ok(&mut sim, &["mkhost", "-name", "h2", "-hbawwpn", "5005076802aaaa01:5005076802aaaa02"]);
        sim
    }

    #[test]
    fn test_mkhost_rules() {
        let mut sim = setup();
        assert_eq!(code(&mut sim, &["mkhost", "-name", "h3"]), "CMMVC5707E");
        assert_eq!(
            code(&mut sim, &["mkhost", "-name", "h3", "-iscsiname", "iqn.a", "-hbawwpn", "1"]),
            "CMMVC5713E"
        );
        assert_eq!(
            code(&mut sim, &["mkhost", "-name", "h3", "-iscsiname", "iqn.1993-08.org.debian:01:1"]),
            "CMMVC6581E"
        );
        assert_eq!(
            code(&mut sim, &["mkhost", "-name", "h1", "-iscsiname", "iqn.other"]),
            "CMMVC6035E"
        );
        let h2 = sim.hosts().by_name("h2").unwrap();
        assert_eq!(h2.wwpns, vec!["5005076802AAAA01", "5005076802AAAA02"]);
    }

    #[test]
    fn test_mapping_luns_and_conflicts() {
        let mut sim = setup();
        let out = ok(&mut sim, &["mkvdiskhostmap", "-host", "h1", "v1"]);
        assert_eq!(out, "Virtual Disk to Host map, id [0], successfully created");
        assert_eq!(code(&mut sim, &["mkvdiskhostmap", "-host", "h1", "v1"]), "CMMVC5878E");
        assert_eq!(
            code(&mut sim, &["mkvdiskhostmap", "-host", "h1", "-scsi", "0", "v2"]),
            "CMMVC5879E"
        );
        assert_eq!(code(&mut sim, &["mkvdiskhostmap", "-host", "h2", "v1"]), "CMMVC6071E");
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h2", "-force", "v1"]);
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h1", "v2"]);
        let luns: Vec<u32> = sim
            .mappings()
            .values()
            .filter(|m| m.host == "h1")
            .map(|m| m.lun)
            .collect();
        assert_eq!(luns, vec![0, 1]);
        assert_eq!(code(&mut sim, &["mkvdiskhostmap", "-host", "ghost", "v2"]), "CMMVC5754E");
        assert_eq!(code(&mut sim, &["mkvdiskhostmap", "-host", "h1", "ghost"]), "CMMVC5753E");
    }

    #[test]
    fn test_rmhost_with_mappings_and_unmap() {
        let mut sim = setup();
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h1", "v1"]);
        assert_eq!(code(&mut sim, &["rmhost", "h1"]), "CMMVC5871E");
        assert_eq!(code(&mut sim, &["rmvdiskhostmap", "-host", "h1", "v2"]), "CMMVC5753E");
        ok(&mut sim, &["rmvdiskhostmap", "-host", "h1", "v1"]);
        ok(&mut sim, &["rmhost", "h1"]);
        assert!(sim.hosts().by_name("h1").is_none());
    }

    #[test]
    fn test_lshost_views_and_faults() {
        let mut sim = setup();
        let list = ok(&mut sim, &["lshost", "-delim", "!", "-nohdr"]);
        assert_eq!(list.lines().count(), 2);
        let view = ok(&mut sim, &["lshost", "-delim", "!", "h2"]);
        assert!(view.contains("WWPN!5005076802AAAA01"));
        assert!(view.contains("port_count!2"));

        sim.error_injection("lshost", "missing_host").unwrap();
        assert_eq!(code(&mut sim, &["lshost", "h1"]), "CMMVC5754E");
        sim.error_injection("lshost", "bigger_troubles").unwrap();
        assert_eq!(code(&mut sim, &["lshost", "h1"]), "CMMVC6527E");
        assert!(code(&mut sim, &["lshost", "h1"]).is_empty());
    }

    #[test]
    fn test_chhost_rename_and_chap() {
        let mut sim = setup();
        ok(&mut sim, &["mkvdiskhostmap", "-host", "h1", "v1"]);
        ok(&mut sim, &["chhost", "-name", "renamed", "h1"]);
        assert_eq!(sim.mappings().values().next().unwrap().host, "renamed");
        ok(&mut sim, &["chhost", "-chapsecret", "s3cret", "renamed"]);
        let auth = ok(&mut sim, &["lsiscsiauth", "-delim", "!"]);
        assert!(auth.contains("host!0!renamed!chap!s3cret"));
        assert_eq!(code(&mut sim, &["chhost", "renamed"]), "CMMVC5707E");
    }
}

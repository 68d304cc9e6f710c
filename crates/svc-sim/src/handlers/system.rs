//! System, pool, I/O group, node and port listings.

use common::{unquote, NodeSpec, PoolSpec};
use svc_cli::{ObjectView, Table};

use super::{filter_table, shape_table, yes_no, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::fault::Fault;
use crate::simulator::Simulator;

const NODE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "UPS_serial_number",
    "WWNN",
    "status",
    "IO_group_id",
    "IO_group_name",
    "config_node",
    "UPS_unique_id",
    "hardware",
    "iscsi_name",
    "iscsi_alias",
    "panel_name",
    "enclosure_id",
    "canister_id",
    "enclosure_serial_number",
    "site_id",
];

impl Simulator {
    pub(crate) fn lslicense(&mut self, req: &Request) -> HandlerResult {
        let enclosures = if self.config.license_compression && !req.fault_is(Fault::NoCompression) {
            "1"
        } else {
            "0"
        };
        let view = ObjectView::new()
            .with("used_compression_capacity", "0.08")
            .with("license_compression_capacity", "0")
            .with("license_compression_enclosures", enclosures);
        Ok(view.render(&req.opts))
    }

    pub(crate) fn lsguicapabilities(&mut self, req: &Request) -> HandlerResult {
        let scheme = if self.config.license_compression && !req.fault_is(Fault::NoCompression) {
            "flex"
        } else {
            "0"
        };
        let view = ObjectView::new()
            .with("license_scheme", scheme)
            .with("product_key", "2076");
        Ok(view.render(&req.opts))
    }

    pub(crate) fn lssystem(&mut self, req: &Request) -> HandlerResult {
        let system = &self.config.local_system;
        let topology_status = if system.topology.is_empty() {
            ""
        } else {
            "dual_site"
        };
        let view = ObjectView::new()
            .with("id", system.id.as_str())
            .with("name", system.name.as_str())
            .with("location", "local")
            .with("partnership", "")
            .with("code_level", system.code_level.as_str())
            .with("console_IP", "1.234.56.78:443")
            .with("id_alias", system.id.as_str())
            .with("product_name", "IBM Storwize V7000")
            .with("topology", system.topology.as_str())
            .with("topology_status", topology_status);
        Ok(view.render(&req.opts))
    }

    /// `(virtual, real, vdisk_count)` allocated from the pool.
    fn pool_usage(&self, pool: &str) -> (u64, u64, usize) {
        self.volumes
            .values()
            .flat_map(|vol| {
                vol.copies
                    .values()
                    .filter(move |copy| copy.mdisk_grp_name == pool)
                    .map(move |copy| (vol.capacity, copy.real_capacity(vol.capacity)))
            })
            .fold((0, 0, 0), |(virt, real, count), (v, r)| {
                (virt + v, real + r, count + 1)
            })
    }

    fn pool_fields(&self, req: &Request, id: usize, pool: &PoolSpec) -> Vec<(&'static str, String)> {
        let (virt, real, count) = self.pool_usage(&pool.name);
        let free = pool.free_capacity.saturating_sub(real);
        let overallocation = if pool.capacity == 0 {
            0
        } else {
            virt * 100 / pool.capacity
        };
        vec![
            ("id", id.to_string()),
            ("name", pool.name.clone()),
            ("status", "online".to_string()),
            ("mdisk_count", "1".to_string()),
            ("vdisk_count", count.to_string()),
            ("capacity", req.capacity(pool.capacity)),
            ("extent_size", pool.extent_size.to_string()),
            ("free_capacity", req.capacity(free)),
            ("virtual_capacity", req.capacity(virt)),
            ("used_capacity", req.capacity(real)),
            ("real_capacity", req.capacity(real)),
            ("overallocation", overallocation.to_string()),
            ("warning", "0".to_string()),
            ("easy_tier", "auto".to_string()),
            ("easy_tier_status", "balanced".to_string()),
            (
                "site_id",
                pool.site_id.map(|s| s.to_string()).unwrap_or_default(),
            ),
            ("data_reduction", yes_no(pool.data_reduction).to_string()),
        ]
    }

    pub(crate) fn lsmdiskgrp(&mut self, req: &Request) -> HandlerResult {
        if let Some(obj) = req.obj() {
            let key = unquote(obj);
            let (id, pool) = self
                .config
                .pool(key)
                .or_else(|| {
                    key.parse::<usize>()
                        .ok()
                        .and_then(|id| self.config.pools.get(id.wrapping_sub(1)).map(|p| (id, p)))
                })
                .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, key.to_string()))?;
            let mut view = ObjectView::new();
            for (label, value) in self.pool_fields(req, id, pool) {
                view.push(label, value);
            }
            return Ok(view.render(&req.opts));
        }

        let mut table: Option<Table> = None;
        for (idx, pool) in self.config.pools.iter().enumerate() {
            let fields = self.pool_fields(req, idx + 1, pool);
            let table = table.get_or_insert_with(|| {
                Table::new(&fields.iter().map(|(label, _)| *label).collect::<Vec<_>>())
            });
            table.push(fields.into_iter().map(|(_, value)| value));
        }
        let mut table = table.unwrap_or_default();
        filter_table(req, &mut table, &["name", "id", "site_id"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsiogrp(&mut self, req: &Request) -> HandlerResult {
        let mut table = Table::new(&[
            "id",
            "name",
            "node_count",
            "vdisk_count",
            "host_count",
            "site_id",
        ]);
        for id in 0..self.config.io_groups {
            let nodes = if id == 0 { self.config.nodes.len() } else { 0 };
            let vdisks = self.volumes.values().filter(|v| v.io_group_id == id).count();
            table.push([
                id.to_string(),
                format!("io_grp{}", id),
                nodes.to_string(),
                vdisks.to_string(),
                self.hosts.len().to_string(),
                String::new(),
            ]);
        }
        table.push([
            self.config.io_groups.to_string(),
            "recovery_io_grp".to_string(),
            "0".to_string(),
            "0".to_string(),
            "0".to_string(),
            String::new(),
        ]);
        filter_table(req, &mut table, &["id", "name"])?;
        Ok(table.render(&req.opts))
    }

    fn node_iscsi_name(&self, req: &Request, node: &NodeSpec) -> String {
        if req.fault_is(Fault::NoIqn) {
            String::new()
        } else {
            node.iscsi_name.clone()
        }
    }

    pub(crate) fn lsnodecanister(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let mut table = Table::new(NODE_COLUMNS);
        for (idx, node) in self.config.nodes.iter().enumerate() {
            table.push([
                node.id.to_string(),
                node.name.clone(),
                String::new(),
                node.wwnn.clone(),
                "online".to_string(),
                "0".to_string(),
                "io_grp0".to_string(),
                yes_no(idx == 0).to_string(),
                String::new(),
                "400".to_string(),
                self.node_iscsi_name(req, node),
                String::new(),
                node.panel_name.clone(),
                "1".to_string(),
                node.id.to_string(),
                "0000000".to_string(),
                node.site_id.map(|s| s.to_string()).unwrap_or_default(),
            ]);
        }
        shape_table(req, &mut table, 2);
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsnode(&mut self, req: &Request) -> HandlerResult {
        let Some(key) = req.args.node_id.as_deref() else {
            return self.lsnodecanister(req);
        };
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let nodes = &self.config.nodes;
        let node = nodes
            .iter()
            .find(|n| n.name == key || n.id.to_string() == key)
            .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, key.to_string()))?;
        let partner = nodes.iter().find(|n| n.id != node.id);

        let mut view = ObjectView::new()
            .with("id", node.id.to_string())
            .with("name", node.name.as_str())
            .with("WWNN", node.wwnn.as_str())
            .with("status", "online")
            .with("IO_group_id", "0")
            .with("IO_group_name", "io_grp0")
            .with(
                "partner_node_id",
                partner.map(|p| p.id.to_string()).unwrap_or_default(),
            )
            .with(
                "partner_node_name",
                partner.map(|p| p.name.clone()).unwrap_or_default(),
            )
            .with("config_node", yes_no(node.id == nodes[0].id))
            .with("iscsi_name", self.node_iscsi_name(req, node))
            .with("panel_name", node.panel_name.as_str());
        if !req.fault_is(Fault::NoWwpn) {
            for wwpn in &node.wwpns {
                view.push("port_id", wwpn.as_str());
                view.push("port_status", "active");
                view.push("port_speed", "8Gb");
            }
        }
        view.push(
            "site_id",
            node.site_id.map(|s| s.to_string()).unwrap_or_default(),
        );
        Ok(view.render(&req.opts))
    }

    pub(crate) fn lsportfc(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let mut table = Table::new(&[
            "id",
            "fc_io_port_id",
            "port_id",
            "type",
            "port_speed",
            "node_id",
            "node_name",
            "WWPN",
            "nportid",
            "status",
            "attachment",
        ]);
        let mut row_id = 0;
        for node in &self.config.nodes {
            for (port, wwpn) in node.wwpns.iter().enumerate() {
                table.push([
                    row_id.to_string(),
                    (port + 1).to_string(),
                    (port + 1).to_string(),
                    "fc".to_string(),
                    "8Gb".to_string(),
                    node.id.to_string(),
                    node.name.clone(),
                    wwpn.clone(),
                    format!("0{}0000", port + 1),
                    "active".to_string(),
                    "switch".to_string(),
                ]);
                row_id += 1;
            }
        }
        shape_table(req, &mut table, 2);
        filter_table(req, &mut table, &["node_id", "status"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lstargetportfc(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let mut table = Table::new(&[
            "id",
            "WWPN",
            "WWNN",
            "port_id",
            "owning_node_id",
            "current_node_id",
            "nportid",
            "host_io_permitted",
            "virtualized",
            "protocol",
        ]);
        let mut row_id = 0;
        for node in &self.config.nodes {
            for (port, wwpn) in node.wwpns.iter().enumerate() {
                table.push([
                    row_id.to_string(),
                    wwpn.clone(),
                    node.wwnn.clone(),
                    (port + 1).to_string(),
                    node.id.to_string(),
                    node.id.to_string(),
                    format!("0{}0000", port + 1),
                    "yes".to_string(),
                    "no".to_string(),
                    "scsi".to_string(),
                ]);
                row_id += 1;
            }
        }
        shape_table(req, &mut table, 2);
        filter_table(
            req,
            &mut table,
            &["owning_node_id", "host_io_permitted", "virtualized"],
        )?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsportip(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let mut table = Table::new(&[
            "id",
            "node_id",
            "node_name",
            "IP_address",
            "mask",
            "gateway",
            "IP_address_6",
            "prefix_6",
            "gateway_6",
            "MAC",
            "duplex",
            "state",
            "speed",
            "failover",
            "link_state",
        ]);
        for node in &self.config.nodes {
            for (port, ip) in node.ipv4.iter().enumerate() {
                let mac = format!("01:23:45:67:89:{:02x}", node.id * 16 + port as u32);
                for failover in [false, true] {
                    let (ip, mask, gateway, state) = if failover {
                        ("", "", "", "unconfigured")
                    } else {
                        (ip.as_str(), "255.255.255.0", "1.234.56.1", "configured")
                    };
                    table.push([
                        (port + 1).to_string(),
                        node.id.to_string(),
                        node.name.clone(),
                        ip.to_string(),
                        mask.to_string(),
                        gateway.to_string(),
                        String::new(),
                        String::new(),
                        String::new(),
                        mac.clone(),
                        "Full".to_string(),
                        state.to_string(),
                        "1Gb/s".to_string(),
                        yes_no(failover).to_string(),
                        "active".to_string(),
                    ]);
                }
            }
        }
        shape_table(req, &mut table, 2);
        filter_table(req, &mut table, &["node_id", "state", "failover"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsip(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoInfo) {
            return Ok(String::new());
        }
        let mut table = Table::new(&[
            "id",
            "node_id",
            "node_name",
            "port_id",
            "portset_id",
            "portset_name",
            "IP_address",
            "prefix",
            "vlan",
            "gateway",
            "owner_id",
            "owner_name",
        ]);
        let mut row_id = 0;
        for node in &self.config.nodes {
            for (port, ip) in node.ipv4.iter().enumerate() {
                table.push([
                    row_id.to_string(),
                    node.id.to_string(),
                    node.name.clone(),
                    (port + 1).to_string(),
                    "0".to_string(),
                    "portset0".to_string(),
                    ip.clone(),
                    "24".to_string(),
                    String::new(),
                    "1.234.56.1".to_string(),
                    String::new(),
                    String::new(),
                ]);
                row_id += 1;
            }
        }
        shape_table(req, &mut table, 2);
        filter_table(req, &mut table, &["node_id", "portset_name"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lsfabric(&mut self, req: &Request) -> HandlerResult {
        if req.fault_is(Fault::NoHosts) {
            return Ok(String::new());
        }
        let host_filter = req.flag("host").map(unquote);
        let wwpn_filter = req.flag("wwpn").map(unquote);

        let mut table = Table::new(&[
            "remote_wwpn",
            "remote_nportid",
            "id",
            "node_name",
            "local_wwpn",
            "local_port",
            "local_nportid",
            "state",
            "name",
            "cluster_name",
            "type",
        ]);
        for host in self.hosts.values() {
            if host_filter.is_some_and(|name| name != host.name) {
                continue;
            }
            for wwpn in &host.wwpns {
                if wwpn_filter.is_some_and(|w| !w.eq_ignore_ascii_case(wwpn)) {
                    continue;
                }
                for node in &self.config.nodes {
                    let Some(local) = node.wwpns.first() else {
                        continue;
                    };
                    table.push([
                        wwpn.clone(),
                        "010000".to_string(),
                        node.id.to_string(),
                        node.name.clone(),
                        local.clone(),
                        "1".to_string(),
                        "020000".to_string(),
                        "active".to_string(),
                        host.name.clone(),
                        String::new(),
                        "host".to_string(),
                    ]);
                }
            }
        }
        shape_table(req, &mut table, 0);
        Ok(table.render(&req.opts))
    }
}

#[cfg(test)]
mod tests {
    use crate::simulator::Simulator;

    fn stdout(sim: &mut Simulator, tokens: &[&str]) -> String {
        sim.execute(tokens, true).unwrap().stdout
    }

    #[test]
    fn test_lsnodecanister_shape() {
        let mut sim = Simulator::default();
        let out = stdout(&mut sim, &["svcinfo", "lsnode", "-delim", "!"]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split('!').count(), 17);
        assert!(lines[1].starts_with("1!node1!!123456789ABCDEF0!online"));
    }

    #[test]
    fn test_lsnode_detail_and_wwpn_fault() {
        let mut sim = Simulator::default();
        let out = stdout(&mut sim, &["svcinfo", "lsnode", "-delim", "!", "1"]);
        assert!(out.contains("port_id!5005076802112ADE"));
        assert!(out.contains("partner_node_name!node2"));

        sim.error_injection("lsnode", "no_wwpn").unwrap();
        let out = stdout(&mut sim, &["svcinfo", "lsnode", "-delim", "!", "1"]);
        assert!(!out.contains("port_id"));
    }

    #[test]
    fn test_lsmdiskgrp_bytes_and_object() {
        let mut sim = Simulator::default();
        let out = stdout(&mut sim, &["lsmdiskgrp", "-bytes", "-delim", "!", "\"hyperswap1\""]);
        assert!(out.contains("name!hyperswap1"));
        assert!(out.contains("site_id!1"));
        assert!(out.contains("capacity!3573412790272"));

        let out = stdout(&mut sim, &["lsmdiskgrp", "-nohdr"]);
        assert_eq!(out.lines().count(), sim.config().pools.len());
        assert!(sim.execute(&["lsmdiskgrp", "ghost"], true).is_err());
    }

    #[test]
    fn test_license_fault() {
        let mut sim = Simulator::default();
        assert!(stdout(&mut sim, &["lslicense"]).contains("license_compression_enclosures 1"));
        sim.error_injection("lslicense", "no_compression").unwrap();
        assert!(stdout(&mut sim, &["lslicense"]).contains("license_compression_enclosures 0"));
    }

    #[test]
    fn test_port_filters() {
        let mut sim = Simulator::default();
        let out = stdout(
            &mut sim,
            &["lsportfc", "-nohdr", "-filtervalue", "node_id=2"],
        );
        assert_eq!(out.lines().count(), 4);
        assert!(out.lines().all(|l| l.contains("node2")));

        let out = stdout(
            &mut sim,
            &["lsportip", "-nohdr", "-filtervalue", "state=configured"],
        );
        assert_eq!(out.lines().count(), 4);
    }

    #[test]
    fn test_lsiogrp_includes_recovery_group() {
        let mut sim = Simulator::default();
        let out = stdout(&mut sim, &["lsiogrp", "-nohdr"]);
        assert_eq!(out.lines().count(), 5);
        assert!(out.lines().last().unwrap().contains("recovery_io_grp"));
    }
}

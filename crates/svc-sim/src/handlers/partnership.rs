//! System partnerships for remote copy.

use common::unquote;
use svc_cli::Table;
use tracing::info;

use super::{filter_table, yes_no, HandlerResult, Request};
use crate::error::{CliError, ErrorCode};
use crate::model::Partnership;
use crate::simulator::Simulator;

impl Simulator {
    /// A partnership by partner name, partner system id or numeric id.
    fn partnership_id_or(&self, key: &str) -> Result<u32, CliError> {
        let key = unquote(key);
        self.partnerships
            .values()
            .find(|p| p.system_id == key)
            .map(|p| p.id)
            .or_else(|| self.partnerships.resolve_id(key))
            .ok_or_else(|| CliError::with_detail(ErrorCode::DoesNotExist, format!("partnership {}", key)))
    }

    fn create_partnership(&mut self, transport: &str, req: &Request) -> HandlerResult {
        let bandwidth = req
            .parse::<u32>("linkbandwidthmbits")?
            .ok_or(ErrorCode::MissingParameters)?;
        let rate = req
            .parse::<u32>("backgroundcopyrate")?
            .ok_or(ErrorCode::MissingParameters)?;
        let partner = self.config.aux_system.clone();
        if self.partnerships.contains_name(&partner.name) {
            return Err(CliError::with_detail(ErrorCode::AlreadyExists, partner.name).into());
        }

        let id = self.partnerships.next_id();
        self.partnerships.insert(Partnership {
            id,
            system_id: partner.id,
            name: partner.name.clone(),
            location: "remote".to_string(),
            state: "fully_configured_stopped".to_string(),
            transport: transport.to_string(),
            cluster_ip: req.flag("clusterip").map(|ip| unquote(ip).to_string()).unwrap_or_default(),
            link_bandwidth_mbits: bandwidth,
            background_copy_rate: rate,
        });
        info!(partner = %partner.name, transport, "created partnership");
        Ok(String::new())
    }

    pub(crate) fn lspartnershipcandidate(&mut self, req: &Request) -> HandlerResult {
        let aux = &self.config.aux_system;
        let mut table = Table::new(&["id", "configured", "name"]);
        table.push([
            aux.id.clone(),
            yes_no(self.partnerships.contains_name(&aux.name)).to_string(),
            aux.name.clone(),
        ]);
        Ok(table.render(&req.opts))
    }

    pub(crate) fn lspartnership(&mut self, req: &Request) -> HandlerResult {
        let local = &self.config.local_system;
        let mut table = Table::new(&[
            "id",
            "name",
            "location",
            "partnership",
            "type",
            "cluster_ip",
            "event_log_sequence",
        ]);
        table.push([
            local.id.as_str(),
            local.name.as_str(),
            "local",
            "",
            "",
            "",
            "",
        ]);
        for partner in self.partnerships.values() {
            table.push([
                partner.system_id.as_str(),
                partner.name.as_str(),
                partner.location.as_str(),
                partner.state.as_str(),
                partner.transport.as_str(),
                partner.cluster_ip.as_str(),
                "",
            ]);
        }
        filter_table(req, &mut table, &["name", "id", "location"])?;
        Ok(table.render(&req.opts))
    }

    pub(crate) fn mkippartnership(&mut self, req: &Request) -> HandlerResult {
        req.require("clusterip")?;
        req.require("linkbandwidthmbits")?;
        req.require("backgroundcopyrate")?;
        self.create_partnership("ipv4", req)
    }

    pub(crate) fn mkfcpartnership(&mut self, req: &Request) -> HandlerResult {
        let key = unquote(req.require_obj()?);
        let aux = &self.config.aux_system;
        if aux.id != key && aux.name != key {
            return Err(CliError::with_detail(ErrorCode::DoesNotExist, format!("system {}", key)).into());
        }
        req.require("linkbandwidthmbits")?;
        req.require("backgroundcopyrate")?;
        self.create_partnership("fc", req)
    }

    pub(crate) fn chpartnership(&mut self, req: &Request) -> HandlerResult {
        let id = self.partnership_id_or(req.require_obj()?)?;
        let state = if req.has("start") {
            "fully_configured"
        } else if req.has("stop") {
            "fully_configured_stopped"
        } else {
            return Err(ErrorCode::MissingParameters.into());
        };
        if let Some(partner) = self.partnerships.get_mut(id) {
            partner.state = state.to_string();
        }
        Ok(String::new())
    }

    pub(crate) fn rmpartnership(&mut self, req: &Request) -> HandlerResult {
        let id = self.partnership_id_or(req.require_obj()?)?;
        if let Some(partner) = self.partnerships.remove(id) {
            info!(partner = %partner.name, "removed partnership");
        }
        Ok(String::new())
    }
}

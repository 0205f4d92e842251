//! ARP and IPv6 neighbour-advertisement anti-spoofing.
//!
//! Protocol traffic from a protected port is diverted from the classifier to
//! [`tables::ARP_SPOOF_TABLE`], where only the port's own addresses are
//! allowed onward; the table-miss rule there drops the rest.

use super::IntegrationBridge;
use crate::error::{AgentError, AgentResult};
use crate::tables::{self, priority};
use ovs_bridge::{Bridge, FlowFilter, FlowMatch};
use ovs_types::proto::{ether_types, icmpv6, in_proto};
use ovs_types::{parse_ipv4_host, parse_ipv6_host, PortNumber};

fn arp_divert_match(port: PortNumber) -> FlowMatch {
    FlowMatch::new()
        .eth_type(ether_types::ETH_TYPE_ARP)
        .in_port(port)
}

fn neighbor_advert_divert_match(port: PortNumber) -> FlowMatch {
    FlowMatch::new()
        .eth_type(ether_types::ETH_TYPE_IPV6)
        .icmpv6_type(icmpv6::ND_NEIGHBOR_ADVERT)
        .ip_proto(in_proto::IPPROTO_ICMPV6)
        .in_port(port)
}

fn address_error(address: &str, err: ovs_types::ParseError) -> AgentError {
    AgentError::invalid_address(address, err.to_string())
}

impl<B: Bridge> IntegrationBridge<B> {
    /// Allows ARP from `port` only when the sender address is one of
    /// `ip_addresses`.
    pub fn install_arp_spoofing_protection<S: AsRef<str>>(
        &mut self,
        port: PortNumber,
        ip_addresses: &[S],
    ) -> AgentResult<()> {
        let addresses = ip_addresses
            .iter()
            .map(|addr| parse_ipv4_host(addr.as_ref()).map_err(|e| address_error(addr.as_ref(), e)))
            .collect::<AgentResult<Vec<_>>>()?;

        for spa in addresses {
            let allow = self
                .flow(
                    tables::ARP_SPOOF_TABLE,
                    priority::ANTI_SPOOF_ALLOW,
                    arp_divert_match(port).arp_spa(spa),
                )
                .goto_table(tables::MAC_SPOOF_TABLE);
            self.install(allow)?;
        }

        let divert = self
            .flow(
                tables::LOCAL_SWITCHING,
                priority::ANTI_SPOOF_DIVERT,
                arp_divert_match(port),
            )
            .goto_table(tables::ARP_SPOOF_TABLE);
        self.install(divert)
    }

    /// Allows neighbour advertisements from `port` only for targets in
    /// `ip_addresses`.
    pub fn install_icmpv6_na_spoofing_protection<S: AsRef<str>>(
        &mut self,
        port: PortNumber,
        ip_addresses: &[S],
    ) -> AgentResult<()> {
        let targets = ip_addresses
            .iter()
            .map(|addr| parse_ipv6_host(addr.as_ref()).map_err(|e| address_error(addr.as_ref(), e)))
            .collect::<AgentResult<Vec<_>>>()?;

        for target in targets {
            let allow = self
                .flow(
                    tables::ARP_SPOOF_TABLE,
                    priority::ANTI_SPOOF_ALLOW,
                    neighbor_advert_divert_match(port).ipv6_nd_target(target),
                )
                .goto_table(tables::TRANSIENT_TABLE);
            self.install(allow)?;
        }

        let divert = self
            .flow(
                tables::LOCAL_SWITCHING,
                priority::ANTI_SPOOF_DIVERT,
                neighbor_advert_divert_match(port),
            )
            .goto_table(tables::ARP_SPOOF_TABLE);
        self.install(divert)
    }

    /// Removes both divert rules and every allow rule of `port`.
    pub fn delete_arp_spoofing_protection(&mut self, port: PortNumber) -> AgentResult<()> {
        self.uninstall(FlowFilter::matching(arp_divert_match(port)).in_table(tables::LOCAL_SWITCHING))?;
        self.uninstall(
            FlowFilter::matching(neighbor_advert_divert_match(port))
                .in_table(tables::LOCAL_SWITCHING),
        )?;
        self.uninstall(
            FlowFilter::matching(FlowMatch::new().in_port(port)).in_table(tables::ARP_SPOOF_TABLE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_agent_test::{FlowVerifier, RecordingBridge};
    use pretty_assertions::assert_eq;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const PORT: PortNumber = PortNumber::new(8888);

    #[test]
    fn test_arp_protection_rules() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.install_arp_spoofing_protection(PORT, &["192.0.2.1", "192.0.2.2/32"])
            .unwrap();

        let flows = recorder.flows();
        let verifier = FlowVerifier::new(&flows);
        for spa in [Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2)] {
            let allow = verifier
                .assert_flow(
                    tables::ARP_SPOOF_TABLE,
                    2,
                    &FlowMatch::new().eth_type(0x0806).arp_spa(spa).in_port(PORT),
                )
                .unwrap();
            assert_eq!(allow.goto_target(), Some(tables::MAC_SPOOF_TABLE));
        }
        let divert = verifier
            .assert_flow(
                tables::LOCAL_SWITCHING,
                10,
                &FlowMatch::new().eth_type(0x0806).in_port(PORT),
            )
            .unwrap();
        assert_eq!(divert.goto_target(), Some(tables::ARP_SPOOF_TABLE));
        assert_eq!(flows.len(), 3);
    }

    #[test]
    fn test_na_protection_rules() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.install_icmpv6_na_spoofing_protection(PORT, &["2001:db8::1", "fdf8:f53b:82e4::1/128"])
            .unwrap();

        let flows = recorder.flows();
        let verifier = FlowVerifier::new(&flows);
        let target: Ipv6Addr = "fdf8:f53b:82e4::1".parse().unwrap();
        let allow = verifier
            .assert_flow(
                tables::ARP_SPOOF_TABLE,
                2,
                &FlowMatch::new()
                    .eth_type(0x86dd)
                    .icmpv6_type(136)
                    .ip_proto(58)
                    .ipv6_nd_target(target)
                    .in_port(PORT),
            )
            .unwrap();
        assert_eq!(allow.goto_target(), Some(tables::TRANSIENT_TABLE));
        verifier
            .assert_flow(
                tables::LOCAL_SWITCHING,
                10,
                &FlowMatch::new()
                    .eth_type(0x86dd)
                    .icmpv6_type(136)
                    .ip_proto(58)
                    .in_port(PORT),
            )
            .unwrap();
        assert_eq!(flows.len(), 3);
    }

    #[test]
    fn test_invalid_address_installs_nothing() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        let result = br.install_arp_spoofing_protection(PORT, &["192.0.2.1", "192.0.2.0/24"]);

        assert!(matches!(result, Err(AgentError::InvalidAddress { .. })));
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_delete_removes_all_port_protection() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());
        let other = PortNumber::new(7);

        br.install_arp_spoofing_protection(PORT, &["192.0.2.1"]).unwrap();
        br.install_icmpv6_na_spoofing_protection(PORT, &["2001:db8::1"]).unwrap();
        br.install_arp_spoofing_protection(other, &["192.0.2.9"]).unwrap();

        br.delete_arp_spoofing_protection(PORT).unwrap();

        let flows = recorder.flows();
        let verifier = FlowVerifier::new(&flows);
        verifier
            .assert_no_flows_for_port(tables::LOCAL_SWITCHING, PORT)
            .unwrap();
        verifier
            .assert_no_flows_for_port(tables::ARP_SPOOF_TABLE, PORT)
            .unwrap();
        assert_eq!(flows.len(), 2);
    }
}

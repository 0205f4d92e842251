//! Flow-table primitives: match predicates, actions, instructions and rules.
//!
//! A [`Flow`] is keyed on the switch by `(table, priority, match)`. The same
//! [`FlowMatch`] value is used both to install a rule and, through a
//! [`FlowFilter`], to delete it again.

use ovs_types::{MacAddress, PortNumber, VlanVid};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Flow table identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u8);

impl TableId {
    pub const fn new(id: u8) -> Self {
        TableId(id)
    }

    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque tag the agent stamps on every rule it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(u64);

impl Cookie {
    pub const fn new(value: u64) -> Self {
        Cookie(value)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Rule priority, higher wins.
pub type Priority = u16;

/// Match predicate. Unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlowMatch {
    pub in_port: Option<PortNumber>,
    pub eth_src: Option<MacAddress>,
    pub eth_dst: Option<MacAddress>,
    pub vlan_vid: Option<VlanVid>,
    pub eth_type: Option<u16>,
    pub ip_proto: Option<u8>,
    pub ipv4_dst: Option<Ipv4Addr>,
    pub ipv6_dst: Option<Ipv6Addr>,
    pub udp_src: Option<u16>,
    pub udp_dst: Option<u16>,
    pub icmpv6_type: Option<u8>,
    pub ipv6_nd_target: Option<Ipv6Addr>,
    pub arp_spa: Option<Ipv4Addr>,
    pub reg2: Option<u32>,
}

macro_rules! match_setters {
    ($($field:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $field(mut self, value: $ty) -> Self {
                self.$field = Some(value);
                self
            }
        )*
    };
}

// Keep in the same order as the struct; drives both `covers` and `Display`.
macro_rules! for_each_match_field {
    ($mac:ident) => {
        $mac!(
            in_port,
            eth_src,
            eth_dst,
            vlan_vid,
            eth_type,
            ip_proto,
            ipv4_dst,
            ipv6_dst,
            udp_src,
            udp_dst,
            icmpv6_type,
            ipv6_nd_target,
            arp_spa,
            reg2
        )
    };
}

impl FlowMatch {
    /// The catch-all predicate.
    pub fn new() -> Self {
        Self::default()
    }

    match_setters!(
        in_port: PortNumber,
        eth_src: MacAddress,
        eth_dst: MacAddress,
        vlan_vid: VlanVid,
        eth_type: u16,
        ip_proto: u8,
        ipv4_dst: Ipv4Addr,
        ipv6_dst: Ipv6Addr,
        udp_src: u16,
        udp_dst: u16,
        icmpv6_type: u8,
        ipv6_nd_target: Ipv6Addr,
        arp_spa: Ipv4Addr,
        reg2: u32,
    );

    /// True when no field is constrained.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Non-strict containment: every field constrained here carries the same
    /// value in `other`. A rule whose match is `other` is selected by a
    /// non-strict delete with this predicate.
    pub fn covers(&self, other: &FlowMatch) -> bool {
        macro_rules! check {
            ($($field:ident),*) => {
                true $(&& (self.$field.is_none() || self.$field == other.$field))*
            };
        }
        for_each_match_field!(check)
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        macro_rules! render {
            ($($field:ident),*) => {
                $(
                    if let Some(value) = &self.$field {
                        parts.push(format!(concat!(stringify!($field), "={}"), value));
                    }
                )*
            };
        }
        for_each_match_field!(render);
        if parts.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&parts.join(","))
        }
    }
}

/// Field written by a set-field action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetField {
    VlanVid(VlanVid),
    EthSrc(MacAddress),
    IpDscp(u8),
    Reg2(u32),
}

impl fmt::Display for SetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetField::VlanVid(vid) => write!(f, "vlan_vid={vid}"),
            SetField::EthSrc(mac) => write!(f, "eth_src={mac}"),
            SetField::IpDscp(dscp) => write!(f, "ip_dscp={dscp}"),
            SetField::Reg2(value) => write!(f, "reg2={value}"),
        }
    }
}

/// Destination of an output action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    Port(PortNumber),
    /// Hand the packet to the switch's MAC-learning pipeline.
    Normal,
}

/// Packet action inside an apply-actions instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    PushVlan,
    PopVlan,
    SetField(SetField),
    Output(OutputPort),
    /// Re-run the pipeline from table 0 as if received on `in_port`.
    Resubmit { in_port: PortNumber },
}

impl Action {
    pub fn set_field(field: SetField) -> Self {
        Action::SetField(field)
    }

    pub fn output(port: PortNumber) -> Self {
        Action::Output(OutputPort::Port(port))
    }

    pub fn normal() -> Self {
        Action::Output(OutputPort::Normal)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PushVlan => f.write_str("push_vlan:0x8100"),
            Action::PopVlan => f.write_str("pop_vlan"),
            Action::SetField(field) => write!(f, "set_field:{field}"),
            Action::Output(OutputPort::Port(port)) => write!(f, "output:{port}"),
            Action::Output(OutputPort::Normal) => f.write_str("NORMAL"),
            Action::Resubmit { in_port } => write!(f, "resubmit({in_port})"),
        }
    }
}

/// Rule instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    ApplyActions(Vec<Action>),
    GotoTable(TableId),
}

/// A flow rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flow {
    pub cookie: Cookie,
    pub table: TableId,
    pub priority: Priority,
    pub match_fields: FlowMatch,
    pub instructions: Vec<Instruction>,
}

impl Flow {
    /// A rule with no instructions, i.e. a drop.
    pub fn new(cookie: Cookie, table: TableId, priority: Priority, match_fields: FlowMatch) -> Self {
        Self {
            cookie,
            table,
            priority,
            match_fields,
            instructions: Vec::new(),
        }
    }

    pub fn apply_actions(mut self, actions: Vec<Action>) -> Self {
        self.instructions.push(Instruction::ApplyActions(actions));
        self
    }

    pub fn goto_table(mut self, table: TableId) -> Self {
        self.instructions.push(Instruction::GotoTable(table));
        self
    }

    pub fn is_drop(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn goto_target(&self) -> Option<TableId> {
        self.instructions.iter().find_map(|inst| match inst {
            Instruction::GotoTable(table) => Some(*table),
            Instruction::ApplyActions(_) => None,
        })
    }

    /// Actions of the apply-actions instruction, empty if there is none.
    pub fn actions(&self) -> &[Action] {
        self.instructions
            .iter()
            .find_map(|inst| match inst {
                Instruction::ApplyActions(actions) => Some(actions.as_slice()),
                Instruction::GotoTable(_) => None,
            })
            .unwrap_or(&[])
    }

    /// The `(table, priority, match)` identity of this rule on the switch.
    pub fn key(&self) -> (TableId, Priority, &FlowMatch) {
        (self.table, self.priority, &self.match_fields)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cookie={}, table={}, priority={}, {} actions=",
            self.cookie, self.table, self.priority, self.match_fields
        )?;
        if self.is_drop() {
            return f.write_str("drop");
        }
        let mut rendered = Vec::new();
        for inst in &self.instructions {
            match inst {
                Instruction::ApplyActions(actions) => {
                    rendered.extend(actions.iter().map(ToString::to_string))
                }
                Instruction::GotoTable(table) => rendered.push(format!("goto_table:{table}")),
            }
        }
        f.write_str(&rendered.join(","))
    }
}

/// Selector for deleting rules.
///
/// Strict filters select the single rule with exactly this table, priority
/// and match. Non-strict filters select every rule whose match is covered by
/// [`FlowFilter::match_fields`], optionally narrowed by table and cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowFilter {
    pub table: Option<TableId>,
    pub priority: Option<Priority>,
    pub cookie: Option<Cookie>,
    pub match_fields: FlowMatch,
    pub strict: bool,
}

impl FlowFilter {
    /// Non-strict filter over every table.
    pub fn matching(match_fields: FlowMatch) -> Self {
        Self {
            match_fields,
            ..Self::default()
        }
    }

    /// Strict filter on `(table, priority, match)`.
    pub fn strict(table: TableId, priority: Priority, match_fields: FlowMatch) -> Self {
        Self {
            table: Some(table),
            priority: Some(priority),
            cookie: None,
            match_fields,
            strict: true,
        }
    }

    /// Every rule carrying `cookie`.
    pub fn by_cookie(cookie: Cookie) -> Self {
        Self {
            cookie: Some(cookie),
            ..Self::default()
        }
    }

    pub fn in_table(mut self, table: TableId) -> Self {
        self.table = Some(table);
        self
    }

    /// Whether a delete with this filter removes `flow`.
    pub fn selects(&self, flow: &Flow) -> bool {
        if self.table.is_some_and(|table| table != flow.table) {
            return false;
        }
        if self.cookie.is_some_and(|cookie| cookie != flow.cookie) {
            return false;
        }
        if self.strict {
            self.priority == Some(flow.priority) && self.match_fields == flow.match_fields
        } else {
            self.match_fields.covers(&flow.match_fields)
        }
    }
}

impl fmt::Display for FlowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.strict { "strict " } else { "" })?;
        if let Some(table) = self.table {
            write!(f, "table={table}, ")?;
        }
        if let Some(priority) = self.priority {
            write!(f, "priority={priority}, ")?;
        }
        if let Some(cookie) = self.cookie {
            write!(f, "cookie={cookie}, ")?;
        }
        write!(f, "{}", self.match_fields)
    }
}

//! Cloud-resource tag vocabulary and the ports-tag codec.
//!
//! Tags are the wire protocol between control-plane hosts (§6): every field
//! that a peer needs to reconstruct a server record from a bare cloud VM is
//! round-tripped through one of these keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GscpError, Result};

pub const TAG_ID: &str = "id";
pub const TAG_GAME: &str = "game";
pub const TAG_NAME: &str = "name";
pub const TAG_SG_ID: &str = "sg-id";
pub const TAG_PORTS: &str = "ports";
pub const TAG_RCON_PASSWORD: &str = "rcon-password";
pub const TAG_CONTAINER_NAME: &str = "container-name";
pub const TAG_LAUNCH_TIME: &str = "launch-time";
pub const TAG_EIP_ALLOC_ID: &str = "eip-alloc-id";
pub const TAG_CONTAINER_STOPPED: &str = "container-stopped";
pub const TAG_SNAPSHOT_ID: &str = "snapshot-id";

/// Prefixes every tag key with the configured tool namespace, e.g.
/// `tag_key("gscp", TAG_ID) == "gscp:id"`.
pub fn tag_key(tool_name: &str, key: &str) -> String {
    format!("{}:{}", tool_name, key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = GscpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(GscpError::integrity(format!(
                "unrecognized port protocol '{other}'"
            ))),
        }
    }
}

/// A single game port, e.g. `27015/udp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortSpec {
    pub port: u16,
    pub protocol: Protocol,
}

impl PortSpec {
    pub fn new(port: u16, protocol: Protocol) -> Self {
        Self { port, protocol }
    }

    /// The `host:container/proto` triple passed to the container daemon's
    /// `-p` publish flag.
    pub fn docker_publish(&self) -> String {
        format!("{0}:{0}/{1}", self.port, self.protocol)
    }

    /// A security-group ingress rule opening this port to the world.
    pub fn sg_rule(&self) -> SgIngressRule {
        SgIngressRule {
            from_port: self.port,
            to_port: self.port,
            protocol: self.protocol,
            cidr: "0.0.0.0/0".to_string(),
        }
    }

    fn tag_key(&self) -> String {
        format!("{}/{}", self.port, self.protocol)
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.protocol)
    }
}

/// A security-group ingress rule, expressed generically enough for the
/// cloud gateway to translate into provider-specific API calls.
#[derive(Debug, Clone)]
pub struct SgIngressRule {
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: Protocol,
    pub cidr: String,
}

/// Serialize a port set into the compact `<tool>:ports` tag value:
/// `"27015/udp,34197/udp"`, keys sorted for determinism.
pub fn serialize_ports(ports: &[PortSpec]) -> String {
    let mut sorted = ports.to_vec();
    sorted.sort();
    sorted
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse the `<tool>:ports` tag value back into a port map keyed by
/// `"<port>/<proto>"`, matching the shape the record stores it in.
pub fn parse_ports(tag_value: &str) -> Result<BTreeMap<String, u16>> {
    let mut map = BTreeMap::new();
    if tag_value.trim().is_empty() {
        return Ok(map);
    }
    for entry in tag_value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (port_str, proto_str) = entry.split_once('/').ok_or_else(|| {
            GscpError::integrity(format!("malformed ports tag entry '{entry}'"))
        })?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| GscpError::integrity(format!("malformed port number in '{entry}'")))?;
        let _proto: Protocol = proto_str.parse()?;
        map.insert(format!("{port_str}/{proto_str}"), port);
    }
    Ok(map)
}

/// Build the port map directly from a game's declared ports, for use at
/// launch time before any tag exists yet.
pub fn ports_to_map(ports: &[PortSpec]) -> BTreeMap<String, u16> {
    ports
        .iter()
        .map(|p| (p.tag_key(), p.port))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_tag_round_trips() {
        let ports = vec![
            PortSpec::new(34197, Protocol::Udp),
            PortSpec::new(27015, Protocol::Tcp),
        ];
        let tag = serialize_ports(&ports);
        assert_eq!(tag, "27015/tcp,34197/udp");

        let parsed = parse_ports(&tag).unwrap();
        assert_eq!(parsed.get("27015/tcp"), Some(&27015));
        assert_eq!(parsed.get("34197/udp"), Some(&34197));
    }

    #[test]
    fn empty_ports_tag_parses_to_empty_map() {
        assert!(parse_ports("").unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_entry() {
        assert!(parse_ports("not-a-port").is_err());
    }

    #[test]
    fn docker_publish_format() {
        let p = PortSpec::new(27015, Protocol::Udp);
        assert_eq!(p.docker_publish(), "27015:27015/udp");
    }

    #[test]
    fn tag_key_prefixes_with_tool_name() {
        assert_eq!(tag_key("gscp", TAG_ID), "gscp:id");
    }
}

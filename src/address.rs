// fmctl - CLI for the Cisco Firepower Management Center API
// Copyright (C) 2026 The fmctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! IPv4 host and network values in the canonical form used for comparison.

use crate::error::FmcError;
use crate::model::ObjectKind;
use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressEntry {
    Host(Ipv4Addr),
    /// Always stored with host bits cleared.
    Network(Ipv4Network),
}

impl AddressEntry {
    /// Parses a host (`a.b.c.d`) or a CIDR network (`a.b.c.d/len`).
    ///
    /// Networks are normalized to their network address, so `10.1.0.7/24`
    /// and `10.1.0.0/24` compare equal.
    pub fn parse(raw: &str) -> Result<Self, FmcError> {
        let raw = raw.trim();
        if let Some((addr, prefix)) = raw.split_once('/') {
            let addr: Ipv4Addr = addr.trim().parse().map_err(|e| FmcError::parse(raw, e))?;
            let prefix: u8 = prefix.trim().parse().map_err(|e| FmcError::parse(raw, e))?;
            let parsed = Ipv4Network::new(addr, prefix).map_err(|e| FmcError::parse(raw, e))?;
            let network = Ipv4Network::new(parsed.network(), prefix)
                .map_err(|e| FmcError::parse(raw, e))?;
            Ok(Self::Network(network))
        } else {
            raw.parse::<Ipv4Addr>()
                .map(Self::Host)
                .map_err(|e| FmcError::parse(raw, e))
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Host(_) => ObjectKind::Host,
            Self::Network(_) => ObjectKind::Network,
        }
    }

    /// Name given to objects created for this address.
    pub fn object_name(&self) -> String {
        match self {
            Self::Host(addr) => format!("Host-{addr}"),
            Self::Network(net) => format!(
                "Net-{}-{}",
                net.network().to_string().replace('.', "-"),
                net.prefix()
            ),
        }
    }
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(addr) => write!(f, "{addr}"),
            Self::Network(net) => write!(f, "{}/{}", net.network(), net.prefix()),
        }
    }
}

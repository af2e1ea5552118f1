use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use crate::config::Settings;
use crate::host::HostInfo;
use crate::pki::error::ProvisionError;

/// DNS name the API service is reachable under inside the cluster.
const INTERNAL_API_SERVICE: &str = "api";

/// Offset of the API service virtual IP inside the service subnet.
pub const SERVICE_VIP_INDEX: u32 = 1;

/// The set of subject alternative names a server certificate must cover.
///
/// Sets rather than lists: duplicate inputs collapse, iteration order is
/// deterministic, and IP addresses compare by value so equivalent textual
/// forms of one address are a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanSet {
    pub dns_names: BTreeSet<String>,
    pub ip_addrs: BTreeSet<IpAddr>,
}

impl fmt::Display for SanSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<String> = self.dns_names.iter().cloned().collect();
        entries.extend(self.ip_addrs.iter().map(ToString::to_string));
        write!(f, "{}", entries.join(", "))
    }
}

impl SanSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addrs.is_empty()
    }
}

/// Builds the complete SAN set the API server certificate must be valid for:
/// the configured external DNS names, the local hostname, the fixed internal
/// service aliases, the advertised addresses, and the service virtual IP.
///
/// # Errors
/// Returns [`ProvisionError::InvalidHostname`] if the host name cannot be
/// determined, [`ProvisionError::InvalidIpLiteral`] for an unparseable
/// advertise address, and [`ProvisionError::InvalidCidr`] /
/// [`ProvisionError::AddressAllocation`] for a bad or too-small service
/// subnet.
pub fn assemble(settings: &Settings, host: &dyn HostInfo) -> Result<SanSet, ProvisionError> {
    let hostname = host.hostname().ok_or(ProvisionError::InvalidHostname)?;

    let mut sans = SanSet::default();
    for name in &settings.api.external_dns_names {
        sans.dns_names.insert(name.clone());
    }
    sans.dns_names.insert(hostname);
    for alias in internal_api_aliases(&settings.networking.dns_domain) {
        sans.dns_names.insert(alias);
    }

    for literal in &settings.api.advertise_addresses {
        let ip: IpAddr = literal
            .parse()
            .map_err(|_| ProvisionError::InvalidIpLiteral {
                literal: literal.clone(),
            })?;
        sans.ip_addrs.insert(ip);
    }

    let subnet: IpNet =
        settings
            .networking
            .service_subnet
            .parse()
            .map_err(|source| ProvisionError::InvalidCidr {
                cidr: settings.networking.service_subnet.clone(),
                source,
            })?;
    let vip = service_virtual_ip(&subnet, SERVICE_VIP_INDEX).ok_or(
        ProvisionError::AddressAllocation {
            cidr: settings.networking.service_subnet.clone(),
            index: SERVICE_VIP_INDEX,
        },
    )?;
    sans.ip_addrs.insert(vip);

    Ok(sans)
}

/// The fixed DNS aliases in-cluster clients resolve the API service under.
#[must_use]
pub fn internal_api_aliases(dns_domain: &str) -> [String; 4] {
    [
        INTERNAL_API_SERVICE.to_string(),
        format!("{INTERNAL_API_SERVICE}.default"),
        format!("{INTERNAL_API_SERVICE}.default.svc"),
        format!("{INTERNAL_API_SERVICE}.default.svc.{dns_domain}"),
    ]
}

/// Address at `index` past the network base, or `None` if it falls outside
/// the block.
fn service_virtual_ip(subnet: &IpNet, index: u32) -> Option<IpAddr> {
    let candidate = match subnet {
        IpNet::V4(net) => {
            let raw = u32::from(net.network()).checked_add(index)?;
            IpAddr::V4(Ipv4Addr::from(raw))
        }
        IpNet::V6(net) => {
            let raw = u128::from(net.network()).checked_add(u128::from(index))?;
            IpAddr::V6(Ipv6Addr::from(raw))
        }
    };
    subnet.contains(&candidate).then_some(candidate)
}

use std::path::PathBuf;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub networking: NetworkingSettings,
    pub paths: Paths,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiSettings {
    pub external_dns_names: Vec<String>,
    pub advertise_addresses: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkingSettings {
    pub service_subnet: String,
    pub dns_domain: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Paths {
    pub pki: PathBuf,
}

const DEFAULT_SERVICE_SUBNET: &str = "10.96.0.0/12";
const DEFAULT_DNS_DOMAIN: &str = "cluster.local";
const DEFAULT_PKI_DIR: &str = "pki";

impl Settings {
    /// Creates a new `Settings` instance.
    ///
    /// # Errors
    /// Returns error if configuration parsing fails (e.g. file not found, invalid format).
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut s = Config::builder();

        // 1. Set Defaults
        s = s
            .set_default("api.external_dns_names", Vec::<String>::new())?
            .set_default("api.advertise_addresses", Vec::<String>::new())?
            .set_default("networking.service_subnet", DEFAULT_SERVICE_SUBNET)?
            .set_default("networking.dns_domain", DEFAULT_DNS_DOMAIN)?
            .set_default("paths.pki", DEFAULT_PKI_DIR)?;

        // 2. Merge File (optional)
        // If config_path is provided, use it. Otherwise look for "rootplane.toml"
        let path = config_path.unwrap_or_else(|| PathBuf::from("rootplane.toml"));
        s = s.add_source(File::from(path).required(false));

        // 3. Environment Variables
        // e.g. ROOTPLANE_NETWORKING_SERVICE_SUBNET
        s = s.add_source(Environment::with_prefix("ROOTPLANE").separator("_"));

        // 4. Build
        s.build()?.try_deserialize()
    }

    /// Merges CLI arguments into the settings, overriding values if present.
    pub fn merge_with_args(&mut self, args: &crate::ClusterArgs) {
        if let Some(names) = &args.external_dns_names {
            names.clone_into(&mut self.api.external_dns_names);
        }
        if let Some(addresses) = &args.advertise_addresses {
            addresses.clone_into(&mut self.api.advertise_addresses);
        }
        if let Some(subnet) = &args.service_subnet {
            subnet.clone_into(&mut self.networking.service_subnet);
        }
        if let Some(domain) = &args.dns_domain {
            domain.clone_into(&mut self.networking.dns_domain);
        }
        if let Some(pki_dir) = &args.pki_dir {
            pki_dir.clone_into(&mut self.paths.pki);
        }
    }

    /// Validates configuration values for correctness.
    ///
    /// # Errors
    /// Returns error if any setting is empty or obviously malformed.
    pub fn validate(&self) -> Result<()> {
        if self.networking.service_subnet.trim().is_empty() {
            anyhow::bail!("networking.service_subnet must not be empty");
        }
        if self.networking.dns_domain.trim().is_empty() {
            anyhow::bail!("networking.dns_domain must not be empty");
        }
        if self.api.external_dns_names.iter().any(|n| n.trim().is_empty()) {
            anyhow::bail!("api.external_dns_names must not contain empty names");
        }
        if self
            .api
            .advertise_addresses
            .iter()
            .any(|a| a.trim().is_empty())
        {
            anyhow::bail!("api.advertise_addresses must not contain empty addresses");
        }
        Ok(())
    }
}

use std::path::PathBuf;

use clap::Args;

/// Cluster-facing flags shared by the `certs` and `verify` subcommands.
///
/// Every flag overrides the corresponding configuration value when present;
/// see [`crate::config::Settings::merge_with_args`].
#[derive(Args, Debug, Default)]
pub struct ClusterArgs {
    /// Path to configuration file (default: rootplane.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// External DNS name the API server certificate must cover (repeatable)
    #[arg(long = "external-dns-name", value_delimiter = ',')]
    pub external_dns_names: Option<Vec<String>>,

    /// IP address the API server advertises (repeatable)
    #[arg(long = "advertise-address", value_delimiter = ',')]
    pub advertise_addresses: Option<Vec<String>>,

    /// CIDR block the cluster allocates service addresses from
    #[arg(long)]
    pub service_subnet: Option<String>,

    /// Internal cluster DNS domain suffix
    #[arg(long)]
    pub dns_domain: Option<String>,

    /// Directory holding the PKI material
    #[arg(long, env = "ROOTPLANE_PKI_DIR")]
    pub pki_dir: Option<PathBuf>,
}

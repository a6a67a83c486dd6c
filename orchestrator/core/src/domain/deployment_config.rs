// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Deployment Configuration Types
//
// Defines the configuration schema for a studio deployment, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Network, directory and name-resolution parameters
// - Version-control, CI, build-worker and workstation host parameters
// - Operator allow-list and feature toggles (svn, vanilla)
//
// Every tool URL, image family, vendor bucket and instance size lives here
// with a default so that a new release is a config change, not a code change.

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::compute::Tenancy;
use super::network::{plan_subnets, Peer, DEFAULT_VPC_CIDR};

pub const API_VERSION: &str = "gamestudio.dev/v1";
pub const KIND: &str = "StudioDeployment";

/// Environment variable naming the manifest to load
pub const MANIFEST_ENV: &str = "STUDIO_INFRA_CONFIG";
/// Manifest picked up from the working directory
pub const WORKDIR_MANIFEST: &str = "studio-infra.yaml";
/// Manifest picked up from the user's home, relative to it
pub const USER_MANIFEST: &str = ".studio-infra/config.yaml";

/// Top-level Kubernetes-style deployment manifest
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentManifest {
    /// API version (must be "gamestudio.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "StudioDeployment")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: DeploymentSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Deployment specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentSpec {
    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub version_control: VersionControlConfig,

    #[serde(default)]
    pub ci: CiConfig,

    #[serde(default)]
    pub build_worker: BuildWorkerConfig,

    #[serde(default)]
    pub workstation: WorkstationConfig,
}

/// Sources granted access to studio hosts. Entries are not validated here;
/// `studio-infra check` reports malformed ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AccessConfig {
    #[serde(default)]
    pub allow_cidrs: Vec<String>,

    #[serde(default)]
    pub allow_prefix_lists: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkConfig {
    #[serde(default = "default_vpc_cidr")]
    pub vpc_cidr: String,

    #[serde(default = "default_max_azs")]
    pub max_azs: u8,

    /// Private hosted zone for the host records
    #[serde(default = "default_zone_name")]
    pub zone_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DirectoryConfig {
    /// Fully-qualified directory domain (e.g. "corp.gamestudio.aws.internal")
    #[serde(default = "default_directory_name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VersionControlConfig {
    /// Also build the centralized HTTP repository host
    #[serde(default)]
    pub svn: bool,

    /// Skip seeding the depot with sample data
    #[serde(default)]
    pub vanilla: bool,

    #[serde(default = "default_vcs_instance_type")]
    pub perforce_instance_type: String,

    #[serde(default = "default_vcs_instance_type")]
    pub svn_instance_type: String,

    #[serde(default = "default_svn_volume_gib")]
    pub svn_volume_gib: u32,

    #[serde(default = "default_perforce_record")]
    pub perforce_record: String,

    #[serde(default = "default_svn_record")]
    pub svn_record: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CiConfig {
    #[serde(default = "default_ci_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_ci_root_volume_gib")]
    pub root_volume_gib: u32,

    #[serde(default = "default_ci_record")]
    pub record: String,

    /// Tag the coordinator stamps on workers; lifecycle actions are scoped to it
    #[serde(default = "default_worker_tag_key")]
    pub worker_tag_key: String,

    #[serde(default = "default_worker_tag_value")]
    pub worker_tag_value: String,

    #[serde(default = "default_jenkins_repo_url")]
    pub jenkins_repo_url: String,

    #[serde(default = "default_jenkins_key_url")]
    pub jenkins_key_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildWorkerConfig {
    #[serde(default = "default_worker_instance_type")]
    pub instance_type: String,

    /// Windows Server 2019 locale (e.g. "English", "Japanese")
    #[serde(default = "default_windows_locale")]
    pub image_locale: String,

    #[serde(default = "default_windows_volume_gib")]
    pub root_volume_gib: u32,

    #[serde(default = "default_firefox_url")]
    pub firefox_url: String,

    #[serde(default = "default_seven_zip_url")]
    pub seven_zip_url: String,

    /// Hardware placement of launched workers
    #[serde(default = "default_worker_tenancy")]
    pub tenancy: Tenancy,
}

/// Vendor bucket prefix copied onto the workstation desktop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DriverSource {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkstationConfig {
    #[serde(default = "default_workstation_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_windows_locale")]
    pub image_locale: String,

    #[serde(default = "default_windows_volume_gib")]
    pub root_volume_gib: u32,

    #[serde(default = "default_firefox_url")]
    pub firefox_url: String,

    #[serde(default = "default_dcv_server_url")]
    pub dcv_server_url: String,

    /// Regions whose `dcv-license.<region>` bucket the workstation may read
    #[serde(default = "default_dcv_license_regions")]
    pub dcv_license_regions: Vec<String>,

    #[serde(default = "default_driver_sources")]
    pub driver_sources: Vec<DriverSource>,

    /// Region the vendor driver buckets live in
    #[serde(default = "default_driver_region")]
    pub driver_region: String,

    /// Provision the distributed-build toolchain
    #[serde(default)]
    pub incredibuild: bool,

    #[serde(default = "default_incredibuild_url")]
    pub incredibuild_url: String,
}

fn default_vpc_cidr() -> String {
    DEFAULT_VPC_CIDR.to_string()
}

fn default_max_azs() -> u8 {
    2
}

fn default_zone_name() -> String {
    "gamestudio.aws.internal".to_string()
}

fn default_directory_name() -> String {
    "corp.gamestudio.aws.internal".to_string()
}

fn default_vcs_instance_type() -> String {
    "c5.xlarge".to_string()
}

fn default_svn_volume_gib() -> u32 {
    300
}

fn default_perforce_record() -> String {
    "perforce".to_string()
}

fn default_svn_record() -> String {
    "svn".to_string()
}

fn default_ci_instance_type() -> String {
    "m5.xlarge".to_string()
}

fn default_ci_root_volume_gib() -> u32 {
    30
}

fn default_ci_record() -> String {
    "jenkins".to_string()
}

fn default_worker_tag_key() -> String {
    "Purpose".to_string()
}

fn default_worker_tag_value() -> String {
    "BuildWorker".to_string()
}

fn default_jenkins_repo_url() -> String {
    "https://pkg.jenkins.io/redhat-stable/jenkins.repo".to_string()
}

fn default_jenkins_key_url() -> String {
    "https://pkg.jenkins.io/redhat-stable/jenkins.io-2023.key".to_string()
}

fn default_worker_instance_type() -> String {
    "c5.4xlarge".to_string()
}

fn default_worker_tenancy() -> Tenancy {
    Tenancy::Dedicated
}

fn default_windows_locale() -> String {
    "English".to_string()
}

fn default_windows_volume_gib() -> u32 {
    500
}

fn default_firefox_url() -> String {
    "https://download.mozilla.org/?product=firefox-msi-latest-ssl&os=win64&lang=en-US".to_string()
}

fn default_seven_zip_url() -> String {
    "https://www.7-zip.org/a/7z1900-x64.msi".to_string()
}

fn default_workstation_instance_type() -> String {
    "g4dn.xlarge".to_string()
}

fn default_dcv_server_url() -> String {
    "https://d1uj6qtbmh3dt5.cloudfront.net/2021.3/Servers/nice-dcv-server-x64-Release-2021.3-11591.msi".to_string()
}

fn default_dcv_license_regions() -> Vec<String> {
    [
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-southeast-1",
        "ap-southeast-2",
        "eu-central-1",
        "eu-west-1",
        "eu-west-2",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

fn default_driver_sources() -> Vec<DriverSource> {
    vec![
        DriverSource {
            bucket: "ec2-windows-nvidia-drivers".to_string(),
            prefix: "g4/latest".to_string(),
        },
        DriverSource {
            bucket: "ec2-windows-nvidia-drivers".to_string(),
            prefix: "latest".to_string(),
        },
        DriverSource {
            bucket: "nvidia-gaming".to_string(),
            prefix: "windows/latest".to_string(),
        },
    ]
}

fn default_driver_region() -> String {
    "us-east-1".to_string()
}

fn default_incredibuild_url() -> String {
    "https://incredibuild-installer.s3.amazonaws.com/IBSetupConsole.exe".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_cidr: default_vpc_cidr(),
            max_azs: default_max_azs(),
            zone_name: default_zone_name(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            name: default_directory_name(),
        }
    }
}

impl Default for VersionControlConfig {
    fn default() -> Self {
        Self {
            svn: false,
            vanilla: false,
            perforce_instance_type: default_vcs_instance_type(),
            svn_instance_type: default_vcs_instance_type(),
            svn_volume_gib: default_svn_volume_gib(),
            perforce_record: default_perforce_record(),
            svn_record: default_svn_record(),
        }
    }
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            instance_type: default_ci_instance_type(),
            root_volume_gib: default_ci_root_volume_gib(),
            record: default_ci_record(),
            worker_tag_key: default_worker_tag_key(),
            worker_tag_value: default_worker_tag_value(),
            jenkins_repo_url: default_jenkins_repo_url(),
            jenkins_key_url: default_jenkins_key_url(),
        }
    }
}

impl Default for BuildWorkerConfig {
    fn default() -> Self {
        Self {
            instance_type: default_worker_instance_type(),
            image_locale: default_windows_locale(),
            root_volume_gib: default_windows_volume_gib(),
            firefox_url: default_firefox_url(),
            seven_zip_url: default_seven_zip_url(),
            tenancy: default_worker_tenancy(),
        }
    }
}

impl Default for WorkstationConfig {
    fn default() -> Self {
        Self {
            instance_type: default_workstation_instance_type(),
            image_locale: default_windows_locale(),
            root_volume_gib: default_windows_volume_gib(),
            firefox_url: default_firefox_url(),
            dcv_server_url: default_dcv_server_url(),
            dcv_license_regions: default_dcv_license_regions(),
            driver_sources: default_driver_sources(),
            driver_region: default_driver_region(),
            incredibuild: false,
            incredibuild_url: default_incredibuild_url(),
        }
    }
}

impl Default for DeploymentManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "game-studio".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: DeploymentSpec::default(),
        }
    }
}

impl DeploymentSpec {
    /// Operator allow-list as ingress peers, CIDRs first.
    pub fn allow_list(&self) -> Vec<Peer> {
        Peer::parse_allow_list(
            Some(&self.access.allow_cidrs.join(",")),
            Some(&self.access.allow_prefix_lists.join(",")),
        )
    }

    /// Host records that will be bound in the private zone, keyed by the
    /// manifest field that names them. The repository host only counts when enabled.
    pub fn host_records(&self) -> Vec<(&'static str, &str)> {
        let mut records = vec![(
            "spec.version_control.perforce_record",
            self.version_control.perforce_record.as_str(),
        )];
        if self.version_control.svn {
            records.push(("spec.version_control.svn_record", self.version_control.svn_record.as_str()));
        }
        records.push(("spec.ci.record", self.ci.record.as_str()));
        records
    }

    /// Every host record must name a distinct host in the zone.
    pub fn check_host_records(&self) -> anyhow::Result<()> {
        let records = self.host_records();
        for (i, (field, name)) in records.iter().enumerate() {
            if let Some((earlier, _)) = records[..i].iter().find(|(_, other)| other.eq_ignore_ascii_case(name)) {
                anyhow::bail!(
                    "{} '{}' collides with {}: each host needs its own record in {}",
                    field,
                    name,
                    earlier,
                    self.network.zone_name
                );
            }
        }
        Ok(())
    }
}

/// Where a loaded manifest came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// `--config` on the command line
    Flag(PathBuf),
    /// [`MANIFEST_ENV`]
    Environment(PathBuf),
    WorkingDirectory(PathBuf),
    UserHome(PathBuf),
    /// Nothing found; built-in defaults
    Defaults,
}

impl ManifestSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Flag(p) | Self::Environment(p) | Self::WorkingDirectory(p) | Self::UserHome(p) => Some(p),
            Self::Defaults => None,
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(p) => write!(f, "{} (--config)", p.display()),
            Self::Environment(p) => write!(f, "{} ({})", p.display(), MANIFEST_ENV),
            Self::WorkingDirectory(p) => write!(f, "{} (working directory)", p.display()),
            Self::UserHome(p) => write!(f, "{} (user home)", p.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Resolve which manifest to load.
///
/// An explicitly requested manifest, by flag or by [`MANIFEST_ENV`], must
/// exist. The working-directory and home manifests are optional.
pub fn locate_manifest(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    cwd: &Path,
    home: Option<&Path>,
) -> anyhow::Result<ManifestSource> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!("Deployment manifest {} given with --config does not exist", path.display());
        }
        return Ok(ManifestSource::Flag(path.to_path_buf()));
    }

    if let Some(value) = env(MANIFEST_ENV).filter(|v| !v.trim().is_empty()) {
        let path = PathBuf::from(value.trim());
        if !path.is_file() {
            anyhow::bail!("{} points at {}, which does not exist", MANIFEST_ENV, path.display());
        }
        return Ok(ManifestSource::Environment(path));
    }

    let local = cwd.join(WORKDIR_MANIFEST);
    if local.is_file() {
        return Ok(ManifestSource::WorkingDirectory(local));
    }

    if let Some(home) = home {
        let user = home.join(USER_MANIFEST);
        if user.is_file() {
            return Ok(ManifestSource::UserHome(user));
        }
    }

    Ok(ManifestSource::Defaults)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl DeploymentManifest {
    /// Read and parse a manifest; errors name the file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment manifest {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("Invalid deployment manifest {}", path.display()))
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write deployment manifest {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("Invalid deployment manifest")
    }

    /// Load the manifest for this process: `explicit` first, then
    /// [`MANIFEST_ENV`], `./studio-infra.yaml` and `~/.studio-infra/config.yaml`.
    /// Environment overrides are applied on top of whatever was found.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, ManifestSource)> {
        let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
        Self::load_from(explicit, |key| std::env::var(key).ok(), &cwd, dirs::home_dir().as_deref())
    }

    /// [`Self::load`] with every input supplied by the caller.
    pub fn load_from(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        cwd: &Path,
        home: Option<&Path>,
    ) -> anyhow::Result<(Self, ManifestSource)> {
        let source = locate_manifest(explicit, &env, cwd, home)?;
        let mut manifest = match source.path() {
            Some(path) => {
                tracing::info!("Loading deployment manifest from {}", source);
                Self::from_yaml_file(path)?
            }
            None => {
                tracing::warn!("No deployment manifest found; using built-in defaults");
                Self::default()
            }
        };
        manifest.apply_overrides_from(env);
        Ok((manifest, source))
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup` (the process environment in production).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ALLOW_CIDR") {
            tracing::info!("Environment override: ALLOW_CIDR");
            self.spec.access.allow_cidrs = split_list(&val);
        }

        if let Some(val) = lookup("ALLOW_PREFIX_LIST") {
            tracing::info!("Environment override: ALLOW_PREFIX_LIST");
            self.spec.access.allow_prefix_lists = split_list(&val);
        }

        for (key, target) in [
            ("IS_SVN", &mut self.spec.version_control.svn),
            ("VANILLA", &mut self.spec.version_control.vanilla),
        ] {
            let Some(val) = lookup(key) else { continue };
            match parse_bool(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: {}={}", key, flag);
                    *target = flag;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for {}: '{}'. Expected true/false. Ignoring.",
                        key,
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;

        if spec.network.max_azs == 0 {
            anyhow::bail!("spec.network.max_azs must be at least 1");
        }
        if spec.network.zone_name.is_empty() {
            anyhow::bail!("spec.network.zone_name cannot be empty");
        }
        plan_subnets(&spec.network.vpc_cidr, spec.network.max_azs)
            .with_context(|| format!("spec.network.vpc_cidr '{}' is unusable", spec.network.vpc_cidr))?;

        let labels = spec.directory.name.split('.').filter(|l| !l.is_empty()).count();
        if labels < 2 {
            anyhow::bail!(
                "spec.directory.name '{}' must be a fully-qualified domain with at least two labels",
                spec.directory.name
            );
        }

        for (field, value) in [
            ("spec.version_control.perforce_instance_type", &spec.version_control.perforce_instance_type),
            ("spec.version_control.svn_instance_type", &spec.version_control.svn_instance_type),
            ("spec.ci.instance_type", &spec.ci.instance_type),
            ("spec.build_worker.instance_type", &spec.build_worker.instance_type),
            ("spec.workstation.instance_type", &spec.workstation.instance_type),
            ("spec.ci.record", &spec.ci.record),
            ("spec.version_control.perforce_record", &spec.version_control.perforce_record),
            ("spec.version_control.svn_record", &spec.version_control.svn_record),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", field);
            }
        }

        spec.check_host_records()?;

        for (field, size) in [
            ("spec.version_control.svn_volume_gib", spec.version_control.svn_volume_gib),
            ("spec.ci.root_volume_gib", spec.ci.root_volume_gib),
            ("spec.build_worker.root_volume_gib", spec.build_worker.root_volume_gib),
            ("spec.workstation.root_volume_gib", spec.workstation.root_volume_gib),
        ] {
            if size == 0 {
                anyhow::bail!("{} must be greater than zero", field);
            }
        }

        for source in &spec.workstation.driver_sources {
            if source.bucket.is_empty() {
                anyhow::bail!("spec.workstation.driver_sources entries need a bucket");
            }
        }

        Ok(())
    }

    /// JSON Schema describing the manifest
    pub fn json_schema() -> anyhow::Result<serde_json::Value> {
        let schema = schemars::schema_for!(DeploymentManifest);
        Ok(serde_json::to_value(schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = DeploymentManifest::default();
        assert_eq!(manifest.api_version, "gamestudio.dev/v1");
        assert_eq!(manifest.kind, "StudioDeployment");
        assert!(!manifest.spec.version_control.svn);
        assert!(!manifest.spec.version_control.vanilla);
        assert_eq!(manifest.spec.workstation.instance_type, "g4dn.xlarge");
        assert_eq!(manifest.spec.ci.worker_tag_value, "BuildWorker");
        assert_eq!(manifest.spec.build_worker.tenancy, Tenancy::Dedicated);
        assert!(manifest.spec.allow_list().is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: gamestudio.dev/v1
kind: StudioDeployment
metadata:
  name: tokyo-studio
spec:
  access:
    allow_cidrs: ["203.0.113.0/24"]
  version_control:
    svn: true
  build_worker:
    tenancy: host
  workstation:
    image_locale: Japanese
"#;
        let manifest = DeploymentManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "tokyo-studio");
        assert!(manifest.spec.version_control.svn);
        assert_eq!(manifest.spec.version_control.svn_record, "svn");
        assert_eq!(manifest.spec.workstation.image_locale, "Japanese");
        assert_eq!(manifest.spec.build_worker.tenancy, Tenancy::Host);
        assert_eq!(manifest.spec.workstation.root_volume_gib, 500);
        assert_eq!(manifest.spec.network.vpc_cidr, "10.0.0.0/16");
        assert_eq!(manifest.spec.allow_list(), vec![Peer::Cidr("203.0.113.0/24".into())]);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut manifest = DeploymentManifest::default();
        manifest.spec.access.allow_prefix_lists = vec!["pl-0123".to_string()];
        manifest.spec.workstation.incredibuild = true;

        let yaml = serde_yaml::to_string(&manifest).unwrap();
        let parsed = DeploymentManifest::from_yaml_str(&yaml).unwrap();

        assert_eq!(parsed.spec.access.allow_prefix_lists, vec!["pl-0123".to_string()]);
        assert!(parsed.spec.workstation.incredibuild);
        assert_eq!(parsed.spec.workstation.driver_sources, default_driver_sources());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ALLOW_CIDR", "10.1.0.0/16, 192.168.1.0/24,"),
            ("ALLOW_PREFIX_LIST", "pl-abc"),
            ("IS_SVN", "yes"),
            ("VANILLA", "1"),
        ]);
        let mut manifest = DeploymentManifest::default();
        manifest.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(manifest.spec.access.allow_cidrs, vec!["10.1.0.0/16", "192.168.1.0/24"]);
        assert_eq!(manifest.spec.access.allow_prefix_lists, vec!["pl-abc"]);
        assert!(manifest.spec.version_control.svn);
        assert!(manifest.spec.version_control.vanilla);
        assert_eq!(manifest.spec.allow_list().len(), 3);
    }

    #[test]
    fn test_invalid_boolean_override_is_ignored() {
        let mut manifest = DeploymentManifest::default();
        manifest.spec.version_control.svn = true;
        manifest.apply_overrides_from(|k| (k == "IS_SVN").then(|| "maybe".to_string()));
        assert!(manifest.spec.version_control.svn);
    }

    #[test]
    fn test_validation() {
        let mut manifest = DeploymentManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.directory.name = "studio".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.directory.name = "corp.studio".to_string();
        assert!(manifest.validate().is_ok());

        manifest.spec.ci.root_volume_gib = 0;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_vpc_range_too_small_for_zones() {
        let mut manifest = DeploymentManifest::default();
        manifest.spec.network.vpc_cidr = "10.0.0.0/27".to_string();
        manifest.spec.network.max_azs = 2;
        let err = format!("{:#}", manifest.validate().unwrap_err());
        assert!(err.contains("spec.network.vpc_cidr"), "{}", err);

        manifest.spec.network.max_azs = 1;
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_shared_host_record() {
        let mut manifest = DeploymentManifest::default();
        manifest.spec.version_control.svn_record = manifest.spec.version_control.perforce_record.clone();
        // the repository host is off, so its record is not bound
        assert!(manifest.validate().is_ok());

        manifest.spec.version_control.svn = true;
        let err = manifest.validate().unwrap_err().to_string();
        assert!(err.contains("spec.version_control.svn_record"), "{}", err);
        assert!(err.contains("spec.version_control.perforce_record"), "{}", err);

        manifest.spec.version_control.svn_record = "svn".to_string();
        assert!(manifest.validate().is_ok());

        manifest.spec.ci.record = "SVN".to_string();
        let err = manifest.validate().unwrap_err().to_string();
        assert!(err.contains("spec.ci.record"), "{}", err);
    }

    #[test]
    fn test_manifest_lookup_precedence() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let no_env = |_: &str| None::<String>;

        let (manifest, source) = DeploymentManifest::load_from(None, no_env, cwd.path(), Some(home.path())).unwrap();
        assert_eq!(source, ManifestSource::Defaults);
        assert_eq!(manifest.metadata.name, DeploymentManifest::default().metadata.name);

        let user = home.path().join(USER_MANIFEST);
        std::fs::create_dir_all(user.parent().unwrap()).unwrap();
        let mut named = DeploymentManifest::default();
        named.metadata.name = "home-studio".to_string();
        named.to_yaml_file(&user).unwrap();
        let (manifest, source) = DeploymentManifest::load_from(None, no_env, cwd.path(), Some(home.path())).unwrap();
        assert_eq!(source, ManifestSource::UserHome(user.clone()));
        assert_eq!(manifest.metadata.name, "home-studio");

        let local = cwd.path().join(WORKDIR_MANIFEST);
        named.metadata.name = "local-studio".to_string();
        named.to_yaml_file(&local).unwrap();
        let source = locate_manifest(None, no_env, cwd.path(), Some(home.path())).unwrap();
        assert_eq!(source, ManifestSource::WorkingDirectory(local.clone()));

        let pinned = cwd.path().join("pinned.yaml");
        named.metadata.name = "pinned-studio".to_string();
        named.to_yaml_file(&pinned).unwrap();
        let pinned_value = pinned.display().to_string();
        let env = |key: &str| (key == MANIFEST_ENV).then(|| pinned_value.clone());
        let (manifest, source) = DeploymentManifest::load_from(None, env, cwd.path(), Some(home.path())).unwrap();
        assert_eq!(source, ManifestSource::Environment(pinned.clone()));
        assert_eq!(manifest.metadata.name, "pinned-studio");

        let (manifest, source) =
            DeploymentManifest::load_from(Some(user.as_path()), env, cwd.path(), Some(home.path())).unwrap();
        assert_eq!(source, ManifestSource::Flag(user));
        assert_eq!(manifest.metadata.name, "home-studio");
    }

    #[test]
    fn test_missing_requested_manifest_is_an_error() {
        let cwd = tempfile::tempdir().unwrap();
        let missing = cwd.path().join("nowhere.yaml");

        let err = locate_manifest(Some(missing.as_path()), |_| None, cwd.path(), None).unwrap_err();
        assert!(err.to_string().contains("nowhere.yaml"));

        let value = missing.display().to_string();
        let err = locate_manifest(None, |k| (k == MANIFEST_ENV).then(|| value.clone()), cwd.path(), None).unwrap_err();
        assert!(err.to_string().contains(MANIFEST_ENV));
    }

    #[test]
    fn test_unparsable_manifest_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WORKDIR_MANIFEST);
        std::fs::write(&path, "apiVersion: [unclosed").unwrap();

        let err = DeploymentManifest::load_from(None, |_| None, dir.path(), None).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Invalid deployment manifest"), "{}", message);
        assert!(message.contains(WORKDIR_MANIFEST), "{}", message);
    }

    #[test]
    fn test_env_overrides_apply_to_loaded_manifest() {
        let dir = tempfile::tempdir().unwrap();
        DeploymentManifest::default().to_yaml_file(dir.path().join(WORKDIR_MANIFEST)).unwrap();

        let (manifest, _) =
            DeploymentManifest::load_from(None, |k| (k == "IS_SVN").then(|| "true".to_string()), dir.path(), None)
                .unwrap();
        assert!(manifest.spec.version_control.svn);
    }

    #[test]
    fn test_malformed_allow_list_passes_validation() {
        let mut manifest = DeploymentManifest::default();
        manifest.spec.access.allow_cidrs = vec!["not-a-cidr".to_string()];
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_schema_mentions_sections() {
        let schema = DeploymentManifest::json_schema().unwrap();
        let text = schema.to_string();
        assert!(text.contains("version_control"));
        assert!(text.contains("allow_cidrs"));
    }
}

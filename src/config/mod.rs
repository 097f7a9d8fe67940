// ABOUTME: Manifest types and parsing for armada.yml.
// ABOUTME: Handles YAML parsing, validation, and template scaffolding.

mod capacity;
mod context;

pub use capacity::{Capacity, CapacityError};
pub use context::{RunContext, RunMode, RunOptions};

use crate::error::{Error, Result};
use crate::types::{RegionId, StackName};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const MANIFEST_FILENAME: &str = "armada.yml";
pub const MANIFEST_FILENAME_ALT: &str = "armada.yaml";
pub const MANIFEST_FILENAME_DIR: &str = ".armada/manifest.yml";

/// The replacement strategy a stack deploys with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    BlueGreen,
    Canary,
    RollingUpdate,
    DeployOnly,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::BlueGreen => "blue-green",
            StrategyKind::Canary => "canary",
            StrategyKind::RollingUpdate => "rolling-update",
            StrategyKind::DeployOnly => "deploy-only",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Environment label embedded in every resource-name prefix.
    pub env: String,

    #[serde(deserialize_with = "deserialize_stacks")]
    pub stacks: NonEmpty<Stack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stack {
    #[serde(deserialize_with = "deserialize_stack_name")]
    pub name: StackName,

    pub strategy: StrategyKind,

    /// Intended full-scale capacity declared by the manifest.
    pub capacity: Capacity,

    /// Capacity increment per rolling-update step.
    #[serde(default = "default_rolling_step")]
    pub rolling_step: u32,

    /// Settle delay used by deploy-only in place of active health polling.
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,

    #[serde(deserialize_with = "deserialize_regions")]
    pub regions: NonEmpty<RegionManifest>,

    /// Run the configured API test suite after deployment.
    #[serde(default)]
    pub api_test: bool,

    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Immutable per-region manifest data. Read-only input to the deployer.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionManifest {
    pub region: RegionId,

    pub instance_type: String,

    /// Machine image the launch template boots from.
    pub image: String,

    #[serde(default)]
    pub subnets: Vec<String>,

    #[serde(default)]
    pub security_groups: Vec<String>,

    /// Production target groups the new group is attached to.
    #[serde(default)]
    pub target_groups: Vec<String>,

    /// Load balancer fronting the production target groups. Canary builds
    /// its dedicated balancer alongside this one.
    #[serde(default)]
    pub load_balancer: Option<String>,

    #[serde(default)]
    pub scaling_policies: Vec<ScalingPolicyConfig>,

    #[serde(default)]
    pub alarms: Vec<AlarmConfig>,

    #[serde(default)]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScalingPolicyConfig {
    pub name: String,
    /// Signed capacity adjustment applied when the policy fires.
    pub adjustment: i32,
    #[serde(default = "default_cooldown", with = "humantime_serde")]
    pub cooldown: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlarmConfig {
    pub name: String,
    pub metric: String,
    pub threshold: f64,
    #[serde(default = "default_alarm_periods")]
    pub evaluation_periods: u32,
}

fn default_rolling_step() -> u32 {
    1
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(300)
}

fn default_alarm_periods() -> u32 {
    3
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(MANIFEST_FILENAME),
            dir.join(MANIFEST_FILENAME_ALT),
            dir.join(MANIFEST_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ManifestNotFound(dir.to_path_buf()))
    }

    /// Restrict the manifest to the named stack.
    pub fn for_stack(&self, name: &str) -> Result<Manifest> {
        let stacks: Vec<Stack> = self
            .stacks
            .iter()
            .filter(|s| s.name.as_str() == name)
            .cloned()
            .collect();

        let stacks =
            NonEmpty::from_vec(stacks).ok_or_else(|| Error::UnknownStack(name.to_string()))?;

        Ok(Manifest {
            env: self.env.clone(),
            stacks,
        })
    }

    /// Every region named by any stack of the manifest.
    pub fn regions(&self) -> Vec<RegionId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for stack in &self.stacks {
            for region in &stack.regions {
                if seen.insert(region.region.clone()) {
                    out.push(region.region.clone());
                }
            }
        }
        out
    }

    fn validate(&self) -> Result<()> {
        if self.env.is_empty() {
            return Err(Error::InvalidManifest("env cannot be empty".to_string()));
        }

        let mut names = HashSet::new();
        for stack in &self.stacks {
            if !names.insert(stack.name.as_str().to_string()) {
                return Err(Error::InvalidManifest(format!(
                    "duplicate stack name: {}",
                    stack.name
                )));
            }

            stack
                .capacity
                .validate()
                .map_err(|e| Error::InvalidManifest(format!("stack {}: {}", stack.name, e)))?;

            if stack.rolling_step == 0 && stack.strategy == StrategyKind::RollingUpdate {
                return Err(Error::InvalidManifest(format!(
                    "stack {}: rolling_step must be at least 1",
                    stack.name
                )));
            }

            for region in &stack.regions {
                // Every strategy except deploy-only health-checks through
                // target groups, so the manifest must name at least one.
                if stack.strategy != StrategyKind::DeployOnly && region.target_groups.is_empty() {
                    return Err(Error::InvalidManifest(format!(
                        "stack {} region {}: {} requires at least one target group",
                        stack.name,
                        region.region,
                        stack.strategy.as_str()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn template() -> Self {
        Manifest {
            env: "dev".to_string(),
            stacks: NonEmpty::new(Stack {
                name: StackName::new("my-app").unwrap(),
                strategy: StrategyKind::BlueGreen,
                capacity: Capacity {
                    min: 1,
                    desired: 2,
                    max: 4,
                },
                rolling_step: default_rolling_step(),
                settle_delay: default_settle_delay(),
                regions: NonEmpty::new(RegionManifest {
                    region: RegionId::new("us-east-1").unwrap(),
                    instance_type: "m5.large".to_string(),
                    image: "image-0123456789abcdef0".to_string(),
                    subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
                    security_groups: vec!["my-app-sg".to_string()],
                    target_groups: vec!["my-app-tg".to_string()],
                    load_balancer: Some("my-app-lb".to_string()),
                    scaling_policies: vec![],
                    alarms: vec![],
                    user_data: None,
                }),
                api_test: false,
                tags: HashMap::new(),
            }),
        }
    }
}

/// Write a template armada.yml into `dir`.
pub fn init_manifest(dir: &Path, stack: Option<&str>, force: bool) -> Result<()> {
    let manifest_path = dir.join(MANIFEST_FILENAME);

    if manifest_path.exists() && !force {
        return Err(Error::AlreadyExists(manifest_path));
    }

    let name = match stack {
        Some(s) => StackName::new(s).map_err(|e| Error::InvalidManifest(e.to_string()))?,
        None => StackName::new("my-app").unwrap(),
    };

    let yaml = generate_template_yaml(&name);
    std::fs::write(&manifest_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(name: &StackName) -> String {
    format!(
        r#"env: dev
stacks:
  - name: {name}
    strategy: blue-green
    capacity:
      min: 1
      desired: 2
      max: 4
    regions:
      - region: us-east-1
        instance_type: m5.large
        image: image-0123456789abcdef0
        subnets: [subnet-a, subnet-b]
        security_groups: [{name}-sg]
        target_groups: [{name}-tg]
        load_balancer: {name}-lb
"#
    )
}

// Custom deserializers

fn deserialize_stack_name<'de, D>(deserializer: D) -> std::result::Result<StackName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    StackName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_stacks<'de, D>(deserializer: D) -> std::result::Result<NonEmpty<Stack>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<Stack> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one stack is required"))
}

fn deserialize_regions<'de, D>(
    deserializer: D,
) -> std::result::Result<NonEmpty<RegionManifest>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<RegionManifest> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one region is required"))
}

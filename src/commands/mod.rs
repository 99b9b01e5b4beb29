//! Command implementations
//!
//! Both commands start from an [`Environment`]: the loaded declaration, the
//! environment's recorded state and the desired tree built from both.

pub mod apply;
pub mod diff;

use crate::Context;
use crate::config::{Config, Settings};
use crate::output::LocalOutputDir;
use crate::state::StateStore;
use anyhow::{Context as _, Result, bail};
use controller::client::StateHandlers;
use controller::desired::{create_application_desired_state_graph, create_desired_state_graph};
use controller::{CommonMetadata, PlanOpts};
use resourcetree::ResourceNode;
use std::sync::Arc;

/// Which declaration a command works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Cluster,
    Application,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Application => "application",
        }
    }
}

/// Effective settings for a command: config file overridden by flags
pub fn settings(ctx: &Context) -> Result<Settings> {
    let config = Config::load()?;
    Ok(config.resolve(ctx.api_url.as_deref(), ctx.output_dir.as_deref()))
}

/// A declaration bound to its environment
pub struct Environment {
    pub settings: Settings,
    pub target: Target,
    pub state: Arc<StateStore>,
    pub output: Arc<LocalOutputDir>,
    pub metadata: Arc<CommonMetadata>,
    pub desired: ResourceNode,
}

impl Environment {
    /// Load a declaration and the state of the environment it belongs to
    pub fn load(
        target: Target,
        file: &str,
        settings: Settings,
        run: controller::Context,
    ) -> Result<Self> {
        match target {
            Target::Cluster => Self::cluster(file, settings, run),
            Target::Application => Self::application(file, settings, run),
        }
    }

    fn cluster(file: &str, settings: Settings, run: controller::Context) -> Result<Self> {
        let declaration = declaration::load_cluster(file)
            .with_context(|| format!("Could not load cluster declaration {file}"))?;
        let cluster_id = controller::ClusterId::from_declaration(&declaration);

        let environment_dir = settings.environment_dir(&cluster_id.environment);
        let state = Arc::new(StateStore::open(&environment_dir)?);

        if let Some(recorded) = state.cluster_id()
            && recorded != cluster_id
        {
            bail!(
                "Environment {} already holds cluster {recorded}, not {cluster_id}",
                cluster_id.environment
            );
        }

        // Databases dropped from the declaration still need a node to be deleted through
        let existing = state.get_postgres_databases()?;
        let desired = create_desired_state_graph(&declaration, &existing)?;

        Ok(Self {
            target: Target::Cluster,
            output: Arc::new(LocalOutputDir::new(&environment_dir)),
            settings,
            state,
            metadata: Arc::new(CommonMetadata::for_cluster(run, declaration)),
            desired,
        })
    }

    fn application(file: &str, settings: Settings, run: controller::Context) -> Result<Self> {
        let declaration = declaration::load_application(file)
            .with_context(|| format!("Could not load application declaration {file}"))?;

        let environment = declaration.cluster.environment.clone();
        let environment_dir = settings.environment_dir(&environment);
        let state = Arc::new(StateStore::open(&environment_dir)?);
        let cluster_id = state.cluster_id().with_context(|| {
            format!("Environment {environment} has no cluster yet; apply its cluster declaration first")
        })?;

        let desired = create_application_desired_state_graph(&declaration);
        let metadata = CommonMetadata::for_application(run, cluster_id, declaration);

        Ok(Self {
            target: Target::Application,
            output: Arc::new(LocalOutputDir::new(&environment_dir)),
            settings,
            state,
            metadata: Arc::new(metadata),
            desired,
        })
    }

    /// Short description for headers and messages
    pub fn title(&self) -> String {
        match &self.metadata.declaration {
            controller::Declaration::Cluster(declaration) => format!(
                "Cluster {} ({})",
                declaration.metadata.name, self.metadata.cluster_id.environment
            ),
            controller::Declaration::Application(declaration) => format!(
                "Application {} ({})",
                declaration.metadata.name, declaration.cluster.environment
            ),
        }
    }

    /// Inputs for planning or synchronizing this environment
    pub fn plan_opts(&self) -> PlanOpts {
        PlanOpts {
            desired: self.desired.clone(),
            metadata: Arc::clone(&self.metadata),
            state_handlers: self.state.clone(),
            accessors: self.state.clone(),
            output_dir: self.output.clone(),
        }
    }

    /// Remember which cluster lives in this environment
    pub fn record_cluster_id(&self) -> Result<()> {
        let id = self.metadata.cluster_id.clone();
        self.state.update(|s| s.cluster_id = Some(id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CLUSTER: &str = r#"
cluster_root_domain = "staging.example.com"

[metadata]
name = "platform"
environment = "staging"
region = "eu-west-1"
account_id = "123456789012"

[github]
organisation = "example"
repository = "infra"
output_path = "infrastructure"

[vpc]
cidr = "192.168.0.0/20"
high_availability = true

[[databases.postgres]]
name = "orders"
user = "orders_admin"
namespace = "shop"
"#;

    const APPLICATION: &str = r#"
subdomain = "web"
port = 8080

[metadata]
name = "web"
namespace = "shop"

[cluster]
environment = "staging"

[image]
name = "web"
"#;

    fn write(dir: &Path, name: &str, content: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn test_settings(dir: &Path) -> Settings {
        Config::default().resolve(None, Some(dir.join("out").as_path()))
    }

    #[test]
    fn test_cluster_environment() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "cluster.toml", CLUSTER);

        let env = Environment::load(
            Target::Cluster,
            &file,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .unwrap();

        assert_eq!(env.title(), "Cluster platform (staging)");
        assert_eq!(env.state.path(), dir.path().join("out/staging/state.toml"));
        assert!(env.desired.node_count() > 1);

        env.record_cluster_id().unwrap();
        assert_eq!(env.state.cluster_id(), Some(env.metadata.cluster_id.clone()));
    }

    #[test]
    fn test_application_needs_recorded_cluster() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "web.toml", APPLICATION);

        let err = Environment::load(
            Target::Application,
            &file,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("has no cluster yet"));
    }

    #[test]
    fn test_application_uses_recorded_cluster() {
        let dir = TempDir::new().unwrap();
        let cluster = write(dir.path(), "cluster.toml", CLUSTER);
        let application = write(dir.path(), "web.toml", APPLICATION);

        Environment::load(
            Target::Cluster,
            &cluster,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .unwrap()
        .record_cluster_id()
        .unwrap();

        let env = Environment::load(
            Target::Application,
            &application,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .unwrap();
        assert_eq!(env.title(), "Application web (staging)");
        assert_eq!(env.metadata.cluster_id.cluster_name, "platform");
    }

    #[test]
    fn test_environment_holds_one_cluster() {
        let dir = TempDir::new().unwrap();
        let file = write(dir.path(), "cluster.toml", CLUSTER);
        Environment::load(
            Target::Cluster,
            &file,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .unwrap()
        .record_cluster_id()
        .unwrap();

        let other = write(
            dir.path(),
            "other.toml",
            &CLUSTER.replace("name = \"platform\"", "name = \"other\""),
        );
        let err = Environment::load(
            Target::Cluster,
            &other,
            test_settings(dir.path()),
            controller::Context::new(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("already holds cluster"));
    }
}

use clap::Args;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::validators::{
    ImageValidator, JsonMetaValidator, MaxSizeValidator, Project, ProjectRegistry,
    ReadOnlyValidator, TitleLengthValidator,
};

#[derive(Args, Debug)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub projects: HashMap<String, ProjectConfig>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Declarative validator bundle for one project. The registry assembles the
/// validators in a fixed order: read-only guard, title length, payload size,
/// meta schema, image checks.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ProjectConfig {
    pub read_only: bool,
    pub title_min: usize,
    pub title_max: usize,
    pub max_size: Option<usize>,
    /// Require the meta field to be a JSON object.
    pub json_meta: bool,
    /// Keys the meta object must carry; implies `json_meta`.
    pub required_meta: Vec<String>,
    pub image: Option<ImageConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            title_min: 1,
            title_max: 1024,
            max_size: None,
            json_meta: false,
            required_meta: Vec::new(),
            image: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ImageConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("library.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".asset-library")
        })
    }

    pub fn db_path(&self) -> &PathBuf {
        self.database.path.as_ref().unwrap()
    }

    /// Build the project registry declared by this config. Unlisted project
    /// names resolve to the registry's read-only fallback.
    pub fn registry(&self) -> ProjectRegistry {
        let mut registry = ProjectRegistry::new();
        for (name, settings) in &self.projects {
            let mut project = Project::new();
            if settings.read_only {
                project.push(ReadOnlyValidator);
            }
            project.push(TitleLengthValidator::new(
                settings.title_min,
                settings.title_max,
            ));
            if let Some(max_size) = settings.max_size {
                project.push(MaxSizeValidator::new(max_size));
            }
            if !settings.required_meta.is_empty() {
                project.push(JsonMetaValidator::with_required(
                    settings.required_meta.clone(),
                ));
            } else if settings.json_meta {
                project.push(JsonMetaValidator::new());
            }
            if let Some(image) = &settings.image {
                project.push(ImageValidator::png(image.width, image.height));
            }
            registry.insert(name.clone(), project);
        }
        registry
    }
}

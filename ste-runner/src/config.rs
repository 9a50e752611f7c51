// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for ste.
//!
//! Configuration is layered, with later layers overriding earlier ones:
//!
//! 1. The built-in defaults in `default-config.toml`.
//! 2. The repository config at `.config/ste.toml`, or a file passed in explicitly.
//! 3. Environment overrides of the form `STE_<SECTION>__<KEY>`, for example
//!    `STE_PROFILE__DEFAULT__BUDGET_TESTS=10` or `STE_STORE__DIR=/tmp/ste`.
//!
//! Profiles other than `default` inherit every key they don't set from `default`.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, InvalidConfigError, ProfileNotFound},
    scoring::ScoringWeights,
    selector::SelectionBudget,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Overall configuration for ste, before a profile has been picked.
#[derive(Clone, Debug)]
pub struct SteConfig {
    project_root: Utf8PathBuf,
    config_file: Utf8PathBuf,
    store: StoreConfigImpl,
    diff: DiffConfigImpl,
    default_profile: DefaultProfileImpl,
    other_profiles: BTreeMap<String, CustomProfileImpl>,
}

impl SteConfig {
    /// The path of the repository config file, relative to the project root.
    pub const CONFIG_PATH: &'static str = ".config/ste.toml";

    /// The default config, embedded at build time.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the default profile.
    pub const DEFAULT_PROFILE: &'static str = "default";

    /// The prefix for environment overrides.
    pub const ENV_PREFIX: &'static str = "STE_";

    /// Top-level sections that may be overridden from the environment.
    const ENV_SECTIONS: [&'static str; 3] = ["store", "diff", "profile"];

    /// Loads configuration for the project at `project_root`.
    ///
    /// If `config_file` is `None`, `.config/ste.toml` under the project root is read if it
    /// exists. If it is `Some`, that file must exist.
    ///
    /// `env` is the set of environment variables to consider for overrides; pass
    /// `std::env::vars()` to use the process environment. Variables without the `STE_` prefix,
    /// or that don't name a config section, are ignored.
    pub fn from_sources<I>(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        env: I,
    ) -> Result<Self, ConfigParseError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let build_error = |error: ConfigError| {
            ConfigParseError::new(&config_file, ConfigParseErrorKind::BuildError(Box::new(error)))
        };

        let mut builder = Self::make_default_config().add_source(source);
        for (key, value) in Self::env_overrides(env) {
            debug!("config override from environment: {key} = {value}");
            builder = builder.set_override(key, value).map_err(build_error)?;
        }

        let config = builder.build().map_err(build_error)?;
        let default_profile: DefaultProfileImpl =
            config.get("profile.default").map_err(build_error)?;
        let SteConfigDeserialize {
            store,
            diff,
            mut profiles,
        } = config.try_deserialize().map_err(build_error)?;
        profiles.remove(Self::DEFAULT_PROFILE);

        let this = Self {
            project_root,
            config_file,
            store,
            diff,
            default_profile,
            other_profiles: profiles,
        };

        for name in this.all_profiles() {
            if let Ok(profile) = this.profile(name) {
                profile.validate().map_err(|error| {
                    ConfigParseError::new(
                        &this.config_file,
                        ConfigParseErrorKind::InvalidValue(error),
                    )
                })?;
            }
        }

        Ok(this)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Converts `STE_A__B_C=value` into `("a.b-c", value)`.
    fn env_overrides<I>(env: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut overrides: Vec<_> = env
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(Self::ENV_PREFIX)?;
                let path: Vec<String> = rest
                    .split("__")
                    .map(|segment| segment.to_ascii_lowercase().replace('_', "-"))
                    .collect();
                let is_known = path.len() > 1
                    && Self::ENV_SECTIONS.contains(&path[0].as_str())
                    && path.iter().all(|segment| !segment.is_empty());
                is_known.then(|| (path.join("."), value))
            })
            .collect();
        // Environment iteration order is unspecified.
        overrides.sort();
        overrides
    }

    /// Returns the project root this config was loaded for.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the repository config file path, whether or not it exists.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the names of all known profiles, `default` first.
    pub fn all_profiles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(Self::DEFAULT_PROFILE)
            .chain(self.other_profiles.keys().map(|key| key.as_str()))
    }

    /// Resolves a profile by name.
    pub fn profile(&self, name: &str) -> Result<SteProfile, ProfileNotFound> {
        let custom = match name {
            Self::DEFAULT_PROFILE => None,
            other => Some(
                self.other_profiles
                    .get(other)
                    .ok_or_else(|| ProfileNotFound::new(name, self.all_profiles()))?,
            ),
        };
        Ok(self.resolve(name, custom))
    }

    fn resolve(&self, name: &str, custom: Option<&CustomProfileImpl>) -> SteProfile {
        let default = &self.default_profile;
        let pick = |get: fn(&CustomProfileImpl) -> Option<f64>, fallback: f64| {
            custom.and_then(get).unwrap_or(fallback)
        };

        let weights = ScoringWeights {
            affected: pick(|c| c.weights.affected, default.weights.affected),
            fail_rate: pick(|c| c.weights.fail_rate, default.weights.fail_rate),
            flaky_rate: pick(|c| c.weights.flaky_rate, default.weights.flaky_rate),
            runtime: pick(|c| c.weights.runtime, default.weights.runtime),
        };

        SteProfile {
            name: name.to_owned(),
            store_dir: self.project_root.join(&self.store.dir),
            report_dir: self.project_root.join(&self.store.report_dir),
            project: custom
                .and_then(|c| c.project.clone())
                .unwrap_or_else(|| default.project.clone()),
            python: custom
                .and_then(|c| c.python.clone())
                .unwrap_or_else(|| default.python.clone()),
            pytest_args: custom
                .and_then(|c| c.pytest_args.clone())
                .unwrap_or_else(|| default.pytest_args.clone()),
            probe_fallback: custom
                .and_then(|c| c.probe_fallback)
                .unwrap_or(default.probe_fallback),
            budget_tests: custom
                .and_then(|c| c.budget_tests)
                .unwrap_or(default.budget_tests),
            budget_seconds: pick(|c| c.budget_seconds, default.budget_seconds),
            weights,
            base: self.diff.base.clone(),
            head: self.diff.head.clone(),
        }
    }
}

/// A fully resolved profile.
#[derive(Clone, Debug, PartialEq)]
pub struct SteProfile {
    /// The profile name.
    pub name: String,

    /// The store directory, absolute if the project root is.
    pub store_dir: Utf8PathBuf,

    /// The directory `latest.json` is written to.
    pub report_dir: Utf8PathBuf,

    /// The tests path passed to the test command, relative to the project root.
    pub project: Utf8PathBuf,

    /// The Python interpreter.
    pub python: String,

    /// Extra arguments for pytest, as a single shell-quoted string.
    pub pytest_args: String,

    /// Whether to probe tests one at a time when coverage has no per-test contexts.
    pub probe_fallback: bool,

    /// The test-count budget as configured. 0 means unlimited; negative values fail validation.
    pub budget_tests: i64,

    /// The time budget in seconds as configured. 0 means unlimited.
    pub budget_seconds: f64,

    /// The scoring weights.
    pub weights: ScoringWeights,

    /// The base revision for `git diff`.
    pub base: String,

    /// The head revision for `git diff`.
    pub head: String,
}

impl SteProfile {
    /// Checks that budgets and weights are in range.
    ///
    /// Profiles returned by [`SteConfig::profile`] have already been validated; call this again
    /// after overriding values.
    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        if self.budget_tests < 0 {
            return Err(InvalidConfigError::NegativeBudget {
                profile: self.name.clone(),
                key: "budget-tests",
                value: self.budget_tests as f64,
            });
        }
        if self.budget_seconds.is_nan() || self.budget_seconds < 0.0 {
            return Err(InvalidConfigError::NegativeBudget {
                profile: self.name.clone(),
                key: "budget-seconds",
                value: self.budget_seconds,
            });
        }
        for (key, value) in self.weights.entries() {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidConfigError::InvalidWeight {
                    profile: self.name.clone(),
                    key,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Returns the selection budget. Negative budgets are treated as unlimited.
    pub fn budget(&self) -> SelectionBudget {
        SelectionBudget::from_config(
            usize::try_from(self.budget_tests).unwrap_or(0),
            self.budget_seconds,
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SteConfigDeserialize {
    store: StoreConfigImpl,
    diff: DiffConfigImpl,
    #[serde(rename = "profile")]
    profiles: BTreeMap<String, CustomProfileImpl>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoreConfigImpl {
    dir: Utf8PathBuf,
    report_dir: Utf8PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiffConfigImpl {
    base: String,
    head: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DefaultProfileImpl {
    budget_tests: i64,
    budget_seconds: f64,
    project: Utf8PathBuf,
    python: String,
    pytest_args: String,
    probe_fallback: bool,
    weights: ScoringWeights,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CustomProfileImpl {
    budget_tests: Option<i64>,
    budget_seconds: Option<f64>,
    project: Option<Utf8PathBuf>,
    python: Option<String>,
    pytest_args: Option<String>,
    probe_fallback: Option<bool>,
    weights: CustomWeightsImpl,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct CustomWeightsImpl {
    affected: Option<f64>,
    fail_rate: Option<f64>,
    flaky_rate: Option<f64>,
    runtime: Option<f64>,
}

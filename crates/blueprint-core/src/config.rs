//! Host configuration.
//!
//! [`BlueprintConfig`] carries the knobs the generator needs: the
//! application name, the unique assembly name for the generated output,
//! the optimization level, and the compile strategy. Configuration is
//! validated once before generation starts.

use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, GenerationResult};

/// Optimization level handed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationLevel {
    /// Unoptimized output with full diagnostics.
    #[default]
    Debug,
    /// Optimized output.
    Release,
}

/// Where the compiled output lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStrategy {
    /// Verify and bind entirely in memory.
    #[default]
    InMemory,
    /// Additionally hand the emitted files back to the host for
    /// persistence.
    ToDisk,
}

/// Complete host configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintConfig {
    /// Application name, used in generated namespaces.
    pub app_name: String,
    /// Assembly name; must be unique per generation to avoid load
    /// conflicts on repeated generation.
    pub assembly_name: String,
    /// Optimization level.
    #[serde(default)]
    pub optimization: OptimizationLevel,
    /// Compile strategy.
    #[serde(default)]
    pub compile_strategy: CompileStrategy,
    /// Test-mode escape hatch: rethrow unhandled executor errors to the
    /// dispatcher instead of converting them to results.
    #[serde(default)]
    pub rethrow_unhandled: bool,
}

impl BlueprintConfig {
    /// Starts a configuration builder.
    #[must_use]
    pub fn builder(app_name: impl Into<String>) -> BlueprintConfigBuilder {
        BlueprintConfigBuilder {
            config: Self {
                app_name: app_name.into(),
                assembly_name: String::new(),
                optimization: OptimizationLevel::default(),
                compile_strategy: CompileStrategy::default(),
                rethrow_unhandled: false,
            },
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::InvalidConfig`] when the app name is
    /// empty, the assembly name is empty, or the assembly name is not a
    /// plain identifier.
    pub fn validate(&self) -> GenerationResult<()> {
        if self.app_name.trim().is_empty() {
            return Err(GenerationError::InvalidConfig {
                field: "app_name".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.assembly_name.trim().is_empty() {
            return Err(GenerationError::InvalidConfig {
                field: "assembly_name".into(),
                reason: "must not be empty".into(),
            });
        }
        let mut chars = self.assembly_name.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !head_ok || !tail_ok {
            return Err(GenerationError::InvalidConfig {
                field: "assembly_name".into(),
                reason: format!("'{}' is not a valid assembly identifier", self.assembly_name),
            });
        }
        Ok(())
    }
}

/// Builder for [`BlueprintConfig`].
#[derive(Debug)]
pub struct BlueprintConfigBuilder {
    config: BlueprintConfig,
}

impl BlueprintConfigBuilder {
    /// Sets the assembly name.
    #[must_use]
    pub fn assembly_name(mut self, name: impl Into<String>) -> Self {
        self.config.assembly_name = name.into();
        self
    }

    /// Sets the optimization level.
    #[must_use]
    pub fn optimization(mut self, level: OptimizationLevel) -> Self {
        self.config.optimization = level;
        self
    }

    /// Sets the compile strategy.
    #[must_use]
    pub fn compile_strategy(mut self, strategy: CompileStrategy) -> Self {
        self.config.compile_strategy = strategy;
        self
    }

    /// Enables rethrow of unhandled executor errors (test mode).
    #[must_use]
    pub fn rethrow_unhandled(mut self) -> Self {
        self.config.rethrow_unhandled = true;
        self
    }

    /// Finishes and validates the configuration.
    ///
    /// # Errors
    ///
    /// See [`BlueprintConfig::validate`].
    pub fn build(self) -> GenerationResult<BlueprintConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_valid_config() {
        let config = BlueprintConfig::builder("AcmeApi")
            .assembly_name("AcmeApi.Generated")
            .optimization(OptimizationLevel::Release)
            .build()
            .expect("valid");

        assert_eq!(config.app_name, "AcmeApi");
        assert_eq!(config.assembly_name, "AcmeApi.Generated");
        assert_eq!(config.optimization, OptimizationLevel::Release);
        assert_eq!(config.compile_strategy, CompileStrategy::InMemory);
        assert!(!config.rethrow_unhandled);
    }

    #[test]
    fn test_empty_app_name_rejected() {
        let result = BlueprintConfig::builder("  ").assembly_name("A").build();
        assert!(matches!(
            result,
            Err(GenerationError::InvalidConfig { field, .. }) if field == "app_name"
        ));
    }

    #[test]
    fn test_missing_assembly_name_rejected() {
        let result = BlueprintConfig::builder("AcmeApi").build();
        assert!(matches!(
            result,
            Err(GenerationError::InvalidConfig { field, .. }) if field == "assembly_name"
        ));
    }

    #[test]
    fn test_invalid_assembly_identifier_rejected() {
        let result = BlueprintConfig::builder("AcmeApi")
            .assembly_name("1-bad name")
            .build();
        assert!(result.is_err());
    }
}

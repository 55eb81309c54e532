use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::layer::LayerStack;
use crate::lithology::{LithologyProfile, LithologyType, get_profile};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// Loads layer stacks and engine settings from JSON documents
pub struct JsonParser;

impl JsonParser {
    fn read_document<T: DeserializeOwned, P: AsRef<Path>>(file_path: P) -> Result<T, ConfigError> {
        let json_str = fs::read_to_string(file_path.as_ref())?;
        Ok(serde_json::from_str(&json_str)?)
    }

    /// Load and validate a layer stack from a file
    pub fn load_layer_stack<P: AsRef<Path>>(file_path: P) -> Result<LayerStack, ConfigError> {
        let stack: LayerStack = Self::read_document(file_path)?;
        stack.validate()?;
        Ok(stack)
    }

    /// Parse and validate a layer stack from an embedded string
    pub fn layer_stack_from_str(json_str: &str) -> Result<LayerStack, ConfigError> {
        let stack: LayerStack = serde_json::from_str(json_str)?;
        stack.validate()?;
        Ok(stack)
    }

    pub fn load_engine_config<P: AsRef<Path>>(file_path: P) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = Self::read_document(file_path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn engine_config_from_str(json_str: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LithologySpec {
    Catalog(String),
    Profile(LithologyProfile),
}

/// Accepts either a catalog name (`"shale"`) or a full lithology profile.
pub fn deserialize_lithology<'de, D>(deserializer: D) -> Result<LithologyProfile, D::Error>
where
    D: Deserializer<'de>,
{
    match LithologySpec::deserialize(deserializer)? {
        LithologySpec::Profile(profile) => Ok(profile),
        LithologySpec::Catalog(name) => LithologyType::from_str(&name)
            .and_then(get_profile)
            .cloned()
            .ok_or_else(|| serde::de::Error::custom(format!("unknown lithology '{}'", name))),
    }
}

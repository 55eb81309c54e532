// src/config.rs - Run settings for the thickness-history engine

use crate::constants::{
    DEFAULT_CRUST_ELEMENT_HEIGHT_M, DEFAULT_MANTLE_ELEMENT_HEIGHT_M,
    DEFAULT_SEDIMENT_ELEMENT_HEIGHT_M, MAXIMUM_NUMBER_OF_ERRORS_PER_LAYER,
    MOBILE_LAYER_NEGATIVE_THICKNESS_TOLERANCE, THICKNESS_TOLERANCE,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How the base of the lithosphere is constrained; selects the source of the
/// crustal thickness history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottomBoundary {
    #[default]
    FixedTemperature,
    FixedHeatFlow,
    AdvancedLithosphereCalculator,
}

impl BottomBoundary {
    pub fn as_str(&self) -> &'static str {
        match self {
            BottomBoundary::FixedTemperature => "fixed_temperature",
            BottomBoundary::FixedHeatFlow => "fixed_heat_flow",
            BottomBoundary::AdvancedLithosphereCalculator => "advanced_lithosphere_calculator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fixed_temperature" => Some(BottomBoundary::FixedTemperature),
            "fixed_heat_flow" => Some(BottomBoundary::FixedHeatFlow),
            "advanced_lithosphere_calculator" => Some(BottomBoundary::AdvancedLithosphereCalculator),
            _ => None,
        }
    }
}

/// Target element height per layer class, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementHeights {
    pub sediment: f64,
    pub crust: f64,
    pub mantle: f64,
}

impl Default for ElementHeights {
    fn default() -> Self {
        Self {
            sediment: DEFAULT_SEDIMENT_ELEMENT_HEIGHT_M,
            crust: DEFAULT_CRUST_ELEMENT_HEIGHT_M,
            mantle: DEFAULT_MANTLE_ELEMENT_HEIGHT_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thickness_tolerance: f64,
    pub mobile_negative_thickness_tolerance: f64,
    pub max_errors_per_layer: usize,
    pub overpressure_calculation: bool,
    pub bottom_boundary: BottomBoundary,
    pub element_heights: ElementHeights,
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thickness_tolerance: THICKNESS_TOLERANCE,
            mobile_negative_thickness_tolerance: MOBILE_LAYER_NEGATIVE_THICKNESS_TOLERANCE,
            max_errors_per_layer: MAXIMUM_NUMBER_OF_ERRORS_PER_LAYER,
            overpressure_calculation: false,
            bottom_boundary: BottomBoundary::default(),
            element_heights: ElementHeights::default(),
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.thickness_tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "thickness_tolerance must be positive, got {}",
                self.thickness_tolerance
            )));
        }
        if self.mobile_negative_thickness_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mobile_negative_thickness_tolerance must not be negative, got {}",
                self.mobile_negative_thickness_tolerance
            )));
        }
        let heights = self.element_heights;
        for (name, height) in [
            ("sediment", heights.sediment),
            ("crust", heights.crust),
            ("mantle", heights.mantle),
        ] {
            if !(height > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{} element height must be positive, got {}",
                    name, height
                )));
            }
        }
        Ok(())
    }
}

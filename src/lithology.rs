// src/lithology.rs - Lithology catalog, pore fluids and the compaction law

use crate::constants::{
    ACCELERATION_DUE_TO_GRAVITY, BRINE_DENSITY_KGM3, DECOMPACTION_MAX_ITERATIONS,
    DECOMPACTION_RELATIVE_TOLERANCE, FRESH_WATER_DENSITY_KGM3, OVERPRESSURE_VES_SCALE_FACTOR,
};
use crate::error::CompactionError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LithologyType {
    Sandstone,
    Shale,
    Limestone,
    Salt,
    Basalt,
    Granite,
    Peridotite,
}

impl LithologyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LithologyType::Sandstone => "sandstone",
            LithologyType::Shale => "shale",
            LithologyType::Limestone => "limestone",
            LithologyType::Salt => "salt",
            LithologyType::Basalt => "basalt",
            LithologyType::Granite => "granite",
            LithologyType::Peridotite => "peridotite",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sandstone" => Some(LithologyType::Sandstone),
            "shale" => Some(LithologyType::Shale),
            "limestone" => Some(LithologyType::Limestone),
            "salt" => Some(LithologyType::Salt),
            "basalt" => Some(LithologyType::Basalt),
            "granite" => Some(LithologyType::Granite),
            "peridotite" => Some(LithologyType::Peridotite),
            _ => None,
        }
    }
}

/// Porosity as a function of vertical effective stress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PorosityModel {
    /// `φ(ves) = φ0 · exp(-c · ves)`, with `c` in 1/Pa.
    Exponential {
        surface_porosity: f64,
        compaction_coefficient: f64,
    },
    Incompressible,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LithologyProfile {
    pub name: String,
    /// Density of the solid matrix.
    pub density_kg_m3: f64,
    pub porosity: PorosityModel,
}

impl LithologyProfile {
    pub fn incompressible(name: &str, density_kg_m3: f64) -> Self {
        Self {
            name: name.to_string(),
            density_kg_m3,
            porosity: PorosityModel::Incompressible,
        }
    }

    pub fn exponential(
        name: &str,
        density_kg_m3: f64,
        surface_porosity: f64,
        compaction_coefficient: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            density_kg_m3,
            porosity: PorosityModel::Exponential {
                surface_porosity,
                compaction_coefficient,
            },
        }
    }
}

pub static LITHOLOGY_PROFILES: Lazy<HashMap<LithologyType, LithologyProfile>> = Lazy::new(|| {
    use LithologyType::*;
    let mut m = HashMap::new();

    m.insert(Sandstone, LithologyProfile::exponential("Std. Sandstone", 2720.0, 0.41, 2.7e-8));
    m.insert(Shale, LithologyProfile::exponential("Std. Shale", 2680.0, 0.70, 8.0e-8));
    m.insert(Limestone, LithologyProfile::exponential("Std. Limestone", 2710.0, 0.50, 5.0e-8));
    m.insert(Salt, LithologyProfile::incompressible("Std. Salt", 2160.0));
    m.insert(Basalt, LithologyProfile::incompressible("Std. Basalt", 2900.0));
    m.insert(Granite, LithologyProfile::incompressible("Crust", 2700.0));
    m.insert(Peridotite, LithologyProfile::incompressible("Litho. Mantle", 3300.0));

    m
});

pub fn get_profile(kind: LithologyType) -> Option<&'static LithologyProfile> {
    LITHOLOGY_PROFILES.get(&kind)
}

/// Pore fluid filling a sediment layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProfile {
    pub density_kg_m3: f64,
    #[serde(default)]
    pub permafrost_enabled: bool,
}

impl FluidProfile {
    pub fn fresh_water() -> Self {
        Self {
            density_kg_m3: FRESH_WATER_DENSITY_KGM3,
            permafrost_enabled: false,
        }
    }

    pub fn brine() -> Self {
        Self {
            density_kg_m3: BRINE_DENSITY_KGM3,
            permafrost_enabled: false,
        }
    }
}

/// Density contrast that loads the matrix: `ρ_lith − ρ_fluid` clamped at zero,
/// or the plain lithology density for a dry layer.
pub fn density_difference(lithology: &LithologyProfile, fluid: Option<&FluidProfile>) -> f64 {
    match fluid {
        Some(fluid) => (lithology.density_kg_m3 - fluid.density_kg_m3).max(0.0),
        None => lithology.density_kg_m3,
    }
}

/// Converts between deposited thickness and the thickness it occupies once
/// fully compacted under a given maximum effective stress.
pub trait CompactionLaw {
    fn density_kg_m3(&self) -> f64;

    fn surface_porosity(&self) -> f64;

    fn is_incompressible(&self) -> bool;

    /// Full-compacted thickness of a `thickness` increment deposited on top of
    /// material that has seen `max_ves`.
    fn full_compacted_thickness(
        &self,
        max_ves: f64,
        thickness: f64,
        density_difference: f64,
        overpressured: bool,
    ) -> Result<f64, CompactionError>;

    /// Raw thickness whose full-compacted thickness is `fct`.
    fn decompacted_thickness(
        &self,
        max_ves: f64,
        fct: f64,
        density_difference: f64,
        overpressured: bool,
    ) -> Result<f64, CompactionError> {
        if !max_ves.is_finite() || !fct.is_finite() {
            return Err(CompactionError::NonFiniteInput { max_ves, thickness: fct });
        }
        if fct <= 0.0 {
            return Ok(0.0);
        }

        let residual = |h: f64| -> Result<f64, CompactionError> {
            Ok(self.full_compacted_thickness(max_ves, h, density_difference, overpressured)? - fct)
        };

        // compaction never makes a layer thicker, so the root lies above fct
        let mut lo = fct;
        let mut f_lo = residual(lo)?;
        if f_lo >= 0.0 {
            return Ok(lo);
        }
        let mut hi = 2.0 * fct;
        let mut f_hi = residual(hi)?;
        let mut iterations = 0;
        while f_hi < 0.0 {
            iterations += 1;
            if iterations >= DECOMPACTION_MAX_ITERATIONS {
                return Err(CompactionError::NoConvergence { iterations });
            }
            lo = hi;
            f_lo = f_hi;
            hi *= 2.0;
            f_hi = residual(hi)?;
        }

        // secant steps inside the bracket, bisection when they leave it
        for iteration in 0..DECOMPACTION_MAX_ITERATIONS {
            let width = hi - lo;
            if width <= DECOMPACTION_RELATIVE_TOLERANCE * hi.abs().max(1.0) {
                return Ok(0.5 * (lo + hi));
            }
            let secant = lo - f_lo * width / (f_hi - f_lo);
            let candidate = if secant > lo && secant < hi { secant } else { 0.5 * (lo + hi) };
            let f_candidate = residual(candidate)?;
            if f_candidate.abs() <= DECOMPACTION_RELATIVE_TOLERANCE * fct {
                return Ok(candidate);
            }
            if f_candidate < 0.0 {
                lo = candidate;
                f_lo = f_candidate;
            } else {
                hi = candidate;
                f_hi = f_candidate;
            }
            // keep the bracket shrinking when the secant stalls on one side
            if iteration % 2 == 1 {
                let mid = 0.5 * (lo + hi);
                let f_mid = residual(mid)?;
                if f_mid < 0.0 {
                    lo = mid;
                    f_lo = f_mid;
                } else {
                    hi = mid;
                    f_hi = f_mid;
                }
            }
        }

        Err(CompactionError::NoConvergence {
            iterations: DECOMPACTION_MAX_ITERATIONS,
        })
    }
}

impl CompactionLaw for LithologyProfile {
    fn density_kg_m3(&self) -> f64 {
        self.density_kg_m3
    }

    fn surface_porosity(&self) -> f64 {
        match self.porosity {
            PorosityModel::Exponential { surface_porosity, .. } => surface_porosity,
            PorosityModel::Incompressible => 0.0,
        }
    }

    fn is_incompressible(&self) -> bool {
        matches!(self.porosity, PorosityModel::Incompressible)
    }

    fn full_compacted_thickness(
        &self,
        max_ves: f64,
        thickness: f64,
        density_difference: f64,
        overpressured: bool,
    ) -> Result<f64, CompactionError> {
        if !max_ves.is_finite() || !thickness.is_finite() || !density_difference.is_finite() {
            return Err(CompactionError::NonFiniteInput { max_ves, thickness });
        }
        if density_difference < 0.0 {
            return Err(CompactionError::NegativeDensityDifference(density_difference));
        }

        let (phi0, c) = match self.porosity {
            PorosityModel::Incompressible => return Ok(thickness),
            PorosityModel::Exponential {
                surface_porosity,
                compaction_coefficient,
            } => (surface_porosity, compaction_coefficient),
        };

        let ves = if overpressured {
            max_ves * OVERPRESSURE_VES_SCALE_FACTOR
        } else {
            max_ves
        };

        let fct = if c > 0.0 && density_difference > 0.0 {
            let c1 = ACCELERATION_DUE_TO_GRAVITY * density_difference * c;
            let c2 = (1.0 - (-c1 * thickness).exp()) * phi0 * (-c * ves).exp();
            thickness + (1.0 - c2).ln() / c1
        } else {
            thickness * (1.0 - phi0)
        };

        if fct.is_finite() {
            Ok(fct)
        } else {
            Err(CompactionError::NonFiniteResult)
        }
    }
}

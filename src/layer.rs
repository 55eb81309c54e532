// src/layer.rs - Stratigraphic layers and the top-to-bottom layer stack

use crate::error::ConfigError;
use crate::grid::{Grid, GridMap};
use crate::lithology::{FluidProfile, LithologyProfile};
use serde::{Deserialize, Serialize};

/// Thickness map valid at one paleo age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaleoThickness {
    pub age_ma: f64,
    pub thickness: GridMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerKind {
    /// Deposited (positive input thickness) or eroding (negative) sediment.
    Sediment,
    /// Thickness through time comes from the paleo table, e.g. salt.
    Mobile {
        #[serde(default)]
        paleo_thickness: Vec<PaleoThickness>,
    },
    IgneousIntrusion {
        start_of_intrusion_ma: f64,
        end_of_intrusion_ma: f64,
    },
    Crust {
        #[serde(default)]
        paleo_thickness: Vec<PaleoThickness>,
        /// Effective crustal thickness history maintained by the lithosphere calculator.
        #[serde(default)]
        effective_thickness: Vec<PaleoThickness>,
    },
    Mantle {
        #[serde(default)]
        paleo_thickness: Vec<PaleoThickness>,
    },
}

impl LayerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Sediment => "sediment",
            LayerKind::Mobile { .. } => "mobile",
            LayerKind::IgneousIntrusion { .. } => "igneous_intrusion",
            LayerKind::Crust { .. } => "crust",
            LayerKind::Mantle { .. } => "mantle",
        }
    }

    pub fn is_basement(&self) -> bool {
        matches!(self, LayerKind::Crust { .. } | LayerKind::Mantle { .. })
    }
}

fn default_segment_count() -> usize {
    1
}

fn default_refinement() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(flatten)]
    pub kind: LayerKind,
    /// Age of the bottom surface (start of deposition or erosion), Ma.
    pub deposition_start_ma: f64,
    /// Age of the top surface (end of deposition or erosion), Ma.
    pub deposition_end_ma: f64,
    /// Present-day thickness; negative values mark erosion.
    pub input_thickness: GridMap,
    #[serde(deserialize_with = "crate::json_parser::deserialize_lithology")]
    pub lithology: LithologyProfile,
    #[serde(default)]
    pub fluid: Option<FluidProfile>,
    #[serde(default = "default_segment_count")]
    pub segment_count: usize,
    #[serde(default = "default_refinement")]
    pub depth_refinement_factor: f64,
}

impl Layer {
    pub fn new(
        name: &str,
        kind: LayerKind,
        deposition_start_ma: f64,
        deposition_end_ma: f64,
        input_thickness: GridMap,
        lithology: LithologyProfile,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            deposition_start_ma,
            deposition_end_ma,
            input_thickness,
            lithology,
            fluid: None,
            segment_count: 1,
            depth_refinement_factor: 1.0,
        }
    }

    pub fn with_fluid(mut self, fluid: FluidProfile) -> Self {
        self.fluid = Some(fluid);
        self
    }

    pub fn with_segments(mut self, segment_count: usize) -> Self {
        self.segment_count = segment_count;
        self
    }

    /// Normal, mobile and intrusive layers; everything above the basement.
    pub fn is_sediment(&self) -> bool {
        !self.kind.is_basement()
    }

    pub fn is_mobile(&self) -> bool {
        matches!(self.kind, LayerKind::Mobile { .. })
    }

    pub fn is_intrusion(&self) -> bool {
        matches!(self.kind, LayerKind::IgneousIntrusion { .. })
    }

    pub fn input_thickness_at(&self, i: usize, j: usize) -> f64 {
        self.input_thickness.value(i, j)
    }

    /// Every map the layer carries, for dimension checks.
    fn maps(&self) -> impl Iterator<Item = &GridMap> {
        let paleo: &[PaleoThickness] = match &self.kind {
            LayerKind::Mobile { paleo_thickness } | LayerKind::Mantle { paleo_thickness } => paleo_thickness.as_slice(),
            LayerKind::Crust { paleo_thickness, .. } => paleo_thickness.as_slice(),
            LayerKind::Sediment | LayerKind::IgneousIntrusion { .. } => &[],
        };
        let effective: &[PaleoThickness] = match &self.kind {
            LayerKind::Crust { effective_thickness, .. } => effective_thickness.as_slice(),
            _ => &[],
        };
        std::iter::once(&self.input_thickness)
            .chain(paleo.iter().map(|p| &p.thickness))
            .chain(effective.iter().map(|p| &p.thickness))
    }
}

/// The stratigraphic column, youngest layer first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    pub grid: Grid,
    pub layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new(grid: Grid, layers: Vec<Layer>) -> Self {
        Self { grid, layers }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn find_layer(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grid.valid.is_empty() && self.grid.valid.len() != self.grid.column_count() {
            return Err(ConfigError::Invalid(format!(
                "validity mask has {} entries for a {}x{} grid",
                self.grid.valid.len(),
                self.grid.nx,
                self.grid.ny
            )));
        }

        let mut seen_basement = false;
        let mut crust_count = 0;
        let mut mantle_count = 0;

        for layer in &self.layers {
            for map in layer.maps() {
                map.check_dimensions(self.grid.nx, self.grid.ny)
                    .map_err(|e| ConfigError::Invalid(format!("layer {}: {}", layer.name, e)))?;
            }
            if layer.segment_count == 0 {
                return Err(ConfigError::Invalid(format!("layer {} has no segments", layer.name)));
            }
            if !(layer.depth_refinement_factor > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "layer {} has depth refinement factor {}",
                    layer.name, layer.depth_refinement_factor
                )));
            }
            if layer.deposition_start_ma < layer.deposition_end_ma {
                return Err(ConfigError::Invalid(format!(
                    "layer {} ends ({} Ma) before it starts ({} Ma)",
                    layer.name, layer.deposition_end_ma, layer.deposition_start_ma
                )));
            }

            match &layer.kind {
                LayerKind::Crust { .. } => {
                    crust_count += 1;
                    seen_basement = true;
                }
                LayerKind::Mantle { .. } => {
                    mantle_count += 1;
                    seen_basement = true;
                }
                LayerKind::IgneousIntrusion {
                    start_of_intrusion_ma,
                    end_of_intrusion_ma,
                } => {
                    if start_of_intrusion_ma < end_of_intrusion_ma {
                        return Err(ConfigError::Invalid(format!(
                            "intrusion {} ends ({} Ma) before it starts ({} Ma)",
                            layer.name, end_of_intrusion_ma, start_of_intrusion_ma
                        )));
                    }
                    if seen_basement {
                        return Err(ConfigError::Invalid(format!("layer {} lies below the basement", layer.name)));
                    }
                }
                LayerKind::Sediment | LayerKind::Mobile { .. } => {
                    if seen_basement {
                        return Err(ConfigError::Invalid(format!("layer {} lies below the basement", layer.name)));
                    }
                }
            }
        }

        if crust_count > 1 || mantle_count > 1 {
            return Err(ConfigError::Invalid(format!(
                "expected at most one crust and one mantle, found {} and {}",
                crust_count, mantle_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lithology::{LithologyType, get_profile};

    fn shale() -> LithologyProfile {
        get_profile(LithologyType::Shale).unwrap().clone()
    }

    #[test]
    fn test_layer_kind_predicates() {
        let grid_map = GridMap::constant(1, 1, 100.0);
        let sediment = Layer::new("A", LayerKind::Sediment, 10.0, 5.0, grid_map.clone(), shale());
        assert!(sediment.is_sediment());
        assert!(!sediment.is_mobile());

        let crust = Layer::new(
            "Crust",
            LayerKind::Crust {
                paleo_thickness: vec![],
                effective_thickness: vec![],
            },
            300.0,
            300.0,
            grid_map,
            shale(),
        );
        assert!(!crust.is_sediment());
        assert_eq!(crust.kind.as_str(), "crust");
    }

    #[test]
    fn test_validate_catches_bad_stacks() {
        let grid = Grid::all_valid(2, 1);
        let good = Layer::new("A", LayerKind::Sediment, 10.0, 5.0, GridMap::constant(2, 1, 50.0), shale());
        assert!(LayerStack::new(grid.clone(), vec![good.clone()]).validate().is_ok());

        let wrong_size = Layer::new("B", LayerKind::Sediment, 10.0, 5.0, GridMap::constant(3, 1, 50.0), shale());
        assert!(LayerStack::new(grid.clone(), vec![wrong_size]).validate().is_err());

        let reversed = Layer::new("C", LayerKind::Sediment, 5.0, 10.0, GridMap::constant(2, 1, 50.0), shale());
        assert!(LayerStack::new(grid.clone(), vec![reversed]).validate().is_err());

        let mantle = Layer::new(
            "Mantle",
            LayerKind::Mantle { paleo_thickness: vec![] },
            300.0,
            300.0,
            GridMap::constant(2, 1, 90000.0),
            shale(),
        );
        assert!(LayerStack::new(grid, vec![mantle, good]).validate().is_err());
    }

    #[test]
    fn test_kind_tag_deserialization() {
        let layer: Layer = serde_json::from_str(
            r#"{
                "name": "Sill",
                "kind": "igneous_intrusion",
                "start_of_intrusion_ma": 8.0,
                "end_of_intrusion_ma": 6.0,
                "deposition_start_ma": 12.0,
                "deposition_end_ma": 10.0,
                "input_thickness": {"nx": 1, "ny": 1, "values": [20.0]},
                "lithology": {"name": "basalt", "density_kg_m3": 2900.0, "porosity": {"model": "incompressible"}}
            }"#,
        )
        .unwrap();
        assert!(layer.is_intrusion());
        assert_eq!(layer.segment_count, 1);
        assert_eq!(
            layer.kind,
            LayerKind::IgneousIntrusion {
                start_of_intrusion_ma: 8.0,
                end_of_intrusion_ma: 6.0
            }
        );
    }
}

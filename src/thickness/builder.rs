use crate::config::{BottomBoundary, EngineConfig};
use crate::constants::{ERODED_SEGMENT_EPSILON, thickness_tolerance};
use crate::error::{ThicknessError, ValidationError};
use crate::layer::{LayerKind, LayerStack, PaleoThickness};
use crate::thickness::diagnostics::Diagnostic;
use crate::thickness::segment::LayerColumnHistory;

/// Output of the first pass over a column.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub histories: Vec<LayerColumnHistory>,
    /// Thickness each erosion layer actually removed from the layers below.
    pub eroded_thickness: Vec<f64>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Builds the uncompacted deposition and erosion shape of every layer at one
/// column, oldest layer first.
pub struct SegmentHistoryBuilder<'a> {
    stack: &'a LayerStack,
    config: &'a EngineConfig,
    i: usize,
    j: usize,
    histories: Vec<LayerColumnHistory>,
    eroded_thickness: Vec<f64>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SegmentHistoryBuilder<'a> {
    pub fn new(stack: &'a LayerStack, config: &'a EngineConfig, i: usize, j: usize) -> Self {
        Self {
            stack,
            config,
            i,
            j,
            histories: stack
                .layers
                .iter()
                .map(|l| LayerColumnHistory::new(l.segment_count))
                .collect(),
            eroded_thickness: vec![0.0; stack.layers.len()],
            diagnostics: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<RawColumn, ThicknessError> {
        for index in (0..self.stack.layers.len()).rev() {
            self.build_layer(index)?;
        }
        for history in &mut self.histories {
            history.store_present_day_thickness();
        }
        Ok(RawColumn {
            histories: self.histories,
            eroded_thickness: self.eroded_thickness,
            diagnostics: self.diagnostics,
        })
    }

    fn build_layer(&mut self, index: usize) -> Result<(), ThicknessError> {
        let stack = self.stack;
        let layer = &stack.layers[index];
        let thickness = layer.input_thickness_at(self.i, self.j);

        match &layer.kind {
            LayerKind::Sediment => {
                let eps = thickness_tolerance(self.config.thickness_tolerance, thickness);
                if thickness > eps {
                    self.set_deposition_history(index, thickness);
                } else if thickness < -eps {
                    self.eroded_thickness[index] = self.set_histories_for_unconformity(index, thickness)?;
                }
                // otherwise the layer is already eroded here
            }
            LayerKind::Mobile { paleo_thickness } => {
                self.set_mobile_layer_history(index, thickness, paleo_thickness);
            }
            LayerKind::IgneousIntrusion {
                start_of_intrusion_ma,
                end_of_intrusion_ma,
            } => {
                self.set_igneous_intrusion_history(index, thickness, *start_of_intrusion_ma, *end_of_intrusion_ma);
            }
            LayerKind::Crust {
                paleo_thickness,
                effective_thickness,
            } => {
                let table: &[PaleoThickness] = match self.config.bottom_boundary {
                    BottomBoundary::FixedHeatFlow => &[],
                    BottomBoundary::FixedTemperature => paleo_thickness.as_slice(),
                    BottomBoundary::AdvancedLithosphereCalculator if !effective_thickness.is_empty() => {
                        effective_thickness.as_slice()
                    }
                    BottomBoundary::AdvancedLithosphereCalculator => paleo_thickness.as_slice(),
                };
                self.set_basement_history(index, thickness, table);
            }
            LayerKind::Mantle { paleo_thickness } => {
                self.set_basement_history(index, thickness, paleo_thickness);
            }
        }
        Ok(())
    }

    fn report(&mut self, layer_index: usize, error: ValidationError) {
        self.histories[layer_index].succeeded = false;
        self.diagnostics.push(Diagnostic {
            layer: self.stack.layers[layer_index].name.clone(),
            layer_index,
            i: self.i,
            j: self.j,
            error,
        });
    }

    /// Uniform ramps, segment 0 taking the oldest part of the window.
    fn set_deposition_history(&mut self, index: usize, thickness: f64) {
        let layer = &self.stack.layers[index];
        let history = &mut self.histories[index];
        let count = history.segment_count();
        let segment_thickness = thickness / count as f64;

        // negative: ages decrease going up the stack
        let duration = (layer.deposition_end_ma - layer.deposition_start_ma) / count as f64;
        let mut start_age = layer.deposition_start_ma;

        for (k, segment) in history.segments.iter_mut().enumerate() {
            let end_age = if k + 1 == count {
                layer.deposition_end_ma
            } else {
                start_age + duration
            };
            segment.add_point(start_age, 0.0);
            segment.add_point(end_age, segment_thickness);
            start_age = end_age;
        }
    }

    /// Removes `-thickness` from the layers below, youngest material first.
    ///
    /// Returns the thickness actually removed, which falls short of the
    /// request when the erosion runs into a layer that cannot be eroded.
    fn set_histories_for_unconformity(&mut self, index: usize, thickness: f64) -> Result<f64, ThicknessError> {
        let stack = self.stack;
        let layer = &stack.layers[index];
        let eps = thickness_tolerance(self.config.thickness_tolerance, thickness);

        let end_age = layer.deposition_end_ma;
        let mut start_age = layer.deposition_start_ma;
        let mut remaining = -thickness;
        let mut eroded = 0.0;

        for below in index + 1..stack.layers.len() {
            if remaining <= eps {
                break;
            }
            let lower = &stack.layers[below];

            let blocked = match lower.kind {
                LayerKind::Crust { .. } | LayerKind::Mantle { .. } => Some(ValidationError::BasementErosion {
                    remaining,
                    eroding_layer: layer.name.clone(),
                }),
                LayerKind::Mobile { .. } if remaining <= self.config.mobile_negative_thickness_tolerance => {
                    // small enough to ignore
                    return Ok(eroded);
                }
                LayerKind::Mobile { .. } => Some(ValidationError::MobileLayerErosion {
                    requested: remaining,
                    eroding_layer: layer.name.clone(),
                }),
                LayerKind::IgneousIntrusion { .. } => Some(ValidationError::IntrusionErosion {
                    requested: remaining,
                    eroding_layer: layer.name.clone(),
                }),
                LayerKind::Sediment => None,
            };
            if let Some(error) = blocked {
                self.report(below, error);
                return Ok(eroded);
            }

            if lower.input_thickness_at(self.i, self.j) <= eps {
                continue;
            }

            let history = &mut self.histories[below];
            if let Some(segment) = history.segments.iter().position(|s| s.is_empty()) {
                return Err(ThicknessError::MalformedHistory {
                    layer: lower.name.clone(),
                    i: self.i,
                    j: self.j,
                    segment,
                });
            }

            let layer_thickness = history.present_day_solid_thickness();
            if layer_thickness < eps {
                continue;
            }

            let removed = layer_thickness.min(remaining);
            let local_end_age = start_age + (removed / remaining) * (end_age - start_age);
            set_erosion_history(history, start_age, local_end_age, removed, eps);

            remaining -= removed;
            eroded += removed;
            start_age = local_end_age;
        }

        if remaining > eps {
            self.report(
                index,
                ValidationError::ErosionBeyondStack {
                    remaining,
                    eroding_layer: layer.name.clone(),
                },
            );
        }
        Ok(eroded)
    }

    fn set_mobile_layer_history(&mut self, index: usize, thickness: f64, paleo_thickness: &[PaleoThickness]) {
        let count = self.histories[index].segment_count() as f64;
        let mut segment_thickness = thickness / count;

        if (-self.config.mobile_negative_thickness_tolerance..=0.0).contains(&segment_thickness) {
            segment_thickness = 0.0;
        }
        if segment_thickness < 0.0 {
            self.report(index, ValidationError::NegativeMobileThickness { thickness });
        }

        let (i, j) = (self.i, self.j);
        let history = &mut self.histories[index];
        history.add_point_to_all(0.0, segment_thickness);

        // present day comes from the input map above
        for paleo in paleo_thickness.iter().filter(|p| p.age_ma != 0.0) {
            history.add_point_to_all(paleo.age_ma, paleo.thickness.value(i, j) / count);
        }
    }

    /// Pulse that is zero outside the intrusion window.
    fn set_igneous_intrusion_history(&mut self, index: usize, thickness: f64, start_age: f64, end_age: f64) {
        let count = self.histories[index].segment_count() as f64;
        let segment_thickness = thickness / count;
        if segment_thickness < 0.0 {
            self.report(index, ValidationError::NegativeIntrusionThickness { thickness });
        }

        let inclusion_age = self.stack.layers[index].deposition_end_ma;
        let history = &mut self.histories[index];

        history.add_point_to_all(0.0, segment_thickness);
        if end_age != 0.0 {
            history.add_point_to_all(end_age, segment_thickness);
        }
        history.add_point_to_all(start_age, 0.0);
        history.add_point_to_all(inclusion_age, 0.0);
    }

    /// Crust or mantle: one point per table entry, or the present-day input
    /// when there is no table.
    fn set_basement_history(&mut self, index: usize, thickness: f64, table: &[PaleoThickness]) {
        let (i, j) = (self.i, self.j);
        let history = &mut self.histories[index];
        let count = history.segment_count() as f64;

        if table.is_empty() {
            history.add_point_to_all(0.0, thickness / count);
            return;
        }
        for entry in table {
            history.add_point_to_all(entry.age_ma, entry.thickness.value(i, j) / count);
        }
    }
}

/// Spreads `eroded` over the segments from the top down, each eroded segment
/// getting a plateau point and a drop point.
fn set_erosion_history(history: &mut LayerColumnHistory, start_age: f64, end_age: f64, eroded: f64, eps: f64) {
    let mut left = eroded;
    let mut segment_start_age = start_age;

    for segment in history.segments.iter_mut().rev() {
        if left <= eps {
            break;
        }
        let current = match segment.solid.youngest() {
            Some(point) => point.value,
            None => continue,
        };
        if current <= 0.0 {
            continue;
        }

        let removed = current.min(left);
        let segment_end_age = segment_start_age + (removed / left) * (end_age - segment_start_age);
        let after = if (current - removed).abs() < ERODED_SEGMENT_EPSILON {
            0.0
        } else {
            current - removed
        };

        segment.add_point(segment_start_age, current);
        segment.add_point(segment_end_age, after);

        segment_start_age = segment_end_age;
        left -= removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Grid, GridMap};
    use crate::layer::Layer;
    use crate::lithology::LithologyProfile;
    use approx::assert_abs_diff_eq;

    fn sediment(name: &str, start: f64, end: f64, thickness: f64, segments: usize) -> Layer {
        Layer::new(
            name,
            LayerKind::Sediment,
            start,
            end,
            GridMap::constant(1, 1, thickness),
            LithologyProfile::incompressible("rock", 2500.0),
        )
        .with_segments(segments)
    }

    fn build(layers: Vec<Layer>, config: &EngineConfig) -> RawColumn {
        let stack = LayerStack::new(Grid::all_valid(1, 1), layers);
        SegmentHistoryBuilder::new(&stack, config, 0, 0).build().unwrap()
    }

    #[test]
    fn test_deposition_ramps_oldest_segment_first() {
        let raw = build(vec![sediment("A", 10.0, 0.0, 100.0, 2)], &EngineConfig::default());
        let segments = &raw.histories[0].segments;

        let deep: Vec<(f64, f64)> = segments[0].solid.points().iter().map(|p| (p.age, p.value)).collect();
        let shallow: Vec<(f64, f64)> = segments[1].solid.points().iter().map(|p| (p.age, p.value)).collect();
        assert_eq!(deep, vec![(10.0, 0.0), (5.0, 50.0)]);
        assert_eq!(shallow, vec![(5.0, 0.0), (0.0, 50.0)]);
        assert_eq!(raw.histories[0].present_day_eroded_thickness, 100.0);
    }

    #[test]
    fn test_erosion_removes_from_top_segment_down() {
        let raw = build(
            vec![
                sediment("Erosion", 5.0, 2.0, -70.0, 1),
                sediment("A", 10.0, 5.0, 100.0, 2),
            ],
            &EngineConfig::default(),
        );
        assert_eq!(raw.eroded_thickness[0], 70.0);
        assert!(raw.diagnostics.is_empty());

        let a = &raw.histories[1];
        // top segment fully gone after 50/70 of the window
        let top = &a.segments[1].solid;
        assert_eq!(top.evaluate(0.0), 0.0);
        assert_abs_diff_eq!(top.youngest().unwrap().age, 5.0 - 3.0 * 50.0 / 70.0, epsilon = 1e-12);

        let bottom = &a.segments[0].solid;
        assert_abs_diff_eq!(bottom.evaluate(0.0), 30.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bottom.youngest().unwrap().age, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a.present_day_eroded_thickness, 30.0, epsilon = 1e-12);
    }

    #[test]
    fn test_erosion_walks_into_older_layers() {
        let raw = build(
            vec![
                sediment("Erosion", 4.0, 0.0, -60.0, 1),
                sediment("B", 5.0, 4.0, 20.0, 1),
                sediment("Gone", 6.0, 5.0, 0.0, 1),
                sediment("A", 10.0, 6.0, 100.0, 1),
            ],
            &EngineConfig::default(),
        );
        assert_eq!(raw.eroded_thickness[0], 60.0);
        assert_eq!(raw.histories[1].present_day_eroded_thickness, 0.0);
        assert!(raw.histories[2].segments[0].is_empty());
        assert_abs_diff_eq!(raw.histories[3].present_day_eroded_thickness, 60.0, epsilon = 1e-12);

        // B is removed over the first third of the erosion window
        let b = &raw.histories[1].segments[0].solid;
        assert_abs_diff_eq!(b.youngest().unwrap().age, 4.0 - 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mobile_erosion_is_reported_and_leaves_layer_alone() {
        let salt = Layer::new(
            "Salt",
            LayerKind::Mobile { paleo_thickness: vec![] },
            12.0,
            10.0,
            GridMap::constant(1, 1, 200.0),
            LithologyProfile::incompressible("salt", 2160.0),
        );
        let raw = build(
            vec![sediment("Erosion", 5.0, 2.0, -30.0, 1), sediment("A", 10.0, 5.0, 10.0, 1), salt],
            &EngineConfig::default(),
        );

        assert_eq!(raw.eroded_thickness[0], 10.0);
        assert_eq!(raw.diagnostics.len(), 1);
        assert_eq!(raw.diagnostics[0].layer, "Salt");
        assert!(matches!(
            raw.diagnostics[0].error,
            ValidationError::MobileLayerErosion { requested, .. } if (requested - 20.0).abs() < 1e-12
        ));
        assert!(!raw.histories[2].succeeded);
        assert_eq!(raw.histories[2].segments[0].solid.len(), 1);
        assert_eq!(raw.histories[2].present_day_eroded_thickness, 200.0);
    }

    #[test]
    fn test_erosion_within_mobile_tolerance_is_accepted() {
        let salt = Layer::new(
            "Salt",
            LayerKind::Mobile { paleo_thickness: vec![] },
            12.0,
            10.0,
            GridMap::constant(1, 1, 200.0),
            LithologyProfile::incompressible("salt", 2160.0),
        );
        let raw = build(
            vec![sediment("Erosion", 5.0, 2.0, -10.005, 1), sediment("A", 10.0, 5.0, 10.0, 1), salt],
            &EngineConfig::default(),
        );

        assert!(raw.diagnostics.is_empty());
        assert!(raw.histories.iter().all(|h| h.succeeded));
        assert_eq!(raw.eroded_thickness[0], 10.0);
        assert_eq!(raw.histories[1].present_day_eroded_thickness, 0.0);
    }

    #[test]
    fn test_erosion_past_the_stack_is_reported_on_eroding_layer() {
        let raw = build(
            vec![sediment("Erosion", 5.0, 2.0, -30.0, 1), sediment("A", 10.0, 5.0, 10.0, 1)],
            &EngineConfig::default(),
        );

        assert_eq!(raw.eroded_thickness[0], 10.0);
        assert_eq!(raw.diagnostics.len(), 1);
        assert_eq!(raw.diagnostics[0].layer, "Erosion");
        assert!(matches!(
            raw.diagnostics[0].error,
            ValidationError::ErosionBeyondStack { remaining, .. } if (remaining - 20.0).abs() < 1e-12
        ));
        assert!(!raw.histories[0].succeeded);
    }

    #[test]
    fn test_crust_sources_follow_bottom_boundary() {
        let table = |values: &[(f64, f64)]| -> Vec<PaleoThickness> {
            values
                .iter()
                .map(|&(age, t)| PaleoThickness {
                    age_ma: age,
                    thickness: GridMap::constant(1, 1, t),
                })
                .collect()
        };
        let crust = Layer::new(
            "Crust",
            LayerKind::Crust {
                paleo_thickness: table(&[(0.0, 30000.0), (100.0, 40000.0)]),
                effective_thickness: table(&[(0.0, 25000.0), (50.0, 28000.0), (100.0, 32000.0)]),
            },
            300.0,
            300.0,
            GridMap::constant(1, 1, 31000.0),
            LithologyProfile::incompressible("granite", 2700.0),
        )
        .with_segments(2);

        let fixed_temperature = build(vec![crust.clone()], &EngineConfig::default());
        let f = &fixed_temperature.histories[0].segments[1].solid;
        assert_eq!(f.len(), 2);
        assert_eq!(f.evaluate(100.0), 20000.0);

        let alc = EngineConfig {
            bottom_boundary: BottomBoundary::AdvancedLithosphereCalculator,
            ..EngineConfig::default()
        };
        let raw = build(vec![crust.clone()], &alc);
        assert_eq!(raw.histories[0].segments[0].solid.len(), 3);
        assert_eq!(raw.histories[0].present_day_eroded_thickness, 25000.0);

        let heat_flow = EngineConfig {
            bottom_boundary: BottomBoundary::FixedHeatFlow,
            ..EngineConfig::default()
        };
        let raw = build(vec![crust], &heat_flow);
        assert_eq!(raw.histories[0].segments[0].solid.len(), 1);
        assert_eq!(raw.histories[0].present_day_eroded_thickness, 31000.0);
    }

    #[test]
    fn test_slightly_negative_mobile_thickness_is_clamped() {
        let salt = |t: f64| {
            Layer::new(
                "Salt",
                LayerKind::Mobile {
                    paleo_thickness: vec![PaleoThickness {
                        age_ma: 20.0,
                        thickness: GridMap::constant(1, 1, 400.0),
                    }],
                },
                30.0,
                25.0,
                GridMap::constant(1, 1, t),
                LithologyProfile::incompressible("salt", 2160.0),
            )
            .with_segments(2)
        };

        let raw = build(vec![salt(-0.01)], &EngineConfig::default());
        assert!(raw.diagnostics.is_empty());
        assert_eq!(raw.histories[0].segments[0].solid.evaluate(0.0), 0.0);
        assert_eq!(raw.histories[0].segments[0].solid.evaluate(20.0), 200.0);

        let raw = build(vec![salt(-5.0)], &EngineConfig::default());
        assert_eq!(raw.diagnostics.len(), 1);
        assert_eq!(raw.histories[0].segments[1].solid.evaluate(0.0), -2.5);
    }
}

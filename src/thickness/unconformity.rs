use crate::config::EngineConfig;
use crate::constants::{ACCELERATION_DUE_TO_GRAVITY, thickness_tolerance};
use crate::error::{CompactionError, ThicknessError};
use crate::layer::{Layer, LayerKind, LayerStack};
use crate::lithology::{CompactionLaw, density_difference};
use crate::thickness::segment::LayerColumnHistory;
use crate::time_function::{PiecewiseTimeFunction, TimePoint};

/// An erosion event whose removed thickness has not yet been matched by the
/// layers below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnconformityFrame {
    pub max_ves: f64,
    pub remaining_thickness: f64,
    pub initial_thickness: f64,
}

impl UnconformityFrame {
    fn new(thickness: f64) -> Self {
        Self {
            max_ves: 0.0,
            remaining_thickness: thickness,
            initial_thickness: thickness,
        }
    }
}

/// Open erosion events of one column, most recently opened on top.
///
/// The base frame stands for the whole column below the last unconformity; it
/// is never consumed or popped.
#[derive(Debug, Clone)]
pub struct UnconformityStack {
    base: UnconformityFrame,
    frames: Vec<UnconformityFrame>,
    tolerance: f64,
}

impl UnconformityStack {
    pub fn new(tolerance: f64) -> Self {
        Self {
            base: UnconformityFrame::new(f64::INFINITY),
            frames: Vec::new(),
            tolerance,
        }
    }

    pub fn push_erosion(&mut self, thickness: f64) {
        self.frames.push(UnconformityFrame::new(thickness));
    }

    pub fn top(&self) -> &UnconformityFrame {
        self.frames.last().unwrap_or(&self.base)
    }

    pub fn top_mut(&mut self) -> &mut UnconformityFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.base,
        }
    }

    pub fn open_unconformities(&self) -> usize {
        self.frames.len()
    }

    /// Matches eroded material against the open frames, top first.
    ///
    /// An exhausted frame is popped and its max VES carried into its parent.
    pub fn consume(&mut self, thickness: f64) {
        let mut left = thickness;
        while left > 0.0 {
            let Some(top) = self.frames.last_mut() else {
                break;
            };
            let taken = top.remaining_thickness.min(left);
            top.remaining_thickness -= taken;
            left -= taken;

            if top.remaining_thickness < thickness_tolerance(self.tolerance, top.initial_thickness) {
                let popped = *top;
                self.frames.pop();
                let parent = self.top_mut();
                parent.max_ves = parent.max_ves.max(popped.max_ves);
                tracing::trace!(max_ves = parent.max_ves, "unconformity closed");
            }
        }
    }

    /// Every erosion event must have been matched by the end of a column.
    pub fn finish(self, i: usize, j: usize) -> Result<(), ThicknessError> {
        if self.frames.is_empty() {
            return Ok(());
        }
        Err(ThicknessError::UnbalancedUnconformities {
            i,
            j,
            open: self.frames.len(),
            remaining: self.frames.iter().map(|f| f.remaining_thickness).sum(),
        })
    }
}

/// One erosion found in a segment's solid thickness history.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ErosionEvent {
    plateau_start_age: f64,
    erosion_start_age: f64,
    thickness: f64,
}

/// A segment history split into the material that was later eroded and the
/// material that survives.
#[derive(Debug, Clone, PartialEq)]
struct DepositionScan {
    deposition_start_age: f64,
    deposition_end_age: f64,
    erosions: Vec<ErosionEvent>,
    final_age: f64,
    surviving_thickness: f64,
}

/// Walks the points oldest to youngest. After the deposition ramp, each
/// erosion is either a plateau followed by a drop or a drop straight away.
fn scan_deposition_events(points: &[TimePoint]) -> Option<DepositionScan> {
    if points.len() < 2 || points[0].value != 0.0 {
        return None;
    }

    let mut erosions = Vec::new();
    let mut end_of_event = 1;
    let mut cursor = 1;

    loop {
        cursor += 1;
        if cursor >= points.len() {
            break;
        }
        let end_of_previous = end_of_event;
        let start_of_erosion = if points[end_of_previous].value == points[cursor].value {
            let plateau_end = cursor;
            cursor += 1;
            if cursor >= points.len() {
                // plateau with no drop after it
                return None;
            }
            plateau_end
        } else {
            end_of_previous
        };
        end_of_event = cursor;

        erosions.push(ErosionEvent {
            plateau_start_age: points[end_of_previous].age,
            erosion_start_age: points[start_of_erosion].age,
            thickness: points[start_of_erosion].value - points[end_of_event].value,
        });
    }

    Some(DepositionScan {
        deposition_start_age: points[0].age,
        deposition_end_age: points[1].age,
        erosions,
        final_age: points[end_of_event].age,
        surviving_thickness: points[end_of_event].value,
    })
}

/// Loads the frame with a mobile layer or intrusion, segments bottom to top.
pub(crate) fn update_mobile_or_intrusion_max_ves(layer: &Layer, history: &LayerColumnHistory, max_ves: &mut f64) {
    let lithology = &layer.lithology;
    let lithology_density = lithology.density_kg_m3();

    for segment in history.segments.iter().rev() {
        if segment.is_empty() {
            continue;
        }
        let (segment_thickness, _) = segment.solid.max_y();

        let difference = match layer.fluid {
            Some(fluid) => {
                let difference = lithology_density - fluid.density_kg_m3;
                if difference <= 0.0 && fluid.permafrost_enabled {
                    // frozen pore fluid: load with the matrix alone and stop here
                    *max_ves += ACCELERATION_DUE_TO_GRAVITY
                        * lithology_density
                        * segment_thickness
                        * (1.0 - lithology.surface_porosity());
                    return;
                }
                difference.max(0.0)
            }
            None => lithology_density,
        };
        *max_ves += ACCELERATION_DUE_TO_GRAVITY * difference * segment_thickness;
    }
}

struct CompactionContext<'a> {
    layer: &'a Layer,
    density_difference: f64,
    overpressured: bool,
    i: usize,
    j: usize,
}

impl CompactionContext<'_> {
    /// FCT of a raw increment; loads the frame with it.
    fn full_compacted_thickness(&self, max_ves: &mut f64, thickness: f64) -> Result<f64, ThicknessError> {
        let fct = self
            .layer
            .lithology
            .full_compacted_thickness(*max_ves, thickness, self.density_difference, self.overpressured)
            .map_err(|source| self.error(source))?;
        *max_ves += ACCELERATION_DUE_TO_GRAVITY * self.density_difference * fct;
        Ok(fct)
    }

    fn error(&self, source: CompactionError) -> ThicknessError {
        ThicknessError::Compaction {
            layer: self.layer.name.clone(),
            i: self.i,
            j: self.j,
            source,
        }
    }
}

/// Replaces each segment's raw solid history with full-compacted thickness and
/// retimes the deposition ramps in proportion to it.
pub(crate) fn compact_layer(
    layer: &Layer,
    history: &mut LayerColumnHistory,
    unconformities: &mut UnconformityStack,
    config: &EngineConfig,
    i: usize,
    j: usize,
) -> Result<(), ThicknessError> {
    let context = CompactionContext {
        layer,
        density_difference: density_difference(&layer.lithology, layer.fluid.as_ref()),
        overpressured: config.overpressure_calculation,
        i,
        j,
    };

    let mut total_fct = 0.0;
    let mut start_age: f64 = 0.0;
    let mut end_age: f64 = f64::INFINITY;

    for (segment_index, segment) in history.segments.iter_mut().enumerate().rev() {
        let mut raw = PiecewiseTimeFunction::new();
        segment.solid.swap(&mut raw);

        let scan = scan_deposition_events(raw.points()).ok_or_else(|| ThicknessError::MalformedHistory {
            layer: layer.name.clone(),
            i,
            j,
            segment: segment_index,
        })?;
        start_age = start_age.max(scan.deposition_start_age);
        end_age = end_age.min(scan.deposition_end_age);

        let compacted = &mut segment.solid;
        for erosion in &scan.erosions {
            compacted.add_point(erosion.plateau_start_age, 0.0);
            compacted.add_point(erosion.erosion_start_age, 0.0);

            let fct = context.full_compacted_thickness(&mut unconformities.top_mut().max_ves, erosion.thickness)?;
            total_fct += fct;
            // points go in at zero, then everything laid down so far is lifted
            compacted.raise_by(fct);

            unconformities.consume(erosion.thickness);
        }

        compacted.add_point(scan.final_age, 0.0);
        let fct = context.full_compacted_thickness(&mut unconformities.top_mut().max_ves, scan.surviving_thickness)?;
        total_fct += fct;
        compacted.raise_by(fct);
        // instantaneous deposition shares its start age with the top of the ramp
        compacted.add_point_oldest_side(scan.deposition_start_age, 0.0);
    }

    if total_fct <= config.thickness_tolerance {
        return Ok(());
    }

    // top segment takes the youngest slice of the deposition window
    let mut remaining_fct = total_fct;
    for segment in history.segments.iter_mut().rev() {
        let segment_fct = segment.solid.points()[1].value;
        let share = if remaining_fct > 0.0 { segment_fct / remaining_fct } else { 0.0 };
        let segment_start_age = end_age - (end_age - start_age) * share;

        segment.solid.retime_deposition(segment_start_age, end_age);

        end_age = segment_start_age;
        remaining_fct -= segment_fct;
    }
    Ok(())
}

/// Second pass over a column: sediment layers from the top down.
pub(crate) fn account_for_compaction(
    stack: &LayerStack,
    config: &EngineConfig,
    histories: &mut [LayerColumnHistory],
    eroded_thickness: &[f64],
    i: usize,
    j: usize,
) -> Result<(), ThicknessError> {
    let mut unconformities = UnconformityStack::new(config.thickness_tolerance);
    compact_column(stack, config, histories, eroded_thickness, &mut unconformities, i, j)?;
    unconformities.finish(i, j)
}

fn compact_column(
    stack: &LayerStack,
    config: &EngineConfig,
    histories: &mut [LayerColumnHistory],
    eroded_thickness: &[f64],
    unconformities: &mut UnconformityStack,
    i: usize,
    j: usize,
) -> Result<(), ThicknessError> {
    for (index, layer) in stack.layers.iter().enumerate() {
        match layer.kind {
            LayerKind::Mobile { .. } | LayerKind::IgneousIntrusion { .. } => {
                update_mobile_or_intrusion_max_ves(layer, &histories[index], &mut unconformities.top_mut().max_ves);
            }
            LayerKind::Sediment => {
                let thickness = layer.input_thickness_at(i, j);
                let eps = thickness_tolerance(config.thickness_tolerance, thickness);
                if thickness > eps {
                    compact_layer(layer, &mut histories[index], unconformities, config, i, j)?;
                } else if thickness < -eps {
                    let eroded = eroded_thickness[index];
                    if eroded > thickness_tolerance(config.thickness_tolerance, eroded) {
                        unconformities.push_erosion(eroded);
                    }
                }
            }
            LayerKind::Crust { .. } | LayerKind::Mantle { .. } => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridMap;
    use crate::lithology::{FluidProfile, LithologyProfile};
    use approx::assert_abs_diff_eq;

    fn points(pairs: &[(f64, f64)]) -> Vec<TimePoint> {
        pairs.iter().map(|&(age, value)| TimePoint::new(age, value)).collect()
    }

    #[test]
    fn test_stack_pops_and_merges_max_ves() {
        let mut stack = UnconformityStack::new(1e-8);
        stack.top_mut().max_ves = 5.0e6;
        stack.push_erosion(40.0);
        stack.top_mut().max_ves = 8.0e6;
        stack.push_erosion(10.0);
        stack.top_mut().max_ves = 2.0e6;
        assert_eq!(stack.open_unconformities(), 2);

        // finishes the 10 m frame and eats 5 m of the next one
        stack.consume(15.0);
        assert_eq!(stack.open_unconformities(), 1);
        assert_eq!(stack.top().max_ves, 8.0e6);
        assert_eq!(stack.top().remaining_thickness, 35.0);

        stack.consume(35.0);
        assert_eq!(stack.open_unconformities(), 0);
        assert_eq!(stack.top().max_ves, 8.0e6);
        assert!(stack.finish(0, 0).is_ok());
    }

    #[test]
    fn test_unbalanced_stack_is_an_error() {
        let mut stack = UnconformityStack::new(1e-8);
        stack.push_erosion(40.0);
        stack.consume(25.0);
        match stack.finish(3, 4) {
            Err(ThicknessError::UnbalancedUnconformities { i, j, open, remaining }) => {
                assert_eq!((i, j, open), (3, 4, 1));
                assert_abs_diff_eq!(remaining, 15.0, epsilon = 1e-12);
            }
            other => panic!("expected unbalanced stack, got {:?}", other),
        }
    }

    #[test]
    fn test_base_frame_absorbs_excess() {
        let mut stack = UnconformityStack::new(1e-8);
        stack.consume(100.0);
        assert_eq!(stack.top().remaining_thickness, f64::INFINITY);
        assert!(stack.finish(0, 0).is_ok());
    }

    #[test]
    fn test_scan_simple_deposition() {
        let scan = scan_deposition_events(&points(&[(10.0, 0.0), (5.0, 50.0)])).unwrap();
        assert!(scan.erosions.is_empty());
        assert_eq!(scan.final_age, 5.0);
        assert_eq!(scan.surviving_thickness, 50.0);
    }

    #[test]
    fn test_scan_plateau_then_two_erosions() {
        let scan = scan_deposition_events(&points(&[
            (10.0, 0.0),
            (5.0, 100.0),
            (4.0, 100.0),
            (3.0, 60.0),
            (2.0, 60.0),
            (1.0, 20.0),
        ]))
        .unwrap();
        assert_eq!(
            scan.erosions,
            vec![
                ErosionEvent {
                    plateau_start_age: 5.0,
                    erosion_start_age: 4.0,
                    thickness: 40.0
                },
                ErosionEvent {
                    plateau_start_age: 3.0,
                    erosion_start_age: 2.0,
                    thickness: 40.0
                },
            ]
        );
        assert_eq!(scan.final_age, 1.0);
        assert_eq!(scan.surviving_thickness, 20.0);
    }

    #[test]
    fn test_scan_immediate_erosion() {
        let scan = scan_deposition_events(&points(&[(10.0, 0.0), (5.0, 100.0), (2.0, 60.0)])).unwrap();
        assert_eq!(
            scan.erosions,
            vec![ErosionEvent {
                plateau_start_age: 5.0,
                erosion_start_age: 5.0,
                thickness: 40.0
            }]
        );
        assert_eq!(scan.surviving_thickness, 60.0);
    }

    #[test]
    fn test_scan_rejects_malformed_histories() {
        assert!(scan_deposition_events(&points(&[(0.0, 12.0)])).is_none());
        assert!(scan_deposition_events(&points(&[(10.0, 5.0), (5.0, 50.0)])).is_none());
        assert!(scan_deposition_events(&points(&[(10.0, 0.0), (5.0, 50.0), (3.0, 50.0)])).is_none());
    }

    fn salt_layer(fluid: Option<FluidProfile>, density: f64) -> Layer {
        let mut layer = Layer::new(
            "Salt",
            LayerKind::Mobile { paleo_thickness: vec![] },
            20.0,
            15.0,
            GridMap::constant(1, 1, 200.0),
            LithologyProfile::exponential("salt", density, 0.1, 0.0),
        )
        .with_segments(2);
        layer.fluid = fluid;
        layer
    }

    #[test]
    fn test_mobile_layer_loads_frame() {
        let layer = salt_layer(Some(FluidProfile::fresh_water()), 2200.0);
        let mut history = LayerColumnHistory::new(2);
        history.add_point_to_all(0.0, 100.0);

        let mut max_ves = 0.0;
        update_mobile_or_intrusion_max_ves(&layer, &history, &mut max_ves);
        assert_abs_diff_eq!(max_ves, 2.0 * 9.81 * 1200.0 * 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_permafrost_stops_after_first_segment() {
        let fluid = FluidProfile {
            density_kg_m3: 2300.0,
            permafrost_enabled: true,
        };
        let layer = salt_layer(Some(fluid), 2200.0);
        let mut history = LayerColumnHistory::new(2);
        history.add_point_to_all(0.0, 100.0);

        let mut max_ves = 1.0e6;
        update_mobile_or_intrusion_max_ves(&layer, &history, &mut max_ves);
        assert_abs_diff_eq!(max_ves, 1.0e6 + 9.81 * 2200.0 * 100.0 * 0.9, epsilon = 1e-6);

        // without permafrost the light rock adds nothing
        let layer = salt_layer(Some(FluidProfile { permafrost_enabled: false, ..fluid }), 2200.0);
        let mut max_ves = 1.0e6;
        update_mobile_or_intrusion_max_ves(&layer, &history, &mut max_ves);
        assert_eq!(max_ves, 1.0e6);
    }

    fn shale_column() -> (LayerStack, Vec<LayerColumnHistory>, Vec<f64>) {
        let shale = crate::lithology::get_profile(crate::lithology::LithologyType::Shale)
            .unwrap()
            .clone();
        let stack = LayerStack::new(
            crate::grid::Grid::all_valid(1, 1),
            vec![
                Layer::new("Erosion", LayerKind::Sediment, 5.0, 2.0, GridMap::constant(1, 1, -40.0), shale.clone()),
                Layer::new("A", LayerKind::Sediment, 10.0, 5.0, GridMap::constant(1, 1, 100.0), shale).with_segments(2),
            ],
        );
        let mut a = LayerColumnHistory::new(2);
        a.segments[0].add_point(10.0, 0.0);
        a.segments[0].add_point(7.5, 50.0);
        a.segments[1].add_point(7.5, 0.0);
        a.segments[1].add_point(5.0, 50.0);
        a.segments[1].add_point(2.0, 10.0);
        (stack, vec![LayerColumnHistory::new(1), a], vec![40.0, 0.0])
    }

    #[test]
    fn test_erosion_frame_is_pushed_then_closed() {
        let (stack, mut histories, eroded) = shale_column();
        let config = EngineConfig::default();

        // erosion layer alone leaves its frame open
        let erosion_only = LayerStack::new(stack.grid.clone(), stack.layers[..1].to_vec());
        let mut unconformities = UnconformityStack::new(config.thickness_tolerance);
        compact_column(&erosion_only, &config, &mut histories[..1], &eroded[..1], &mut unconformities, 0, 0).unwrap();
        assert_eq!(unconformities.open_unconformities(), 1);
        assert_eq!(unconformities.top().remaining_thickness, 40.0);
        assert_eq!(unconformities.top().max_ves, 0.0);

        let mut unconformities = UnconformityStack::new(config.thickness_tolerance);
        compact_column(&stack, &config, &mut histories, &eroded, &mut unconformities, 0, 0).unwrap();
        assert_eq!(unconformities.open_unconformities(), 0);

        // base frame carries the load of every chunk of A, eroded one included
        let total_fct = 32.268034876092536;
        crate::assert_deviation!(unconformities.top().max_ves, 9.81 * 2680.0 * total_fct, 1e-8);
        assert!(unconformities.finish(0, 0).is_ok());
    }

    #[test]
    fn test_compact_incompressible_layer_retimes_evenly() {
        let layer = Layer::new(
            "A",
            LayerKind::Sediment,
            10.0,
            0.0,
            GridMap::constant(1, 1, 100.0),
            LithologyProfile::incompressible("rock", 2500.0),
        )
        .with_segments(2);
        let mut history = LayerColumnHistory::new(2);
        history.segments[0].add_point(10.0, 0.0);
        history.segments[0].add_point(5.0, 50.0);
        history.segments[1].add_point(5.0, 0.0);
        history.segments[1].add_point(0.0, 50.0);

        let mut stack = UnconformityStack::new(1e-8);
        compact_layer(&layer, &mut history, &mut stack, &EngineConfig::default(), 0, 0).unwrap();

        let bottom = history.segments[0].solid.points().to_vec();
        let top = history.segments[1].solid.points().to_vec();
        assert_eq!(bottom.len(), 2);
        assert_abs_diff_eq!(bottom[0].age, 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bottom[1].age, 5.0, epsilon = 1e-12);
        assert_eq!(bottom[1].value, 50.0);
        assert_abs_diff_eq!(top[0].age, 5.0, epsilon = 1e-12);
        assert_eq!(top[1], TimePoint::new(0.0, 50.0));

        // dry rock loads the frame with its full density
        assert_abs_diff_eq!(stack.top().max_ves, 9.81 * 2500.0 * 100.0, epsilon = 1e-6);
    }
}

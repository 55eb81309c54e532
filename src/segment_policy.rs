// src/segment_policy.rs - Number of segments per layer from element heights

use crate::config::ElementHeights;
use crate::grid::{ColumnValidity, GridMap};
use crate::layer::{Layer, LayerKind, LayerStack};

/// One line of the segment table.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTableRow {
    pub name: String,
    /// Top-surface age; `None` for the mantle.
    pub deposition_age_ma: Option<f64>,
    pub min_thickness: f64,
    pub max_thickness: f64,
    pub element_height: f64,
    pub segments: usize,
}

fn thickness_maps(layer: &Layer) -> Vec<&GridMap> {
    let mut maps = vec![&layer.input_thickness];
    match &layer.kind {
        LayerKind::Mobile { paleo_thickness } | LayerKind::Mantle { paleo_thickness } => {
            maps.extend(paleo_thickness.iter().map(|p| &p.thickness));
        }
        LayerKind::Crust {
            paleo_thickness,
            effective_thickness,
        } => {
            maps.extend(paleo_thickness.iter().map(|p| &p.thickness));
            maps.extend(effective_thickness.iter().map(|p| &p.thickness));
        }
        LayerKind::Sediment | LayerKind::IgneousIntrusion { .. } => {}
    }
    maps
}

/// Minimum and maximum thickness of a layer over the valid columns, paleo
/// tables included.
pub fn thickness_range<V: ColumnValidity + ?Sized>(layer: &Layer, validity: &V) -> Option<(f64, f64)> {
    thickness_maps(layer)
        .into_iter()
        .filter_map(|map| map.min_max(validity))
        .reduce(|(lo, hi), (map_lo, map_hi)| (lo.min(map_lo), hi.max(map_hi)))
}

pub fn element_height(layer: &Layer, heights: &ElementHeights) -> f64 {
    match layer.kind {
        LayerKind::Crust { .. } => heights.crust,
        LayerKind::Mantle { .. } => heights.mantle,
        _ => heights.sediment / layer.depth_refinement_factor,
    }
}

/// `max(1, ceil(max_thickness / element_height))`
pub fn segment_count(max_thickness: f64, element_height: f64) -> usize {
    if !(max_thickness > 0.0) || !(element_height > 0.0) {
        return 1;
    }
    ((max_thickness / element_height).ceil() as usize).max(1)
}

/// Sets `segment_count` on every layer from the thickness over the stack's
/// valid columns and returns the table describing the result.
pub fn assign_segment_counts(stack: &mut LayerStack, heights: &ElementHeights) -> Vec<SegmentTableRow> {
    let grid = &stack.grid;
    let mut rows = Vec::with_capacity(stack.layers.len());

    for layer in &mut stack.layers {
        let (min_thickness, max_thickness) = thickness_range(layer, grid).unwrap_or((0.0, 0.0));
        let height = element_height(layer, heights);
        let segments = segment_count(max_thickness, height);
        layer.segment_count = segments;

        tracing::debug!(
            layer = %layer.name,
            min_thickness,
            max_thickness,
            element_height = height,
            segments,
            "segment count assigned"
        );

        rows.push(SegmentTableRow {
            name: layer.name.clone(),
            deposition_age_ma: match layer.kind {
                LayerKind::Mantle { .. } => None,
                _ => Some(layer.deposition_end_ma),
            },
            min_thickness,
            max_thickness,
            element_height: height,
            segments,
        });
    }
    rows
}

pub fn total_segments(rows: &[SegmentTableRow]) -> usize {
    rows.iter().map(|r| r.segments).sum()
}

/// Print the segment table
pub fn print_segment_table(rows: &[SegmentTableRow]) {
    println!();
    println!("📏 ------------------------- Number of Segments --------------------------");
    println!(
        "{:>20} {:>10} {:>14} {:>14} {:>23} {:>9}",
        "LayerName", "(Depo)Age", "Min.Thickness", "Max.Thickness", "Effective Max. Elem. Hgt.", "Nb.Seg"
    );
    println!();
    for row in rows {
        let age = match row.deposition_age_ma {
            Some(age) => format!("{:.1}", age),
            None => "-1".to_string(),
        };
        println!(
            "{:>20} {:>10} {:>14.2} {:>14.2} {:>23.2} {:>9}",
            row.name, age, row.min_thickness, row.max_thickness, row.element_height, row.segments
        );
    }
    println!("{:>98}", "-------------------");
    println!("{:>88} {:>9}", "Total", total_segments(rows));
    println!("   ------------------------------------------------------------------------------------------");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::layer::PaleoThickness;
    use crate::lithology::{LithologyType, get_profile};

    fn profile(kind: LithologyType) -> crate::lithology::LithologyProfile {
        get_profile(kind).unwrap().clone()
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count(250.0, 100.0), 3);
        assert_eq!(segment_count(200.0, 100.0), 2);
        assert_eq!(segment_count(10.0, 100.0), 1);
        assert_eq!(segment_count(-40.0, 100.0), 1);
        assert_eq!(segment_count(0.0, 100.0), 1);
    }

    #[test]
    fn test_assign_segment_counts() {
        let mut grid = Grid::all_valid(2, 1);
        grid.mark_invalid(1, 0);

        let mut sediment = Layer::new(
            "Shale",
            LayerKind::Sediment,
            20.0,
            10.0,
            GridMap::new(2, 1, vec![450.0, 9000.0]).unwrap(),
            profile(LithologyType::Shale),
        );
        sediment.depth_refinement_factor = 2.0;

        let salt = Layer::new(
            "Salt",
            LayerKind::Mobile {
                paleo_thickness: vec![PaleoThickness {
                    age_ma: 30.0,
                    thickness: GridMap::new(2, 1, vec![720.0, 50.0]).unwrap(),
                }],
            },
            40.0,
            35.0,
            GridMap::new(2, 1, vec![300.0, 300.0]).unwrap(),
            profile(LithologyType::Salt),
        );

        let crust = Layer::new(
            "Crust",
            LayerKind::Crust {
                paleo_thickness: vec![],
                effective_thickness: vec![],
            },
            300.0,
            300.0,
            GridMap::constant(2, 1, 35000.0),
            profile(LithologyType::Granite),
        );

        let mantle = Layer::new(
            "Mantle",
            LayerKind::Mantle { paleo_thickness: vec![] },
            300.0,
            300.0,
            GridMap::constant(2, 1, 90000.0),
            profile(LithologyType::Peridotite),
        );

        let mut stack = LayerStack::new(grid, vec![sediment, salt, crust, mantle]);
        let rows = assign_segment_counts(&mut stack, &ElementHeights::default());

        // invalid column (1, 0) does not count
        assert_eq!(rows[0].max_thickness, 450.0);
        assert_eq!(rows[0].element_height, 50.0);
        assert_eq!(stack.layers[0].segment_count, 9);

        assert_eq!(rows[1].min_thickness, 300.0);
        assert_eq!(rows[1].max_thickness, 720.0);
        assert_eq!(stack.layers[1].segment_count, 8);

        assert_eq!(stack.layers[2].segment_count, 18);
        assert_eq!(stack.layers[3].segment_count, 9);
        assert_eq!(rows[3].deposition_age_ma, None);
        assert_eq!(total_segments(&rows), 9 + 8 + 18 + 9);

        print_segment_table(&rows);
    }
}

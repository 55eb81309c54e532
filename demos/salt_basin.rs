// Builds thickness histories for a small salt basin and prints the results.
//
// cargo run --example salt_basin

use burial_history::config::EngineConfig;
use burial_history::json_parser::JsonParser;
use burial_history::segment_policy::{assign_segment_counts, print_segment_table};
use burial_history::thickness::ThicknessHistoryEngine;

const BASIN_JSON: &str = r#"{
    "grid": {"nx": 3, "ny": 2, "valid": [true, true, true, true, false, true]},
    "layers": [
        {
            "name": "Pliocene",
            "kind": "sediment",
            "deposition_start_ma": 5.0,
            "deposition_end_ma": 0.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [350.0, 420.0, 510.0, 600.0, 0.0, 640.0]},
            "lithology": "shale",
            "fluid": {"density_kg_m3": 1035.0}
        },
        {
            "name": "Messinian Erosion",
            "kind": "sediment",
            "deposition_start_ma": 6.0,
            "deposition_end_ma": 5.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [-120.0, -80.0, -40.0, 0.0, 0.0, 0.0]},
            "lithology": "sandstone"
        },
        {
            "name": "Miocene Sands",
            "kind": "sediment",
            "deposition_start_ma": 20.0,
            "deposition_end_ma": 6.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [900.0, 1100.0, 1250.0, 1400.0, 0.0, 1500.0]},
            "lithology": "sandstone",
            "fluid": {"density_kg_m3": 1035.0}
        },
        {
            "name": "Triassic Salt",
            "kind": "mobile",
            "deposition_start_ma": 230.0,
            "deposition_end_ma": 220.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [800.0, 300.0, 50.0, 1200.0, 0.0, 20.0]},
            "lithology": "salt",
            "paleo_thickness": [
                {"age_ma": 220.0, "thickness": {"nx": 3, "ny": 2, "values": [500.0, 500.0, 500.0, 500.0, 0.0, 500.0]}},
                {"age_ma": 20.0, "thickness": {"nx": 3, "ny": 2, "values": [700.0, 400.0, 200.0, 900.0, 0.0, 150.0]}}
            ]
        },
        {
            "name": "Crust",
            "kind": "crust",
            "deposition_start_ma": 300.0,
            "deposition_end_ma": 300.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [32000.0, 32000.0, 33000.0, 34000.0, 0.0, 35000.0]},
            "lithology": "granite",
            "paleo_thickness": [
                {"age_ma": 0.0, "thickness": {"nx": 3, "ny": 2, "values": [32000.0, 32000.0, 33000.0, 34000.0, 0.0, 35000.0]}},
                {"age_ma": 250.0, "thickness": {"nx": 3, "ny": 2, "values": [38000.0, 38000.0, 38000.0, 38000.0, 0.0, 38000.0]}}
            ]
        },
        {
            "name": "Mantle",
            "kind": "mantle",
            "deposition_start_ma": 300.0,
            "deposition_end_ma": 300.0,
            "input_thickness": {"nx": 3, "ny": 2, "values": [90000.0, 90000.0, 90000.0, 90000.0, 0.0, 90000.0]},
            "lithology": "peridotite"
        }
    ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stack = JsonParser::layer_stack_from_str(BASIN_JSON)?;
    let config = EngineConfig::default();

    let rows = assign_segment_counts(&mut stack, &config.element_heights);
    print_segment_table(&rows);

    let engine = ThicknessHistoryEngine::new(config);
    let history = engine.build(&stack)?;
    history.report().print_report();

    let (i, j) = (0, 0);
    println!();
    println!("🔎 Column ({}, {})", i, j);
    for (index, name) in history.layer_names().iter().enumerate() {
        let Some(segments) = history.segment_count(index, i, j) else {
            continue;
        };
        let present: f64 = (0..segments)
            .filter_map(|k| history.solid_thickness(index, i, j, k))
            .map(|f| f.evaluate(0.0))
            .sum();
        println!(
            "   {:<20} {:>3} segments, solid thickness today {:>10.2} m (input {:>10.2} m)",
            name,
            segments,
            present,
            history.present_day_eroded_thickness(index, i, j).unwrap_or(0.0)
        );
    }

    let sands = stack.find_layer("Miocene Sands").unwrap_or(0);
    if let Some(top) = history.solid_thickness(sands, i, j, stack.layers[sands].segment_count - 1) {
        println!();
        println!("   Top Miocene segment through time:");
        for point in top.points() {
            println!("   {:>8.3} Ma  {:>10.3} m", point.age, point.value);
        }
    }

    Ok(())
}

use crate::config::EngineConfig;
use crate::error::ThicknessError;
use crate::grid::{ColumnValidity, GridMap};
use crate::layer::LayerStack;
use crate::thickness::builder::{RawColumn, SegmentHistoryBuilder};
use crate::thickness::diagnostics::{Diagnostic, ErrorBudget, LayerErrorCount};
use crate::thickness::segment::ColumnHistory;
use crate::thickness::unconformity::account_for_compaction;
use crate::time_function::PiecewiseTimeFunction;
use rayon::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of building a single column.
#[derive(Debug, Clone)]
pub struct ColumnOutcome {
    pub history: ColumnHistory,
    pub diagnostics: Vec<Diagnostic>,
}

/// Entry point of the thickness-history build.
///
/// Every valid column runs two passes: the segment histories are laid down
/// from the oldest layer up, then the sediment layers are compacted from the
/// youngest layer down against the stack of open unconformities. Columns are
/// independent and run on the rayon pool when `parallel` is set.
#[derive(Debug, Clone, Default)]
pub struct ThicknessHistoryEngine {
    config: EngineConfig,
}

impl ThicknessHistoryEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds one column whether or not it is marked valid.
    pub fn build_column(&self, stack: &LayerStack, i: usize, j: usize) -> Result<ColumnOutcome, ThicknessError> {
        if i >= stack.grid.nx || j >= stack.grid.ny {
            return Err(ThicknessError::ColumnOutOfRange { i, j });
        }
        self.check_inputs(stack)?;
        self.build_checked_column(stack, i, j)
    }

    fn check_inputs(&self, stack: &LayerStack) -> Result<(), ThicknessError> {
        self.config.validate()?;
        stack.validate()?;
        Ok(())
    }

    fn build_checked_column(&self, stack: &LayerStack, i: usize, j: usize) -> Result<ColumnOutcome, ThicknessError> {
        let RawColumn {
            mut histories,
            eroded_thickness,
            diagnostics,
        } = SegmentHistoryBuilder::new(stack, &self.config, i, j).build()?;

        account_for_compaction(stack, &self.config, &mut histories, &eroded_thickness, i, j)?;

        Ok(ColumnOutcome {
            history: ColumnHistory { i, j, layers: histories },
            diagnostics,
        })
    }

    /// Builds every valid column of the stack.
    ///
    /// The stack and the settings are validated first. Validation problems
    /// inside a column fail that column and are collected; a compaction
    /// failure or a structural defect aborts the whole build.
    pub fn build(&self, stack: &LayerStack) -> Result<ThicknessHistory, ThicknessError> {
        if let Err(e) = self.check_inputs(stack) {
            error!("thickness history build rejected: {}", e);
            return Err(e);
        }
        let started = Instant::now();
        let columns: Vec<(usize, usize)> = stack.grid.columns().collect();

        info!(
            columns = columns.len(),
            layers = stack.layers.len(),
            parallel = self.config.parallel,
            "building thickness histories"
        );

        let process = |&(i, j): &(usize, usize)| -> Option<Result<ColumnOutcome, ThicknessError>> {
            if !stack.grid.is_valid_column(i, j) {
                return None;
            }
            Some(self.build_checked_column(stack, i, j))
        };

        let outcomes: Vec<Option<Result<ColumnOutcome, ThicknessError>>> = if self.config.parallel {
            columns.par_iter().map(process).collect()
        } else {
            columns.iter().map(process).collect()
        };

        let mut column_histories = Vec::with_capacity(outcomes.len());
        let mut diagnostics = Vec::new();
        let mut columns_skipped = 0;
        let mut columns_failed = 0;

        // first fatal error in column order wins
        for outcome in outcomes {
            match outcome {
                None => {
                    columns_skipped += 1;
                    column_histories.push(None);
                }
                Some(Err(e)) => {
                    error!("thickness history build aborted: {}", e);
                    return Err(e);
                }
                Some(Ok(outcome)) => {
                    if !outcome.history.succeeded() {
                        columns_failed += 1;
                    }
                    diagnostics.extend(outcome.diagnostics);
                    column_histories.push(Some(outcome.history));
                }
            }
        }

        let layer_names: Vec<String> = stack.layers.iter().map(|l| l.name.clone()).collect();
        let mut budget = ErrorBudget::new(self.config.max_errors_per_layer, &layer_names);
        for diagnostic in &diagnostics {
            budget.record(diagnostic);
        }
        let layer_errors = budget.finish();

        let report = BuildReport {
            columns_total: columns.len(),
            columns_processed: columns.len() - columns_skipped,
            columns_skipped,
            columns_failed,
            layer_errors,
            elapsed: started.elapsed(),
        };

        if report.succeeded() {
            info!(
                processed = report.columns_processed,
                skipped = report.columns_skipped,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "thickness histories built"
            );
        } else {
            warn!(
                failed = report.columns_failed,
                diagnostics = diagnostics.len(),
                "thickness histories built with errors"
            );
        }

        Ok(ThicknessHistory {
            nx: stack.grid.nx,
            ny: stack.grid.ny,
            layer_names,
            sediment_layers: stack.layers.iter().map(|l| l.is_sediment()).collect(),
            columns: column_histories,
            diagnostics,
            report,
        })
    }
}

/// Segment histories of every layer at every column, plus the verdict of the
/// build that produced them.
#[derive(Debug, Clone)]
pub struct ThicknessHistory {
    nx: usize,
    ny: usize,
    layer_names: Vec<String>,
    sediment_layers: Vec<bool>,
    columns: Vec<Option<ColumnHistory>>,
    diagnostics: Vec<Diagnostic>,
    report: BuildReport,
}

impl ThicknessHistory {
    fn column(&self, i: usize, j: usize) -> Option<&ColumnHistory> {
        if i >= self.nx || j >= self.ny {
            return None;
        }
        self.columns[i * self.ny + j].as_ref()
    }

    fn segment_function(
        &self,
        layer: usize,
        i: usize,
        j: usize,
        segment: usize,
        real: bool,
    ) -> Option<&PiecewiseTimeFunction> {
        let segment = self.column(i, j)?.layers.get(layer)?.segments.get(segment)?;
        let function = if real { &segment.real } else { &segment.solid };
        if function.is_empty() { None } else { Some(function) }
    }

    /// Compacted thickness of a segment; `None` for skipped columns and
    /// segments that never received material.
    pub fn solid_thickness(&self, layer: usize, i: usize, j: usize, segment: usize) -> Option<&PiecewiseTimeFunction> {
        self.segment_function(layer, i, j, segment, false)
    }

    pub fn real_thickness(&self, layer: usize, i: usize, j: usize, segment: usize) -> Option<&PiecewiseTimeFunction> {
        self.segment_function(layer, i, j, segment, true)
    }

    pub fn segment_count(&self, layer: usize, i: usize, j: usize) -> Option<usize> {
        Some(self.column(i, j)?.layers.get(layer)?.segment_count())
    }

    pub fn present_day_eroded_thickness(&self, layer: usize, i: usize, j: usize) -> Option<f64> {
        Some(self.column(i, j)?.layers.get(layer)?.present_day_eroded_thickness)
    }

    /// Skipped columns count as succeeded.
    pub fn column_succeeded(&self, i: usize, j: usize) -> bool {
        self.column(i, j).is_none_or(|c| c.succeeded())
    }

    pub fn layer_succeeded(&self, layer: usize, i: usize, j: usize) -> bool {
        self.column(i, j)
            .and_then(|c| c.layers.get(layer))
            .is_none_or(|l| l.succeeded)
    }

    pub fn succeeded(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    /// Scales every solid thickness function of a sediment layer by a
    /// per-column correction factor. Basement layers are left untouched.
    pub fn apply_fct_corrections(&mut self, layer: usize, corrections: &GridMap) -> Result<(), ThicknessError> {
        let is_sediment = *self
            .sediment_layers
            .get(layer)
            .ok_or(ThicknessError::LayerIndexOutOfRange(layer))?;
        corrections.check_dimensions(self.nx, self.ny)?;
        if !is_sediment {
            debug!(layer = %self.layer_names[layer], "no FCT correction for basement layers");
            return Ok(());
        }

        for column in self.columns.iter_mut().flatten() {
            let factor = corrections.value(column.i, column.j);
            for segment in &mut column.layers[layer].segments {
                if !segment.solid.is_empty() {
                    segment.solid.scale_by(factor);
                }
            }
        }
        Ok(())
    }
}

/// Summary of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub columns_total: usize,
    pub columns_processed: usize,
    pub columns_skipped: usize,
    pub columns_failed: usize,
    pub layer_errors: Vec<LayerErrorCount>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.columns_failed == 0
    }

    pub fn total_errors(&self) -> usize {
        self.layer_errors.iter().map(|c| c.reported + c.suppressed).sum()
    }

    /// Print the build summary
    pub fn print_report(&self) {
        println!();
        println!("🪨 Thickness history build");
        println!("   Columns: {} total, {} processed, {} skipped", self.columns_total, self.columns_processed, self.columns_skipped);
        println!("   Elapsed: {:.3} s", self.elapsed.as_secs_f64());

        if self.succeeded() {
            println!("   ✅ All columns succeeded");
            return;
        }

        println!("   ❌ {} columns failed, {} errors", self.columns_failed, self.total_errors());
        for count in self.layer_errors.iter().filter(|c| c.reported + c.suppressed > 0) {
            if count.suppressed > 0 {
                println!(
                    "   ⚠️  {:<20} {} errors ({} not logged)",
                    count.layer,
                    count.reported + count.suppressed,
                    count.suppressed
                );
            } else {
                println!("   ⚠️  {:<20} {} errors", count.layer, count.reported);
            }
        }
    }
}

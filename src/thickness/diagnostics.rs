use crate::error::ValidationError;

/// A validation failure at one layer and column.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub layer: String,
    pub layer_index: usize,
    pub i: usize,
    pub j: usize,
    pub error: ValidationError,
}

/// Reported and suppressed diagnostic counts for one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerErrorCount {
    pub layer: String,
    pub reported: usize,
    pub suppressed: usize,
}

/// Limits how many diagnostics per layer reach the log.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    max_per_layer: usize,
    counts: Vec<LayerErrorCount>,
}

impl ErrorBudget {
    pub fn new(max_per_layer: usize, layer_names: &[String]) -> Self {
        Self {
            max_per_layer,
            counts: layer_names
                .iter()
                .map(|name| LayerErrorCount {
                    layer: name.clone(),
                    ..LayerErrorCount::default()
                })
                .collect(),
        }
    }

    /// Logs the diagnostic if its layer still has budget left.
    /// Returns `true` when it was logged.
    pub fn record(&mut self, diagnostic: &Diagnostic) -> bool {
        let count = &mut self.counts[diagnostic.layer_index];
        if count.reported < self.max_per_layer {
            count.reported += 1;
            tracing::error!(
                layer = %diagnostic.layer,
                i = diagnostic.i,
                j = diagnostic.j,
                "{}",
                diagnostic.error
            );
            true
        } else {
            count.suppressed += 1;
            false
        }
    }

    /// One summary line per layer whose budget ran out.
    pub fn finish(self) -> Vec<LayerErrorCount> {
        for count in &self.counts {
            if count.suppressed > 0 {
                tracing::error!(
                    layer = %count.layer,
                    suppressed = count.suppressed,
                    "layer has more errors than reported"
                );
            }
        }
        self.counts
    }
}

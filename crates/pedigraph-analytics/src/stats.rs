use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use pedigraph_store::GraphStore;

use crate::cohort::cohort_dogs;
use crate::inbreeding::coefficient_of_inbreeding;

/// Inbreeding distribution over a breed cohort.
#[derive(Debug, Clone, Serialize)]
pub struct CoiStats {
    pub sample: usize,
    pub mean_percent: f64,
    pub max_percent: f64,
}

/// Compute the coefficient of inbreeding for every dog of the named
/// breeds and aggregate. Each worker opens its own read transaction, so
/// the computation parallelizes freely.
pub fn breed_inbreeding_stats(store: &GraphStore, breeds: &[String], generations: u32) -> CoiStats {
    let dogs = cohort_dogs(&store.read(), breeds);
    debug!(cohort = dogs.len(), generations, "computing inbreeding distribution");

    let coefficients: Vec<f64> = dogs
        .par_iter()
        .map(|&dog| coefficient_of_inbreeding(&store.read(), dog, generations))
        .collect();

    let sample = coefficients.len();
    let mean = if sample == 0 {
        0.0
    } else {
        coefficients.iter().sum::<f64>() / sample as f64
    };
    let max = coefficients.iter().copied().fold(0.0, f64::max);
    CoiStats {
        sample,
        mean_percent: mean * 100.0,
        max_percent: max * 100.0,
    }
}

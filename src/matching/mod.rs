use ndarray::{Array2, Axis};

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Squared Euclidean distance between two equally sized vectors.
#[inline]
pub fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// For every neuron, find the bank entry with the minimal squared
/// Euclidean distance and record both the distance and the entry index.
///
/// Distances stay squared; callers that need the Euclidean norm take the
/// square root. The bank scan is sequential per neuron with a strict `<`,
/// so ties resolve to the lowest bank index and the result does not depend
/// on the parallel schedule.
#[tracing::instrument(skip_all, name = "best_match")]
pub fn best_match(
    neurons: &Array2<f32>,
    bank: &Array2<f32>,
    min_dist: &mut [f32],
    best_rot: &mut [usize],
) {
    debug_assert_eq!(neurons.nrows(), min_dist.len());
    debug_assert_eq!(neurons.nrows(), best_rot.len());
    debug_assert_eq!(neurons.ncols(), bank.ncols());

    let scan = |neuron: ndarray::ArrayView1<'_, f32>, dist: &mut f32, rot: &mut usize| {
        let neuron = neuron.as_slice().expect("neuron row is contiguous");
        let mut best = f32::INFINITY;
        let mut best_index = 0usize;
        for (j, entry) in bank.axis_iter(Axis(0)).enumerate() {
            let entry = entry.as_slice().expect("bank row is contiguous");
            let d = squared_distance(neuron, entry);
            if d < best {
                best = d;
                best_index = j;
            }
        }
        *dist = best;
        *rot = best_index;
    };

    #[cfg(feature = "rayon")]
    {
        neurons
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(min_dist.par_iter_mut())
            .zip(best_rot.par_iter_mut())
            .for_each(|((neuron, dist), rot)| scan(neuron, dist, rot));
    }
    #[cfg(not(feature = "rayon"))]
    {
        neurons
            .axis_iter(Axis(0))
            .zip(min_dist.iter_mut())
            .zip(best_rot.iter_mut())
            .for_each(|((neuron, dist), rot)| scan(neuron, dist, rot));
    }
}

/// Index of the smallest entry, lowest index on ties.
pub fn argmin(values: &[f32]) -> usize {
    let mut best = f32::INFINITY;
    let mut best_index = 0usize;
    for (i, &v) in values.iter().enumerate() {
        if v < best {
            best = v;
            best_index = i;
        }
    }
    best_index
}

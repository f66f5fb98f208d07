/// Kneedle-style elbow detection, specialized to the convex decreasing
/// curves produced by sorting topic scores. Sensitivity is fixed at 1.0.
const SENSITIVITY: f64 = 1.0;

/// Index of the knee on a non-increasing curve, when one exists.
pub fn find_knee(values: &[f64]) -> Option<usize> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let y_max = values.iter().cloned().fold(f64::MIN, f64::max);
    let y_min = values.iter().cloned().fold(f64::MAX, f64::min);
    if y_max == y_min {
        return None;
    }

    let step = 1.0 / (n - 1) as f64;
    // Normalize, then flip vertically: a convex decreasing curve becomes
    // concave increasing, which the difference curve expects.
    let difference: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let y_transformed = 1.0 - (y - y_min) / (y_max - y_min);
            y_transformed - i as f64 * step
        })
        .collect();

    let is_maximum = |i: usize| {
        i > 0 && i < n - 1 && difference[i] >= difference[i - 1] && difference[i] >= difference[i + 1]
    };
    let is_minimum = |i: usize| {
        i > 0 && i < n - 1 && difference[i] <= difference[i - 1] && difference[i] <= difference[i + 1]
    };

    let first_maximum = (1..n - 1).find(|&i| is_maximum(i))?;

    let mut threshold = 0.0;
    let mut candidate = None;
    for i in first_maximum..n - 1 {
        if is_maximum(i) {
            threshold = difference[i] - SENSITIVITY * step;
            candidate = Some(i);
        } else if is_minimum(i) {
            threshold = 0.0;
        }
        if difference[i + 1] < threshold {
            return candidate;
        }
    }
    None
}

/// Score threshold for the ranked-topic selection: topics scoring at least
/// the returned value are retained.
///
/// The locator works on the plateau-stripped curve and retries from one
/// element further down whenever the knee lands on the first position. When
/// no knee can be determined the selection falls back to the first five
/// scores, widened to the whole top plateau when the fifth still equals the
/// maximum. Fewer than five scores are always retained in full.
pub fn score_cutoff(sorted_values: &[f64]) -> f64 {
    let Some(&first) = sorted_values.first() else {
        return 0.0;
    };
    if sorted_values.len() < 5 {
        return *sorted_values.last().unwrap();
    }

    let mut values = sorted_values.to_vec();
    loop {
        let plateau_end = values
            .iter()
            .position(|v| *v < values[0])
            .unwrap_or(values.len());
        if plateau_end > 1 {
            values.drain(..plateau_end - 1);
        }
        match find_knee(&values) {
            Some(knee) if knee > 0 => return values[knee],
            _ => {
                if values.len() <= 2 {
                    break;
                }
                values.remove(0);
            }
        }
    }

    if first == sorted_values[4] {
        first
    } else {
        sorted_values[4]
    }
}

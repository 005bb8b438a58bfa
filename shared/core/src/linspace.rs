/// `count` evenly spaced values over `[lo, hi]`, endpoints inclusive.
///
/// `count == 1` yields just `lo`, matching the degenerate case of a
/// single-point sweep axis.
pub fn linspace_f64(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (count - 1) as f64;
            (0..count).map(|i| lo + step * i as f64).collect()
        }
    }
}

/// Integer linspace: evenly spaced points truncated toward zero.
pub fn linspace_i64(lo: i64, hi: i64, count: usize) -> Vec<i64> {
    linspace_f64(lo as f64, hi as f64, count)
        .into_iter()
        .map(|x| x as i64)
        .collect()
}

/// Round to 4 decimal places. Sweep axes over floats are rounded so that
/// run configurations have stable, printable values.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

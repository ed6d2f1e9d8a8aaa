//! Crossover helpers over aligned series.

/// `a` crossed above `b` between index i-1 and i.
pub fn crossed_above(a: &[f64], b: &[f64], i: usize) -> bool {
    if i == 0 || i >= a.len() || i >= b.len() {
        return false;
    }
    a[i - 1] <= b[i - 1] && a[i] > b[i]
}

/// `a` crossed below `b` between index i-1 and i.
pub fn crossed_below(a: &[f64], b: &[f64], i: usize) -> bool {
    if i == 0 || i >= a.len() || i >= b.len() {
        return false;
    }
    a[i - 1] >= b[i - 1] && a[i] < b[i]
}

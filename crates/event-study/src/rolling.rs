/// Centered rolling mean over `values` with an odd `window`.
///
/// Matches the upstream tables' smoothing: the mean at position `i` covers
/// `values[i - window/2 ..= i + window/2]` and is only defined where the
/// full window fits, so the first and last `window/2` positions are `None`.
pub fn rolling_mean_centered(values: &[f64], window: usize) -> Vec<Option<f64>> {
    debug_assert!(window >= 1 && window % 2 == 1, "window must be odd");

    let half = window / 2;
    let n = values.len();
    let mut out = vec![None; n];

    if n < window {
        return out;
    }

    for i in half..n - half {
        let sum: f64 = values[i - half..=i + half].iter().sum();
        out[i] = Some(sum / window as f64);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_stays_constant() {
        let values = vec![3.5; 20];
        let rolled = rolling_mean_centered(&values, 7);

        for v in &rolled[3..17] {
            assert_eq!(*v, Some(3.5));
        }
        assert!(rolled[..3].iter().all(|v| v.is_none()));
        assert!(rolled[17..].iter().all(|v| v.is_none()));
    }

    #[test]
    fn window_is_centered() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let rolled = rolling_mean_centered(&values, 3);

        assert_eq!(rolled, vec![None, Some(2.0), Some(3.0), Some(4.0), None]);
    }

    #[test]
    fn short_series_is_all_undefined() {
        let rolled = rolling_mean_centered(&[1.0, 2.0], 7);
        assert!(rolled.iter().all(|v| v.is_none()));
    }
}

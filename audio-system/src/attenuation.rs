/// Inverse distance clamped rolloff.
///
/// `distance` is clamped to `[reference_distance, max_distance]` first, so
/// gain never rises inside the reference distance and never keeps falling
/// past the max distance. Returns the attenuation factor to multiply a gain
/// by; `1.0` at or inside the reference distance.
pub fn inverse_distance_clamped(
    distance: f32,
    reference_distance: f32,
    max_distance: f32,
    rolloff: f32,
) -> f32 {
    // max then min: a max distance below the reference distance collapses
    // onto the reference distance instead of panicking like f32::clamp
    let d = distance.max(reference_distance).min(max_distance.max(reference_distance));
    let denominator = reference_distance + rolloff * (d - reference_distance);
    if denominator <= 0.0 || !denominator.is_finite() {
        return 1.0;
    }
    reference_distance / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_at_and_inside_reference_distance() {
        assert_eq!(inverse_distance_clamped(10.0, 10.0, 100.0, 1.0), 1.0);
        assert_eq!(inverse_distance_clamped(0.5, 10.0, 100.0, 1.0), 1.0);
    }

    #[test]
    fn flat_beyond_max_distance() {
        let at_max = inverse_distance_clamped(100.0, 10.0, 100.0, 1.0);
        assert_eq!(inverse_distance_clamped(5000.0, 10.0, 100.0, 1.0), at_max);
        assert!((at_max - 0.1).abs() < 1e-6);
    }

    #[test]
    fn halves_at_double_reference_with_unit_rolloff() {
        assert!((inverse_distance_clamped(20.0, 10.0, 1000.0, 1.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_rolloff_disables_attenuation() {
        assert_eq!(inverse_distance_clamped(500.0, 10.0, 1000.0, 0.0), 1.0);
    }

    #[test]
    fn degenerate_inputs_do_not_produce_nan() {
        assert_eq!(inverse_distance_clamped(0.0, 0.0, 100.0, 1.0), 1.0);
        // max below reference collapses to the reference distance
        assert_eq!(inverse_distance_clamped(50.0, 10.0, 5.0, 1.0), 1.0);
    }
}

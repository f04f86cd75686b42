//! Net power balance of one period.

/// Computes net power from its three components.
///
/// All inputs follow the meter convention:
/// - Positive = load (buildings, activities, battery charging)
/// - Negative = supply (solar already netted into `base_kw`, battery discharging)
///
/// # Arguments
///
/// * `base_kw` - Forecast net building load
/// * `activity_kw` - Load of ongoing activities (positive)
/// * `battery_kw` - Battery exchange (positive = charge, negative = discharge)
pub fn net_power_kw(base_kw: f64, activity_kw: f64, battery_kw: f64) -> f64 {
    base_kw + activity_kw + battery_kw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_add_up() {
        assert_eq!(net_power_kw(10.0, 2.5, 0.0), 12.5);
    }

    #[test]
    fn discharge_reduces_net() {
        assert_eq!(net_power_kw(10.0, 0.0, -4.5), 5.5);
    }

    #[test]
    fn solar_surplus_can_be_absorbed_by_charging() {
        // base is negative when solar exceeds the buildings
        let net = net_power_kw(-3.0, 0.0, 5.0);
        assert!((net - 2.0).abs() < 1e-12);
    }
}

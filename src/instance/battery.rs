/// A stationary battery attached to a building.
///
/// A battery either runs at full power for a whole period or stays idle, so
/// each mode moves a fixed amount of energy. The round-trip efficiency is
/// split evenly between the two directions: charging draws
/// `max_power / sqrt(eff)` from the grid and discharging delivers
/// `max_power * sqrt(eff)`. The same quantity is added to (or removed from)
/// the stored level.
///
/// # Power Flow Convention
/// - Positive energy: charging (adds load on the building meter)
/// - Negative energy: discharging (offsets load on the building meter)
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// Battery identifier from the instance file.
    pub id: usize,

    /// Building the battery is installed in.
    pub building_id: usize,

    /// Usable capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Maximum energy moved in one period, in kilowatt-hours.
    pub max_power_kwh: f64,

    /// Round-trip efficiency (0..1.0].
    pub efficiency: f64,
}

impl Battery {
    /// Creates a new battery with the specified parameters.
    ///
    /// # Panics
    ///
    /// Panics if capacity or power is negative or the efficiency lies outside (0, 1].
    pub fn new(
        id: usize,
        building_id: usize,
        capacity_kwh: f64,
        max_power_kwh: f64,
        efficiency: f64,
    ) -> Self {
        assert!(capacity_kwh >= 0.0);
        assert!(max_power_kwh >= 0.0);
        assert!(efficiency > 0.0 && efficiency <= 1.0);

        Self {
            id,
            building_id,
            capacity_kwh,
            max_power_kwh,
            efficiency,
        }
    }

    /// Energy drawn per charging period (`max_power * eff^-0.5`).
    pub fn charge_kwh(&self) -> f64 {
        self.max_power_kwh / self.efficiency.sqrt()
    }

    /// Energy delivered per discharging period (`max_power * eff^0.5`).
    pub fn discharge_kwh(&self) -> f64 {
        self.max_power_kwh * self.efficiency.sqrt()
    }

    /// Signed energy exchanged with the building in one period.
    ///
    /// Both flags may be set at once; their contributions simply add up.
    pub fn net_kwh(&self, charging: bool, discharging: bool) -> f64 {
        let mut kwh = 0.0;
        if charging {
            kwh += self.charge_kwh();
        }
        if discharging {
            kwh -= self.discharge_kwh();
        }
        kwh
    }
}

use serde::Deserialize;

/// A subset of the charge state reported by the vehicle.
///
/// Fields the vehicle omits or reports as `null` are `None`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChargeState {
    #[serde(default)]
    pub charging_state: Option<String>,
    #[serde(default)]
    pub battery_level: Option<u32>,
    #[serde(default)]
    pub usable_battery_level: Option<u32>,
    #[serde(default)]
    pub battery_range: Option<f64>,
    #[serde(default)]
    pub charge_limit_soc: Option<u32>,
    #[serde(default)]
    pub charge_rate: Option<f64>,
    #[serde(default)]
    pub charger_power: Option<u32>,
    #[serde(default)]
    pub charge_energy_added: Option<f64>,
    #[serde(default)]
    pub time_to_full_charge: Option<f64>,
    #[serde(default)]
    pub charge_port_door_open: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl ChargeState {
    pub fn is_charging(&self) -> bool {
        self.charging_state.as_deref() == Some("Charging")
    }

    /// State of charge in `[0, 1]`.
    pub fn soc(&self) -> Option<f64> {
        self.battery_level.map(|level| level as f64 / 100.)
    }
}

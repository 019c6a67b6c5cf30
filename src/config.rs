pub mod alarm {
    /// Zona cuyo estado sigue al nivel de humo global.
    pub const MONITORED_ZONE_ID: u32 = 1;
    pub const ALERT_LOG_CAPACITY: usize = 10;

    pub const WARNING_THRESHOLD: f64 = 25.0;
    pub const CRITICAL_THRESHOLD: f64 = 50.0;

    pub const TEMPERATURE_MIN: f64 = 20.0;
    pub const TEMPERATURE_MAX: f64 = 35.0;
    pub const PERCENT_MIN: f64 = 0.0;
    pub const PERCENT_MAX: f64 = 100.0;

    pub const INITIAL_TEMPERATURE: f64 = 24.0;
    pub const BASELINE_SMOKE_LEVEL: f64 = 15.0;
    pub const INITIAL_BATTERY_LEVEL: f64 = 78.0;
    pub const TEST_ALARM_SMOKE_LEVEL: f64 = 60.0;

    pub const TEMPERATURE_STEP: f64 = 1.0;
    pub const SMOKE_RISE_PROBABILITY: f64 = 0.3;
    pub const SMOKE_RISE_STEP: f64 = 5.0;
    pub const SMOKE_FALL_STEP: f64 = -2.0;
    pub const SMOKE_ALARM_MAX_STEP: f64 = 10.0;
    pub const BATTERY_DRAIN_STEP: f64 = -0.1;
}

pub mod engine {
    pub const COMMAND_CHANNEL_SIZE: usize = 32;
    pub const EVENT_CHANNEL_SIZE: usize = 32;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 3000;
    pub const DEFAULT_TEST_ALARM_RESET_SECS: u64 = 10;
}

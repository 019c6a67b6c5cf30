//! Máquina de estados del sistema de alarmas.
//!
//! `AlarmState` es el único dueño de las lecturas, zonas, dispositivos y
//! registro de alertas. Todas las operaciones reciben el instante actual
//! de forma explícita, lo que las vuelve deterministas para las pruebas.
//!
//! # Propagación
//! Después de cada cambio del nivel de humo se ejecuta un único paso de
//! propagación: si el estado derivado cambió respecto al último propagado,
//! la zona monitoreada y sus dispositivos adoptan el nuevo estado y, si el
//! nuevo estado es `Warning` o `Critical`, se agrega exactamente una alerta.


use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::{debug, info, warn};
use crate::config::alarm::*;
use crate::engine::domain::EngineError;
use super::domain::{derive_status, seed, AlertLevel, AlertLog, Device, Reading, Snapshot, Status, Zone};


/// Variación aleatoria de un ciclo de simulación.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub temperature: f64,
    pub smoke: f64,
    pub battery: f64,
}


impl Drift {
    /// Muestrea la variación de un tick.
    ///
    /// Con una prueba de alarma activa y sin silenciar, el humo sube entre
    /// 0 y 10 unidades; en caso contrario sube 5 con probabilidad 0.3 o baja 2.
    pub fn sample<R: Rng>(rng: &mut R, accelerated: bool) -> Self {
        let temperature = if rng.random_bool(0.5) { TEMPERATURE_STEP } else { -TEMPERATURE_STEP };

        let smoke = if accelerated {
            rng.random_range(0.0..SMOKE_ALARM_MAX_STEP)
        } else if rng.random_bool(SMOKE_RISE_PROBABILITY) {
            SMOKE_RISE_STEP
        } else {
            SMOKE_FALL_STEP
        };

        Self { temperature, smoke, battery: BATTERY_DRAIN_STEP }
    }
}


#[derive(Debug, Clone)]
pub struct AlarmState {
    reading: Reading,
    zones: Vec<Zone>,
    devices: Vec<Device>,
    alerts: AlertLog,
    alarming: bool,
    silenced: bool,
    propagated: Status,
    timezone: Tz,
}


impl AlarmState {

    /// Crea el estado con los datos iniciales del panel.
    pub fn new(now: DateTime<Utc>, timezone: Tz) -> Self {
        let mut state = Self {
            reading: Reading::default(),
            zones: seed::zones(),
            devices: seed::devices(now),
            alerts: seed::alerts(),
            alarming: false,
            silenced: false,
            propagated: Status::Normal,
            timezone,
        };
        state.propagate(now);
        state
    }

    pub fn reading(&self) -> Reading {
        self.reading
    }

    /// Estado global derivado, calculado en cada lectura.
    pub fn status(&self) -> Status {
        derive_status(self.reading.smoke_level)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn is_alarming(&self) -> bool {
        self.alarming
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Cantidad de zonas en `Warning` o `Critical`. Las zonas `Offline` no cuentan.
    pub fn active_alert_count(&self) -> usize {
        self.zones.iter().filter(|zone| zone.status.is_active()).count()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            reading: self.reading,
            status: self.status(),
            zones: self.zones.clone(),
            devices: self.devices.clone(),
            alerts: self.alerts.to_vec(),
            active_alert_count: self.active_alert_count(),
            alarming: self.alarming,
            silenced: self.silenced,
        }
    }

    /// Avanza la simulación un ciclo con variaciones aleatorias.
    pub fn tick<R: Rng>(&mut self, rng: &mut R, now: DateTime<Utc>) {
        let drift = Drift::sample(rng, self.alarming && !self.silenced);
        self.apply_drift(drift, now);
    }

    /// Aplica una variación concreta, acotando cada lectura a su rango.
    pub fn apply_drift(&mut self, drift: Drift, now: DateTime<Utc>) {
        let reading = &mut self.reading;
        reading.temperature = (reading.temperature + drift.temperature).clamp(TEMPERATURE_MIN, TEMPERATURE_MAX);
        reading.smoke_level = (reading.smoke_level + drift.smoke).clamp(PERCENT_MIN, PERCENT_MAX);
        reading.battery_level = (reading.battery_level + drift.battery).clamp(PERCENT_MIN, PERCENT_MAX);

        debug!(
            temperature = reading.temperature,
            smoke_level = reading.smoke_level,
            battery_level = reading.battery_level,
            "Debug: tick aplicado"
        );

        self.propagate(now);
    }

    /// Inicia una prueba de alarma: humo forzado al nivel de prueba.
    pub fn test_alarm(&mut self, now: DateTime<Utc>) {
        self.alarming = true;
        self.push_alert("Alarm test initiated", AlertLevel::Info, now);
        self.set_smoke_level(TEST_ALARM_SMOKE_LEVEL, now);
    }

    /// Termina la prueba de alarma y devuelve el humo a su nivel base.
    pub fn reset_test_alarm(&mut self, now: DateTime<Utc>) {
        self.alarming = false;
        self.set_smoke_level(BASELINE_SMOKE_LEVEL, now);
    }

    /// Alterna el silencio de la alarma. Devuelve el nuevo valor.
    pub fn silence_alarm(&mut self, now: DateTime<Utc>) -> bool {
        self.silenced = !self.silenced;
        let message = if self.silenced { "Alarm silenced" } else { "Alarm unsilenced" };
        self.push_alert(message, AlertLevel::Info, now);
        self.silenced
    }

    /// Marca todos los dispositivos como revisados en `now`.
    pub fn system_check(&mut self, now: DateTime<Utc>) {
        self.push_alert("System check initiated", AlertLevel::Info, now);
        for device in &mut self.devices {
            device.last_checked = now;
        }
    }

    pub fn refresh_data(&mut self, now: DateTime<Utc>) {
        self.push_alert("Data refreshed", AlertLevel::Info, now);
    }

    /// Marca una zona como desconectada o la restablece.
    ///
    /// Al restablecerla, la zona monitoreada vuelve al estado derivado y
    /// cualquier otra vuelve a `Normal`.
    pub fn set_zone_offline(&mut self, zone_id: u32, offline: bool) -> Result<(), EngineError> {
        let restored = self.restored_status(zone_id);
        let zone = self.zones
            .iter_mut()
            .find(|zone| zone.id == zone_id)
            .ok_or(EngineError::UnknownZone(zone_id))?;

        zone.status = if offline { Status::Offline } else { restored };
        info!("Info: zona {} ahora en estado {}", zone_id, zone.status);
        Ok(())
    }

    /// Igual que [`set_zone_offline`](Self::set_zone_offline) para un dispositivo.
    pub fn set_device_offline(&mut self, device_id: u32, offline: bool) -> Result<(), EngineError> {
        let zone_id = self.devices
            .iter()
            .find(|device| device.id == device_id)
            .map(|device| device.zone_id)
            .ok_or(EngineError::UnknownDevice(device_id))?;
        let restored = self.restored_status(zone_id);

        if let Some(device) = self.devices.iter_mut().find(|device| device.id == device_id) {
            device.status = if offline { Status::Offline } else { restored };
            info!("Info: dispositivo {} ahora en estado {}", device_id, device.status);
        }
        Ok(())
    }

    fn restored_status(&self, zone_id: u32) -> Status {
        if zone_id == MONITORED_ZONE_ID { self.propagated } else { Status::Normal }
    }

    fn set_smoke_level(&mut self, level: f64, now: DateTime<Utc>) {
        self.reading.smoke_level = level.clamp(PERCENT_MIN, PERCENT_MAX);
        self.propagate(now);
    }

    fn propagate(&mut self, now: DateTime<Utc>) {
        let status = self.status();
        if status == self.propagated {
            return;
        }

        info!("Info: estado global {} -> {}", self.propagated, status);
        self.propagated = status;

        match status {
            Status::Critical => {
                warn!("Warn: humo en nivel crítico en zona {}", MONITORED_ZONE_ID);
                self.push_alert("EMERGENCY: Fire detected in Zone 1", AlertLevel::Critical, now);
            }
            Status::Warning => {
                self.push_alert("Warning: Elevated smoke levels in Zone 1", AlertLevel::Warning, now);
            }
            _ => {}
        }

        for zone in self.zones.iter_mut().filter(|zone| zone.id == MONITORED_ZONE_ID) {
            if zone.status != Status::Offline {
                zone.status = status;
            }
        }
        for device in self.devices.iter_mut().filter(|device| device.zone_id == MONITORED_ZONE_ID) {
            if device.status != Status::Offline {
                device.status = status;
            }
        }
    }

    fn push_alert(&mut self, message: &str, level: AlertLevel, now: DateTime<Utc>) {
        let alert = self.alerts.push(message, level, now, self.timezone);
        debug!(id = alert.id, "Debug: alerta registrada: {}", alert.message);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 10, 30, 0).unwrap()
    }

    fn state() -> AlarmState {
        AlarmState::new(now(), Tz::UTC)
    }

    fn smoke(delta: f64) -> Drift {
        Drift { temperature: 0.0, smoke: delta, battery: 0.0 }
    }

    fn zone_one(state: &AlarmState) -> Status {
        state.zones().iter().find(|z| z.id == 1).map(|z| z.status).unwrap()
    }

    fn zone_one_devices(state: &AlarmState) -> Vec<Status> {
        state.devices().iter().filter(|d| d.zone_id == 1).map(|d| d.status).collect()
    }

    #[test]
    fn starts_normal_with_seeded_data() {
        let state = state();

        assert_eq!(state.status(), Status::Normal);
        assert_eq!(state.reading(), Reading::default());
        assert_eq!(state.alerts().len(), 5);
        assert_eq!(state.active_alert_count(), 0);
        assert!(!state.is_alarming());
        assert!(!state.is_silenced());
    }

    #[test]
    fn tick_keeps_readings_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = state();

        for i in 0..5_000 {
            if i % 700 == 0 {
                state.test_alarm(now());
            }
            if i % 900 == 0 {
                state.reset_test_alarm(now());
            }
            state.tick(&mut rng, now());

            let reading = state.reading();
            assert!((TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&reading.temperature));
            assert!((PERCENT_MIN..=PERCENT_MAX).contains(&reading.smoke_level));
            assert!((PERCENT_MIN..=PERCENT_MAX).contains(&reading.battery_level));
            assert!(state.alerts().len() <= ALERT_LOG_CAPACITY);
        }
    }

    #[test]
    fn battery_drains_and_stops_at_zero() {
        let mut state = state();
        for _ in 0..1_000 {
            state.apply_drift(Drift { temperature: 0.0, smoke: 0.0, battery: BATTERY_DRAIN_STEP }, now());
        }

        assert_eq!(state.reading().battery_level, 0.0);
    }

    #[test]
    fn accelerated_drift_only_rises() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let drift = Drift::sample(&mut rng, true);
            assert!((0.0..SMOKE_ALARM_MAX_STEP).contains(&drift.smoke));
        }
    }

    #[test]
    fn rising_smoke_emits_one_alert_per_transition() {
        let mut state = state();
        state.apply_drift(smoke(5.0), now());
        let before = state.alerts().len();

        // 20 -> 60 en pasos de 5.
        let mut seen = vec![zone_one(&state)];
        for _ in 0..8 {
            state.apply_drift(smoke(5.0), now());
            if seen.last() != Some(&zone_one(&state)) {
                seen.push(zone_one(&state));
            }
        }

        assert_eq!(state.reading().smoke_level, 60.0);
        assert_eq!(seen, vec![Status::Normal, Status::Warning, Status::Critical]);
        assert_eq!(state.alerts().len(), before + 2);
        assert_eq!(zone_one_devices(&state), vec![Status::Critical]);

        let levels: Vec<_> = state.alerts().iter().take(2).map(|a| a.level).collect();
        assert_eq!(levels, vec![AlertLevel::Critical, AlertLevel::Warning]);
    }

    #[test]
    fn returning_to_normal_resets_zone_without_alert() {
        let mut state = state();
        state.apply_drift(smoke(20.0), now());
        assert_eq!(zone_one(&state), Status::Warning);
        assert_eq!(state.active_alert_count(), 1);

        let before = state.alerts().len();
        state.apply_drift(smoke(-20.0), now());

        assert_eq!(zone_one(&state), Status::Normal);
        assert_eq!(zone_one_devices(&state), vec![Status::Normal]);
        assert_eq!(state.alerts().len(), before);
        assert_eq!(state.active_alert_count(), 0);
    }

    #[test]
    fn test_alarm_forces_critical_and_reset_restores_baseline() {
        let mut state = state();
        state.test_alarm(now());

        assert!(state.is_alarming());
        assert_eq!(state.reading().smoke_level, TEST_ALARM_SMOKE_LEVEL);
        assert_eq!(state.status(), Status::Critical);
        assert_eq!(zone_one(&state), Status::Critical);

        let messages: Vec<_> = state.alerts().iter().take(2).map(|a| a.message.as_str()).collect();
        assert_eq!(messages, vec!["EMERGENCY: Fire detected in Zone 1", "Alarm test initiated"]);

        state.reset_test_alarm(now());

        assert!(!state.is_alarming());
        assert_eq!(state.reading().smoke_level, BASELINE_SMOKE_LEVEL);
        assert_eq!(state.status(), Status::Normal);
        assert_eq!(zone_one(&state), Status::Normal);
    }

    #[test]
    fn silence_twice_restores_flag_and_logs_each_call() {
        let mut state = state();
        let before = state.alerts().len();

        assert!(state.silence_alarm(now()));
        assert_eq!(state.alerts().latest().map(|a| a.message.as_str()), Some("Alarm silenced"));
        assert!(!state.silence_alarm(now()));
        assert_eq!(state.alerts().latest().map(|a| a.message.as_str()), Some("Alarm unsilenced"));

        assert!(!state.is_silenced());
        assert_eq!(state.alerts().len(), before + 2);
    }

    #[test]
    fn silenced_alarm_does_not_accelerate_smoke() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = state();
        state.test_alarm(now());
        state.silence_alarm(now());

        for _ in 0..50 {
            let before = state.reading().smoke_level;
            state.tick(&mut rng, now());
            let level = state.reading().smoke_level;
            let delta = level - before;
            assert!(delta == SMOKE_RISE_STEP || delta == SMOKE_FALL_STEP
                || level == PERCENT_MIN || level == PERCENT_MAX);
        }
    }

    #[test]
    fn system_check_stamps_every_device_and_logs_once() {
        let mut state = state();
        let before = state.alerts().len();
        let later = now() + Duration::minutes(30);

        state.system_check(later);

        assert!(state.devices().iter().all(|d| d.last_checked == later));
        assert_eq!(state.alerts().len(), before + 1);
        assert_eq!(state.alerts().latest().map(|a| a.level), Some(AlertLevel::Info));
    }

    #[test]
    fn refresh_only_logs() {
        let mut state = state();
        let reading = state.reading();
        let devices = state.devices().to_vec();

        state.refresh_data(now());

        assert_eq!(state.reading(), reading);
        assert_eq!(state.devices(), devices.as_slice());
        assert_eq!(state.alerts().latest().map(|a| a.message.as_str()), Some("Data refreshed"));
    }

    #[test]
    fn alert_log_never_exceeds_capacity() {
        let mut state = state();
        for _ in 0..25 {
            state.refresh_data(now());
        }

        assert_eq!(state.alerts().len(), ALERT_LOG_CAPACITY);
        assert!(state.alerts().iter().all(|a| a.message == "Data refreshed"));
    }

    #[test]
    fn offline_zone_is_not_overwritten_by_propagation() {
        let mut state = state();
        state.set_zone_offline(1, true).unwrap();
        state.test_alarm(now());

        assert_eq!(zone_one(&state), Status::Offline);
        assert_eq!(zone_one_devices(&state), vec![Status::Critical]);
        assert_eq!(state.active_alert_count(), 0);

        state.set_zone_offline(1, false).unwrap();
        assert_eq!(zone_one(&state), Status::Critical);
        assert_eq!(state.active_alert_count(), 1);
    }

    #[test]
    fn offline_device_keeps_its_status_and_restores_to_normal() {
        let mut state = state();
        state.set_device_offline(1, true).unwrap();
        state.apply_drift(smoke(20.0), now());

        assert_eq!(zone_one_devices(&state), vec![Status::Offline]);

        state.apply_drift(smoke(-20.0), now());
        state.set_device_offline(1, false).unwrap();
        assert_eq!(zone_one_devices(&state), vec![Status::Normal]);

        state.set_device_offline(4, false).unwrap();
        let sprinkler = state.devices().iter().find(|d| d.id == 4).map(|d| d.status);
        assert_eq!(sprinkler, Some(Status::Normal));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let mut state = state();

        assert_eq!(state.set_zone_offline(99, true), Err(EngineError::UnknownZone(99)));
        assert_eq!(state.set_device_offline(42, true), Err(EngineError::UnknownDevice(42)));
    }
}

//! Modelo de datos del motor de alarmas.
//!
//! Define las lecturas simuladas, el estado derivado del nivel de humo,
//! las zonas y dispositivos monitoreados y el registro de alertas acotado.


use std::collections::VecDeque;
use std::fmt;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use crate::config::alarm::{ALERT_LOG_CAPACITY, BASELINE_SMOKE_LEVEL, CRITICAL_THRESHOLD,
                           INITIAL_BATTERY_LEVEL, INITIAL_TEMPERATURE, WARNING_THRESHOLD};


/// Lecturas ambientales simuladas.
///
/// Los tres valores se mantienen siempre dentro de sus rangos:
/// temperatura en `[20, 35]` °C, humo y batería en `[0, 100]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub smoke_level: f64,
    pub battery_level: f64,
}


impl Default for Reading {
    fn default() -> Self {
        Self {
            temperature: INITIAL_TEMPERATURE,
            smoke_level: BASELINE_SMOKE_LEVEL,
            battery_level: INITIAL_BATTERY_LEVEL,
        }
    }
}


/// Nivel de estado de una zona, un dispositivo o del sistema completo.
///
/// `Offline` nunca se deriva de las lecturas: solo se asigna externamente
/// para simular hardware desconectado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Normal,
    Warning,
    Critical,
    Offline,
}


impl Status {
    /// `true` para los estados que cuentan como alerta activa.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Warning | Status::Critical)
    }
}


impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Normal => "normal",
            Status::Warning => "warning",
            Status::Critical => "critical",
            Status::Offline => "offline",
        };
        f.write_str(label)
    }
}


/// Calcula el estado global a partir del nivel de humo.
///
/// * `> 50`: `Critical`
/// * `> 25`: `Warning`
/// * resto: `Normal`
pub fn derive_status(smoke_level: f64) -> Status {
    if smoke_level > CRITICAL_THRESHOLD {
        Status::Critical
    } else if smoke_level > WARNING_THRESHOLD {
        Status::Warning
    } else {
        Status::Normal
    }
}


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Smoke,
    Heat,
    Sprinkler,
    Co,
    Panel,
}


/// Área lógica del edificio agrupando dispositivos bajo un mismo estado.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub id: u32,
    pub name: String,
    pub status: Status,
    pub device_count: u32,
}


/// Sensor o actuador simulado perteneciente a una zona.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: u32,
    pub name: String,
    pub kind: DeviceKind,
    pub status: Status,
    pub last_checked: DateTime<Utc>,
    pub zone_id: u32,
}


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}


/// Entrada del registro de alertas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// Identificador único, estrictamente creciente en el tiempo.
    pub id: u64,
    /// Hora de creación ya formateada (`10:23 AM`).
    pub time: String,
    pub message: String,
    pub level: AlertLevel,
}


/// Registro de alertas, del más reciente al más antiguo.
///
/// Nunca supera `ALERT_LOG_CAPACITY` entradas: al insertar por encima del
/// límite se descarta la entrada más antigua.
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    entries: VecDeque<Alert>,
    last_id: u64,
}


impl AlertLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(ALERT_LOG_CAPACITY + 1),
            last_id: 0,
        }
    }

    /// Inserta una alerta nueva fechada en `now` y la devuelve.
    ///
    /// El id se toma de los milisegundos de `now`, forzado a ser mayor que
    /// el último emitido para que dos alertas en el mismo milisegundo no colisionen.
    pub fn push(&mut self,
                message: impl Into<String>,
                level: AlertLevel,
                now: DateTime<Utc>,
                timezone: Tz) -> &Alert {

        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last_id + 1);
        let time = now.with_timezone(&timezone).format("%I:%M %p").to_string();
        self.insert(id, time, message.into(), level)
    }

    fn insert(&mut self, id: u64, time: String, message: String, level: AlertLevel) -> &Alert {
        self.last_id = id;
        self.entries.push_front(Alert { id, time, message, level });
        self.entries.truncate(ALERT_LOG_CAPACITY);
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }
}


/// Copia de solo lectura del estado, publicada hacia la capa de presentación.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub reading: Reading,
    pub status: Status,
    pub zones: Vec<Zone>,
    pub devices: Vec<Device>,
    pub alerts: Vec<Alert>,
    pub active_alert_count: usize,
    pub alarming: bool,
    pub silenced: bool,
}


/// Etiqueta relativa para `last_checked` ("Just now", "5 min ago", ...).
pub fn last_checked_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);

    if elapsed < Duration::minutes(1) {
        return "Just now".to_string();
    }
    if elapsed < Duration::hours(1) {
        return format!("{} min ago", elapsed.num_minutes());
    }
    if elapsed < Duration::days(1) {
        let hours = elapsed.num_hours();
        return format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" });
    }
    let days = elapsed.num_days();
    format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
}


/// Datos iniciales del panel.
pub mod seed {
    use super::*;

    pub fn zones() -> Vec<Zone> {
        [
            (1, "Zone 1 - Main Office", Status::Normal, 4),
            (2, "Zone 2 - Conference Room", Status::Normal, 2),
            (3, "Zone 3 - Kitchen", Status::Normal, 3),
            (4, "Zone 4 - Hallway", Status::Offline, 2),
            (5, "Zone 5 - Server Room", Status::Normal, 5),
            (6, "Zone 6 - Reception", Status::Normal, 3),
        ]
            .into_iter()
            .map(|(id, name, status, device_count)| Zone {
                id,
                name: name.to_string(),
                status,
                device_count,
            })
            .collect()
    }

    pub fn devices(now: DateTime<Utc>) -> Vec<Device> {
        [
            (1, "Smoke Detector - Main Office", DeviceKind::Smoke, Status::Normal, 2, 1),
            (2, "Heat Sensor - Conference Room", DeviceKind::Heat, Status::Normal, 5, 2),
            (3, "Smoke Detector - Kitchen", DeviceKind::Smoke, Status::Normal, 3, 3),
            (4, "Sprinkler System - Hallway", DeviceKind::Sprinkler, Status::Offline, 60, 4),
            (5, "CO Detector - Server Room", DeviceKind::Co, Status::Normal, 10, 5),
            (6, "Alarm Panel - Reception", DeviceKind::Panel, Status::Normal, 1, 6),
        ]
            .into_iter()
            .map(|(id, name, kind, status, minutes_ago, zone_id)| Device {
                id,
                name: name.to_string(),
                kind,
                status,
                last_checked: now - Duration::minutes(minutes_ago),
                zone_id,
            })
            .collect()
    }

    /// Historial previo, insertado del más antiguo al más reciente.
    pub fn alerts() -> AlertLog {
        let mut log = AlertLog::new();
        let history = [
            ("2 days ago", "Fire alarm triggered in Zone 3", AlertLevel::Critical),
            ("Yesterday, 3:30 PM", "Scheduled maintenance completed", AlertLevel::Info),
            ("Yesterday, 6:12 PM", "Battery level low on Zone 4 detector", AlertLevel::Warning),
            ("09:45 AM", "System test completed successfully", AlertLevel::Info),
            ("10:23 AM", "Smoke level above threshold in Zone 1", AlertLevel::Warning),
        ];
        for (id, (time, message, level)) in (1u64..).zip(history) {
            log.insert(id, time.to_string(), message.to_string(), level);
        }
        log
    }
}

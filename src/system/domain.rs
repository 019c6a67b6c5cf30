//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Lee las variables de entorno, establece valores por defecto y configura
//! la trazabilidad (`tracing`) del proceso.
//!
//! # Variables reconocidas
//! * `ENVIRONMENT`: `development` (por defecto), `staging`, `production`.
//! * `RUST_LOG`: nivel de logs; se deduce del entorno si no está definido.
//! * `TICK_INTERVAL_MS`: período de la simulación de sensores.
//! * `TEST_ALARM_RESET_SECS`: duración de una prueba de alarma.
//! * `ALARM_TIMEZONE`: zona horaria IANA usada en las etiquetas de alertas.


use std::env;
use std::str::FromStr;
use std::time::Duration;
use chrono_tz::Tz;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use crate::config::engine::{DEFAULT_TEST_ALARM_RESET_SECS, DEFAULT_TICK_INTERVAL_MS};


/// Errores al cargar la configuración.
#[derive(Debug, Error, PartialEq)]
pub enum SystemError {
    #[error("{name} debe ser un número positivo (valor: {value:?})")]
    InvalidNumber { name: &'static str, value: String },

    #[error("ALARM_TIMEZONE no es una zona horaria válida: {0:?}")]
    InvalidTimezone(String),
}


/// Configuración global del proceso.
#[derive(Debug, Clone)]
pub struct System {
    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    /// Afecta el formato de logs y la carga de archivos `.env`.
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    pub rust_log: String,

    /// Período entre ticks de la simulación, en milisegundos.
    /// Por defecto: `3000`.
    pub tick_interval_ms: u64,

    /// Segundos hasta el reinicio automático de una prueba de alarma.
    /// Por defecto: `10`.
    pub test_alarm_reset_secs: u64,

    /// Zona horaria para formatear la hora de las alertas.
    /// Por defecto: `UTC`.
    pub timezone: Tz,
}


impl Default for System {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            rust_log: "debug".to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            test_alarm_reset_secs: DEFAULT_TEST_ALARM_RESET_SECS,
            timezone: Tz::UTC,
        }
    }
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Las variables ausentes toman el valor por defecto.
    ///
    /// # Errores
    /// * `SystemError::InvalidNumber` si un intervalo no es un entero positivo.
    /// * `SystemError::InvalidTimezone` si `ALARM_TIMEZONE` no es un nombre IANA.
    pub fn new() -> Result<Self, SystemError> {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        Self::from_vars(environment, |name| env::var(name).ok())
    }

    /// Construye la configuración a partir de un lector de variables.
    fn from_vars<F>(environment: String, var: F) -> Result<Self, SystemError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = System::default();

        let system = System {
            tick_interval_ms: parse_positive("TICK_INTERVAL_MS", var("TICK_INTERVAL_MS"), defaults.tick_interval_ms)?,

            test_alarm_reset_secs: parse_positive("TEST_ALARM_RESET_SECS",
                                                  var("TEST_ALARM_RESET_SECS"),
                                                  defaults.test_alarm_reset_secs)?,

            timezone: match var("ALARM_TIMEZONE") {
                Some(name) => Tz::from_str(&name).map_err(|_| SystemError::InvalidTimezone(name))?,
                None => defaults.timezone,
            },

            rust_log: var("RUST_LOG")
                .unwrap_or_else(|| {
                    match environment.as_str() {
                        "development" => "debug".to_string(),
                        "staging" => "info".to_string(),
                        _ => "warn".to_string(),
                    }
                }),

            environment,
        };

        info!("Info: configuración cargada para entorno {}", system.environment);
        Ok(system)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn test_alarm_reset(&self) -> Duration {
        Duration::from_secs(self.test_alarm_reset_secs)
    }
}


fn parse_positive(name: &'static str, value: Option<String>, default: u64) -> Result<u64, SystemError> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(SystemError::InvalidNumber { name, value: raw }),
        },
    }
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

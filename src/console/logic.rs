//! Presentación por consola del panel de alarmas.
//!
//! La vista sigue el canal `watch` del motor como un `Stream` y registra los
//! cambios relevantes. La entrada lee comandos de texto desde stdin y los
//! traduce en llamadas a `EngineHandle`.


use chrono::Utc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, instrument, warn};
use crate::alarm::domain::{last_checked_label, Snapshot, Status};
use crate::engine::domain::{EngineError, EngineHandle};


/// Comandos reconocidos por la entrada de consola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Test,
    Silence,
    Check,
    Refresh,
    ZoneOffline(u32, bool),
    DeviceOffline(u32, bool),
    Quit,
}


/// Interpreta una línea de entrada. Devuelve `None` si no se reconoce.
///
/// `offline zone 3`, `online device 4`, `test`, `silence`, `check`,
/// `refresh`, `quit`.
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        ["test"] => Some(ConsoleCommand::Test),
        ["silence"] => Some(ConsoleCommand::Silence),
        ["check"] => Some(ConsoleCommand::Check),
        ["refresh"] => Some(ConsoleCommand::Refresh),
        ["quit"] | ["exit"] => Some(ConsoleCommand::Quit),
        [state @ ("offline" | "online"), target, id] => {
            let id = id.parse().ok()?;
            let offline = *state == "offline";
            match *target {
                "zone" => Some(ConsoleCommand::ZoneOffline(id, offline)),
                "device" => Some(ConsoleCommand::DeviceOffline(id, offline)),
                _ => None,
            }
        }
        _ => None,
    }
}


async fn dispatch(handle: &EngineHandle, command: ConsoleCommand) -> Result<(), EngineError> {
    match command {
        ConsoleCommand::Test => handle.test_alarm().await,
        ConsoleCommand::Silence => handle.silence_alarm().await,
        ConsoleCommand::Check => handle.system_check().await,
        ConsoleCommand::Refresh => handle.refresh_data().await,
        ConsoleCommand::ZoneOffline(id, offline) => handle.set_zone_offline(id, offline).await,
        ConsoleCommand::DeviceOffline(id, offline) => handle.set_device_offline(id, offline).await,
        ConsoleCommand::Quit => handle.shutdown().await,
    }
}


/// Resume las diferencias entre dos instantáneas consecutivas.
pub fn describe_changes(previous: Option<&Snapshot>, current: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();

    let previous_status = previous.map(|p| p.status).unwrap_or(Status::Normal);
    if previous.is_none() || previous_status != current.status {
        lines.push(format!(
            "Estado {} | humo {:.1} | temperatura {:.0}°C | batería {:.1}% | alertas activas {}",
            current.status,
            current.reading.smoke_level,
            current.reading.temperature,
            current.reading.battery_level,
            current.active_alert_count,
        ));
    }

    let last_seen = previous
        .and_then(|p| p.alerts.first())
        .map(|a| a.id)
        .unwrap_or(0);
    for alert in current.alerts.iter().filter(|a| a.id > last_seen).rev() {
        lines.push(format!("[{}] {:?}: {}", alert.time, alert.level, alert.message));
    }

    lines
}


#[instrument(name = "run_console_view", skip_all)]
pub async fn run_console_view(rx_snapshot: watch::Receiver<Snapshot>) {

    info!("Info: vista de consola creada");

    let mut stream = WatchStream::new(rx_snapshot);
    let mut previous: Option<Snapshot> = None;

    while let Some(snapshot) = stream.next().await {
        for line in describe_changes(previous.as_ref(), &snapshot) {
            info!("{line}");
        }

        let now = Utc::now();
        for device in &snapshot.devices {
            debug!("Debug: {} [{}] revisado {}", device.name, device.status, last_checked_label(device.last_checked, now));
        }
        match serde_json::to_string(&snapshot) {
            Ok(json) => debug!("Debug: snapshot {json}"),
            Err(e) => error!("Error: no se pudo serializar el snapshot. {e}"),
        }

        previous = Some(snapshot);
    }
    info!("Info: vista de consola finalizada");
}


#[instrument(name = "run_console_input", skip_all)]
pub async fn run_console_input(handle: EngineHandle) {

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Error: leyendo stdin. {e}");
                break;
            }
        };

        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                warn!("Warn: comando desconocido {:?}", line.trim());
            }
            continue;
        };

        if let Err(e) = dispatch(&handle, command).await {
            error!("Error: {e}");
        }
        if command == ConsoleCommand::Quit {
            break;
        }
    }
    info!("Info: entrada de consola finalizada");
}


pub fn start_console_view(rx_snapshot: watch::Receiver<Snapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_console_view(rx_snapshot).await;
    })
}


pub fn start_console_input(handle: EngineHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_console_input(handle).await;
    })
}

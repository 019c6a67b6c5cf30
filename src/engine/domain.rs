//! Interfaz pública del motor de alarmas.
//!
//! `EngineHandle` es el punto de acceso explícito al estado: se construye una
//! sola vez en `start_engine` y se clona hacia quien necesite leer el estado o
//! enviar comandos. Cada comando viaja por un canal MPSC hasta la tarea del
//! motor, que lo confirma por un canal `oneshot` una vez aplicado.


use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use crate::alarm::domain::Snapshot;


/// Errores observables desde `EngineHandle`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// El motor no está inicializado o ya fue finalizado.
    #[error("el motor de alarmas no está en ejecución")]
    NotRunning,

    #[error("zona desconocida: {0}")]
    UnknownZone(u32),

    #[error("dispositivo desconocido: {0}")]
    UnknownDevice(u32),
}


/// Comandos aceptados por el motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TestAlarm,
    SilenceAlarm,
    SystemCheck,
    RefreshData,
    SetZoneOffline { zone_id: u32, offline: bool },
    SetDeviceOffline { device_id: u32, offline: bool },
    Shutdown,
}


/// Respuesta del motor a un `Request`.
#[derive(Debug)]
pub enum Reply {
    Done,
    State(Box<Snapshot>),
}


/// Mensaje que circula por el canal de comandos.
#[derive(Debug)]
pub enum Request {
    Command {
        command: Command,
        reply: oneshot::Sender<Result<Reply, EngineError>>,
    },
    State {
        reply: oneshot::Sender<Result<Reply, EngineError>>,
    },
}


#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx_request: mpsc::Sender<Request>,
    rx_snapshot: watch::Receiver<Snapshot>,
}


impl EngineHandle {
    pub fn new(tx_request: mpsc::Sender<Request>, rx_snapshot: watch::Receiver<Snapshot>) -> Self {
        Self { tx_request, rx_snapshot }
    }

    pub async fn test_alarm(&self) -> Result<(), EngineError> {
        self.execute(Command::TestAlarm).await
    }

    pub async fn silence_alarm(&self) -> Result<(), EngineError> {
        self.execute(Command::SilenceAlarm).await
    }

    pub async fn system_check(&self) -> Result<(), EngineError> {
        self.execute(Command::SystemCheck).await
    }

    pub async fn refresh_data(&self) -> Result<(), EngineError> {
        self.execute(Command::RefreshData).await
    }

    pub async fn set_zone_offline(&self, zone_id: u32, offline: bool) -> Result<(), EngineError> {
        self.execute(Command::SetZoneOffline { zone_id, offline }).await
    }

    pub async fn set_device_offline(&self, device_id: u32, offline: bool) -> Result<(), EngineError> {
        self.execute(Command::SetDeviceOffline { device_id, offline }).await
    }

    /// Finaliza el motor: detiene el ticker y cancela el reinicio pendiente.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.execute(Command::Shutdown).await
    }

    /// Estado actual, leído por la propia tarea del motor después de
    /// procesar todo lo que ya estaba en cola.
    pub async fn state(&self) -> Result<Snapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx_request
            .send(Request::State { reply })
            .await
            .map_err(|_| EngineError::NotRunning)?;

        match rx.await.map_err(|_| EngineError::NotRunning)?? {
            Reply::State(snapshot) => Ok(*snapshot),
            Reply::Done => Err(EngineError::NotRunning),
        }
    }

    /// Última instantánea publicada, sin pasar por el motor.
    pub fn snapshot(&self) -> Snapshot {
        self.rx_snapshot.borrow().clone()
    }

    /// Suscripción para la capa de presentación; notifica cada cambio.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx_snapshot.clone()
    }

    /// Se completa cuando la tarea del motor terminó.
    pub async fn closed(&self) {
        self.tx_request.closed().await
    }

    async fn execute(&self, command: Command) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.tx_request
            .send(Request::Command { command, reply })
            .await
            .map_err(|_| EngineError::NotRunning)?;

        rx.await.map_err(|_| EngineError::NotRunning)?.map(|_| ())
    }
}

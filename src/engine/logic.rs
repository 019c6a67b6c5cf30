//! Tarea dueña del estado de alarmas.
//!
//! # Arquitectura de Actores
//! 1. `start_engine` crea los canales, el ticker y la tarea del motor.
//! 2. La tarea recibe `Request` desde los `EngineHandle` y `Event` desde los
//!    temporizadores, y los procesa de a uno: no hay dos mutaciones concurrentes.
//! 3. Tras cada mutación publica una `Snapshot` por el canal `watch`.
//! 4. Al finalizar aborta el ticker y cancela el reinicio pendiente de la
//!    prueba de alarma.


use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use crate::alarm::domain::Snapshot;
use crate::alarm::logic::AlarmState;
use crate::channels::domain::Channels;
use crate::context::domain::AppContext;
use crate::timer::domain::{start_reset_timer, Event, TimerHandle};
use crate::timer::logic::start_ticker;
use super::domain::{Command, EngineError, EngineHandle, Reply, Request};


/// Indica si el bucle del motor debe continuar.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}


struct Engine {
    state: AlarmState,
    ctx: AppContext,
    rng: StdRng,
    tx_timer: mpsc::Sender<Event>,
    tx_snapshot: watch::Sender<Snapshot>,
    ticker: Option<JoinHandle<()>>,
    reset_timer: Option<TimerHandle>,
    generation: u64,
}


impl Engine {

    fn handle_request(&mut self, request: Request) -> Flow {
        match request {
            Request::State { reply } => {
                let snapshot = Box::new(self.state.snapshot());
                send_reply(reply, Ok(Reply::State(snapshot)));
                Flow::Continue
            }
            Request::Command { command: Command::Shutdown, reply } => {
                info!("Info: finalización solicitada");
                self.dispose();
                send_reply(reply, Ok(Reply::Done));
                Flow::Stop
            }
            Request::Command { command, reply } => {
                let result = self.apply(command).map(|_| Reply::Done);
                if let Err(e) = &result {
                    warn!("Warn: comando {:?} rechazado: {}", command, e);
                }
                send_reply(reply, result);
                self.publish();
                Flow::Continue
            }
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        let now = Utc::now();
        debug!("Debug: comando entrante {:?}", command);

        match command {
            Command::TestAlarm => {
                self.state.test_alarm(now);
                self.schedule_reset();
            }
            Command::SilenceAlarm => {
                let silenced = self.state.silence_alarm(now);
                info!("Info: alarma silenciada = {}", silenced);
            }
            Command::SystemCheck => self.state.system_check(now),
            Command::RefreshData => self.state.refresh_data(now),
            Command::SetZoneOffline { zone_id, offline } => self.state.set_zone_offline(zone_id, offline)?,
            Command::SetDeviceOffline { device_id, offline } => self.state.set_device_offline(device_id, offline)?,
            Command::Shutdown => {}
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => {
                self.state.tick(&mut self.rng, Utc::now());
            }
            Event::TestAlarmExpired(generation) => {
                let current = self.reset_timer.as_ref().map(TimerHandle::generation);
                if current != Some(generation) {
                    debug!("Debug: reinicio obsoleto descartado (generación {})", generation);
                    return;
                }
                self.reset_timer = None;
                info!("Info: prueba de alarma finalizada");
                self.state.reset_test_alarm(Utc::now());
            }
        }
        self.publish();
    }

    /// Programa el reinicio de la prueba, reemplazando uno pendiente.
    fn schedule_reset(&mut self) {
        if let Some(previous) = self.reset_timer.take() {
            previous.cancel();
        }
        self.generation += 1;
        self.reset_timer = Some(start_reset_timer(
            self.tx_timer.clone(),
            self.ctx.system.test_alarm_reset(),
            self.generation,
        ));
    }

    fn publish(&self) {
        self.tx_snapshot.send_replace(self.state.snapshot());
    }

    fn dispose(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(timer) = self.reset_timer.take() {
            timer.cancel();
        }
    }
}


fn send_reply(reply: oneshot::Sender<Result<Reply, EngineError>>, result: Result<Reply, EngineError>) {
    if reply.send(result).is_err() {
        error!("Error: el solicitante ya no espera la respuesta");
    }
}


/// Bucle principal del motor.
///
/// Termina al recibir `Command::Shutdown` o cuando se liberan todos los
/// `EngineHandle`. En ambos casos libera los temporizadores antes de salir.
#[instrument(name = "run_engine_task", skip_all)]
async fn run_engine(mut engine: Engine,
                    mut rx_request: mpsc::Receiver<Request>,
                    mut rx_timer: mpsc::Receiver<Event>) {

    info!("Info: engine task creada");

    loop {
        tokio::select! {
            request = rx_request.recv() => {
                match request {
                    Some(request) => {
                        if engine.handle_request(request) == Flow::Stop {
                            break;
                        }
                    }
                    None => {
                        info!("Info: no quedan handles del motor");
                        break;
                    }
                }
            }
            Some(event) = rx_timer.recv() => {
                engine.handle_event(event);
            }
        }
    }

    engine.dispose();
    info!("Info: engine task finalizada");
}


/// Construye el estado inicial y pone en marcha el motor y su ticker.
///
/// Devuelve el `EngineHandle` para interactuar con el motor y el
/// `JoinHandle` de su tarea.
pub fn start_engine(ctx: AppContext) -> (EngineHandle, JoinHandle<()>) {

    info!("Info: iniciando motor de alarmas");

    let channels = Channels::new();
    let state = AlarmState::new(Utc::now(), ctx.system.timezone);
    let (tx_snapshot, rx_snapshot) = watch::channel(state.snapshot());
    let ticker = start_ticker(channels.timer_to_engine.clone(), ctx.system.tick_interval());

    let engine = Engine {
        state,
        rng: StdRng::from_os_rng(),
        tx_timer: channels.timer_to_engine,
        tx_snapshot,
        ticker: Some(ticker),
        reset_timer: None,
        generation: 0,
        ctx,
    };

    let task = tokio::spawn(run_engine(engine,
                                       channels.engine_from_handle,
                                       channels.engine_from_timer));

    (EngineHandle::new(channels.handle_to_engine, rx_snapshot), task)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;
    use crate::alarm::domain::Status;
    use crate::config::alarm::{BASELINE_SMOKE_LEVEL, INITIAL_BATTERY_LEVEL, TEST_ALARM_SMOKE_LEVEL};
    use crate::system::domain::System;

    fn quiet_context() -> AppContext {
        AppContext::new(System {
            tick_interval_ms: 3_600_000,
            ..System::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_goes_critical_then_resets_after_delay() {
        let (handle, _task) = start_engine(quiet_context());

        handle.test_alarm().await.unwrap();
        let state = handle.state().await.unwrap();
        assert!(state.alarming);
        assert_eq!(state.reading.smoke_level, TEST_ALARM_SMOKE_LEVEL);
        assert_eq!(state.status, Status::Critical);
        assert_eq!(state.active_alert_count, 1);

        sleep(Duration::from_secs(11)).await;

        let state = handle.state().await.unwrap();
        assert!(!state.alarming);
        assert_eq!(state.reading.smoke_level, BASELINE_SMOKE_LEVEL);
        assert_eq!(state.status, Status::Normal);
        assert_eq!(state.active_alert_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retriggering_replaces_pending_reset() {
        let (handle, _task) = start_engine(quiet_context());

        handle.test_alarm().await.unwrap();
        sleep(Duration::from_secs(6)).await;
        handle.test_alarm().await.unwrap();

        sleep(Duration::from_secs(5)).await;
        assert!(handle.state().await.unwrap().alarming);

        sleep(Duration::from_secs(6)).await;
        assert!(!handle.state().await.unwrap().alarming);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_move_the_readings() {
        let (handle, _task) = start_engine(AppContext::new(System::default()));

        sleep(Duration::from_millis(3_500)).await;

        let battery = handle.state().await.unwrap().reading.battery_level;
        assert!((battery - (INITIAL_BATTERY_LEVEL - 0.1)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_command_effects() {
        let (handle, _task) = start_engine(quiet_context());
        let mut rx = handle.subscribe();

        handle.system_check().await.unwrap();
        rx.changed().await.unwrap();

        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.alerts[0].message, "System check initiated");
        assert_eq!(handle.snapshot(), snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_and_refresh_go_through_the_handle() {
        let (handle, _task) = start_engine(quiet_context());

        handle.silence_alarm().await.unwrap();
        handle.refresh_data().await.unwrap();
        let state = handle.state().await.unwrap();

        assert!(state.silenced);
        let messages: Vec<_> = state.alerts.iter().take(2).map(|a| a.message.as_str()).collect();
        assert_eq!(messages, vec!["Data refreshed", "Alarm silenced"]);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_targets_are_reported_to_the_caller() {
        let (handle, _task) = start_engine(quiet_context());

        assert_eq!(handle.set_zone_offline(77, true).await, Err(EngineError::UnknownZone(77)));
        assert_eq!(handle.set_device_offline(77, true).await, Err(EngineError::UnknownDevice(77)));

        handle.set_zone_offline(2, true).await.unwrap();
        let zone = handle.state().await.unwrap().zones.into_iter().find(|z| z.id == 2);
        assert_eq!(zone.map(|z| z.status), Some(Status::Offline));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_reset_and_rejects_calls() {
        let (handle, task) = start_engine(quiet_context());

        handle.test_alarm().await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        sleep(Duration::from_secs(20)).await;

        assert!(handle.snapshot().alarming);
        assert_eq!(handle.refresh_data().await, Err(EngineError::NotRunning));
        assert_eq!(handle.state().await.map(|_| ()), Err(EngineError::NotRunning));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_the_engine() {
        let (handle, task) = start_engine(quiet_context());
        let other = handle.clone();
        drop(handle);
        drop(other);

        assert!(task.await.is_ok());
    }
}

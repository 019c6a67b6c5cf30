use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{sleep, Duration};
use tracing::debug;


/// Eventos de temporización dirigidos al motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Un ciclo de la simulación de sensores.
    Tick,
    /// Expiró la prueba de alarma con la generación indicada.
    TestAlarmExpired(u64),
}


/// Manejador de un temporizador de un solo disparo.
///
/// Cancelarlo aborta la tarea; si el evento ya estaba encolado, el motor
/// lo descarta comparando la generación.
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    abort: AbortHandle,
}


impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(self) {
        debug!("Debug: cancelando temporizador generación {}", self.generation);
        self.abort.abort();
    }
}


/// Programa el reinicio automático de una prueba de alarma.
///
/// Espera `duration` y envía `Event::TestAlarmExpired(generation)`.
pub fn start_reset_timer(tx_to_engine: mpsc::Sender<Event>,
                         duration: Duration,
                         generation: u64) -> TimerHandle {

    let task = tokio::spawn(async move {
        sleep(duration).await;
        // El motor puede haber terminado
        let _ = tx_to_engine.send(Event::TestAlarmExpired(generation)).await;
    });

    TimerHandle { generation, abort: task.abort_handle() }
}

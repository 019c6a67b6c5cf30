//! Generador de ticks de la simulación.
//!
//! Envía `Event::Tick` al motor a intervalo fijo. El primer tick llega
//! después de un período completo. La tarea termina cuando el motor cierra
//! su receptor o cuando el motor la aborta al finalizar.


use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};
use super::domain::Event;


#[instrument(name = "run_ticker_task", skip(tx_to_engine))]
pub async fn run_ticker(tx_to_engine: mpsc::Sender<Event>, period: Duration) {

    info!("Info: ticker task creada");

    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        debug!("Debug: tick");
        if tx_to_engine.send(Event::Tick).await.is_err() {
            break;
        }
    }
    info!("Info: ticker task finalizada");
}


/// Inicia el ticker en segundo plano y devuelve su `JoinHandle` para poder abortarlo.
pub fn start_ticker(tx_to_engine: mpsc::Sender<Event>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_ticker(tx_to_engine, period).await;
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_first_period() {
        let (tx, mut rx) = mpsc::channel(8);
        let handle = start_ticker(tx, Duration::from_secs(3));

        time::advance(Duration::from_millis(2_900)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(Event::Tick));
        assert_eq!(rx.recv().await, Some(Event::Tick));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_engine_side_closes() {
        let (tx, rx) = mpsc::channel(8);
        let handle = start_ticker(tx, Duration::from_secs(1));
        drop(rx);

        assert!(handle.await.is_ok());
    }
}

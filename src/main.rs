use crate::console::logic::{start_console_input, start_console_view};
use crate::context::domain::AppContext;
use crate::engine::logic::start_engine;
use crate::system::domain::{init_tracing, System};
use tracing::{error, info};

mod alarm;
mod channels;
mod config;
mod console;
mod context;
mod engine;
mod system;
mod timer;


#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {

    let system = System::new()?;
    init_tracing(&system);

    let app_context = AppContext::new(system);
    let (engine, engine_task) = start_engine(app_context.clone());

    start_console_view(engine.subscribe());
    start_console_input(engine.clone());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Info: señal de interrupción recibida");
            if let Err(e) = engine.shutdown().await {
                error!("Error: finalizando el motor. {e}");
            }
        }
        _ = engine.closed() => {}
    }

    engine_task.await?;
    info!("Info: proceso finalizado");
    Ok(())
}

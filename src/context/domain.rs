//! Definición del Contexto de Aplicación (Shared State).
//!
//! `AppContext` agrupa los recursos de solo lectura que necesitan las tareas
//! concurrentes. El estado mutable de las alarmas no vive aquí: lo posee la
//! tarea del motor y se accede a través de `EngineHandle`.


use std::sync::Arc;
use crate::system::domain::System;


#[derive(Clone, Debug)]
pub struct AppContext {
    pub system: Arc<System>,
}


impl AppContext {
    pub fn new(system: System) -> Self {
        Self { system: Arc::new(system) }
    }
}

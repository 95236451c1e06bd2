//! # Límite de Workers
//! src/server/gate.rs
//!
//! Contador de workers activos protegido por un `Mutex` + `Condvar`. El
//! master thread pide un `WorkerSlot` antes de lanzar cada worker y se
//! bloquea mientras haya `max_threads` activos; el slot se libera solo al
//! hacer drop, así que un worker que termina por cualquier camino
//! (incluido un panic) siempre devuelve su lugar.

use std::sync::{Arc, Condvar, Mutex};

/// Contador de workers activos
#[derive(Debug, Default)]
pub struct WorkerGate {
    active: Mutex<usize>,
    changed: Condvar,
}

impl WorkerGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Espera a que haya lugar (menos de `max` activos) y reserva un slot
    pub fn acquire(self: &Arc<Self>, max: usize) -> WorkerSlot {
        let max = max.max(1);
        let mut active = self.active.lock().unwrap();
        while *active >= max {
            active = self.changed.wait(active).unwrap();
        }
        *active += 1;

        WorkerSlot {
            gate: Arc::clone(self),
        }
    }

    /// Workers activos en este momento
    pub fn active(&self) -> usize {
        *self.active.lock().unwrap()
    }

    /// Bloquea hasta que no quede ningún worker activo
    pub fn wait_idle(&self) {
        let mut active = self.active.lock().unwrap();
        while *active > 0 {
            active = self.changed.wait(active).unwrap();
        }
    }

    fn release(&self) {
        let mut active = self.active.lock().unwrap();
        *active = active.saturating_sub(1);
        self.changed.notify_all();
    }
}

/// Lugar reservado para un worker; se libera en `Drop`
#[derive(Debug)]
pub struct WorkerSlot {
    gate: Arc<WorkerGate>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.gate.release();
    }
}

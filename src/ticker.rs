//! Live driving of a force simulation
//!
//! A [`SimulationHandle`] runs the simulation on a tokio task, one tick per
//! period, and hands every tick's positions to a callback. The task yields
//! between ticks so pointer events interleave with simulation steps. Once the
//! layout settles the task parks until a drag warms it up again.
//!
//! Ticks and drag updates both go through one mutex, so a drag override is
//! never interleaved with a half-applied tick. `stop()` takes the same lock,
//! which is what guarantees that no callback runs after it returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::{CanvasConfig, DEFAULT_TICK_RATE, MAX_TICK_RATE, MIN_TICK_RATE};
use crate::force::{ALPHA_MIN, ForceSimulation};
use crate::geometry::{LayoutResult, Point};
use crate::graph::Graph;
use crate::interaction::DragTarget;

/// Positions emitted after one simulation tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickUpdate {
    /// Ticks run so far, including this one
    pub tick: usize,
    pub alpha: f64,
    /// Node centres in graph order
    pub positions: Vec<Point>,
}

type TickCallback = Box<dyn FnMut(&TickUpdate) + Send>;

struct Shared {
    simulation: ForceSimulation,
    on_tick: TickCallback,
    stopped: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a running simulation; dropping it stops the simulation
pub struct SimulationHandle {
    shared: Arc<Mutex<Shared>>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Start a live force simulation of `graph`.
///
/// Must be called from within a tokio runtime.
pub fn start<F>(graph: &Graph, config: &CanvasConfig, on_tick: F) -> SimulationHandle
where
    F: FnMut(&TickUpdate) + Send + 'static,
{
    SimulationHandle::spawn(ForceSimulation::new(graph, config), config.tick_rate, on_tick)
}

impl SimulationHandle {
    /// Drive an existing simulation at `tick_rate` ticks per second, clamped
    /// to the range [`CanvasConfig::validate`] accepts
    pub fn spawn<F>(simulation: ForceSimulation, tick_rate: f64, on_tick: F) -> Self
    where
        F: FnMut(&TickUpdate) + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared {
            simulation,
            on_tick: Box::new(on_tick),
            stopped: false,
        }));
        let wake = Arc::new(Notify::new());
        let period = tick_period(tick_rate);

        let task = tokio::spawn(run(Arc::clone(&shared), Arc::clone(&wake), period));
        Self { shared, wake, task }
    }

    /// Stop the simulation. No tick callback runs after this returns.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        if !shared.stopped {
            shared.stopped = true;
            debug!(ticks = shared.simulation.ticks(), "simulation stopped");
        }
        drop(shared);
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.shared).stopped
    }

    /// Read the simulation state between ticks
    pub fn with_simulation<R>(&self, f: impl FnOnce(&ForceSimulation) -> R) -> R {
        f(&lock(&self.shared).simulation)
    }

    /// Geometry at the current tick
    pub fn geometry(&self) -> LayoutResult {
        self.with_simulation(ForceSimulation::geometry)
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Interval between ticks; never zero, never overflows a `Duration`
fn tick_period(tick_rate: f64) -> Duration {
    let rate = if tick_rate.is_finite() {
        tick_rate.clamp(MIN_TICK_RATE, MAX_TICK_RATE)
    } else {
        DEFAULT_TICK_RATE
    };
    if rate != tick_rate {
        debug!(requested = tick_rate, applied = rate, "tick rate clamped");
    }
    Duration::from_secs_f64(1.0 / rate)
}

async fn run(shared: Arc<Mutex<Shared>>, wake: Arc<Notify>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let settled = {
            let mut guard = lock(&shared);
            if guard.stopped {
                break;
            }
            let Shared {
                simulation,
                on_tick,
                ..
            } = &mut *guard;

            if simulation.is_running() || simulation.alpha_target() >= ALPHA_MIN {
                simulation.tick();
                on_tick(&TickUpdate {
                    tick: simulation.ticks(),
                    alpha: simulation.alpha(),
                    positions: simulation.positions(),
                });
                false
            } else {
                true
            }
        };

        if settled {
            debug!("simulation settled; parked until the next drag");
            wake.notified().await;
            interval.reset();
        }
    }
}

impl DragTarget for SimulationHandle {
    fn node_index(&self, id: &str) -> Option<usize> {
        lock(&self.shared).simulation.node_index(id)
    }

    fn drag_started(&mut self, index: usize) {
        lock(&self.shared).simulation.drag_started(index);
        self.wake.notify_one();
    }

    fn drag_moved(&mut self, index: usize, pointer: Point) -> Point {
        lock(&self.shared).simulation.drag_moved(index, pointer)
    }

    fn drag_ended(&mut self, index: usize) {
        lock(&self.shared).simulation.drag_ended(index);
    }
}

//! `hearth_cycles` — the light-cycle arena simulation: a representative
//! tick-driven `GamePlugin` exercising every real-time behavior the
//! substrate has to support (spec §4.H).

pub mod collision;
pub mod cycle;
pub mod destination;
pub mod engine;
pub mod events;
pub mod geometry;
pub mod grid;
pub mod plugin;
pub mod settings;
pub mod wall;

pub use engine::{EnginePhase, TickEngine};
pub use plugin::LightcyclesPlugin;
pub use settings::ArenaSettings;

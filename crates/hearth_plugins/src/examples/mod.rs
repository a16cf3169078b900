//! Reference plugins. Not wired into the `hearth` binary by default — kept
//! here to show a minimal, non-tick-driven `GamePlugin` implementation
//! alongside the tick-driven one in `hearth_cycles`.

pub mod ready_check;

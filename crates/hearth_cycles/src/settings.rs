//! Per-room tunables for the arena (spec §3 "settings", §4.H constants).
//! Parsed from a room's `settings.extra` JSON bag; the substrate never
//! reads these fields itself (spec §9, "tagged variants").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaSettings {
    /// Side length of the square arena, centered at the origin.
    pub arena_size: f64,
    /// Whether crossing the boundary teleports to the opposite edge
    /// instead of eliminating (spec §4.H, "Arena bounds").
    pub wrap_around: bool,
    /// Edge length of one collision-grid cell.
    pub grid_size: f64,
    /// Units travelled per second.
    pub speed: f64,
    /// Minimum real time between accepted turns for one cycle, in seconds
    /// (spec §4.H, "turnDelay ≈ 0.1s").
    pub turn_delay: f64,
    /// Whether a cycle can eliminate itself on its own trail.
    pub self_collision: bool,
    /// First player to reach this many round wins ends the game.
    pub rounds_to_win: u32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            arena_size: 100.0,
            wrap_around: false,
            grid_size: 1.0,
            speed: 20.0,
            turn_delay: 0.1,
            self_collision: true,
            rounds_to_win: 3,
        }
    }
}

impl ArenaSettings {
    /// Merges whatever fields are present in a room's `settings.extra`
    /// JSON bag over these defaults; unrecognized or absent fields fall
    /// back silently.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut settings = Self::default();
        let Some(obj) = value.as_object() else {
            return settings;
        };
        if let Some(v) = obj.get("arenaSize").and_then(|v| v.as_f64()) {
            settings.arena_size = v;
        }
        if let Some(v) = obj.get("wrapAround").and_then(|v| v.as_bool()) {
            settings.wrap_around = v;
        }
        if let Some(v) = obj.get("gridSize").and_then(|v| v.as_f64()) {
            settings.grid_size = v;
        }
        if let Some(v) = obj.get("speed").and_then(|v| v.as_f64()) {
            settings.speed = v;
        }
        if let Some(v) = obj.get("turnDelay").and_then(|v| v.as_f64()) {
            settings.turn_delay = v;
        }
        if let Some(v) = obj.get("selfCollision").and_then(|v| v.as_bool()) {
            settings.self_collision = v;
        }
        if let Some(v) = obj.get("roundsToWin").and_then(|v| v.as_u64()) {
            settings.rounds_to_win = v as u32;
        }
        settings
    }

    pub fn half_size(&self) -> f64 {
        self.arena_size / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_fall_back_to_defaults() {
        let settings = ArenaSettings::from_json(&json!({ "arenaSize": 200.0 }));
        assert_eq!(settings.arena_size, 200.0);
        assert_eq!(settings.speed, ArenaSettings::default().speed);
    }

    #[test]
    fn non_object_value_yields_defaults() {
        let settings = ArenaSettings::from_json(&serde_json::Value::Null);
        assert_eq!(settings.arena_size, ArenaSettings::default().arena_size);
    }
}

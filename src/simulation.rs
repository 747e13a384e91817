//! Attack simulation flags
//!
//! Flags that force specific factor scorers into an adversarial state so the
//! override and classification paths can be exercised deterministically. They
//! belong to a session and are handed to the engine on every evaluation; each
//! flag stays armed until `clear` is called.

use serde::{Deserialize, Serialize};

/// Simulated attacks a host can arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedAttack {
    /// Superhuman keystroke cadence
    BotTyping,
    /// Location jump no human could travel
    ImpossibleTravel,
}

/// Session-scoped simulation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationFlags {
    bot_typing: bool,
    impossible_travel: bool,
}

impl SimulationFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_bot_typing(&mut self) {
        log::warn!("bot typing simulation armed");
        self.bot_typing = true;
    }

    pub fn force_impossible_travel(&mut self) {
        log::warn!("impossible travel simulation armed");
        self.impossible_travel = true;
    }

    pub fn arm(&mut self, attack: SimulatedAttack) {
        match attack {
            SimulatedAttack::BotTyping => self.force_bot_typing(),
            SimulatedAttack::ImpossibleTravel => self.force_impossible_travel(),
        }
    }

    pub fn clear(&mut self) {
        self.bot_typing = false;
        self.impossible_travel = false;
    }

    pub fn bot_typing(&self) -> bool {
        self.bot_typing
    }

    pub fn impossible_travel(&self) -> bool {
        self.impossible_travel
    }

    pub fn any_active(&self) -> bool {
        self.bot_typing || self.impossible_travel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_stay_set_until_cleared() {
        let mut flags = SimulationFlags::new();
        assert!(!flags.any_active());

        flags.arm(SimulatedAttack::BotTyping);
        assert!(flags.bot_typing());
        assert!(!flags.impossible_travel());

        flags.force_impossible_travel();
        assert!(flags.impossible_travel());

        flags.clear();
        assert!(!flags.any_active());
    }

    #[test]
    fn test_attack_serialization() {
        let json = serde_json::to_string(&SimulatedAttack::ImpossibleTravel).unwrap();
        assert_eq!(json, "\"impossible_travel\"");
    }
}

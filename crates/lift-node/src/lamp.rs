//! Button lamps without hardware: transitions go to the log.

use std::collections::HashMap;

use lift_consensus::ButtonLamp;
use lift_protocol::{ButtonKind, Floor};

#[derive(Debug, Default)]
pub struct TracingLamp {
    lit: HashMap<(ButtonKind, Floor), bool>,
}

impl TracingLamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_lit(&self, button: ButtonKind, floor: Floor) -> bool {
        self.lit.get(&(button, floor)).copied().unwrap_or(false)
    }
}

impl ButtonLamp for TracingLamp {
    fn set(&mut self, button: ButtonKind, floor: Floor, lit: bool) {
        let previous = self.lit.insert((button, floor), lit).unwrap_or(false);
        if previous != lit {
            tracing::info!(button = %button, floor, lit, "Button lamp");
        }
    }
}

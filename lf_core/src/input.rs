//! Operator inputs: button edges and decoded remote codes.
//!
//! Events are handed to one injected `InputHandler`, which answers with the
//! drive action (if any) the loop should apply. Handlers never see the loop
//! itself.

use std::collections::HashMap;

use lf_traits::{BUTTON_COUNT, ButtonId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    /// A button went from released to pressed.
    Button(ButtonId),
    /// A decoded, non-repeat remote code.
    Remote(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveAction {
    Start,
    Stop,
    /// Set the base speed, then start.
    Go { base_speed: i16 },
}

pub trait InputHandler {
    fn handle(&mut self, event: InputEvent) -> Option<DriveAction>;
}

impl<F> InputHandler for F
where
    F: FnMut(InputEvent) -> Option<DriveAction>,
{
    fn handle(&mut self, event: InputEvent) -> Option<DriveAction> {
        self(event)
    }
}

/// Static bindings from buttons and remote codes to drive actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    buttons: [Option<DriveAction>; BUTTON_COUNT],
    remote: HashMap<u8, DriveAction>,
}

impl Keymap {
    /// No bindings at all.
    pub fn empty() -> Self {
        Self {
            buttons: [None; BUTTON_COUNT],
            remote: HashMap::new(),
        }
    }

    pub fn bind_button(&mut self, id: ButtonId, action: Option<DriveAction>) {
        self.buttons[id.index()] = action;
    }

    pub fn bind_remote(&mut self, code: u8, action: DriveAction) {
        self.remote.insert(code, action);
    }

    /// Drop every remote binding, keeping the buttons.
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    pub fn button(&self, id: ButtonId) -> Option<DriveAction> {
        self.buttons[id.index()]
    }

    pub fn remote(&self, code: u8) -> Option<DriveAction> {
        self.remote.get(&code).copied()
    }
}

impl Default for Keymap {
    /// Button 1 starts, button 2 stops; remote `0x52` stops and the digit row
    /// starts at base speed 0, 25, 50, 75 or 100.
    fn default() -> Self {
        let mut map = Self::empty();
        map.bind_button(ButtonId::One, Some(DriveAction::Start));
        map.bind_button(ButtonId::Two, Some(DriveAction::Stop));
        map.bind_remote(0x52, DriveAction::Stop);
        for (code, base_speed) in [(0x19, 0), (0x16, 25), (0x0D, 50), (0x0C, 75), (0x18, 100)] {
            map.bind_remote(code, DriveAction::Go { base_speed });
        }
        map
    }
}

impl InputHandler for Keymap {
    fn handle(&mut self, event: InputEvent) -> Option<DriveAction> {
        match event {
            InputEvent::Button(id) => self.button(id),
            InputEvent::Remote(code) => self.remote(code),
        }
    }
}

/// Press-edge detector over the button levels.
#[derive(Debug, Clone, Default)]
pub struct ButtonEdges {
    prev: [bool; BUTTON_COUNT],
}

impl ButtonEdges {
    /// Buttons that are pressed now and were released at the previous sample.
    pub fn update(
        &mut self,
        levels: [bool; BUTTON_COUNT],
    ) -> impl Iterator<Item = ButtonId> + use<> {
        let prev = std::mem::replace(&mut self.prev, levels);
        ButtonId::ALL
            .into_iter()
            .filter(move |id| levels[id.index()] && !prev[id.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_fire_once_per_press() {
        let mut edges = ButtonEdges::default();
        let first: Vec<_> = edges.update([true, false, false]).collect();
        assert_eq!(first, vec![ButtonId::One]);
        assert_eq!(edges.update([true, false, false]).count(), 0);
        let next: Vec<_> = edges.update([false, true, true]).collect();
        assert_eq!(next, vec![ButtonId::Two, ButtonId::Three]);
    }

    #[test]
    fn default_keymap_matches_board_layout() {
        let mut map = Keymap::default();
        assert_eq!(
            map.handle(InputEvent::Button(ButtonId::One)),
            Some(DriveAction::Start)
        );
        assert_eq!(map.handle(InputEvent::Button(ButtonId::Three)), None);
        assert_eq!(
            map.handle(InputEvent::Remote(0x0C)),
            Some(DriveAction::Go { base_speed: 75 })
        );
        assert_eq!(map.handle(InputEvent::Remote(0x52)), Some(DriveAction::Stop));
        assert_eq!(map.handle(InputEvent::Remote(0x00)), None);
    }

    #[test]
    fn closures_are_handlers() {
        let mut seen = 0;
        let mut handler = |ev: InputEvent| {
            seen += 1;
            matches!(ev, InputEvent::Remote(7)).then_some(DriveAction::Stop)
        };
        assert_eq!(handler.handle(InputEvent::Remote(7)), Some(DriveAction::Stop));
        assert_eq!(handler.handle(InputEvent::Remote(8)), None);
        drop(handler);
        assert_eq!(seen, 2);
    }
}

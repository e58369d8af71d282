//! Input injection boundary.
//!
//! The trigger fired after the final detection stage: move the pointer to the
//! click point, left-click, press the shift+plus chord, then confirm with
//! enter.

use crate::geometry::Point;
use crate::util::TriggerResult;
use std::time::Duration;

/// Default pause between injected input steps.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(100);

/// Performs the synthetic input sequence at a screen position.
pub trait ActionTrigger {
    fn act(&mut self, point: Point) -> TriggerResult<()>;
}

impl<A: ActionTrigger + ?Sized> ActionTrigger for Box<A> {
    fn act(&mut self, point: Point) -> TriggerResult<()> {
        (**self).act(point)
    }
}

/// One step of the injected sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputStep {
    MoveTo(Point),
    LeftClick,
    ShiftPlus,
    Enter,
}

/// The full sequence issued for a click at `point`.
pub fn input_sequence(point: Point) -> [InputStep; 4] {
    [
        InputStep::MoveTo(point),
        InputStep::LeftClick,
        InputStep::ShiftPlus,
        InputStep::Enter,
    ]
}

/// Injects input through `enigo`.
///
/// A fresh connection is opened for each sequence; steps are separated by
/// `delay`.
#[cfg(feature = "desktop")]
#[derive(Debug, Clone, Copy)]
pub struct EnigoTrigger {
    delay: Duration,
}

#[cfg(feature = "desktop")]
impl EnigoTrigger {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[cfg(feature = "desktop")]
impl Default for EnigoTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_DELAY)
    }
}

#[cfg(feature = "desktop")]
impl ActionTrigger for EnigoTrigger {
    fn act(&mut self, point: Point) -> TriggerResult<()> {
        use crate::trace::trace_debug;
        use crate::util::TriggerError;
        use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

        let fail = |e: enigo::InputError| TriggerError::Action(e.to_string());
        let mut enigo =
            Enigo::new(&Settings::default()).map_err(|e| TriggerError::Action(e.to_string()))?;

        for step in input_sequence(point) {
            trace_debug!("input step {:?}", step);
            match step {
                InputStep::MoveTo(p) => enigo.move_mouse(p.x, p.y, Coordinate::Abs).map_err(fail)?,
                InputStep::LeftClick => {
                    enigo.button(Button::Left, Direction::Press).map_err(fail)?;
                    enigo.button(Button::Left, Direction::Release).map_err(fail)?;
                }
                InputStep::ShiftPlus => {
                    enigo.key(Key::Shift, Direction::Press).map_err(fail)?;
                    let chord = enigo.key(Key::Unicode('='), Direction::Click).map_err(fail);
                    // Release shift even when the chord key failed.
                    enigo.key(Key::Shift, Direction::Release).map_err(fail)?;
                    chord?;
                }
                InputStep::Enter => enigo.key(Key::Return, Direction::Click).map_err(fail)?,
            }
            std::thread::sleep(self.delay);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{input_sequence, InputStep};
    use crate::geometry::Point;

    #[test]
    fn sequence_moves_before_clicking() {
        let steps = input_sequence(Point::new(2500, 1100));
        assert_eq!(steps[0], InputStep::MoveTo(Point::new(2500, 1100)));
        assert_eq!(steps[1], InputStep::LeftClick);
        assert_eq!(steps[3], InputStep::Enter);
    }
}

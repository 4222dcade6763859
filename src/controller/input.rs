//! # Raw Controller Input
//!
//! Snapshot of every axis, button and hat switch of one controller.

use super::mapping::HatAxis;

/// Hat switch position, `(x, y)` with each component in {-1, 0, 1}
pub type HatState = (i8, i8);

/// Raw controller state at one instant
///
/// Indices match the device's own numbering. Reading an index the device
/// does not have yields the resting value (0.0, released, centered).
///
/// # Examples
///
/// ```
/// use crsf_bridge::controller::input::RawInput;
///
/// let input = RawInput {
///     axes: vec![0.5, -1.0],
///     buttons: vec![true],
///     hats: vec![(1, 0)],
/// };
/// assert_eq!(input.axis(1), -1.0);
/// assert_eq!(input.axis(7), 0.0);
/// assert!(input.button(0));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    /// Analog axes, -1.0..=1.0
    pub axes: Vec<f32>,

    /// Digital buttons, `true` = pressed
    pub buttons: Vec<bool>,

    /// Hat switches
    pub hats: Vec<HatState>,
}

impl RawInput {
    /// Axis value; non-finite readings count as centered.
    pub fn axis(&self, index: usize) -> f32 {
        self.axes
            .get(index)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn hat(&self, index: usize, axis: HatAxis) -> i8 {
        let (x, y) = self.hats.get(index).copied().unwrap_or((0, 0));
        match axis {
            HatAxis::X => x,
            HatAxis::Y => y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inputs_rest() {
        let input = RawInput::default();
        assert_eq!(input.axis(0), 0.0);
        assert!(!input.button(3));
        assert_eq!(input.hat(0, HatAxis::X), 0);
        assert_eq!(input.hat(0, HatAxis::Y), 0);
    }

    #[test]
    fn test_non_finite_axis_is_centered() {
        let input = RawInput {
            axes: vec![f32::NAN, f32::INFINITY],
            ..RawInput::default()
        };
        assert_eq!(input.axis(0), 0.0);
        assert_eq!(input.axis(1), 0.0);
    }

    #[test]
    fn test_hat_components() {
        let input = RawInput {
            hats: vec![(0, 0), (-1, 1)],
            ..RawInput::default()
        };
        assert_eq!(input.hat(1, HatAxis::X), -1);
        assert_eq!(input.hat(1, HatAxis::Y), 1);
    }
}

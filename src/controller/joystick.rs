//! # Joystick Input Module
//!
//! Generic Linux joystick input through evdev.
//!
//! ## Device Detection
//!
//! A device counts as a joystick when it reports `ABS_X` and at least one
//! joystick or gamepad button (`BTN_JOYSTICK..=BTN_THUMBR`, or the
//! `BTN_TRIGGER_HAPPY` block).
//!
//! ## Index Assignment
//!
//! - Axes: every absolute axis below `ABS_MISC` except the hat axes, in
//!   event code order. Values are normalized to -1.0..=1.0 using the range
//!   the kernel reports for each axis.
//! - Buttons: supported button codes in ascending order.
//! - Hats: `ABS_HAT0X..=ABS_HAT3Y`, two codes per hat. Y is reported with
//!   up as +1.

use evdev::{AbsoluteAxisType, Device, InputEvent, InputEventKind};
use std::path::Path;
use std::thread::JoinHandle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::input::RawInput;
use crate::error::{BridgeError, Result};

/// First hat axis code (`ABS_HAT0X`)
const ABS_HAT_FIRST: u16 = 0x10;

/// Last hat axis code (`ABS_HAT3Y`)
const ABS_HAT_LAST: u16 = 0x17;

/// Axis codes at or above `ABS_MISC` are not stick-like
const ABS_AXIS_END: u16 = 0x28;

/// `BTN_JOYSTICK` (`BTN_TRIGGER`) through `BTN_THUMBR`
const BTN_JOYSTICK_RANGE: std::ops::RangeInclusive<u16> = 0x120..=0x13e;

/// `BTN_TRIGGER_HAPPY1` through `BTN_TRIGGER_HAPPY40`
const BTN_TRIGGER_HAPPY_RANGE: std::ops::RangeInclusive<u16> = 0x2c0..=0x2e7;

/// Range assumed when the kernel reports none
const DEFAULT_AXIS_RANGE: (i32, i32) = (-32768, 32767);

fn is_hat_code(code: u16) -> bool {
    (ABS_HAT_FIRST..=ABS_HAT_LAST).contains(&code)
}

fn is_axis_code(code: u16) -> bool {
    code < ABS_AXIS_END && !is_hat_code(code)
}

fn is_button_code(code: u16) -> bool {
    BTN_JOYSTICK_RANGE.contains(&code) || BTN_TRIGGER_HAPPY_RANGE.contains(&code)
}

/// Scales a raw axis reading from `min..=max` to -1.0..=1.0.
///
/// A degenerate range reads as centered.
pub fn normalize_axis(value: i32, min: i32, max: i32) -> f32 {
    if max <= min {
        return 0.0;
    }
    let span = (max as f64) - (min as f64);
    let scaled = ((value as f64) - (min as f64)) / span * 2.0 - 1.0;
    scaled.clamp(-1.0, 1.0) as f32
}

/// Kernel-reported range of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub code: u16,
    pub min: i32,
    pub max: i32,
}

/// Maps evdev event codes to [`RawInput`] indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoystickLayout {
    axes: Vec<AxisRange>,
    buttons: Vec<u16>,
    hats: usize,
}

impl JoystickLayout {
    /// Builds a layout; axes and buttons are ordered by event code.
    pub fn new(mut axes: Vec<AxisRange>, mut buttons: Vec<u16>, hats: usize) -> Self {
        axes.sort_by_key(|axis| axis.code);
        axes.dedup_by_key(|axis| axis.code);
        buttons.sort_unstable();
        buttons.dedup();
        Self { axes, buttons, hats }
    }

    /// Reads the layout from the device's capabilities.
    pub fn from_device(device: &Device) -> Self {
        let abs_state = device.get_abs_state().ok();

        let axes = device
            .supported_absolute_axes()
            .map(|set| {
                set.iter()
                    .filter(|axis| is_axis_code(axis.0))
                    .map(|axis| {
                        let (min, max) = abs_state
                            .as_ref()
                            .map(|state| {
                                let info = &state[axis.0 as usize];
                                (info.minimum, info.maximum)
                            })
                            .unwrap_or(DEFAULT_AXIS_RANGE);
                        AxisRange {
                            code: axis.0,
                            min,
                            max,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let hats = device
            .supported_absolute_axes()
            .and_then(|set| {
                set.iter()
                    .filter(|axis| is_hat_code(axis.0))
                    .map(|axis| usize::from((axis.0 - ABS_HAT_FIRST) / 2) + 1)
                    .max()
            })
            .unwrap_or(0);

        let buttons = device
            .supported_keys()
            .map(|keys| {
                keys.iter()
                    .map(|key| key.code())
                    .filter(|&code| is_button_code(code))
                    .collect()
            })
            .unwrap_or_default();

        Self::new(axes, buttons, hats)
    }

    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    pub fn hat_count(&self) -> usize {
        self.hats
    }

    /// All inputs at rest, sized to this layout.
    pub fn neutral_state(&self) -> RawInput {
        RawInput {
            axes: vec![0.0; self.axes.len()],
            buttons: vec![false; self.buttons.len()],
            hats: vec![(0, 0); self.hats],
        }
    }

    /// Applies one evdev event to `state`. Returns whether it was relevant.
    pub fn apply(&self, state: &mut RawInput, event: &InputEvent) -> bool {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.apply_abs(state, axis.0, event.value()),
            InputEventKind::Key(key) => self.apply_key(state, key.code(), event.value() != 0),
            _ => false,
        }
    }

    fn apply_abs(&self, state: &mut RawInput, code: u16, value: i32) -> bool {
        if is_hat_code(code) {
            let offset = code - ABS_HAT_FIRST;
            let Some(hat) = state.hats.get_mut(usize::from(offset / 2)) else {
                return false;
            };
            let direction = value.signum() as i8;
            if offset % 2 == 0 {
                hat.0 = direction;
            } else {
                // evdev reports up as negative
                hat.1 = -direction;
            }
            return true;
        }

        let Some(index) = self.axes.iter().position(|axis| axis.code == code) else {
            return false;
        };
        let range = self.axes[index];
        match state.axes.get_mut(index) {
            Some(slot) => {
                *slot = normalize_axis(value, range.min, range.max);
                true
            }
            None => false,
        }
    }

    fn apply_key(&self, state: &mut RawInput, code: u16, pressed: bool) -> bool {
        let Ok(index) = self.buttons.binary_search(&code) else {
            return false;
        };
        match state.buttons.get_mut(index) {
            Some(slot) => {
                *slot = pressed;
                true
            }
            None => false,
        }
    }
}

/// Whether `device` looks like a joystick or gamepad
fn is_joystick(device: &Device) -> bool {
    let has_stick = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_X));
    let has_buttons = device
        .supported_keys()
        .is_some_and(|keys| keys.iter().any(|key| is_button_code(key.code())));

    has_stick && has_buttons
}

/// Open joystick handle
pub struct Joystick {
    device: Device,
    device_path: String,
    layout: JoystickLayout,
    state: RawInput,
}

impl std::fmt::Debug for Joystick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Joystick")
            .field("device_path", &self.device_path)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Joystick {
    /// Open the joystick at `device_path`, or detect one when it is empty.
    ///
    /// # Errors
    ///
    /// - `Controller`: the device cannot be opened
    /// - `ControllerNotFound`: detection found no joystick
    pub fn open(device_path: &str) -> Result<Self> {
        if device_path.trim().is_empty() {
            return Self::detect();
        }

        let device = Device::open(device_path)
            .map_err(|e| BridgeError::Controller(format!("Failed to open {}: {}", device_path, e)))?;
        Ok(Self::from_device(device, device_path.to_string()))
    }

    /// Scan `/dev/input/event*` and open the first joystick.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_bridge::controller::joystick::Joystick;
    ///
    /// let joystick = Joystick::detect()?;
    /// println!("Connected to joystick at: {}", joystick.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn detect() -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(BridgeError::Controller(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| BridgeError::Controller(format!("Failed to read /dev/input: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BridgeError::Controller(format!("Failed to read directory entry: {}", e)))?;

        // Deterministic choice when several joysticks are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"));
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) if is_joystick(&device) => {
                    let device_path = path.to_string_lossy().to_string();
                    info!(
                        "Found joystick '{}' at {}",
                        device.name().unwrap_or("unknown"),
                        device_path
                    );
                    return Ok(Self::from_device(device, device_path));
                }
                Ok(_) => debug!("Skipping non-joystick input device {}", path.display()),
                Err(e) => debug!("Could not open {}: {}", path.display(), e),
            }
        }

        Err(BridgeError::ControllerNotFound)
    }

    fn from_device(device: Device, device_path: String) -> Self {
        let layout = JoystickLayout::from_device(&device);
        let mut state = layout.neutral_state();

        // Seed with current positions so a held stick is not reported centered
        if let Ok(abs_state) = device.get_abs_state() {
            for code in (0..ABS_AXIS_END).filter(|&code| is_axis_code(code) || is_hat_code(code)) {
                layout.apply_abs(&mut state, code, abs_state[code as usize].value);
            }
        }

        info!(
            "Joystick layout: {} axes, {} buttons, {} hats",
            layout.axis_count(),
            layout.button_count(),
            layout.hat_count()
        );

        Self {
            device,
            device_path,
            layout,
            state,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    pub fn layout(&self) -> &JoystickLayout {
        &self.layout
    }

    /// Current input state
    pub fn state(&self) -> &RawInput {
        &self.state
    }

    /// Wait for the next batch of events and apply them.
    ///
    /// Blocks until the device reports something. Returns whether any input
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if reading fails (e.g., the joystick was unplugged).
    pub fn poll(&mut self) -> Result<bool> {
        let events = self
            .device
            .fetch_events()
            .map_err(|e| BridgeError::Controller(format!("Failed to fetch events: {}", e)))?;

        let mut changed = false;
        for event in events {
            changed |= self.layout.apply(&mut self.state, &event);
        }
        Ok(changed)
    }

    /// Publish input into `input` from a dedicated thread until the device
    /// fails or every receiver is gone.
    ///
    /// On failure the inputs are returned to rest before the thread exits.
    pub fn spawn(mut self, input: watch::Sender<RawInput>) -> Result<JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("joystick".to_string())
            .spawn(move || {
                input.send_replace(self.state.clone());

                while !input.is_closed() {
                    match self.poll() {
                        Ok(true) => {
                            input.send_replace(self.state.clone());
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!("Joystick {} lost: {}", self.device_path, e);
                            input.send_replace(self.layout.neutral_state());
                            break;
                        }
                    }
                }
            })?;

        Ok(handle)
    }
}

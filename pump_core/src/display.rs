//! Two-line status screens for the character LCD.

use pump_traits::{CharacterDisplay, PumpId};
use tracing::debug;

use crate::error::PumpError;
use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Manual,
    Auto,
}

/// The two pages of the dual-fault alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmPage {
    #[default]
    Fault,
    CallService,
}

impl AlarmPage {
    pub fn next(self) -> AlarmPage {
        match self {
            AlarmPage::Fault => AlarmPage::CallService,
            AlarmPage::CallService => AlarmPage::Fault,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    Starting,
    Waiting,
    Running { mode: OperatingMode, pump: PumpId },
    StartRefused { mode: OperatingMode, pump: PumpId },
    Readings { pump: PumpId, amps: f32, celsius: i32 },
    DualFault(AlarmPage),
}

impl Screen {
    /// Unpadded text of both lines.
    pub fn lines(&self) -> (String, String) {
        fn mode_line(mode: OperatingMode) -> String {
            match mode {
                OperatingMode::Manual => "Mode: Manual".into(),
                OperatingMode::Auto => "Mode: Auto".into(),
            }
        }
        match *self {
            Screen::Starting => ("Starting...".into(), String::new()),
            Screen::Waiting => ("Waiting...".into(), String::new()),
            Screen::Running { mode, pump } => (mode_line(mode), format!("Pump {pump}: ON")),
            Screen::StartRefused { mode, pump } => {
                (mode_line(mode), format!("Pump {pump}: FAULT"))
            }
            Screen::Readings {
                pump,
                amps,
                celsius,
            } => (
                format!("I P{pump}: {amps:.1} A"),
                format!("Temp P{pump}: {celsius} C"),
            ),
            Screen::DualFault(AlarmPage::Fault) => ("Fault on".into(), "both pumps".into()),
            Screen::DualFault(AlarmPage::CallService) => {
                ("Call service".into(), "technician".into())
            }
        }
    }
}

/// Centre `text` in `width` columns, truncating what does not fit.
pub fn center(text: &str, width: usize) -> String {
    let clipped: String = text.chars().take(width).collect();
    format!("{clipped:^width$}")
}

#[derive(Debug)]
pub struct DisplayPresenter {
    width: usize,
    last: Option<(String, String)>,
}

impl DisplayPresenter {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            last: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Padded lines exactly `width` characters long.
    pub fn render(&self, screen: &Screen) -> (String, String) {
        let (l1, l2) = screen.lines();
        (center(&l1, self.width), center(&l2, self.width))
    }

    /// Send `screen` unless it is already showing. Returns whether the
    /// device was written.
    pub fn show(
        &mut self,
        screen: &Screen,
        display: &mut dyn CharacterDisplay,
    ) -> Result<bool, PumpError> {
        let lines = self.render(screen);
        if self.last.as_ref() == Some(&lines) {
            return Ok(false);
        }
        display
            .show_lines(&lines.0, &lines.1)
            .map_err(|e| map_hw_error("display write", &*e))?;
        debug!(line1 = lines.0.trim(), line2 = lines.1.trim(), "display");
        self.last = Some(lines);
        Ok(true)
    }

    /// Forget what is on the glass; the next `show` always writes.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

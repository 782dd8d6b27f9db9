use std::fmt::{Display, Formatter};

pub mod dummy;

#[cfg(target_family = "unix")]
pub mod sysfs_gpio;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GPIOState {
    High,
    Low,
}

#[derive(Debug)]
#[allow(dead_code)]
pub enum GPIOMode {
    Input,
    Output,
}

#[derive(Debug)]
pub enum GPIOError {
    PinNotSetup,
    PinInIncorrectMode { required_mode: GPIOMode },
    Io(std::io::Error),
    Other(String),
}

impl Display for GPIOError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GPIOError::PinNotSetup => write!(f, "Pin not setup"),
            GPIOError::PinInIncorrectMode { required_mode } => {
                write!(f, "Pin in incorrect mode, requires {:?}", required_mode)
            }
            GPIOError::Io(err) => write!(f, "IO error: {}", err),
            GPIOError::Other(s) => write!(f, "{}", s),
        }
    }
}

pub trait GPIOManager: Send {
    fn setup(&mut self, pin: usize, mode: &GPIOMode) -> Result<(), GPIOError>;

    fn set_pin(&mut self, pin_id: usize, state: &GPIOState) -> Result<(), GPIOError>;

    fn get_pin(&self, pin: usize) -> Result<GPIOState, GPIOError>;
}

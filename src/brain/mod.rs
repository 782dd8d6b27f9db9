use backtrace::Backtrace;
use std::fmt::{Display, Formatter};

pub mod control_task;
pub mod hysteresis;
pub mod pwm;
pub mod setpoint;
pub mod setpoint_determiner;

#[derive(Debug)]
pub struct BrainFailure {
    description: String,
    trace: Backtrace,
    line_num: u32,
    file_name: String,
    actions: CorrectiveActions,
}

impl BrainFailure {
    pub fn new(
        description: String,
        trace: Backtrace,
        line_num: u32,
        file_name: String,
        actions: CorrectiveActions,
    ) -> Self {
        BrainFailure {
            description,
            trace,
            line_num,
            file_name,
            actions,
        }
    }

    pub fn get_description(&self) -> &str {
        &self.description
    }

    pub fn get_corrective_actions(&self) -> &CorrectiveActions {
        &self.actions
    }

    /// A fatal failure means the control loop must stop and the outputs must be forced off.
    pub fn is_fatal(&self) -> bool {
        self.actions.should_halt()
    }
}

impl Display for BrainFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BrainFailure occured: '{}'", self.description)?;
        writeln!(f, "Recommended corrective actions: {:?}", self.actions)?;
        writeln!(f, "At: Line {} in {}", self.line_num, self.file_name)?;
        writeln!(f, "Trace:{:?}", self.trace)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CorrectiveActions {
    outputs_state_unknown: bool,
    halt: bool,
}

impl CorrectiveActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unknown_outputs() -> Self {
        CorrectiveActions::new().with_unknown_outputs_state()
    }

    /// Both outputs were seen enabled at once, nothing may keep driving them.
    pub fn halt() -> Self {
        CorrectiveActions::new().with_unknown_outputs_state().with_halt()
    }

    pub fn is_outputs_state_unknown(&self) -> bool {
        self.outputs_state_unknown
    }

    pub fn should_halt(&self) -> bool {
        self.halt
    }

    pub fn with_unknown_outputs_state(mut self) -> Self {
        self.outputs_state_unknown = true;
        self
    }

    pub fn with_halt(mut self) -> Self {
        self.halt = true;
        self
    }
}

#[macro_export]
macro_rules! brain_fail {
    ($msg:expr) => {{
        let trace = backtrace::Backtrace::new();
        let actions = $crate::brain::CorrectiveActions::new();
        $crate::brain::BrainFailure::new(
            $msg.to_string(),
            trace,
            line!(),
            file!().to_owned(),
            actions,
        )
    }};
    ($msg:expr, $actions:expr) => {{
        let trace = backtrace::Backtrace::new();
        $crate::brain::BrainFailure::new(
            $msg.to_string(),
            trace,
            line!(),
            file!().to_owned(),
            $actions,
        )
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macro_records_location() {
        let failure = brain_fail!("Something broke");
        assert_eq!(failure.get_description(), "Something broke");
        assert!(!failure.is_fatal());
        assert!(failure.to_string().contains("brain/mod.rs"));
    }

    #[test]
    fn test_halt_is_fatal() {
        let failure = brain_fail!(format!("Both outputs {}", "on"), CorrectiveActions::halt());
        assert!(failure.is_fatal());
        assert!(failure.get_corrective_actions().is_outputs_state_unknown());
    }
}

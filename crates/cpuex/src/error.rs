use cpuex_error::define_error;

define_error! {
    /// Ways the dispatcher refuses a request.
    pub enum ExceptionError(0x01) {
        /// Trap taken while a handler was still running
        NestedFault = 0x01 => "Exception raised while a handler was running",
        /// Trap taken after a handler gave up on the core
        Terminated = 0x02 => "Exception raised after a terminal outcome",
        /// Handler slot touched while an exception is in flight
        HandlerBusy = 0x03 => "Handler cannot change while an exception is in flight",
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ExceptionError::NestedFault.code(), 0x0101);
        assert_eq!(ExceptionError::Terminated.code(), 0x0102);
        assert_eq!(ExceptionError::HandlerBusy.code(), 0x0103);
        assert_eq!(
            std::format!("{}", ExceptionError::NestedFault),
            "E0101: Exception raised while a handler was running"
        );
    }
}

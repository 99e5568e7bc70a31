/// Process exit codes: 0 success, 1 configuration error, 2 partial
/// completion, 3 aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    ConfigError,
    PartialCompletion,
    Aborted,
}

impl ExitCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::ConfigError => 1,
            Self::PartialCompletion => 2,
            Self::Aborted => 3,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code.as_i32() as u8)
    }
}

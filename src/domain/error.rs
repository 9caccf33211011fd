//! Domain error types.

/// Top-level error type for strategy-arena.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {id}")]
    UnknownStrategy { id: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("model error: {reason}")]
    Model { reason: String },

    #[error("run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ArenaError> for std::process::ExitCode {
    fn from(err: &ArenaError) -> Self {
        let code: u8 = match err {
            ArenaError::Io(_) | ArenaError::Report { .. } => 1,
            ArenaError::ConfigParse { .. }
            | ArenaError::ConfigMissing { .. }
            | ArenaError::ConfigInvalid { .. }
            | ArenaError::UnknownStrategy { .. } => 2,
            ArenaError::Data { .. } | ArenaError::Model { .. } => 3,
            ArenaError::NoData { .. } | ArenaError::InsufficientData { .. } => 5,
            ArenaError::Cancelled => 130,
        };
        std::process::ExitCode::from(code)
    }
}

/// Run-scoped outcome of a backtest that produced no metrics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BacktestError {
    /// No symbol has a single quote inside the requested window.
    #[error("no usable price history in the requested window")]
    NoData,

    #[error("backtest cancelled")]
    Cancelled,
}

impl From<BacktestError> for ArenaError {
    fn from(err: BacktestError) -> Self {
        match err {
            BacktestError::NoData => ArenaError::NoData {
                symbol: "all".to_string(),
            },
            BacktestError::Cancelled => ArenaError::Cancelled,
        }
    }
}

/// Tournament-scoped failures. Per-run failures never surface here; they are
/// recorded as [`crate::domain::tournament::RunFailure`] markers instead.
#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    #[error("tournament cancelled")]
    Cancelled,

    #[error("worker pool error: {reason}")]
    Runtime { reason: String },
}

impl From<TournamentError> for ArenaError {
    fn from(err: TournamentError) -> Self {
        match err {
            TournamentError::Cancelled => ArenaError::Cancelled,
            TournamentError::Runtime { reason } => ArenaError::Io(std::io::Error::other(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::ExitCode;

    #[test]
    fn exit_codes_by_category() {
        let config = ArenaError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        };
        assert_eq!(ExitCode::from(&config), ExitCode::from(2));

        let no_data = ArenaError::NoData {
            symbol: "AAPL".into(),
        };
        assert_eq!(ExitCode::from(&no_data), ExitCode::from(5));

        assert_eq!(ExitCode::from(&ArenaError::Cancelled), ExitCode::from(130));
    }

    #[test]
    fn backtest_error_converts() {
        let err: ArenaError = BacktestError::NoData.into();
        assert!(matches!(err, ArenaError::NoData { .. }));
        let err: ArenaError = BacktestError::Cancelled.into();
        assert!(matches!(err, ArenaError::Cancelled));
    }

    #[test]
    fn display_includes_context() {
        let err = ArenaError::InsufficientData {
            symbol: "MSFT".into(),
            bars: 10,
            minimum: 50,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data for MSFT: have 10 bars, need 50"
        );
    }
}

//! Result consumption port.

use crate::domain::error::ArenaError;
use crate::domain::tournament::TournamentResult;

/// Port for writing tournament results somewhere durable.
pub trait ReportPort {
    fn write_tournament(
        &self,
        result: &TournamentResult,
        output_path: &str,
    ) -> Result<(), ArenaError>;
}

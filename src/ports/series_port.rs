//! Per-symbol series source port trait.

use crate::domain::error::FutalphaError;
use crate::domain::series::SymbolSeries;

pub trait SeriesPort {
    /// Full, date-ordered history for one symbol.
    fn load_series(&self, symbol: &str) -> Result<SymbolSeries, FutalphaError>;

    /// Symbols the source can supply, sorted.
    fn list_symbols(&self) -> Result<Vec<String>, FutalphaError>;
}

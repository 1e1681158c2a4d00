pub mod loader;
pub mod types;

pub use loader::{load_csv, read_csv, LoaderError};
pub use types::{Bar, PriceSeries, SeriesError};

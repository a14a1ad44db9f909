//! UI panels

mod measures;
mod meter;
mod transport;

pub use measures::MeasuresPanel;
pub use meter::{MeterAction, MeterPanel};
pub use transport::{TransportAction, TransportPanel};

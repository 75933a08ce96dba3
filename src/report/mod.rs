pub mod aggregator;
pub mod renderer;
pub mod summary;
pub mod views;

pub use aggregator::*;
pub use renderer::*;
pub use summary::*;
pub use views::*;

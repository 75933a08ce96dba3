pub mod column_normalizer;
pub mod rule_normalizer;

pub use column_normalizer::*;
pub use rule_normalizer::*;

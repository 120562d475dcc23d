pub mod criteria;
pub mod result;
pub mod visualization;

pub mod filter;
pub mod interp;
pub mod stats;

pub use filter::GaussianFilter;
pub use interp::LinearInterpolator;
pub use stats::StatsHelper;

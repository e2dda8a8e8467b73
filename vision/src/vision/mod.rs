pub mod classifier;
pub mod roi;
pub mod uncertainty;
pub mod window;

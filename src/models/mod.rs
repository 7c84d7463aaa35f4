pub mod batch;
pub mod drug;
pub mod order;
pub mod order_item;
pub mod user;

pub use drug::Drug;

pub mod controller;
pub mod handle;

pub use controller::StoreController;
pub use handle::StoreHandle;

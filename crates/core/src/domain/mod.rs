pub mod item;
pub mod scenario;
pub mod status;
pub mod value;

pub mod alert;
pub mod jump;
pub mod model;
pub mod registry;
pub mod store;

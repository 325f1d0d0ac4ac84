pub mod inventory;
pub mod inventory_batch;
pub mod payment;
pub mod product;
pub mod sale;
pub mod sale_item;
pub mod stock_movement;

pub use inventory_batch::BatchStatus;
pub use payment::PaymentMethod;
pub use stock_movement::MovementType;

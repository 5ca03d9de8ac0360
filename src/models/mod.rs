pub mod address;
pub mod cart;
pub mod checkout;
pub mod common;
pub mod order;
pub mod pagination;
pub mod payment;
pub mod product;
pub mod shipping;

pub use address::*;
pub use cart::*;
pub use checkout::*;
pub use common::*;
pub use order::*;
pub use pagination::*;
pub use payment::*;
pub use product::*;
pub use shipping::*;

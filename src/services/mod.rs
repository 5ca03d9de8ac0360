pub mod address_service;
pub mod cart_service;
pub mod checkout_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod shipping_service;
pub mod sync_service;

pub use address_service::*;
pub use cart_service::*;
pub use checkout_service::*;
pub use notification_service::*;
pub use order_service::*;
pub use product_service::*;
pub use shipping_service::*;
pub use sync_service::*;

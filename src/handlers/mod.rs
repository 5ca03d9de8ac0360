pub mod address;
pub mod admin;
pub mod cart;
pub mod checkout;
pub mod order;
pub mod product;
pub mod shipping;

pub use address::address_config;
pub use admin::admin_config;
pub use cart::cart_config;
pub use checkout::checkout_config;
pub use order::order_config;
pub use product::product_config;
pub use shipping::shipping_config;

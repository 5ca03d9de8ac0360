pub mod addresses;
pub mod cart_items;
pub mod carts;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod products;
pub mod shipping_methods;
pub mod users;

pub use addresses as address_entity;
pub use cart_items as cart_item_entity;
pub use carts as cart_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use payments as payment_entity;
pub use products as product_entity;
pub use shipping_methods as shipping_method_entity;
pub use users as user_entity;

pub use addresses::AddressType;
pub use orders::OrderStatus;
pub use payments::PaymentStatus;

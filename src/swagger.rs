use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{AddressType, OrderStatus, PaymentStatus};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::product::list_products,
        handlers::product::get_product,
        handlers::cart::get_cart,
        handlers::cart::add_item,
        handlers::cart::update_item,
        handlers::cart::remove_item,
        handlers::cart::clear_cart,
        handlers::address::list_addresses,
        handlers::address::create_address,
        handlers::address::update_address,
        handlers::address::delete_address,
        handlers::address::set_default_address,
        handlers::shipping::list_shipping_methods,
        handlers::checkout::start_checkout,
        handlers::checkout::get_session,
        handlers::checkout::select_address,
        handlers::checkout::create_address,
        handlers::checkout::select_shipping,
        handlers::checkout::place_order,
        handlers::checkout::retry_checkout,
        handlers::checkout::close_checkout,
        handlers::order::get_orders,
        handlers::order::get_live_orders,
        handlers::order::get_order,
        handlers::admin::get_order_queue,
        handlers::admin::get_order_alerts,
        handlers::admin::list_orders,
        handlers::admin::update_order_status,
        handlers::admin::list_order_payments,
        handlers::admin::update_payment_status,
        handlers::admin::trigger_poll,
        handlers::admin::list_shipping_methods,
        handlers::admin::create_shipping_method,
        handlers::admin::update_shipping_method,
        handlers::admin::delete_shipping_method,
    ),
    components(
        schemas(
            ProductResponse,
            CartResponse,
            CartItemResponse,
            AddCartItemRequest,
            UpdateCartItemRequest,
            AddressType,
            AddressResponse,
            CreateAddressRequest,
            UpdateAddressRequest,
            ShippingMethodResponse,
            CreateShippingMethodRequest,
            UpdateShippingMethodRequest,
            CheckoutStep,
            OrderLine,
            DirectCheckoutItem,
            StartCheckoutRequest,
            SelectAddressRequest,
            SelectShippingRequest,
            PlaceOrderRequest,
            CheckoutSessionResponse,
            OrderStatus,
            OrderResponse,
            OrderItemResponse,
            AdminOrderResponse,
            UpdateOrderStatusRequest,
            QueueAlert,
            PaymentStatus,
            PaymentResponse,
            UpdatePaymentStatusRequest,
            PaginationParams,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "product", description = "Product catalog API"),
        (name = "cart", description = "Shopping cart API"),
        (name = "address", description = "Address book API"),
        (name = "shipping", description = "Shipping method API"),
        (name = "checkout", description = "Checkout wizard API"),
        (name = "order", description = "Order history API"),
        (name = "admin", description = "Admin order management API"),
    ),
    info(
        title = "Teahouse Fulfillment API",
        version = "1.0.0",
        description = "Order fulfillment backend REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

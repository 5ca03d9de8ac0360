use crate::entities::{AddressType, address_entity};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateAddressRequest {
    #[serde(rename = "type", default)]
    pub address_type: Option<AddressType>,
    pub full_name: String,
    pub phone: String,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateAddressRequest {
    #[serde(rename = "type", default)]
    pub address_type: Option<AddressType>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub street_address: Option<String>,
    pub street_address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    pub is_default: bool,
    pub full_name: String,
    pub phone: String,
    pub street_address: String,
    pub street_address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl From<address_entity::Model> for AddressResponse {
    fn from(m: address_entity::Model) -> Self {
        Self {
            id: m.id,
            address_type: m.address_type,
            is_default: m.is_default,
            full_name: m.full_name,
            phone: m.phone,
            street_address: m.street_address,
            street_address2: m.street_address2,
            city: m.city,
            state: m.state,
            postal_code: m.postal_code,
            country: m.country,
        }
    }
}

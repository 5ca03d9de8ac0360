use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 错误响应里 error 字段的载荷，形状与 error_response 输出一致
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

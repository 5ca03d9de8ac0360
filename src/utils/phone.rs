use crate::error::{AppError, AppResult};
use regex::Regex;

/// 验证收货电话格式，允许带分隔符的国际号码
pub fn validate_phone(phone: &str) -> AppResult<()> {
    let normalized = normalize_phone(phone);
    let phone_regex = Regex::new(r"^\+?[0-9]{7,15}$").unwrap();

    if !phone_regex.is_match(&normalized) {
        return Err(AppError::ValidationError(
            "电话格式无效，需要7到15位数字，可带+国家码".to_string(),
        ));
    }

    Ok(())
}

/// 去掉空格、连字符和括号等常见分隔符
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

use chrono::Utc;
use rand::Rng;

/// 生成订单号，格式为 ORD-{毫秒时间戳}-{6位随机数}。
/// 随机后缀用于避免同一毫秒内下单产生的冲突。
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("ORD-{}-{:06}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_order_numbers_are_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..10 {
            seen.insert(generate_order_number());
        }
        assert_eq!(seen.len(), 10);
    }
}

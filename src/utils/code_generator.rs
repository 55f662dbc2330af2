use uuid::Uuid;

/// 生成门票二维码哈希 (32 位十六进制)
///
/// 以随机 UUID 混入票档与持票人信息后取 md5，每次调用结果不同；
/// 全局唯一性最终由 tickets.qr_code_hash 唯一索引保证。
pub fn generate_qr_code_hash(tier_id: i64, holder_id: Option<i64>) -> String {
    let seed = format!(
        "{}:{}:{}",
        Uuid::new_v4(),
        tier_id,
        holder_id.map(|h| h.to_string()).unwrap_or_default()
    );
    format!("{:x}", md5::compute(seed.as_bytes()))
}

/// 生成订单在支付网关侧使用的商户引用
pub fn generate_provider_ref() -> String {
    format!("ord_{}", Uuid::new_v4().simple())
}

/// 生成分期付款记录的交易引用
pub fn generate_payment_ref() -> String {
    format!("pp_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_qr_code_hash_format() {
        let hash = generate_qr_code_hash(7, Some(42));
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_qr_code_hashes_differ_for_same_ticket_data() {
        let hashes: HashSet<String> = (0..500).map(|_| generate_qr_code_hash(1, None)).collect();
        assert_eq!(hashes.len(), 500);
    }

    #[test]
    fn test_refs_are_prefixed() {
        assert!(generate_provider_ref().starts_with("ord_"));
        assert!(generate_payment_ref().starts_with("pp_"));
        assert_ne!(generate_provider_ref(), generate_provider_ref());
    }
}

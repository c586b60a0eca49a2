use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

// 付款金额上限，超过视为录入错误
const MAX_PAYMENT_AMOUNT: f64 = 1_000_000.0;

static PAYMENT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9/_\- .#]+$").expect("Invalid payment ref regex"));

/// 校验付款金额：必须为有限正数且不超过上限
pub fn validate_payment_amount(amount: f64) -> Result<(), &'static str> {
    if !amount.is_finite() {
        return Err("Payment amount must be a finite number");
    }
    if amount <= 0.0 {
        return Err("Payment amount must be greater than zero");
    }
    if amount > MAX_PAYMENT_AMOUNT {
        return Err("Payment amount exceeds the allowed maximum");
    }
    Ok(())
}

/// 校验付款参考号（可选字段）：长度与字符集
pub fn validate_payment_ref(reference: &str) -> Result<(), &'static str> {
    if reference.is_empty() || reference.len() > 64 {
        return Err("Payment reference must be between 1 and 64 characters");
    }
    if !PAYMENT_REF_RE.is_match(reference) {
        return Err("Payment reference contains invalid characters");
    }
    Ok(())
}

/// 解析付款日期（YYYY-MM-DD），不接受未来日期
pub fn parse_payment_date(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, &'static str> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| "Payment date must be in YYYY-MM-DD format")?;

    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or("Payment date is out of range")?
        .and_utc();

    if datetime > now {
        return Err("Payment date cannot be in the future");
    }

    Ok(datetime)
}

/// 从原始文件名提取小写扩展名（包含点号）
pub fn file_extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_amount() {
        assert!(validate_payment_amount(0.01).is_ok());
        assert!(validate_payment_amount(100.0).is_ok());
        assert!(validate_payment_amount(999_999.99).is_ok());
    }

    #[test]
    fn test_invalid_amount() {
        assert!(validate_payment_amount(0.0).is_err());
        assert!(validate_payment_amount(-5.0).is_err());
        assert!(validate_payment_amount(f64::NAN).is_err());
        assert!(validate_payment_amount(f64::INFINITY).is_err());
        assert!(validate_payment_amount(2_000_000.0).is_err());
    }

    #[test]
    fn test_valid_payment_ref() {
        assert!(validate_payment_ref("TXN-2025-001").is_ok());
        assert!(validate_payment_ref("INV #42/3").is_ok());
    }

    #[test]
    fn test_invalid_payment_ref() {
        assert!(validate_payment_ref("").is_err());
        assert!(validate_payment_ref(&"x".repeat(65)).is_err());
        assert!(validate_payment_ref("ref\nwith\nnewlines").is_err());
    }

    #[test]
    fn test_parse_payment_date() {
        let now = "2025-08-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let parsed = parse_payment_date("2025-07-15", now).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2025-07-15");
    }

    #[test]
    fn test_parse_payment_date_rejects_future_and_garbage() {
        let now = "2025-08-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert!(parse_payment_date("2025-09-01", now).is_err());
        assert!(parse_payment_date("not-a-date", now).is_err());
        assert!(parse_payment_date("2025-13-40", now).is_err());
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("receipt.PDF"), ".pdf");
        assert_eq!(file_extension("scan.tar.gz"), ".gz");
        assert_eq!(file_extension("noext"), "");
    }
}

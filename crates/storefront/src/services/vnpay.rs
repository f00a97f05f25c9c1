//! VNPay return URL handling.
//!
//! After payment VNPay redirects the customer back with the transaction
//! outcome in the query string. This module turns that query into a
//! [`PaymentReturn`] and decides where the customer goes next.

use serde::Deserialize;

use phuphiem_core::Price;

/// Message shown for response codes without a specific text.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Thanh toán thất bại.";

/// The query VNPay appends to the return URL.
///
/// Every field is optional: a customer can hit the URL by hand.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentReturn {
    #[serde(rename = "vnp_ResponseCode")]
    pub response_code: Option<String>,
    #[serde(rename = "vnp_TransactionStatus")]
    pub transaction_status: Option<String>,
    /// Order reference.
    #[serde(rename = "vnp_TxnRef")]
    pub txn_ref: Option<String>,
    /// Amount in minor units (hundredths of a dong).
    #[serde(rename = "vnp_Amount")]
    pub amount: Option<String>,
    #[serde(rename = "vnp_BankCode")]
    pub bank_code: Option<String>,
    #[serde(rename = "vnp_TransactionNo")]
    pub transaction_no: Option<String>,
    #[serde(rename = "vnp_PayDate")]
    pub pay_date: Option<String>,
}

/// Where to send the customer after a payment return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { order_id: String, amount: Price },
    Failure { order_id: String, message: String },
}

impl PaymentReturn {
    /// Both the response code and the transaction status are `"00"`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_code.as_deref() == Some("00")
            && self.transaction_status.as_deref() == Some("00")
    }

    /// Paid amount in dong; zero when missing or unparsable.
    #[must_use]
    pub fn amount_dong(&self) -> Price {
        self.amount
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map_or(Price::ZERO, Price::from_minor_units)
    }

    /// Order reference, empty when VNPay did not send one.
    #[must_use]
    pub fn order_id(&self) -> &str {
        self.txn_ref.as_deref().unwrap_or("")
    }

    /// Classify the return.
    #[must_use]
    pub fn outcome(&self) -> PaymentOutcome {
        if self.is_success() {
            PaymentOutcome::Success {
                order_id: self.order_id().to_string(),
                amount: self.amount_dong(),
            }
        } else {
            PaymentOutcome::Failure {
                order_id: self.order_id().to_string(),
                message: failure_message(self.response_code.as_deref()).to_string(),
            }
        }
    }
}

impl PaymentOutcome {
    /// Result page URL for this outcome.
    #[must_use]
    pub fn redirect_url(&self) -> String {
        match self {
            Self::Success { order_id, amount } => format!(
                "/payment/success?orderId={}&amount={}",
                urlencoding::encode(order_id),
                amount.to_plain_string()
            ),
            Self::Failure { order_id, message } => format!(
                "/payment/failure?orderId={}&error={}",
                urlencoding::encode(order_id),
                urlencoding::encode(message)
            ),
        }
    }
}

/// Customer-facing text for a VNPay response code.
#[must_use]
pub fn failure_message(response_code: Option<&str>) -> &'static str {
    match response_code {
        Some("07") => {
            "Trừ tiền thành công. Giao dịch bị nghi ngờ (liên quan tới lừa đảo, giao dịch bất thường)."
        }
        Some("09") => "Thẻ/Tài khoản chưa đăng ký dịch vụ InternetBanking.",
        Some("10") => "Xác thực thông tin thẻ/tài khoản không đúng quá 3 lần.",
        Some("11") => "Đã hết hạn chờ thanh toán. Vui lòng thử lại.",
        Some("12") => "Thẻ/Tài khoản bị khóa.",
        Some("51") => "Tài khoản không đủ số dư để thực hiện giao dịch.",
        Some("65") => "Tài khoản đã vượt quá hạn mức giao dịch trong ngày.",
        Some("75") => "Ngân hàng thanh toán đang bảo trì.",
        Some("79") => "Nhập sai mật khẩu thanh toán quá số lần quy định.",
        _ => DEFAULT_FAILURE_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_return(code: &str, status: &str, amount: Option<&str>) -> PaymentReturn {
        PaymentReturn {
            response_code: Some(code.to_string()),
            transaction_status: Some(status.to_string()),
            txn_ref: Some("ORD123".to_string()),
            amount: amount.map(str::to_string),
            ..PaymentReturn::default()
        }
    }

    #[test]
    fn test_success_requires_both_codes() {
        assert!(payment_return("00", "00", None).is_success());
        assert!(!payment_return("00", "02", None).is_success());
        assert!(!payment_return("24", "00", None).is_success());
        assert!(!PaymentReturn::default().is_success());
    }

    #[test]
    fn test_success_redirect_divides_amount() {
        let outcome = payment_return("00", "00", Some("29500000")).outcome();
        assert_eq!(
            outcome.redirect_url(),
            "/payment/success?orderId=ORD123&amount=295000"
        );
    }

    #[test]
    fn test_missing_amount_is_zero() {
        assert_eq!(payment_return("00", "00", None).amount_dong(), Price::ZERO);
        assert_eq!(
            payment_return("00", "00", Some("12ab")).amount_dong(),
            Price::ZERO
        );
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            failure_message(Some("51")),
            "Tài khoản không đủ số dư để thực hiện giao dịch."
        );
        assert_eq!(failure_message(Some("99")), DEFAULT_FAILURE_MESSAGE);
        assert_eq!(failure_message(None), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn test_failure_redirect_encodes_message() {
        let outcome = payment_return("12", "02", None).outcome();
        let url = outcome.redirect_url();
        assert!(url.starts_with("/payment/failure?orderId=ORD123&error="));
        assert!(url.contains("Th%E1%BA%BB"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn test_deserialize_from_query() {
        let parsed: PaymentReturn = serde_json::from_value(serde_json::json!({
            "vnp_ResponseCode": "00",
            "vnp_TransactionStatus": "00",
            "vnp_TxnRef": "42",
            "vnp_Amount": "10000000",
            "vnp_BankCode": "NCB"
        }))
        .unwrap_or_default();
        assert!(parsed.is_success());
        assert_eq!(parsed.bank_code.as_deref(), Some("NCB"));
    }
}

/// Request field validation
///
/// Field-level checks used by the `validator` derives on request types and
/// by the query-string handlers.
use std::borrow::Cow;
use validator::ValidationError;

/// Length of an EVM address including the `0x` prefix
const EVM_ADDRESS_LEN: usize = 42;

/// `^0x[a-fA-F0-9]{40}$`
pub fn is_evm_address(value: &str) -> bool {
    value.len() == EVM_ADDRESS_LEN
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// `^0\.0\.\d+$`
pub fn is_hedera_account_id(value: &str) -> bool {
    match value.strip_prefix("0.0.") {
        Some(num) => !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

pub fn validate_evm_address(value: &str) -> Result<(), ValidationError> {
    if is_evm_address(value) {
        Ok(())
    } else {
        Err(field_error(
            "evm_address",
            "Must be a 0x-prefixed 20-byte hex address",
        ))
    }
}

pub fn validate_hedera_account_id(value: &str) -> Result<(), ValidationError> {
    if is_hedera_account_id(value) {
        Ok(())
    } else {
        Err(field_error(
            "hedera_account_id",
            "Must be a Hedera account id of the form 0.0.N",
        ))
    }
}

/// Return the trimmed value of a required query parameter
pub fn required_param<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

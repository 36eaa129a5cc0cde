//! 服务错误定义

use hmdp_common::{ShopId, VoucherId};
use hmdp_errors::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Shop not found: {0}")]
    NotFound(ShopId),

    #[error("Shop id must be positive")]
    InvalidId,

    #[error("Shop types not found")]
    TypesNotFound,
}

#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("Seckill voucher not found: {0}")]
    NotFound(VoucherId),

    #[error("Seckill voucher title is empty")]
    MissingTitle,

    #[error("Seckill stock must not be negative")]
    NegativeStock,

    #[error("Seckill begin time must be before end time")]
    InvalidTimeWindow,
}

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::NotFound(_) | ShopError::TypesNotFound => AppError::not_found(err.to_string()),
            ShopError::InvalidId => AppError::validation(err.to_string()),
        }
    }
}

impl From<VoucherError> for AppError {
    fn from(err: VoucherError) -> Self {
        match err {
            VoucherError::NotFound(_) => AppError::not_found(err.to_string()),
            VoucherError::MissingTitle
            | VoucherError::NegativeStock
            | VoucherError::InvalidTimeWindow => AppError::validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let err: AppError = ShopError::NotFound(ShopId::new(3)).into();
        assert_eq!(err.status_code(), 404);

        let err: AppError = VoucherError::InvalidTimeWindow.into();
        assert_eq!(err.status_code(), 400);
    }
}

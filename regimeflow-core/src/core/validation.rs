//! Order field validation shared between the backtest order manager (§4.5)
//! and the live order manager (§4.9: "validates order (same rules as
//! §4.5)") — both submit different concrete order types, so the shared
//! rule operates on the common shape rather than on either type directly.

use rust_decimal::Decimal;

use super::errors::{ErrorCode, Result};
use super::symbol_registry::SymbolId;
use super::types::OrderType;
use crate::rf_err;

/// `{symbol set, quantity > 0, limit_price > 0 for Limit/StopLimit,
/// stop_price > 0 for Stop/StopLimit}`.
pub fn validate_order_shape(
    symbol: SymbolId,
    quantity: Decimal,
    order_type: OrderType,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
) -> Result<()> {
    if symbol.is_unset() {
        return Err(rf_err!(ErrorCode::InvalidArgument, "order symbol not set"));
    }
    if quantity <= Decimal::ZERO {
        return Err(rf_err!(ErrorCode::InvalidArgument, "order quantity must be positive"));
    }
    if matches!(order_type, OrderType::Limit | OrderType::StopLimit)
        && limit_price.map(|p| p <= Decimal::ZERO).unwrap_or(true)
    {
        return Err(rf_err!(ErrorCode::InvalidArgument, "limit price required for {:?}", order_type));
    }
    if matches!(order_type, OrderType::Stop | OrderType::StopLimit)
        && stop_price.map(|p| p <= Decimal::ZERO).unwrap_or(true)
    {
        return Err(rf_err!(ErrorCode::InvalidArgument, "stop price required for {:?}", order_type));
    }
    Ok(())
}

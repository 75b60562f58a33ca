//! Live message codec (§6): a pipe-delimited text wire format, `{MD, EXEC,
//! POS, ACCT, SYS}|kind|...fields`. Pure parse/format — no I/O, no
//! transport; the message-queue/WebSocket transport itself is out of scope
//! (§1 Non-goals).
//!
//! Examples from §6: `MD|TICK|AAPL|1700000|101.5|2`,
//! `EXEC|BRK-1|EXEC-1|AAPL|BUY|10|100.0|0.0|FILLED|ok|1700001`.

use regimeflow_core::core::errors::{ErrorCode, Result};
use regimeflow_core::core::symbol_registry::{SymbolId, SymbolRegistry};
use regimeflow_core::core::types::{LiveOrderStatus, OrderSide, Quote, Tick, Timestamp};
use regimeflow_core::rf_err;
use rust_decimal::Decimal;

use crate::broker::{ExecutionReport, MarketMessage};

#[derive(Debug, Clone, PartialEq)]
pub enum LiveMessage {
    Market(MarketMessage),
    Execution(ExecutionReport),
    Position { symbol: SymbolId, quantity: Decimal, avg_cost: Decimal, timestamp: Timestamp },
    Account { cash: Decimal, buying_power: Decimal, timestamp: Timestamp },
    System(String),
}

fn field<'a>(parts: &[&'a str], idx: usize, line: &str) -> Result<&'a str> {
    parts.get(idx).copied().ok_or_else(|| rf_err!(ErrorCode::ParseError, "missing field {} in {:?}", idx, line))
}

fn parse_i64(s: &str, line: &str) -> Result<i64> {
    s.parse().map_err(|_| rf_err!(ErrorCode::ParseError, "bad integer {:?} in {:?}", s, line))
}

fn parse_f64(s: &str, line: &str) -> Result<f64> {
    s.parse().map_err(|_| rf_err!(ErrorCode::ParseError, "bad float {:?} in {:?}", s, line))
}

fn parse_decimal(s: &str, line: &str) -> Result<Decimal> {
    s.parse().map_err(|_| rf_err!(ErrorCode::ParseError, "bad decimal {:?} in {:?}", s, line))
}

fn parse_side(s: &str, line: &str) -> Result<OrderSide> {
    match s {
        "BUY" => Ok(OrderSide::Buy),
        "SELL" => Ok(OrderSide::Sell),
        _ => Err(rf_err!(ErrorCode::ParseError, "unknown side {:?} in {:?}", s, line)),
    }
}

fn parse_status(s: &str, line: &str) -> Result<LiveOrderStatus> {
    use LiveOrderStatus::*;
    Ok(match s {
        "PENDING_NEW" => PendingNew,
        "NEW" => New,
        "PARTIALLY_FILLED" => PartiallyFilled,
        "FILLED" => Filled,
        "PENDING_CANCEL" => PendingCancel,
        "CANCELLED" => Cancelled,
        "REJECTED" => Rejected,
        "EXPIRED" => Expired,
        "ERROR" => Error,
        _ => return Err(rf_err!(ErrorCode::ParseError, "unknown status {:?} in {:?}", s, line)),
    })
}

fn status_token(status: LiveOrderStatus) -> &'static str {
    use LiveOrderStatus::*;
    match status {
        PendingNew => "PENDING_NEW",
        New => "NEW",
        PartiallyFilled => "PARTIALLY_FILLED",
        Filled => "FILLED",
        PendingCancel => "PENDING_CANCEL",
        Cancelled => "CANCELLED",
        Rejected => "REJECTED",
        Expired => "EXPIRED",
        Error => "ERROR",
    }
}

/// Parses one line. `registry` interns/looks up the symbol text so the
/// resulting message carries the same dense [`SymbolId`] the rest of the
/// engine uses.
pub fn parse(line: &str, registry: &SymbolRegistry) -> Result<LiveMessage> {
    let parts: Vec<&str> = line.trim().split('|').collect();
    let topic = field(&parts, 0, line)?;
    match topic {
        "MD" => parse_market(&parts, line, registry),
        "EXEC" => parse_exec(&parts, line, registry),
        "POS" => parse_pos(&parts, line, registry),
        "ACCT" => parse_acct(&parts, line),
        "SYS" => Ok(LiveMessage::System(field(&parts, 1, line)?.to_string())),
        other => Err(rf_err!(ErrorCode::ParseError, "unknown topic {:?} in {:?}", other, line)),
    }
}

fn parse_market(parts: &[&str], line: &str, registry: &SymbolRegistry) -> Result<LiveMessage> {
    let kind = field(parts, 1, line)?;
    match kind {
        "TICK" => {
            let symbol = registry.intern(field(parts, 2, line)?);
            let timestamp = Timestamp(parse_i64(field(parts, 3, line)?, line)?);
            let price = parse_f64(field(parts, 4, line)?, line)?;
            let quantity = parse_f64(field(parts, 5, line)?, line)?;
            Ok(LiveMessage::Market(MarketMessage::Tick(Tick { timestamp, symbol, price, quantity, flags: 0 })))
        }
        "QUOTE" => {
            let symbol = registry.intern(field(parts, 2, line)?);
            let timestamp = Timestamp(parse_i64(field(parts, 3, line)?, line)?);
            let bid = parse_f64(field(parts, 4, line)?, line)?;
            let ask = parse_f64(field(parts, 5, line)?, line)?;
            let bid_size = parse_f64(field(parts, 6, line)?, line)?;
            let ask_size = parse_f64(field(parts, 7, line)?, line)?;
            Ok(LiveMessage::Market(MarketMessage::Quote(Quote { timestamp, symbol, bid, ask, bid_size, ask_size })))
        }
        other => Err(rf_err!(ErrorCode::ParseError, "unsupported MD kind {:?} in {:?}", other, line)),
    }
}

fn parse_exec(parts: &[&str], line: &str, registry: &SymbolRegistry) -> Result<LiveMessage> {
    let broker_order_id = field(parts, 1, line)?.to_string();
    let broker_exec_id_raw = field(parts, 2, line)?;
    let broker_exec_id = if broker_exec_id_raw == "-" { None } else { Some(broker_exec_id_raw.to_string()) };
    let symbol = registry.intern(field(parts, 3, line)?);
    let side = parse_side(field(parts, 4, line)?, line)?;
    let filled_quantity = parse_decimal(field(parts, 5, line)?, line)?;
    let avg_fill_price_raw = parse_decimal(field(parts, 6, line)?, line)?;
    let avg_fill_price = if avg_fill_price_raw.is_zero() { None } else { Some(avg_fill_price_raw) };
    let commission = parse_decimal(field(parts, 7, line)?, line)?;
    let status = parse_status(field(parts, 8, line)?, line)?;
    let message_raw = field(parts, 9, line)?;
    let message = if message_raw == "-" { None } else { Some(message_raw.to_string()) };
    let timestamp = Timestamp(parse_i64(field(parts, 10, line)?, line)?);

    Ok(LiveMessage::Execution(ExecutionReport {
        broker_order_id,
        broker_exec_id,
        symbol,
        side,
        status,
        filled_quantity,
        avg_fill_price,
        commission,
        message,
        timestamp,
    }))
}

fn parse_pos(parts: &[&str], line: &str, registry: &SymbolRegistry) -> Result<LiveMessage> {
    let symbol = registry.intern(field(parts, 1, line)?);
    let quantity = parse_decimal(field(parts, 2, line)?, line)?;
    let avg_cost = parse_decimal(field(parts, 3, line)?, line)?;
    let timestamp = Timestamp(parse_i64(field(parts, 4, line)?, line)?);
    Ok(LiveMessage::Position { symbol, quantity, avg_cost, timestamp })
}

fn parse_acct(parts: &[&str], line: &str) -> Result<LiveMessage> {
    let cash = parse_decimal(field(parts, 1, line)?, line)?;
    let buying_power = parse_decimal(field(parts, 2, line)?, line)?;
    let timestamp = Timestamp(parse_i64(field(parts, 3, line)?, line)?);
    Ok(LiveMessage::Account { cash, buying_power, timestamp })
}

/// Formats a message back to wire form; used by paper/simulated adapters
/// and by tests that check round-tripping. `name_of` resolves a
/// [`SymbolId`] back to its string form.
pub fn format(message: &LiveMessage, name_of: impl Fn(SymbolId) -> String) -> String {
    match message {
        LiveMessage::Market(MarketMessage::Tick(tick)) => {
            format!("MD|TICK|{}|{}|{}|{}", name_of(tick.symbol), tick.timestamp.0, tick.price, tick.quantity)
        }
        LiveMessage::Market(MarketMessage::Quote(quote)) => {
            format!(
                "MD|QUOTE|{}|{}|{}|{}|{}|{}",
                name_of(quote.symbol),
                quote.timestamp.0,
                quote.bid,
                quote.ask,
                quote.bid_size,
                quote.ask_size
            )
        }
        LiveMessage::Market(MarketMessage::Book(book)) => {
            format!("MD|BOOK|{}|{}", name_of(book.symbol), book.timestamp.0)
        }
        LiveMessage::Execution(report) => {
            let side = match report.side {
                OrderSide::Buy => "BUY",
                OrderSide::Sell => "SELL",
            };
            format!(
                "EXEC|{}|{}|{}|{}|{}|{}|{}|{}|{}|{}",
                report.broker_order_id,
                report.broker_exec_id.as_deref().unwrap_or("-"),
                name_of(report.symbol),
                side,
                report.filled_quantity,
                report.avg_fill_price.unwrap_or(Decimal::ZERO),
                report.commission,
                status_token(report.status),
                report.message.as_deref().unwrap_or("-"),
                report.timestamp.0
            )
        }
        LiveMessage::Position { symbol, quantity, avg_cost, timestamp } => {
            format!("POS|{}|{}|{}|{}", name_of(*symbol), quantity, avg_cost, timestamp.0)
        }
        LiveMessage::Account { cash, buying_power, timestamp } => {
            format!("ACCT|{}|{}|{}", cash, buying_power, timestamp.0)
        }
        LiveMessage::System(text) => format!("SYS|{}", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_the_spec_tick_example() {
        let registry = SymbolRegistry::new();
        let msg = parse("MD|TICK|AAPL|1700000|101.5|2", &registry).unwrap();
        match msg {
            LiveMessage::Market(MarketMessage::Tick(tick)) => {
                assert_eq!(tick.timestamp, Timestamp(1700000));
                assert_eq!(tick.price, 101.5);
                assert_eq!(tick.quantity, 2.0);
                assert_eq!(registry.name(tick.symbol).as_deref(), Some("AAPL"));
            }
            other => panic!("expected a tick, got {other:?}"),
        }
    }

    #[test]
    fn parses_the_spec_exec_example() {
        let registry = SymbolRegistry::new();
        let msg = parse("EXEC|BRK-1|EXEC-1|AAPL|BUY|10|100.0|0.0|FILLED|ok|1700001", &registry).unwrap();
        match msg {
            LiveMessage::Execution(report) => {
                assert_eq!(report.broker_order_id, "BRK-1");
                assert_eq!(report.broker_exec_id.as_deref(), Some("EXEC-1"));
                assert_eq!(report.side, OrderSide::Buy);
                assert_eq!(report.filled_quantity, dec!(10));
                assert_eq!(report.avg_fill_price, Some(dec!(100.0)));
                assert_eq!(report.status, LiveOrderStatus::Filled);
                assert_eq!(report.message.as_deref(), Some("ok"));
                assert_eq!(report.timestamp, Timestamp(1700001));
            }
            other => panic!("expected an execution report, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_format_and_parse() {
        let registry = SymbolRegistry::new();
        registry.intern("AAPL");
        let original = parse("MD|TICK|AAPL|1700000|101.5|2", &registry).unwrap();
        let line = format(&original, |id| registry.name(id).unwrap_or_default());
        let reparsed = parse(&line, &registry).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn unknown_topic_is_a_parse_error() {
        let registry = SymbolRegistry::new();
        let err = parse("WAT|1|2|3", &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn truncated_line_is_a_parse_error() {
        let registry = SymbolRegistry::new();
        let err = parse("MD|TICK|AAPL", &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }
}

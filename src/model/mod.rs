//! Types that represent the core data model, such as `Transaction` and `Layout`, and the
//! aggregations computed over them.
mod amount;
mod breakdown;
mod period;
mod schema;
mod transaction;

pub(crate) use amount::format_decimal;
pub use amount::{Amount, AmountError, AmountFormat};
pub use breakdown::{breakdown, type_shares, GroupBy, GroupTotals, TypeShares, NONE_KEY};
pub use period::{aggregate, Bucket, Period, PeriodTotals, Totals};
pub use schema::{Column, Layout};
pub(crate) use transaction::Cell;
pub use transaction::{RowIssue, Transaction, TransactionType, Transactions, TypeLabels};

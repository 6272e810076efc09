/// CSV export of the cycle series.
pub mod export;

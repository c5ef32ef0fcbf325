//! Asset adapters

mod idle_balances;

pub use idle_balances::IdleBalancesAdapter;

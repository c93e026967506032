mod ledger;
mod money;
mod position;
mod transaction;

pub use ledger::*;
pub use money::*;
pub use position::*;
pub use transaction::*;

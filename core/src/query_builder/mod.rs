mod expression;
mod page;
mod placeholder;
pub mod util;

pub use expression::{table, Direction, Operator, QueryExpression};
pub use page::Page;
pub use placeholder::Placeholder;

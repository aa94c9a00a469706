pub mod datum;
pub mod heap;
pub mod schema;
pub mod tx;

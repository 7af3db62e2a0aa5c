//! Small serde helpers shared by the data types.

pub mod time;

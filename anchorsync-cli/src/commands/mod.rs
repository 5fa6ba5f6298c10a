pub mod map;
pub mod records;
pub mod simulate;

mod csv;
mod summary;

#[cfg(test)]
mod tests;

pub use csv::{WrittenFiles, write_report};
pub use summary::print_summary;

pub mod access;
pub mod account;
pub mod catalog;
pub mod engagement;
pub mod filter;
pub mod helper_sort;
pub mod library;
pub mod pagination;
pub mod playlist;
pub mod stats;

#[cfg(test)]
pub mod testing;

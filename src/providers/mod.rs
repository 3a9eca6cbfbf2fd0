pub mod transit;

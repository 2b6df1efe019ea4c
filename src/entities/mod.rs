pub mod cost_user;
pub mod kv_entry;

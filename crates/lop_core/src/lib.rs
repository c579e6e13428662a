pub mod core_api;
pub mod gvas;
pub mod layout;
pub mod merge;
pub mod profile;
pub mod reader;
pub mod settings;
pub mod storage;
pub mod writer;

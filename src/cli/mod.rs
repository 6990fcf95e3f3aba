pub mod compile;
pub mod install;
pub mod module;
pub mod status;
pub mod uninstall;
pub mod update;

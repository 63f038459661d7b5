pub mod event;
pub mod flag;
pub mod mask;

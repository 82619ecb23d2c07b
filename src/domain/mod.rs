pub mod availability;
pub mod calendar_view;
pub mod selection;
pub mod session;

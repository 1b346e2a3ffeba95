//! Concrete feed implementations.

pub mod background;
pub mod calendar;
pub mod chat;
pub mod weather;

pub use background::BackgroundProvider;
pub use calendar::CalendarProvider;
pub use chat::ChatProvider;
pub use weather::WeatherProvider;
